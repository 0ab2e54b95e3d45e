//! End-to-end scenarios against the engine façade with the embedded
//! storage and analyzer bindings.

use std::sync::Arc;

use cognigraph_common::config::EngineConfig;
use cognigraph_common::errors::EngineError;
use cognigraph_common::storage::MemoryStore;
use cognigraph_common::text::HashingAnalyzer;
use cognigraph_engine::{ReasoningEngine, StreamStage};
use tokio_stream::StreamExt;

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn engine() -> Arc<ReasoningEngine> {
    init_tracing();
    Arc::new(
        ReasoningEngine::new(
            EngineConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::new(HashingAnalyzer::default()),
        )
        .expect("default engine builds"),
    )
}

#[tokio::test]
async fn test_empty_graph_query() {
    let engine = engine();
    let response = engine.ask("What color is the sky?").await.unwrap();

    assert_eq!(response.confidence, 0.0);
    assert!(response.answer.contains("No relevant concepts"));
}

#[tokio::test]
async fn test_learn_then_ask() {
    let engine = engine();
    let outcome = engine.learn("The sky is blue.", None, None).await.unwrap();
    assert!(outcome.created);
    assert!(outcome.extraction.concepts_created >= 2);

    let response = engine.ask("What color is the sky?").await.unwrap();
    assert!(response.confidence > 0.0);
    assert!(response.answer.contains("blue"));
    assert!(!response.explanation.is_empty());
}

#[tokio::test]
async fn test_multi_hop_chain() {
    let engine = engine();
    engine.learn("Alpha causes beta.", None, None).await.unwrap();
    engine.learn("Beta causes gamma.", None, None).await.unwrap();

    let response = engine.ask("alpha gamma").await.unwrap();
    assert!(response.confidence > 0.0);
    assert!(!response.paths.is_empty());
    assert!(response.paths.iter().any(|p| p.hop_count() >= 2));
}

#[tokio::test]
async fn test_duplicate_learning_reinforces() {
    let engine = engine();
    let mut ids = Vec::new();
    for i in 0..5 {
        let outcome = engine.learn("The sky is blue.", None, None).await.unwrap();
        assert_eq!(outcome.created, i == 0);
        ids.push(outcome.concept_id);
    }

    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    let hits = engine.search_concepts("sky blue", 5).await.unwrap();
    let host = hits
        .iter()
        .find(|h| h.id == ids[0])
        .expect("host concept findable");
    assert_eq!(host.content, "The sky is blue.");

    let stats = engine.stats().await;
    // One host plus the extracted word concepts, not five duplicates
    assert!(stats.concepts < 10);
}

#[tokio::test]
async fn test_access_count_tracks_learn_events() {
    let engine = engine();
    let mut last = None;
    for _ in 0..5 {
        last = Some(engine.learn("Fire makes smoke rise.", None, None).await.unwrap());
    }
    let outcome = last.unwrap();

    // The KB snapshot exposes the stored access counter
    let path = std::env::temp_dir().join(format!("cognigraph-count-{}.json", std::process::id()));
    engine.save_to_file(&path).await.unwrap();
    let bytes = std::fs::read(&path).unwrap();
    let kb: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let count = kb["concepts"][&outcome.concept_id]["access_count"].as_u64().unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(count, 5);
}

#[tokio::test]
async fn test_cache_hit_and_invalidation() {
    let engine = engine();
    engine.learn("Coffee contains caffeine.", None, None).await.unwrap();

    engine.ask("does coffee wake you up").await.unwrap();
    engine.ask("does coffee wake you up").await.unwrap();
    let stats = engine.stats().await;
    assert_eq!(stats.cache.hits, 1);

    // Learning content that shares a query word must invalidate
    engine.learn("Coffee is roasted from beans.", None, None).await.unwrap();
    engine.ask("does coffee wake you up").await.unwrap();
    let stats = engine.stats().await;
    assert_eq!(stats.cache.hits, 1);
    assert!(stats.cache.misses >= 2);
}

#[tokio::test]
async fn test_streaming_stage_order() {
    let engine = engine();
    engine.learn("The sky is blue.", None, None).await.unwrap();

    let mut stream = engine.stream_query("What color is the sky?");
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk);
    }

    fn rank(stage: StreamStage) -> u8 {
        match stage {
            StreamStage::Initial => 0,
            StreamStage::Refining => 1,
            StreamStage::Consensus => 2,
            StreamStage::Complete => 3,
        }
    }

    // initial, then one refinement per productive pair search, then
    // consensus and completion
    assert_eq!(chunks.first().unwrap().stage, StreamStage::Initial);
    assert!(chunks.iter().any(|c| c.stage == StreamStage::Refining));
    assert_eq!(
        chunks.iter().filter(|c| c.stage == StreamStage::Consensus).count(),
        1
    );
    assert_eq!(chunks.last().unwrap().stage, StreamStage::Complete);
    assert!(chunks
        .windows(2)
        .all(|w| rank(w[0].stage) <= rank(w[1].stage)));

    assert!(chunks
        .windows(2)
        .all(|w| w[0].paths_found <= w[1].paths_found));
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.is_final, i == chunks.len() - 1);
    }
    assert!(chunks.last().unwrap().answer.contains("blue"));
}

#[tokio::test]
async fn test_streaming_empty_graph_completes() {
    let engine = engine();
    let mut stream = engine.stream_query("anything at all");
    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk);
    }

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].stage, StreamStage::Initial);
    let last = chunks.last().unwrap();
    assert_eq!(last.stage, StreamStage::Complete);
    assert!(last.is_final);
    assert_eq!(last.confidence, 0.0);
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let engine = engine();
    engine.learn("Rivers flow into oceans.", None, None).await.unwrap();
    engine.learn("Oceans hold salt water.", None, None).await.unwrap();
    let before = engine.stats().await;

    let path = std::env::temp_dir().join(format!("cognigraph-kb-{}.json", std::process::id()));
    engine.save_to_file(&path).await.unwrap();

    let restored = self::engine();
    let loaded = restored.load_from_file(&path).await.unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded, before.concepts);
    let after = restored.stats().await;
    assert_eq!(after.concepts, before.concepts);
    assert_eq!(after.associations, before.associations);

    let response = restored.ask("rivers oceans").await.unwrap();
    assert!(response.confidence > 0.0);
}

#[tokio::test]
async fn test_batch_learning() {
    let engine = engine();
    let contents: Vec<String> = (0..30)
        .map(|i| format!("Process {} causes result {}.", i, i))
        .collect();

    let report = engine.learn_batch(&contents).await.unwrap();
    assert_eq!(report.learned, 30);
    assert_eq!(report.failed, 0);
    assert!(report.extraction.associations_created >= 30);

    let stats = engine.stats().await;
    assert!(stats.concepts >= 30);
}

#[tokio::test]
async fn test_batch_skips_empty_items() {
    let engine = engine();
    let contents = vec![
        "Wind turns turbines.".to_string(),
        "   ".to_string(),
        "Turbines generate power.".to_string(),
    ];

    let report = engine.learn_batch(&contents).await.unwrap();
    assert_eq!(report.learned, 2);
    assert_eq!(report.failed, 1);
}

#[tokio::test]
async fn test_contradiction_surfaced_on_learn() {
    let engine = engine();
    engine.learn("The reactor is safe today.", None, None).await.unwrap();
    let outcome = engine
        .learn("The reactor is dangerous today.", None, None)
        .await
        .unwrap();

    assert!(!outcome.contradictions.is_empty());
}

#[tokio::test]
async fn test_dimension_mismatch_rejected_at_construction() {
    let result = ReasoningEngine::new(
        EngineConfig::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(HashingAnalyzer::new(64)),
    );
    assert!(matches!(
        result,
        Err(EngineError::DimensionMismatch {
            expected: 256,
            actual: 64
        })
    ));
}

#[tokio::test]
async fn test_decay_and_prune_on_fresh_graph_is_noop() {
    let engine = engine();
    engine.learn("Stars emit light.", None, None).await.unwrap();

    let report = engine.decay_and_prune().await.unwrap();
    assert_eq!(report.concepts_removed, 0);

    let response = engine.ask("stars light").await.unwrap();
    assert!(response.confidence >= 0.0);
}

#[tokio::test]
async fn test_search_concepts_fuses_lexical_and_semantic() {
    let engine = engine();
    engine.learn("Honey is made by bees.", None, None).await.unwrap();
    engine.learn("Concrete hardens over days.", None, None).await.unwrap();

    let hits = engine.search_concepts("bees honey", 3).await.unwrap();
    assert!(!hits.is_empty());
    assert!(hits[0].content.to_lowercase().contains("honey") || hits[0].content.contains("bees"));
    assert!(hits.iter().all(|h| h.score > 0.0));
}
