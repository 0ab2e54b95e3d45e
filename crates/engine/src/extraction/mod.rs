//! Association extraction from free text
//!
//! Provides:
//! - Ordered regex relation patterns (causal, hierarchical, compositional,
//!   temporal, semantic)
//! - Co-occurrence extraction for difficult concepts
//! - Sequential and parallel extraction variants
//! - Adaptive learning plans per concept difficulty
//!
//! Analysis is a pure function of the text so it can run on worker tasks;
//! applying findings to the graph is a separate single-writer step.

mod adaptive;
mod parallel;

pub use adaptive::{AdaptiveLearner, LearningPlan};
pub use parallel::{BatchItem, ParallelExtractor};

use cognigraph_common::config::ExtractionConfig;
use cognigraph_common::model::AssociationType;
use cognigraph_common::text::tokenize;
use regex_lite::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::graph::KnowledgeGraph;

/// Where a finding came from; pattern findings also anchor to the host
/// concept they were extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingOrigin {
    Pattern,
    Cooccurrence,
}

/// One extracted relation between two text fragments
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub left: String,
    pub right: String,
    pub assoc_type: AssociationType,
    pub confidence: f32,
    pub origin: FindingOrigin,
}

/// Counts from applying findings to the graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub concepts_created: usize,
    pub associations_created: usize,
    pub associations_reinforced: usize,
}

/// An ordered relation pattern
struct RelationPattern {
    assoc_type: AssociationType,
    regex: Regex,
}

/// Build the ordered pattern table. Specific relations come before the
/// generic semantic fallback so "causes" never degrades to "is".
fn relation_patterns() -> Vec<RelationPattern> {
    let table: [(AssociationType, &str); 5] = [
        (
            AssociationType::Causal,
            r"^(.+?)\s+(?:causes?|leads?\s+to|results?\s+in|produces?)\s+(.+)$",
        ),
        (
            AssociationType::Hierarchical,
            r"^(.+?)\s+(?:is\s+a\s+kind\s+of|is\s+a\s+type\s+of|is\s+an?|are)\s+(.+)$",
        ),
        (
            AssociationType::Compositional,
            r"^(.+?)\s+(?:is\s+part\s+of|consists?\s+of|contains?|is\s+composed\s+of)\s+(.+)$",
        ),
        (
            AssociationType::Temporal,
            r"^(.+?)\s+(?:happens\s+before|happens\s+after|precedes?|follows?)\s+(.+)$",
        ),
        (
            AssociationType::Semantic,
            r"^(.+?)\s+(?:is|means?|relates?\s+to|resembles?)\s+(.+)$",
        ),
    ];

    table
        .into_iter()
        .map(|(assoc_type, pattern)| RelationPattern {
            assoc_type,
            regex: Regex::new(pattern).expect("relation pattern is valid"),
        })
        .collect()
}

/// Sequential association extractor
pub struct AssociationExtractor {
    config: ExtractionConfig,
    patterns: Arc<Vec<RelationPattern>>,
}

impl AssociationExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config,
            patterns: Arc::new(relation_patterns()),
        }
    }

    /// Pure analysis: derive findings from content alone. `deep` enables
    /// the co-occurrence pass used for difficult concepts.
    pub fn analyze(&self, content: &str, deep: bool) -> Vec<Finding> {
        let mut findings = self.pattern_findings(content);
        if deep {
            findings.extend(self.cooccurrence_findings(content));
        }
        findings
    }

    /// Apply findings to the graph: create/find both concepts and link
    /// them; existing links strengthen rather than duplicate. Pattern
    /// findings are additionally anchored to the host concept so that
    /// context expansion can walk from a learned statement to its parts.
    pub fn apply(
        &self,
        graph: &mut KnowledgeGraph,
        host: Option<&str>,
        findings: &[Finding],
    ) -> ExtractionReport {
        let mut report = ExtractionReport::default();

        for finding in findings {
            let (left_id, left_new) = graph.learn_concept(&finding.left, None, None);
            let (right_id, right_new) = graph.learn_concept(&finding.right, None, None);
            report.concepts_created += usize::from(left_new) + usize::from(right_new);

            if graph.add_association(&left_id, &right_id, finding.assoc_type, finding.confidence) {
                report.associations_created += 1;
            } else {
                report.associations_reinforced += 1;
            }

            if finding.origin == FindingOrigin::Pattern {
                if let Some(host_id) = host {
                    for part in [&left_id, &right_id] {
                        if host_id == part.as_str() {
                            continue;
                        }
                        if graph.add_association(
                            host_id,
                            part,
                            AssociationType::Semantic,
                            finding.confidence,
                        ) {
                            report.associations_created += 1;
                        } else {
                            report.associations_reinforced += 1;
                        }
                    }
                }
            }
        }

        report
    }

    /// Sequential extraction for one concept's content
    pub fn extract(
        &self,
        graph: &mut KnowledgeGraph,
        host: Option<&str>,
        content: &str,
        deep: bool,
    ) -> ExtractionReport {
        let findings = self.analyze(content, deep);
        debug!(findings = findings.len(), deep, "Extracted associations");
        self.apply(graph, host, &findings)
    }

    fn pattern_findings(&self, content: &str) -> Vec<Finding> {
        let mut findings = Vec::new();

        for sentence in split_sentences(content) {
            let sentence = sentence.to_lowercase();
            // First matching pattern wins; the table is ordered by
            // specificity
            for pattern in self.patterns.iter() {
                if let Some(caps) = pattern.regex.captures(&sentence) {
                    let left = clean_fragment(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
                    let right = clean_fragment(caps.get(2).map(|m| m.as_str()).unwrap_or(""));
                    if !left.is_empty() && !right.is_empty() && left != right {
                        findings.push(Finding {
                            left,
                            right,
                            assoc_type: pattern.assoc_type,
                            confidence: self.config.pattern_confidence,
                            origin: FindingOrigin::Pattern,
                        });
                    }
                    break;
                }
            }
        }

        findings
    }

    /// Sliding-window co-occurrence over content words. The per-window
    /// pair cap bounds the quadratic blow-up.
    fn cooccurrence_findings(&self, content: &str) -> Vec<Finding> {
        let words = tokenize(content);
        let window = self.config.window_size;
        if words.len() < 2 || window < 2 {
            return Vec::new();
        }

        let cap = self.config.window_pair_cap;
        let mut findings = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for chunk in words.windows(window.min(words.len())) {
            for (i, left) in chunk.iter().take(cap).enumerate() {
                for right in chunk.iter().skip(i + 1).take(cap) {
                    if left == right {
                        continue;
                    }
                    if seen.insert((left.clone(), right.clone())) {
                        findings.push(Finding {
                            left: left.clone(),
                            right: right.clone(),
                            assoc_type: AssociationType::Semantic,
                            confidence: self.config.cooccurrence_confidence,
                            origin: FindingOrigin::Cooccurrence,
                        });
                    }
                }
            }
        }

        findings
    }
}

/// Split text into sentences on terminal punctuation
fn split_sentences(text: &str) -> Vec<String> {
    text.split(['.', '?', '!', ';'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Strip articles and stray punctuation from a captured fragment
fn clean_fragment(fragment: &str) -> String {
    let trimmed = fragment
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .trim();
    let without_article = trimmed
        .strip_prefix("the ")
        .or_else(|| trimmed.strip_prefix("an "))
        .or_else(|| trimmed.strip_prefix("a "))
        .unwrap_or(trimmed);
    without_article.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognigraph_common::config::GraphConfig;

    fn extractor() -> AssociationExtractor {
        AssociationExtractor::new(ExtractionConfig::default())
    }

    #[test]
    fn test_causal_pattern() {
        let findings = extractor().analyze("Smoking causes cancer.", false);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].assoc_type, AssociationType::Causal);
        assert_eq!(findings[0].left, "smoking");
        assert_eq!(findings[0].right, "cancer");
        assert!((findings[0].confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_hierarchical_beats_semantic() {
        let findings = extractor().analyze("A dog is a kind of animal.", false);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].assoc_type, AssociationType::Hierarchical);
    }

    #[test]
    fn test_semantic_fallback() {
        let findings = extractor().analyze("The sky is blue.", false);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].assoc_type, AssociationType::Semantic);
        assert_eq!(findings[0].left, "sky");
        assert_eq!(findings[0].right, "blue");
    }

    #[test]
    fn test_multiple_sentences() {
        let findings = extractor().analyze("A causes B. B causes C.", false);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.assoc_type == AssociationType::Causal));
    }

    #[test]
    fn test_cooccurrence_capped() {
        let ex = extractor();
        let findings = ex.analyze("alpha beta gamma delta epsilon", true);
        let cooc: Vec<_> = findings
            .iter()
            .filter(|f| (f.confidence - 0.5).abs() < f32::EPSILON)
            .collect();
        assert!(!cooc.is_empty());
        // Window of 3 with cap 3: pairs only within a window
        assert!(cooc.iter().all(|f| f.left != f.right));
        assert!(!cooc
            .iter()
            .any(|f| f.left == "alpha" && f.right == "epsilon"));
    }

    #[test]
    fn test_apply_strengthens_existing() {
        let ex = extractor();
        let mut graph = KnowledgeGraph::new(GraphConfig::default());

        let first = ex.extract(&mut graph, None, "Rain causes floods.", false);
        assert_eq!(first.concepts_created, 2);
        assert_eq!(first.associations_created, 1);

        let second = ex.extract(&mut graph, None, "Rain causes floods.", false);
        assert_eq!(second.concepts_created, 0);
        assert_eq!(second.associations_created, 0);
        assert_eq!(second.associations_reinforced, 1);
        assert_eq!(graph.stats().association_count, 1);
    }

    #[test]
    fn test_pattern_findings_anchor_to_host() {
        let ex = extractor();
        let mut graph = KnowledgeGraph::new(GraphConfig::default());
        let (host, _) = graph.learn_concept("The sky is blue.", None, None);

        ex.extract(&mut graph, Some(&host), "The sky is blue.", false);

        let sky = cognigraph_common::model::concept_id("sky");
        let blue = cognigraph_common::model::concept_id("blue");
        assert!(graph.association_between(&sky, &blue).is_some());
        assert!(graph.association_between(&host, &sky).is_some());
        assert!(graph.association_between(&host, &blue).is_some());
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let findings = extractor().analyze("lorem ipsum dolor", false);
        assert!(findings.is_empty());
    }
}
