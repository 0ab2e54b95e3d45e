//! Strength-driven learning plans
//!
//! Weak concepts get more reinforcement and the deeper co-occurrence
//! extraction pass; well-established concepts get a light touch.

use cognigraph_common::config::ExtractionConfig;

/// How to treat one concept during learning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearningPlan {
    /// Run the co-occurrence pass in addition to relation patterns
    pub deep_extraction: bool,

    /// Extra access reinforcements applied to the concept
    pub extra_reinforcement: u32,
}

pub struct AdaptiveLearner {
    config: ExtractionConfig,
}

impl AdaptiveLearner {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Derive the plan from the concept's current strength. Difficulty
    /// is graded: concepts under half the difficult threshold get double
    /// reinforcement.
    pub fn plan(&self, strength: f32) -> LearningPlan {
        let difficult = self.config.difficult_strength;
        let deep_extraction = strength < difficult;
        let extra_reinforcement = if strength < difficult / 2.0 {
            2
        } else if deep_extraction {
            1
        } else {
            0
        };

        LearningPlan {
            deep_extraction,
            extra_reinforcement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learner() -> AdaptiveLearner {
        AdaptiveLearner::new(ExtractionConfig::default())
    }

    #[test]
    fn test_new_concept_gets_full_treatment() {
        let plan = learner().plan(1.0);
        assert!(plan.deep_extraction);
        assert_eq!(plan.extra_reinforcement, 2);
    }

    #[test]
    fn test_middling_concept_gets_single_boost() {
        let plan = learner().plan(3.0);
        assert!(plan.deep_extraction);
        assert_eq!(plan.extra_reinforcement, 1);
    }

    #[test]
    fn test_established_concept_gets_light_touch() {
        let plan = learner().plan(8.0);
        assert!(!plan.deep_extraction);
        assert_eq!(plan.extra_reinforcement, 0);
    }
}
