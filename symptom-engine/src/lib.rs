//! Maps reported symptoms to a probable condition, a confidence score and a
//! specialist recommendation.
//!
//! Two modes share one trained [`ClassificationTree`]:
//! * one-shot: [`DiagnosisEngine::diagnose`] takes free-text symptoms, matches
//!   them against the [`SymptomCatalog`], encodes them and predicts a disease;
//! * interactive: a caller-owned [`TraversalState`] walks the same tree one
//!   yes/no question at a time until it reaches a leaf, then
//!   [`DiagnosisEngine::conclude_traversal`] scores the affirmed symptoms.

pub mod catalog;
pub mod config;
pub mod dataset;
pub mod directory;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod profile;
pub mod traversal;
pub mod tree;

// Re-export commonly used types
pub use catalog::SymptomCatalog;
pub use config::EngineConfig;
pub use dataset::{DEFAULT_LABEL_COLUMN, TrainingData, TrainingTable};
pub use directory::{DoctorDirectory, DoctorRecommendation};
pub use encoder::{FeatureVector, encode};
pub use engine::{DiagnosisEngine, DiagnosisResult, SymptomResolution, confidence};
pub use error::{DiagnosisError, Result};
pub use matcher::{DEFAULT_MATCH_THRESHOLD, SymptomMatch, SymptomMatcher, normalize, similarity};
pub use profile::DiseaseProfileTable;
pub use traversal::{Answer, Question, TraversalState, TraversalStatus};
pub use tree::{ClassificationTree, NodeId, TreeArtifact, TreeNode};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn engine() -> DiagnosisEngine {
        let catalog = SymptomCatalog::new(["fever", "cough", "fatigue"]).unwrap();
        let profiles = DiseaseProfileTable::from_profiles(
            &catalog,
            [
                ("flu", vec!["fever", "cough", "fatigue"]),
                ("cold", vec!["cough"]),
            ],
        )
        .unwrap();
        let tree = ClassificationTree::new(
            vec![TreeNode::split(0, 1, 2), TreeNode::leaf("cold"), TreeNode::leaf("flu")],
            &catalog,
        )
        .unwrap();
        DiagnosisEngine::new(catalog, profiles, tree, DoctorDirectory::default()).unwrap()
    }

    #[test]
    fn test_engine_shared_across_threads() {
        let engine = Arc::new(engine());

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let mut state = engine.start_traversal();
                    let answer = if i % 2 == 0 { Answer::Yes } else { Answer::No };
                    state.answer(engine.tree(), answer).unwrap();
                    engine.conclude_traversal(&state).unwrap().disease
                })
            })
            .collect();

        let diseases: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(diseases, ["flu", "cold", "flu", "cold"]);
    }

    #[test]
    fn test_one_shot_and_interactive_agree_on_confidence() {
        let engine = engine();

        let one_shot = engine.diagnose(&["fever"]).unwrap();

        let mut state = engine.start_traversal();
        state.answer_yes(engine.tree()).unwrap();
        let interactive = engine.conclude_traversal(&state).unwrap();

        assert_eq!(one_shot, interactive);
    }
}
