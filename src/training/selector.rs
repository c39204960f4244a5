//! Validation-driven model selection

use crate::error::{Result, VintnerError};
use tracing::info;

use super::candidates::CandidateModel;

/// Index of the highest score; exact ties keep the earliest entry
pub fn best_index<I>(scores: I) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, score) in scores.into_iter().enumerate() {
        match best {
            Some((_, b)) if score <= b => {}
            _ if score.is_nan() => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}

/// Pick the candidate with maximal validation accuracy.
///
/// `candidates` must be in registration order.
pub fn select_best(candidates: &[CandidateModel]) -> Result<&CandidateModel> {
    let idx = best_index(candidates.iter().map(|c| c.metrics.validation_accuracy))
        .ok_or_else(|| VintnerError::TrainingError("no successful candidates".to_string()))?;
    let best = &candidates[idx];
    info!(
        algorithm = %best.algorithm,
        validation_accuracy = best.metrics.validation_accuracy,
        "Selected best candidate"
    );
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{CandidateMetrics, DummyClassifier, Hyperparameters, ModelRegistry, Tier, TrainedModel};
    use std::collections::HashMap;

    fn candidate(id: &str, validation_accuracy: f64) -> CandidateModel {
        CandidateModel {
            algorithm: id.to_string(),
            tier: Tier::Baseline,
            params: Hyperparameters::new(),
            model: TrainedModel::Dummy(DummyClassifier::new()),
            metrics: CandidateMetrics {
                train_accuracy: 0.0,
                validation_accuracy,
                cv_mean: 0.0,
                cv_std: 0.0,
                training_time_secs: 0.0,
            },
        }
    }

    #[test]
    fn test_tie_goes_to_first_registered() {
        let registry = ModelRegistry::standard();
        let mut by_name: HashMap<String, CandidateModel> = HashMap::new();
        by_name.insert("KNN".to_string(), candidate("KNN", 0.62));
        by_name.insert("DecisionTree".to_string(), candidate("DecisionTree", 0.62));
        by_name.insert("DummyClassifier".to_string(), candidate("DummyClassifier", 0.41));

        // Whatever order the map yields, registration order decides
        let mut ordered: Vec<CandidateModel> = by_name.into_values().collect();
        ordered.sort_by_key(|c| registry.position(&c.algorithm));

        assert_eq!(select_best(&ordered).unwrap().algorithm, "DecisionTree");
    }

    #[test]
    fn test_strictly_better_wins() {
        let candidates = vec![candidate("A", 0.5), candidate("B", 0.7), candidate("C", 0.6)];
        assert_eq!(select_best(&candidates).unwrap().algorithm, "B");
    }

    #[test]
    fn test_empty_input_is_training_error() {
        match select_best(&[]) {
            Err(VintnerError::TrainingError(msg)) => assert_eq!(msg, "no successful candidates"),
            other => panic!("unexpected {:?}", other.map(|c| c.algorithm.clone())),
        }
    }

    #[test]
    fn test_best_index_skips_nan() {
        assert_eq!(best_index([f64::NAN, 0.3, 0.3]), Some(1));
        assert_eq!(best_index(Vec::<f64>::new()), None);
    }
}
