//! Held-out evaluation of the tuned model

mod metrics;

pub use metrics::{binary_auc, roc_auc_ovr, ClassMetrics, ClassificationReport, ConfusionMatrix};

use crate::data::Dataset;
use crate::error::{Result, VintnerError};
use crate::training::{accuracy, TrainedModel};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Test-set results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub accuracy: f64,
    /// One-vs-rest macro ROC-AUC
    pub roc_auc: f64,
    pub report: ClassificationReport,
    pub confusion_matrix: ConfusionMatrix,
}

/// ROC-AUC for a fitted model, checking the probability capability first
pub fn roc_auc(model: &TrainedModel, test: &Dataset) -> Result<f64> {
    if !model.capabilities().probabilities {
        return Err(VintnerError::UnsupportedMetric(format!(
            "{} does not provide class probabilities",
            model.model_type()
        )));
    }
    let proba = model.predict_proba(test.x())?;
    roc_auc_ovr(test.y(), &proba, model.classes())
}

/// Evaluate on the test partition
///
/// Fails with `UnsupportedMetric` when the model has no probabilities or the
/// test labels hold a single class.
pub fn evaluate(model: &TrainedModel, test: &Dataset) -> Result<ModelEvaluation> {
    let y_pred = model.predict(test.x())?;
    let test_accuracy = accuracy(test.y(), &y_pred);
    let roc_auc = roc_auc(model, test)?;

    let report = ClassificationReport::compute(test.y(), &y_pred);
    let confusion_matrix = ConfusionMatrix::compute(test.y(), &y_pred);

    info!(
        test_accuracy,
        roc_auc,
        macro_f1 = report.macro_avg.f1_score,
        "Final evaluation"
    );

    Ok(ModelEvaluation {
        accuracy: test_accuracy,
        roc_auc,
        report,
        confusion_matrix,
    })
}
