//! Classification metrics

use crate::error::{Result, VintnerError};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Precision, recall and F1 for one class or one average
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class report with macro and weighted averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Keyed by class label
    pub classes: BTreeMap<i64, ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    /// Build the report over the union of true and predicted labels
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let confusion = ConfusionMatrix::compute(y_true, y_pred);
        let n = confusion.total();
        let mut classes = BTreeMap::new();

        for (k, &label) in confusion.labels.iter().enumerate() {
            let tp = confusion.matrix[k][k];
            let support: usize = confusion.matrix[k].iter().sum();
            let predicted: usize = confusion.matrix.iter().map(|row| row[k]).sum();

            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1_score = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            classes.insert(
                label,
                ClassMetrics {
                    precision,
                    recall,
                    f1_score,
                    support,
                },
            );
        }

        let n_classes = classes.len().max(1) as f64;
        let macro_avg = ClassMetrics {
            precision: classes.values().map(|m| m.precision).sum::<f64>() / n_classes,
            recall: classes.values().map(|m| m.recall).sum::<f64>() / n_classes,
            f1_score: classes.values().map(|m| m.f1_score).sum::<f64>() / n_classes,
            support: n,
        };

        let weight = |f: fn(&ClassMetrics) -> f64| -> f64 {
            if n == 0 {
                return 0.0;
            }
            classes.values().map(|m| f(m) * m.support as f64).sum::<f64>() / n as f64
        };
        let weighted_avg = ClassMetrics {
            precision: weight(|m| m.precision),
            recall: weight(|m| m.recall),
            f1_score: weight(|m| m.f1_score),
            support: n,
        };

        let correct: usize = (0..confusion.labels.len()).map(|k| confusion.matrix[k][k]).sum();

        Self {
            accuracy: ratio(correct, n),
            classes,
            macro_avg,
            weighted_avg,
        }
    }
}

/// Rows are true labels, columns predicted labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<i64>,
    pub matrix: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut labels: Vec<i64> = y_true
            .iter()
            .chain(y_pred.iter())
            .map(|&v| v.round() as i64)
            .collect();
        labels.sort_unstable();
        labels.dedup();

        let mut matrix = vec![vec![0usize; labels.len()]; labels.len()];
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            let (Ok(i), Ok(j)) = (
                labels.binary_search(&(t.round() as i64)),
                labels.binary_search(&(p.round() as i64)),
            ) else {
                continue;
            };
            matrix[i][j] += 1;
        }

        Self { labels, matrix }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }
}

/// One-vs-rest macro ROC-AUC.
///
/// `proba` columns are aligned with `classes`. Averages over the classes
/// present in `y_true`; fewer than two present classes is unsupported.
pub fn roc_auc_ovr(y_true: &Array1<f64>, proba: &Array2<f64>, classes: &[i64]) -> Result<f64> {
    if proba.nrows() != y_true.len() || proba.ncols() != classes.len() {
        return Err(VintnerError::ShapeError {
            expected: format!("({}, {})", y_true.len(), classes.len()),
            actual: format!("{:?}", proba.dim()),
        });
    }

    let labels: Vec<i64> = y_true.iter().map(|&v| v.round() as i64).collect();
    let mut present = labels.clone();
    present.sort_unstable();
    present.dedup();
    if present.len() < 2 {
        return Err(VintnerError::UnsupportedMetric(format!(
            "ROC-AUC needs at least two classes in y_true, found {}",
            present.len()
        )));
    }

    let mut total = 0.0;
    for &class in &present {
        let positives: Vec<bool> = labels.iter().map(|&l| l == class).collect();
        let scores: Vec<f64> = match classes.iter().position(|&c| c == class) {
            Some(k) => proba.column(k).to_vec(),
            None => vec![0.0; labels.len()],
        };
        // Both groups are non-empty since two classes are present
        total += binary_auc(&scores, &positives).unwrap_or(0.5);
    }
    Ok(total / present.len() as f64)
}

/// Mann-Whitney AUC with averaged ranks for tied scores
pub fn binary_auc(scores: &[f64], positives: &[bool]) -> Option<f64> {
    let n_pos = positives.iter().filter(|&&p| p).count();
    let n_neg = positives.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie group
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = ranks.iter().zip(positives).filter(|(_, &p)| p).map(|(r, _)| r).sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    Some(u / (n_pos * n_neg) as f64)
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
