use serde::Serialize;

use crate::error::{ClassifierError, Result};

/// A single point on the ROC curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocPoint {
    /// Score threshold at which this point is computed (cells with a score
    /// `>=` threshold are called positive).
    pub threshold: f64,
    /// False positive rate: FP / (FP + TN).
    pub fpr: f64,
    /// True positive rate: TP / (TP + FN).
    pub tpr: f64,
}

/// ROC curve with the area under it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RocCurve {
    /// Points from (0, 0) to (1, 1), one per distinct observed score.
    pub points: Vec<RocPoint>,
    /// Area under the ROC curve (trapezoidal rule).
    pub auc: f64,
}

/// Compute the ROC curve from predicted scores and binary labels.
///
/// Sorts by descending score and walks every distinct score as a threshold,
/// so the curve spans the observed score range. The first point sits at
/// `+inf` (nothing called positive), the last at the lowest score.
///
/// # Arguments
///
/// * `scores` - Predicted probability (or any monotone score) per sample.
/// * `labels` - `true` for samples of the positive class.
///
/// # Errors
///
/// `ClassifierError::Data` if the slices differ in length or either class is
/// absent (the curve is undefined with one class).
pub fn roc_curve(scores: &[f64], labels: &[bool]) -> Result<RocCurve> {
    if scores.len() != labels.len() {
        return Err(ClassifierError::Data(format!(
            "{} scores but {} labels",
            scores.len(),
            labels.len()
        )));
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(ClassifierError::Data("NaN found in scores".to_string()));
    }

    let total_pos = labels.iter().filter(|&&l| l).count();
    let total_neg = labels.len() - total_pos;
    if total_pos == 0 || total_neg == 0 {
        return Err(ClassifierError::Data(format!(
            "ROC needs both classes, got {} positive and {} negative cells",
            total_pos, total_neg
        )));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let p = total_pos as f64;
    let n = total_neg as f64;

    let mut points = Vec::with_capacity(scores.len() + 1);
    points.push(RocPoint {
        threshold: f64::INFINITY,
        fpr: 0.0,
        tpr: 0.0,
    });

    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < order.len() {
        // all samples sharing a score move together
        let current = scores[order[i]];
        while i < order.len() && scores[order[i]] == current {
            if labels[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold: current,
            fpr: fp as f64 / n,
            tpr: tp as f64 / p,
        });
    }

    let auc = trapezoidal_auc(&points);
    Ok(RocCurve { points, auc })
}

/// Area under the ROC curve. Shorthand for `roc_curve(scores, labels)?.auc`.
pub fn roc_auc(scores: &[f64], labels: &[bool]) -> Result<f64> {
    Ok(roc_curve(scores, labels)?.auc)
}

fn trapezoidal_auc(points: &[RocPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
        .sum()
}

/// Confusion counts of binary predictions against true labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionCounts {
    pub fn from_predictions(predictions: &[bool], labels: &[bool]) -> Self {
        let mut counts = ConfusionCounts::default();
        for (&pred, &truth) in predictions.iter().zip(labels) {
            match (pred, truth) {
                (true, true) => counts.true_positive += 1,
                (true, false) => counts.false_positive += 1,
                (false, false) => counts.true_negative += 1,
                (false, true) => counts.false_negative += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// Fraction of correct calls; 0 for an empty set.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.true_positive + self.true_negative) as f64 / total as f64
    }
}

/// Fraction of predictions equal to the true labels.
pub fn accuracy(predictions: &[bool], labels: &[bool]) -> f64 {
    ConfusionCounts::from_predictions(predictions, labels).accuracy()
}
