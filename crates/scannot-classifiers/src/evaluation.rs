//! Scoring a trained classifier against labeled cells.
use serde::Serialize;

use crate::classifier::CellTypeClassifier;
use crate::error::{ClassifierError, Result};
use crate::labels::{count_labels, restrict_to_parent, Label, LabelSource};
use crate::models::ClassifierModel;
use crate::population::CellPopulation;
use crate::stats::{roc_curve, ConfusionCounts, RocCurve};
use crate::taxonomy::lineage_positive;

/// Everything computed while evaluating one classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub cell_type: String,
    pub threshold: f64,
    /// Resolved label of every cell of the population (after parent filtering).
    pub labels: Vec<Label>,
    /// Indices of the non-ambiguous cells that were scored.
    pub cells: Vec<usize>,
    /// Predicted probability for each entry of `cells`.
    pub probabilities: Vec<f64>,
    /// Positive call at `threshold` for each entry of `cells`.
    pub predictions: Vec<bool>,
    pub accuracy: f64,
    pub auc: f64,
    pub roc: RocCurve,
    pub confusion: ConfusionCounts,
}

/// Evaluate `classifier` on a labeled population.
///
/// `ancestry` (root first, direct parent last) filters the population the
/// same way training does. Fails with `ClassifierError::Data` when fewer
/// than two label classes remain.
pub fn evaluate_classifier<M, P, A>(
    classifier: &CellTypeClassifier<M>,
    population: &P,
    labels: &LabelSource,
    assay: Option<&str>,
    ancestry: &[&CellTypeClassifier<A>],
) -> Result<EvaluationReport>
where
    M: ClassifierModel,
    P: CellPopulation + ?Sized,
    A: ClassifierModel,
{
    let cell_type = classifier.cell_type();
    let mut resolved = labels.resolve(population, cell_type)?;

    if !ancestry.is_empty() {
        let passed = lineage_positive(ancestry, population, assay)?;
        let (demoted, outside) = restrict_to_parent(&mut resolved, &passed);
        log::debug!(
            "Evaluation of '{}': {} incoherent positives and {} out-of-parent negatives dropped",
            cell_type,
            demoted,
            outside
        );
    }

    let (positives, negatives, ambiguous) = count_labels(&resolved);
    if positives == 0 || negatives == 0 {
        return Err(ClassifierError::Data(format!(
            "evaluating '{}' needs positive and negative cells, got {} positive and {} negative",
            cell_type, positives, negatives
        )));
    }

    let cells: Vec<usize> = (0..resolved.len())
        .filter(|&i| !resolved[i].is_ambiguous())
        .collect();
    let truth: Vec<bool> = cells
        .iter()
        .map(|&i| resolved[i] == Label::Positive)
        .collect();

    let probabilities = classifier.predict_proba(population, assay, Some(&cells))?;
    let predictions: Vec<bool> = probabilities
        .iter()
        .map(|&p| classifier.is_positive(p))
        .collect();

    let confusion = ConfusionCounts::from_predictions(&predictions, &truth);
    let roc = roc_curve(&probabilities, &truth)?;

    log::info!(
        "'{}': accuracy {:.4}, AUC {:.4} on {} cells ({} ambiguous skipped)",
        cell_type,
        confusion.accuracy(),
        roc.auc,
        cells.len(),
        ambiguous
    );

    Ok(EvaluationReport {
        cell_type: cell_type.to_string(),
        threshold: classifier.threshold(),
        labels: resolved,
        cells,
        probabilities,
        predictions,
        accuracy: confusion.accuracy(),
        auc: roc.auc,
        roc,
        confusion,
    })
}
