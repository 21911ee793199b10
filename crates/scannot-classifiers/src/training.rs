//! Balanced training of a cell-type classifier.
//!
//! Labels are resolved per cell, the population is restricted to cells that
//! pass every ancestor classifier, the majority class is subsampled down to
//! the size of the minority class and the binary model is fitted on the
//! marker-gene expression of the remaining cells.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::classifier::{validate_marker_genes, CellTypeClassifier, DEFAULT_THRESHOLD};
use crate::config::{MissingGenePolicy, TrainingConfig};
use crate::error::{ClassifierError, Result};
use crate::labels::{count_labels, restrict_to_parent, Label, LabelSource};
use crate::models::factory::build_model;
use crate::models::utils::encode_feature_names;
use crate::models::{ClassifierModel, SvmClassifier};
use crate::population::CellPopulation;
use crate::taxonomy::lineage_positive;

/// What to train: the target type, its markers and where labels come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub cell_type: String,
    pub marker_genes: Vec<String>,
    pub labels: LabelSource,
    /// Expression layer to read; `None` uses the population's default.
    #[serde(default)]
    pub assay: Option<String>,
}

impl TrainingRequest {
    pub fn new(cell_type: &str, marker_genes: Vec<String>, labels: LabelSource) -> Self {
        TrainingRequest {
            cell_type: cell_type.to_string(),
            marker_genes,
            labels,
            assay: None,
        }
    }

    pub fn with_assay(mut self, assay: &str) -> Self {
        self.assay = Some(assay.to_string());
        self
    }
}

/// Train an SVM classifier configured by `config.model`.
///
/// `ancestry` lists the ancestor classifiers root first; the last entry is
/// the direct parent. Pass an empty slice to train a root classifier.
pub fn train_classifier<P, A>(
    population: &P,
    request: &TrainingRequest,
    ancestry: &[&CellTypeClassifier<A>],
    config: &TrainingConfig,
) -> Result<CellTypeClassifier<SvmClassifier>>
where
    P: CellPopulation + ?Sized,
    A: ClassifierModel,
{
    train_with_model(build_model(&config.model), population, request, ancestry, config)
}

/// Train `model` (unfitted) following the balanced training procedure.
pub fn train_with_model<M, P, A>(
    mut model: M,
    population: &P,
    request: &TrainingRequest,
    ancestry: &[&CellTypeClassifier<A>],
    config: &TrainingConfig,
) -> Result<CellTypeClassifier<M>>
where
    M: ClassifierModel,
    P: CellPopulation + ?Sized,
    A: ClassifierModel,
{
    let cell_type = request.cell_type.as_str();
    if cell_type.trim().is_empty() {
        return Err(ClassifierError::Validation(
            "cell type must be a non-empty string".to_string(),
        ));
    }
    validate_marker_genes(&request.marker_genes)?;
    let assay = request.assay.as_deref();

    let mut labels = request.labels.resolve(population, cell_type)?;

    if let Some(parent) = ancestry.last() {
        let passed = lineage_positive(ancestry, population, assay)?;
        let (demoted, outside) = restrict_to_parent(&mut labels, &passed);
        log::info!(
            "Parent '{}' filter: {} positive cells demoted as incoherent, {} negative cells outside the parent",
            parent.cell_type(),
            demoted,
            outside
        );
    }

    let (positives, negatives, ambiguous) = count_labels(&labels);
    log::info!(
        "'{}': {} positive, {} negative, {} ambiguous cells",
        cell_type,
        positives,
        negatives,
        ambiguous
    );
    if positives == 0 {
        return Err(ClassifierError::Data(format!(
            "cell type '{}' is not represented in the training data",
            cell_type
        )));
    }
    if negatives == 0 {
        return Err(ClassifierError::Data(format!(
            "no negative cells left to train '{}' against",
            cell_type
        )));
    }

    let genes = select_marker_genes(population, &request.marker_genes, config.missing_genes)?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let cells = balance_classes(&labels, &mut rng);
    log::debug!(
        "Balanced '{}' training set: {} cells per class",
        cell_type,
        cells.len() / 2
    );

    let x = population.expression(assay, &genes, Some(&cells))?;
    let y: Vec<bool> = cells.iter().map(|&i| labels[i] == Label::Positive).collect();
    model.fit(&x, &y, &encode_feature_names(&genes))?;

    let parent = ancestry.last().map(|p| p.cell_type().to_string());
    CellTypeClassifier::new(cell_type, model, genes, DEFAULT_THRESHOLD, parent)
}

/// Indices of a class-balanced subset of the labeled cells.
///
/// The majority class is uniformly subsampled down to the minority count;
/// ambiguous cells are never selected. The result is sorted.
pub fn balance_classes<R: Rng + ?Sized>(labels: &[Label], rng: &mut R) -> Vec<usize> {
    let positives: Vec<usize> = (0..labels.len())
        .filter(|&i| labels[i] == Label::Positive)
        .collect();
    let negatives: Vec<usize> = (0..labels.len())
        .filter(|&i| labels[i] == Label::Negative)
        .collect();

    let n = positives.len().min(negatives.len());
    let mut selected: Vec<usize> = if positives.len() > n {
        positives.choose_multiple(rng, n).copied().chain(negatives).collect()
    } else {
        negatives.choose_multiple(rng, n).copied().chain(positives).collect()
    };
    selected.sort_unstable();
    selected
}

fn select_marker_genes<P: CellPopulation + ?Sized>(
    population: &P,
    requested: &[String],
    policy: MissingGenePolicy,
) -> Result<Vec<String>> {
    let missing = population.missing_genes(requested);
    if missing.is_empty() {
        return Ok(requested.to_vec());
    }

    match policy {
        MissingGenePolicy::Fail => Err(ClassifierError::MissingGenes(missing)),
        MissingGenePolicy::Drop => {
            log::warn!(
                "Dropping {} marker genes absent from the data: {}",
                missing.len(),
                missing.join(", ")
            );
            let present: Vec<String> = requested
                .iter()
                .filter(|g| !missing.contains(g))
                .cloned()
                .collect();
            if present.is_empty() {
                return Err(ClassifierError::MissingGenes(missing));
            }
            Ok(present)
        }
    }
}
