//! The cell-type classifier: a fitted binary model together with the marker
//! genes it was fitted on, its decision threshold and its parent type.
use std::collections::HashSet;

use crate::error::{ClassifierError, Result};
use crate::models::utils::{decode_feature_names, is_encodable};
use crate::models::{ClassifierModel, SvmClassifier};
use crate::population::CellPopulation;

/// Probability cutoff given to freshly trained classifiers.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Classifier for one cell type.
///
/// Once the model is fitted it is the source of truth for the marker genes:
/// replacing the model recomputes them, and setting them directly is ignored.
#[derive(Debug, Clone)]
pub struct CellTypeClassifier<M = SvmClassifier> {
    cell_type: String,
    model: M,
    marker_genes: Vec<String>,
    threshold: f64,
    parent: Option<String>,
}

impl<M: ClassifierModel> CellTypeClassifier<M> {
    /// Validate every field and assemble a classifier.
    ///
    /// When `model` is fitted, `marker_genes` must name exactly the genes the
    /// model was fitted on (order-insensitive); the model's order is kept.
    pub fn new(
        cell_type: &str,
        model: M,
        marker_genes: Vec<String>,
        threshold: f64,
        parent: Option<String>,
    ) -> Result<Self> {
        validate_cell_type(cell_type)?;
        validate_threshold(threshold)?;
        validate_parent(parent.as_deref())?;
        validate_marker_genes(&marker_genes)?;

        let marker_genes = if model.is_fitted() {
            let fitted = decode_feature_names(model.feature_names());
            validate_marker_genes(&fitted)?;
            let given: HashSet<&String> = marker_genes.iter().collect();
            let expected: HashSet<&String> = fitted.iter().collect();
            if given != expected {
                return Err(ClassifierError::Validation(format!(
                    "marker genes of '{}' do not match the fitted model features",
                    cell_type
                )));
            }
            fitted
        } else {
            marker_genes
        };

        Ok(CellTypeClassifier {
            cell_type: cell_type.to_string(),
            model,
            marker_genes,
            threshold,
            parent,
        })
    }

    pub fn cell_type(&self) -> &str {
        &self.cell_type
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn marker_genes(&self) -> &[String] {
        &self.marker_genes
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn parent_type(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Rename the target cell type.
    pub fn set_cell_type(&mut self, cell_type: &str) -> Result<()> {
        validate_cell_type(cell_type)?;
        self.cell_type = cell_type.to_string();
        Ok(())
    }

    /// Replace the model. A fitted model's features become the marker genes.
    pub fn set_model(&mut self, model: M) -> Result<()> {
        if model.is_fitted() {
            let genes = decode_feature_names(model.feature_names());
            validate_marker_genes(&genes)?;
            self.marker_genes = genes;
        }
        self.model = model;
        Ok(())
    }

    /// Update the threshold; any finite value above zero is accepted.
    pub fn set_threshold(&mut self, threshold: f64) -> Result<()> {
        validate_threshold(threshold)?;
        self.threshold = threshold;
        Ok(())
    }

    pub fn set_parent(&mut self, parent: Option<&str>) -> Result<()> {
        validate_parent(parent)?;
        self.parent = parent.map(str::to_string);
        Ok(())
    }

    /// Set marker genes directly.
    ///
    /// Returns `Ok(false)` without changing anything when the model is
    /// already fitted.
    pub fn set_marker_genes(&mut self, genes: Vec<String>) -> Result<bool> {
        if self.model.is_fitted() {
            log::warn!(
                "Ignoring marker gene update for '{}': the fitted model defines its features",
                self.cell_type
            );
            return Ok(false);
        }
        validate_marker_genes(&genes)?;
        self.marker_genes = genes;
        Ok(true)
    }

    /// Whether `probability` calls a cell positive for this type.
    pub fn is_positive(&self, probability: f64) -> bool {
        probability > self.threshold
    }

    /// Probability of the target type for each selected cell.
    pub fn predict_proba<P: CellPopulation + ?Sized>(
        &self,
        population: &P,
        assay: Option<&str>,
        cells: Option<&[usize]>,
    ) -> Result<Vec<f64>> {
        let x = population.expression(assay, &self.marker_genes, cells)?;
        if x.nrows() == 0 {
            return Ok(Vec::new());
        }
        let proba = self.model.predict_proba(&x)?;
        if proba.len() != x.nrows() {
            return Err(ClassifierError::Model(format!(
                "'{}' returned {} probabilities for {} cells",
                self.cell_type,
                proba.len(),
                x.nrows()
            )));
        }
        Ok(proba)
    }

    /// Positive calls at the stored threshold for each selected cell.
    pub fn predict<P: CellPopulation + ?Sized>(
        &self,
        population: &P,
        assay: Option<&str>,
        cells: Option<&[usize]>,
    ) -> Result<Vec<bool>> {
        Ok(self
            .predict_proba(population, assay, cells)?
            .into_iter()
            .map(|p| self.is_positive(p))
            .collect())
    }
}

fn validate_cell_type(cell_type: &str) -> Result<()> {
    if cell_type.trim().is_empty() {
        return Err(ClassifierError::Validation(
            "cell type must be a non-empty string".to_string(),
        ));
    }
    Ok(())
}

fn validate_threshold(threshold: f64) -> Result<()> {
    if !threshold.is_finite() || threshold <= 0.0 {
        return Err(ClassifierError::Validation(format!(
            "threshold must be a positive number, got {}",
            threshold
        )));
    }
    Ok(())
}

fn validate_parent(parent: Option<&str>) -> Result<()> {
    if let Some(name) = parent {
        if name.trim().is_empty() {
            return Err(ClassifierError::Validation(
                "parent cell type must be absent or a non-empty string".to_string(),
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_marker_genes(genes: &[String]) -> Result<()> {
    if genes.is_empty() {
        return Err(ClassifierError::Validation(
            "at least one marker gene is required".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(genes.len());
    for gene in genes {
        if gene.trim().is_empty() {
            return Err(ClassifierError::Validation(
                "marker genes must not be blank".to_string(),
            ));
        }
        if !is_encodable(gene) {
            return Err(ClassifierError::Validation(format!(
                "marker gene '{}' places a hyphen next to an underscore and cannot be stored as a model feature",
                gene
            )));
        }
        if !seen.insert(gene.as_str()) {
            return Err(ClassifierError::Validation(format!(
                "marker gene '{}' is listed more than once",
                gene
            )));
        }
    }
    Ok(())
}
