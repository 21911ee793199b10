//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use ndarray::Array2;

use scannot_classifiers::classifier::CellTypeClassifier;
use scannot_classifiers::error::{ClassifierError, Result};
use scannot_classifiers::models::utils::encode_feature_name;
use scannot_classifiers::models::ClassifierModel;
use scannot_classifiers::population::ExpressionMatrix;

/// Deterministic model: the probability is the (clamped) expression of its
/// single feature.
#[derive(Debug, Clone, Default)]
pub struct GeneScore {
    features: Vec<String>,
}

impl GeneScore {
    pub fn on(gene: &str) -> Self {
        GeneScore {
            features: vec![encode_feature_name(gene)],
        }
    }

    pub fn unfitted() -> Self {
        GeneScore::default()
    }
}

impl ClassifierModel for GeneScore {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool], feature_names: &[String]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ClassifierError::Data("label length mismatch".to_string()));
        }
        self.features = feature_names.iter().take(1).cloned().collect();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        Ok(x.column(0).iter().map(|&v| v.clamp(0.0, 1.0)).collect())
    }

    fn feature_names(&self) -> &[String] {
        &self.features
    }

    fn is_fitted(&self) -> bool {
        !self.features.is_empty()
    }
}

/// Route library logs through the test harness; safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

pub fn scored(cell_type: &str, gene: &str, parent: Option<&str>) -> CellTypeClassifier<GeneScore> {
    CellTypeClassifier::new(
        cell_type,
        GeneScore::on(gene),
        vec![gene.to_string()],
        0.5,
        parent.map(str::to_string),
    )
    .unwrap()
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn annotations(values: &[Option<&str>]) -> Vec<Option<String>> {
    values.iter().map(|v| v.map(str::to_string)).collect()
}

/// Population from rows of expression values (one row per cell).
pub fn population(genes: &[&str], rows: &[Vec<f64>]) -> ExpressionMatrix {
    let values: Vec<f64> = rows.iter().flatten().copied().collect();
    let x = Array2::from_shape_vec((rows.len(), genes.len()), values).unwrap();
    let cell_ids = (0..rows.len()).map(|i| format!("cell_{}", i)).collect();
    ExpressionMatrix::new(cell_ids, strings(genes), x).unwrap()
}

/// Well separated B-cell training data.
///
/// `n_b` cells express CD19 and MS4A1 strongly, `n_other` cells express CD3E.
/// Cell `i` is annotated `B cells` or `T cells`; the first `n_missing` other
/// cells carry no annotation.
pub fn b_cell_population(n_b: usize, n_other: usize, n_missing: usize) -> ExpressionMatrix {
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for i in 0..n_b {
        let jitter = (i % 7) as f64 * 0.1;
        rows.push(vec![4.0 + jitter, 3.5 + jitter, 0.1 * jitter]);
        labels.push(Some("B cells"));
    }
    for i in 0..n_other {
        let jitter = (i % 5) as f64 * 0.1;
        rows.push(vec![0.1 * jitter, 0.2 * jitter, 4.0 + jitter]);
        labels.push(if i < n_missing { None } else { Some("T cells") });
    }
    population(&["CD19", "MS4A1", "CD3E"], &rows)
        .with_annotation("cell_type", annotations(&labels))
        .unwrap()
}
