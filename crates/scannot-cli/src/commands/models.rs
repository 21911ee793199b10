use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use scannot_classifiers::registry::{read_classifier_file, RegistrySet, SaveOptions};

/// One line of `scannot models list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub cell_type: String,
    pub parent: Option<String>,
    pub threshold: f64,
    pub marker_genes: Vec<String>,
    /// `user` or `default`.
    pub source: String,
}

impl ModelSummary {
    pub fn to_tsv_row(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.cell_type,
            self.parent.as_deref().unwrap_or("-"),
            self.threshold,
            self.source,
            self.marker_genes.join(",")
        )
    }
}

pub fn list_models(registries: &RegistrySet) -> Result<Vec<ModelSummary>> {
    let mut summaries = Vec::new();
    for name in registries.list()? {
        let classifier = registries.load(&name)?;
        let source = if registries.user().is_some_and(|r| r.contains(&name)) {
            "user"
        } else {
            "default"
        };
        summaries.push(ModelSummary {
            cell_type: name,
            parent: classifier.parent_type().map(str::to_string),
            threshold: classifier.threshold(),
            marker_genes: classifier.marker_genes().to_vec(),
            source: source.to_string(),
        });
    }
    Ok(summaries)
}

/// Import a classifier file into the user registry.
pub fn add_model(registries: &RegistrySet, file: &Path, options: SaveOptions) -> Result<PathBuf> {
    let classifier = read_classifier_file(file)
        .with_context(|| format!("Failed to read classifier: {}", file.display()))?;
    Ok(registries.save(&classifier, options)?)
}

pub fn delete_model(registries: &RegistrySet, cell_type: &str) -> Result<()> {
    Ok(registries.delete(cell_type)?)
}

/// Change the threshold of a stored classifier.
///
/// A classifier found only among the defaults is copied into the user
/// registry with the new threshold.
pub fn set_threshold(registries: &RegistrySet, cell_type: &str, threshold: f64) -> Result<PathBuf> {
    let mut classifier = registries.load(cell_type)?;
    let previous = classifier.threshold();
    classifier.set_threshold(threshold)?;
    let path = registries.save(
        &classifier,
        SaveOptions {
            overwrite: true,
            include_default: true,
        },
    )?;
    log::info!(
        "Threshold of '{}' changed from {} to {}",
        cell_type,
        previous,
        threshold
    );
    Ok(path)
}
