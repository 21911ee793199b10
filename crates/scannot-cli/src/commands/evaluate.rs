use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use scannot_classifiers::classifier::CellTypeClassifier;
use scannot_classifiers::evaluation::{evaluate_classifier, EvaluationReport};
use scannot_classifiers::io::{read_expression_table, ExpressionReaderConfig};
use scannot_classifiers::labels::LabelSource;
use scannot_classifiers::models::SvmClassifier;
use scannot_classifiers::registry::read_classifier_file;

use crate::util::{
    default_models_from_env, load_json_config, open_registries,
    validate_tsv_or_csv_file,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluateConfig {
    pub version: String,
    pub test_data: String,
    pub cell_id_column: String,
    pub assay: Option<String>,
    /// Classifier written by `scannot train`.
    pub classifier_file: Option<String>,
    /// Name of a classifier stored in `registry` or `default_models`.
    pub classifier_name: Option<String>,
    pub registry: Option<String>,
    pub default_models: Option<String>,
    pub label_column: String,
    pub equivalent_labels: Vec<String>,
    pub tag_column: Option<String>,
    pub report_file: String,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        EvaluateConfig {
            version: clap::crate_version!().to_string(),
            test_data: String::new(),
            cell_id_column: String::from("cell_id"),
            assay: None,
            classifier_file: None,
            classifier_name: None,
            registry: None,
            default_models: None,
            label_column: String::from("cell_type"),
            equivalent_labels: Vec::new(),
            tag_column: None,
            report_file: String::from("scannot_evaluation.json"),
        }
    }
}

impl EvaluateConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let mut config: EvaluateConfig = load_json_config(config_path)?;

        if let Some(test_data) = matches.get_one::<String>("test_data") {
            config.test_data = test_data.clone();
        }
        validate_tsv_or_csv_file(&config.test_data)?;

        if let Some(file) = matches.get_one::<String>("classifier_file") {
            config.classifier_file = Some(file.clone());
            config.classifier_name = None;
        }
        if let Some(name) = matches.get_one::<String>("classifier_name") {
            config.classifier_name = Some(name.clone());
            config.classifier_file = None;
        }
        if let Some(registry) = matches.get_one::<String>("registry") {
            config.registry = Some(registry.clone());
        }
        if let Some(defaults) = matches.get_one::<String>("default_models") {
            config.default_models = Some(defaults.clone());
        }
        if config.default_models.is_none() {
            config.default_models = default_models_from_env();
        }
        if let Some(report) = matches.get_one::<String>("report_file") {
            config.report_file = report.clone();
        }

        if config.classifier_file.is_none() && config.classifier_name.is_none() {
            bail!("Either a classifier file or a classifier name is required");
        }
        Ok(config)
    }

    pub fn label_source(&self) -> LabelSource {
        match &self.tag_column {
            Some(column) => LabelSource::tags(column),
            None => LabelSource::Annotation {
                column: self.label_column.clone(),
                equivalents: self.equivalent_labels.clone(),
            },
        }
    }
}

/// Evaluate the configured classifier and write the report as JSON.
pub fn run_evaluation(config: &EvaluateConfig) -> Result<EvaluationReport> {
    let labels = config.label_source();
    let mut reader = ExpressionReaderConfig {
        cell_id_column: config.cell_id_column.clone(),
        ..ExpressionReaderConfig::default()
    }
    .with_metadata([labels.column().to_string()]);
    if let Some(assay) = &config.assay {
        reader.assay = assay.clone();
    }
    let data = read_expression_table(&config.test_data, &reader)?;

    let registries = open_registries(config.registry.as_deref(), config.default_models.as_deref())?;
    let classifier: CellTypeClassifier<SvmClassifier> = match (&config.classifier_file, &config.classifier_name) {
        (Some(file), _) => read_classifier_file(file)
            .with_context(|| format!("Failed to read classifier: {}", file))?,
        (None, Some(name)) => registries.load(name)?,
        (None, None) => bail!("Either a classifier file or a classifier name is required"),
    };

    let lineage = match classifier.parent_type() {
        Some(parent) => registries
            .load_lineage(parent)
            .with_context(|| format!("Failed to resolve parent cell type '{}'", parent))?,
        None => Vec::new(),
    };
    let ancestry: Vec<&CellTypeClassifier<SvmClassifier>> = lineage.iter().collect();

    let report = evaluate_classifier(
        &classifier,
        &data,
        &labels,
        config.assay.as_deref(),
        &ancestry,
    )?;

    let file = File::create(&config.report_file)
        .with_context(|| format!("Failed to create report file: {}", config.report_file))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report)?;
    log::info!(
        "'{}': accuracy {:.4}, AUC {:.4}; report written to {}",
        report.cell_type,
        report.accuracy,
        report.auc,
        config.report_file
    );
    Ok(report)
}
