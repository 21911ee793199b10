use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use scannot_classifiers::classifier::CellTypeClassifier;
use scannot_classifiers::config::TrainingConfig;
use scannot_classifiers::io::{read_expression_table, ExpressionReaderConfig};
use scannot_classifiers::labels::LabelSource;
use scannot_classifiers::models::SvmClassifier;
use scannot_classifiers::registry::{write_classifier_file, SaveOptions};
use scannot_classifiers::training::{train_classifier, TrainingRequest};

use crate::util::{
    default_models_from_env, load_json_config, open_registries,
    parse_list, validate_tsv_or_csv_file,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub version: String,
    pub train_data: String,
    pub cell_id_column: String,
    pub assay: Option<String>,
    pub cell_type: String,
    pub marker_genes: Vec<String>,
    /// Annotation column resolved against `cell_type`.
    pub label_column: String,
    /// Annotation values also counted as `cell_type`.
    pub equivalent_labels: Vec<String>,
    /// Explicit yes/no column; replaces `label_column` when set.
    pub tag_column: Option<String>,
    pub parent: Option<String>,
    pub output_file: String,
    /// Also save the trained classifier into this registry.
    pub registry: Option<String>,
    pub default_models: Option<String>,
    pub overwrite: bool,
    pub include_default: bool,
    pub training: TrainingConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            version: clap::crate_version!().to_string(),
            train_data: String::new(),
            cell_id_column: String::from("cell_id"),
            assay: None,
            cell_type: String::new(),
            marker_genes: Vec::new(),
            label_column: String::from("cell_type"),
            equivalent_labels: Vec::new(),
            tag_column: None,
            parent: None,
            output_file: String::from("scannot_classifier.json"),
            registry: None,
            default_models: None,
            overwrite: false,
            include_default: false,
            training: TrainingConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let mut config: TrainConfig = load_json_config(config_path)?;

        if let Some(train_data) = matches.get_one::<String>("train_data") {
            config.train_data = train_data.clone();
        }
        validate_tsv_or_csv_file(&config.train_data)?;

        if let Some(output_file) = matches.get_one::<String>("output_file") {
            config.output_file = output_file.clone();
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
        if let Some(cell_type) = matches.get_one::<String>("cell_type") {
            config.cell_type = cell_type.clone();
        }
        if let Some(markers) = matches.get_one::<String>("marker_genes") {
            config.marker_genes = parse_list(markers);
        }
        if let Some(parent) = matches.get_one::<String>("parent") {
            config.parent = Some(parent.clone());
        }
        if let Some(&seed) = matches.get_one::<u64>("seed") {
            config.training.seed = Some(seed);
        }
        if matches.get_flag("overwrite") {
            config.overwrite = true;
        }

        if config.cell_type.trim().is_empty() {
            bail!("No cell type to train was given");
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

    fn reader_config(&self) -> ExpressionReaderConfig {
        let mut reader = ExpressionReaderConfig {
            cell_id_column: self.cell_id_column.clone(),
            ..ExpressionReaderConfig::default()
        }
        .with_metadata([self.label_source().column().to_string()]);
        if let Some(assay) = &self.assay {
            reader.assay = assay.clone();
        }
        reader
    }
}

/// Train one classifier and write it to `output_file` (and the registry).
pub fn run_training(config: &TrainConfig) -> Result<CellTypeClassifier<SvmClassifier>> {
    let data = read_expression_table(&config.train_data, &config.reader_config())?;
    let registries = open_registries(config.registry.as_deref(), config.default_models.as_deref())?;

    let lineage = match &config.parent {
        Some(parent) => registries
            .load_lineage(parent)
            .with_context(|| format!("Failed to resolve parent cell type '{}'", parent))?,
        None => Vec::new(),
    };
    let ancestry: Vec<&CellTypeClassifier<SvmClassifier>> = lineage.iter().collect();

    let mut request = TrainingRequest::new(
        &config.cell_type,
        config.marker_genes.clone(),
        config.label_source(),
    );
    if let Some(assay) = &config.assay {
        request = request.with_assay(assay);
    }

    log::info!(
        "Training '{}' on {} marker genes{}",
        config.cell_type,
        config.marker_genes.len(),
        config
            .parent
            .as_ref()
            .map(|p| format!(" below '{}'", p))
            .unwrap_or_default()
    );
    let classifier = train_classifier(&data, &request, &ancestry, &config.training)?;

    write_classifier_file(&config.output_file, &classifier)
        .with_context(|| format!("Failed to write classifier: {}", config.output_file))?;
    log::info!("Classifier written to {}", config.output_file);

    if config.registry.is_some() {
        let options = SaveOptions {
            overwrite: config.overwrite,
            include_default: config.include_default,
        };
        let path = registries.save(&classifier, options)?;
        log::info!("Classifier saved to registry at {}", path.display());
    }

    Ok(classifier)
}
