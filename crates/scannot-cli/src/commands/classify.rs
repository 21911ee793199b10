use std::path::PathBuf;

use anyhow::Result;
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use scannot_classifiers::classify::{
    classify, probability_column, ClassifyOptions, MOST_PROBABLE_COLUMN, PREDICTED_COLUMN,
    UNCLASSIFIED,
};
use scannot_classifiers::io::{read_expression_table, write_annotations_table, ExpressionReaderConfig};
use scannot_classifiers::prediction::{MostProbableScope, PredictionOptions, TaxonomyPrediction};
use scannot_classifiers::registry::CellTypeSelection;

use crate::util::{
    default_models_from_env, load_json_config, open_registries,
    parse_list, validate_tsv_or_csv_file,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub version: String,
    pub data: String,
    pub cell_id_column: String,
    /// Metadata columns that are not genes; copied to the output.
    pub metadata_columns: Vec<String>,
    pub assay: Option<String>,
    pub output_file: String,
    pub registry: Option<String>,
    pub default_models: Option<String>,
    /// Cell types to predict; `None` uses every available classifier.
    pub cell_types: Option<Vec<String>>,
    pub ignore_ambiguous: bool,
    pub most_probable: MostProbableScope,
    pub unclassified_label: String,
    pub write_probabilities: bool,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        ClassifyConfig {
            version: clap::crate_version!().to_string(),
            data: String::new(),
            cell_id_column: String::from("cell_id"),
            metadata_columns: Vec::new(),
            assay: None,
            output_file: String::from("scannot_predictions.tsv"),
            registry: None,
            default_models: None,
            cell_types: None,
            ignore_ambiguous: false,
            most_probable: MostProbableScope::default(),
            unclassified_label: String::from(UNCLASSIFIED),
            write_probabilities: true,
        }
    }
}

impl ClassifyConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let mut config: ClassifyConfig = load_json_config(config_path)?;

        if let Some(data) = matches.get_one::<String>("data") {
            config.data = data.clone();
        }
        validate_tsv_or_csv_file(&config.data)?;

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
        if let Some(cell_types) = matches.get_one::<String>("cell_types") {
            config.cell_types = Some(parse_list(cell_types));
        }
        if matches.get_flag("ignore_ambiguous") {
            config.ignore_ambiguous = true;
        }

        if config.registry.is_none() && config.default_models.is_none() {
            anyhow::bail!("No classifier registry given; use --registry or --default-models");
        }
        Ok(config)
    }

    pub fn options(&self) -> ClassifyOptions {
        ClassifyOptions {
            prediction: PredictionOptions {
                assay: self.assay.clone(),
                ignore_ambiguous: self.ignore_ambiguous,
                most_probable: self.most_probable,
            },
            cell_types: match &self.cell_types {
                Some(names) => CellTypeSelection::Only(names.clone()),
                None => CellTypeSelection::All,
            },
            unclassified_label: self.unclassified_label.clone(),
            write_probabilities: self.write_probabilities,
            ..ClassifyOptions::default()
        }
    }
}

/// Classify every cell of `data` and write the prediction table.
pub fn run_classification(config: &ClassifyConfig) -> Result<TaxonomyPrediction> {
    let mut reader = ExpressionReaderConfig {
        cell_id_column: config.cell_id_column.clone(),
        ..ExpressionReaderConfig::default()
    }
    .with_metadata(config.metadata_columns.iter().cloned());
    if let Some(assay) = &config.assay {
        reader.assay = assay.clone();
    }
    let mut data = read_expression_table(&config.data, &reader)?;

    let registries = open_registries(config.registry.as_deref(), config.default_models.as_deref())?;
    let options = config.options();
    let prediction = classify(&mut data, &registries, &options)?;

    if !prediction.warnings.is_empty() {
        log::warn!(
            "{} classifiers could not be applied; their branches were skipped",
            prediction.warnings.len()
        );
    }

    let mut columns = config.metadata_columns.clone();
    columns.push(PREDICTED_COLUMN.to_string());
    columns.push(MOST_PROBABLE_COLUMN.to_string());
    if options.write_probabilities {
        columns.extend(prediction.probabilities.keys().map(|name| probability_column(name)));
    }
    write_annotations_table(&config.output_file, &data, &columns)?;
    log::info!("Predictions written to {}", config.output_file);

    Ok(prediction)
}
