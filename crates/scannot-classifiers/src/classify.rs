//! Registry-backed classification of a whole population.
use crate::error::{ClassifierError, Result};
use crate::population::CellPopulation;
use crate::prediction::{predict_cell_types, PredictionOptions, TaxonomyPrediction};
use crate::registry::{CellTypeSelection, RegistrySet};

/// Annotation column holding every passing type of a cell.
pub const PREDICTED_COLUMN: &str = "predicted_cell_type";
/// Annotation column holding the single most probable type of a cell.
pub const MOST_PROBABLE_COLUMN: &str = "most_probable_cell_type";
/// Written where a cell received no type.
pub const UNCLASSIFIED: &str = "unclassified";
/// Suffix of the per-classifier probability columns.
pub const PROBABILITY_SUFFIX: &str = "_p";

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyOptions {
    pub prediction: PredictionOptions,
    pub cell_types: CellTypeSelection,
    pub unclassified_label: String,
    /// Joins several passing types in the predicted column.
    pub separator: String,
    /// Also write one `<cell type>_p` score column per classifier.
    pub write_probabilities: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        ClassifyOptions {
            prediction: PredictionOptions::default(),
            cell_types: CellTypeSelection::All,
            unclassified_label: UNCLASSIFIED.to_string(),
            separator: ", ".to_string(),
            write_probabilities: true,
        }
    }
}

/// Load the selected classifiers (with their ancestors), predict every cell
/// and write the prediction columns into `population`.
pub fn classify<P: CellPopulation + ?Sized>(
    population: &mut P,
    registries: &RegistrySet,
    options: &ClassifyOptions,
) -> Result<TaxonomyPrediction> {
    let classifiers = registries.load_selection(&options.cell_types)?;
    if classifiers.is_empty() {
        return Err(ClassifierError::NotFound(
            "no classifiers available in the given registries".to_string(),
        ));
    }
    log::info!(
        "Classifying {} cells with {} classifiers",
        population.n_cells(),
        classifiers.len()
    );

    let prediction = predict_cell_types(&*population, &classifiers, &options.prediction)?;
    write_prediction(population, &prediction, options)?;
    Ok(prediction)
}

/// Append the prediction columns of `prediction` to `population`.
pub fn write_prediction<P: CellPopulation + ?Sized>(
    population: &mut P,
    prediction: &TaxonomyPrediction,
    options: &ClassifyOptions,
) -> Result<()> {
    let unclassified = || Some(options.unclassified_label.clone());

    let predicted = prediction
        .cells
        .iter()
        .map(|c| c.joined(&options.separator).or_else(unclassified))
        .collect();
    population.set_annotation(PREDICTED_COLUMN, predicted)?;

    let most_probable = prediction
        .cells
        .iter()
        .map(|c| c.most_probable_type.clone().or_else(unclassified))
        .collect();
    population.set_annotation(MOST_PROBABLE_COLUMN, most_probable)?;

    if options.write_probabilities {
        for (cell_type, proba) in &prediction.probabilities {
            population.set_scores(&probability_column(cell_type), proba.clone())?;
        }
    }
    Ok(())
}

pub fn probability_column(cell_type: &str) -> String {
    format!("{}{}", cell_type, PROBABILITY_SUFFIX)
}
