//! scannot-classifiers: hierarchical cell-type classification for single-cell
//! RNA-seq expression data.
//!
//! Each cell type is recognised by its own binary classifier trained on a
//! small set of marker genes. Classifiers name their parent cell type and so
//! form a taxonomy: children are trained and applied only to the cells their
//! ancestors accept. The crate covers label resolution, balanced training,
//! ROC-based evaluation, top-down prediction over the taxonomy and a
//! directory-backed registry of trained classifiers.
pub mod classifier;
pub mod classify;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod io;
pub mod labels;
pub mod models;
pub mod population;
pub mod prediction;
pub mod registry;
pub mod stats;
pub mod taxonomy;
pub mod training;

pub use classifier::CellTypeClassifier;
pub use classify::{classify, ClassifyOptions};
pub use error::{ClassifierError, Result};
pub use evaluation::{evaluate_classifier, EvaluationReport};
pub use labels::{Label, LabelSource};
pub use models::{ClassifierModel, SvmClassifier};
pub use population::{CellPopulation, ExpressionMatrix};
pub use prediction::{predict_cell_types, PredictionOptions, TaxonomyPrediction};
pub use registry::{CellTypeSelection, ModelRegistry, RegistrySet, SaveOptions};
pub use taxonomy::Taxonomy;
pub use training::{train_classifier, TrainingRequest};
