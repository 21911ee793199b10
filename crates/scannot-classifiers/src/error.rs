use std::error::Error;
use std::fmt;

/// Errors raised while building, training, evaluating, applying or storing
/// cell-type classifiers.
#[derive(Debug)]
pub enum ClassifierError {
    /// A classifier field was malformed (empty name, bad threshold, ...).
    Validation(String),
    /// The input data cannot support the requested operation.
    Data(String),
    /// Requested marker genes are absent from the population's feature set.
    MissingGenes(Vec<String>),
    /// Registry lookup miss.
    NotFound(String),
    /// Save collision without overwrite, or a write into a read-only registry.
    Conflict(String),
    /// The underlying binary model failed to fit or predict.
    Model(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

impl ClassifierError {
    /// True for every error of the data class (including missing genes).
    pub fn is_data_error(&self) -> bool {
        matches!(self, ClassifierError::Data(_) | ClassifierError::MissingGenes(_))
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClassifierError::Validation(msg) => write!(f, "Invalid classifier: {}", msg),
            ClassifierError::Data(msg) => write!(f, "Data error: {}", msg),
            ClassifierError::MissingGenes(genes) => {
                write!(f, "Missing marker genes: {}", genes.join(", "))
            }
            ClassifierError::NotFound(name) => write!(f, "Not found: {}", name),
            ClassifierError::Conflict(msg) => write!(f, "Registry conflict: {}", msg),
            ClassifierError::Model(msg) => write!(f, "Model error: {}", msg),
            ClassifierError::Io(err) => write!(f, "I/O error: {}", err),
            ClassifierError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl Error for ClassifierError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClassifierError::Io(err) => Some(err),
            ClassifierError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ClassifierError {
    fn from(err: std::io::Error) -> Self {
        ClassifierError::Io(err)
    }
}

impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        ClassifierError::Serialization(err)
    }
}

pub type Result<T, E = ClassifierError> = std::result::Result<T, E>;
