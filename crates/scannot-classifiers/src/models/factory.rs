use crate::config::ModelConfig;
use crate::models::svm::SvmClassifier;

/// Build an unfitted binary model from a `ModelConfig`.
pub fn build_model(params: &ModelConfig) -> SvmClassifier {
    SvmClassifier::new(params.clone())
}
