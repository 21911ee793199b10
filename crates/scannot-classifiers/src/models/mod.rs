pub mod classifier_trait;
pub mod factory;
pub mod svm;
pub mod utils;

pub use classifier_trait::ClassifierModel;
pub use svm::SvmClassifier;
