use ndarray::Array2;

use crate::error::Result;

/// Contract of the binary model wrapped by every cell-type classifier.
///
/// Rows of `x` are cells, columns are features in the order given by
/// `feature_names` at fit time. Labels are `true` for the target cell type.
pub trait ClassifierModel: Send + Sync {
    /// Fit the model. `feature_names` are stored as the model's feature set.
    fn fit(&mut self, x: &Array2<f64>, y: &[bool], feature_names: &[String]) -> Result<()>;

    /// Probability (0..1) that each row belongs to the target class.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>>;

    /// Feature names the model was fitted on, in column order. Empty before `fit`.
    fn feature_names(&self) -> &[String];

    fn is_fitted(&self) -> bool;

    /// Optional human readable name for the model
    fn name(&self) -> &str {
        "classifier"
    }
}
