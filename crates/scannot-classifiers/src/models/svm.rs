use linfa::dataset::Pr;
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_svm::{Svm, SvmError, SvmParams};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::{Kernel, ModelConfig};
use crate::error::{ClassifierError, Result};
use crate::models::classifier_trait::ClassifierModel;

/// Support vector machine with Platt-scaled probability output.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SvmClassifier {
    params: ModelConfig,
    feature_names: Vec<String>,
    model: Option<Svm<f64, Pr>>,
}

impl SvmClassifier {
    pub fn new(params: ModelConfig) -> Self {
        SvmClassifier {
            params,
            feature_names: Vec::new(),
            model: None,
        }
    }

    pub fn params(&self) -> &ModelConfig {
        &self.params
    }

    fn build_params(&self) -> SvmParams<f64, Pr> {
        let (c_pos, c_neg) = self.params.c;
        let params = Svm::<f64, Pr>::params()
            .eps(self.params.eps)
            .pos_neg_weights(c_pos, c_neg);

        match &self.params.kernel {
            Kernel::Linear => params.linear_kernel(),
            Kernel::Gaussian { eps } => params.gaussian_kernel(*eps),
            Kernel::Polynomial { constant, degree } => params.polynomial_kernel(*constant, *degree),
        }
    }
}

impl ClassifierModel for SvmClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[bool], feature_names: &[String]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(ClassifierError::Data(format!(
                "{} rows in the feature matrix but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if x.ncols() != feature_names.len() {
            return Err(ClassifierError::Data(format!(
                "{} feature columns but {} feature names",
                x.ncols(),
                feature_names.len()
            )));
        }

        let dataset = Dataset::new(x.to_owned(), Array1::from_vec(y.to_vec()));
        let fitted: std::result::Result<Svm<f64, Pr>, SvmError> = self.build_params().fit(&dataset);
        let model = fitted.map_err(|e| ClassifierError::Model(e.to_string()))?;

        log::trace!(
            "Fitted SVM on {} cells x {} features",
            x.nrows(),
            x.ncols()
        );

        self.model = Some(model);
        self.feature_names = feature_names.to_vec();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ClassifierError::Model("SVM has not been fitted".to_string()))?;
        if x.ncols() != self.feature_names.len() {
            return Err(ClassifierError::Model(format!(
                "SVM was fitted on {} features but received {}",
                self.feature_names.len(),
                x.ncols()
            )));
        }

        let proba: Array1<Pr> = model.predict(x);
        Ok(proba.iter().map(|p| f64::from(**p)).collect())
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn name(&self) -> &str {
        "svm"
    }
}
