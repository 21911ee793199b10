use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kernel used by the support vector machine.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    #[default]
    Linear,
    Gaussian { eps: f64 },
    Polynomial { constant: f64, degree: f64 },
}

impl FromStr for Kernel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(Kernel::Linear),
            "gauss" | "gaussian" | "rbf" => Ok(Kernel::Gaussian { eps: 0.1 }),
            "poly" | "polynomial" => Ok(Kernel::Polynomial {
                constant: 1.0,
                degree: 3.0,
            }),
            _ => Err(format!(
                "Unsupported kernel type: {}. Valid options are: linear, gauss, poly",
                s
            )),
        }
    }
}

/// Hyper-parameters of the binary model fitted for each cell type.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// Solver tolerance.
    pub eps: f64,
    /// Penalty weights for the (positive, negative) classes.
    pub c: (f64, f64),
    pub kernel: Kernel,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            eps: 0.1,
            c: (1.0, 1.0),
            kernel: Kernel::Linear,
        }
    }
}

impl ModelConfig {
    pub fn new(eps: f64, c: (f64, f64), kernel: Kernel) -> Self {
        Self { eps, c, kernel }
    }
}

/// What to do when requested marker genes are absent from the training data.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingGenePolicy {
    /// Abort training with `ClassifierError::MissingGenes`.
    #[default]
    Fail,
    /// Train on the markers that are present and log a warning.
    Drop,
}

impl FromStr for MissingGenePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fail" => Ok(MissingGenePolicy::Fail),
            "drop" => Ok(MissingGenePolicy::Drop),
            _ => Err(format!("Unknown missing gene policy: {}", s)),
        }
    }
}

/// Settings shared by every training run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    /// Seed for the class-balancing subsample. `None` draws from entropy.
    pub seed: Option<u64>,
    pub missing_genes: MissingGenePolicy,
}

impl TrainingConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
