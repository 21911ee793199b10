//! Command line front end for scannot-classifiers: JSON configuration,
//! argument overrides and the `train`, `evaluate`, `classify` and `models`
//! commands.
pub mod commands;
pub mod util;
