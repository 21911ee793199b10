use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use scannot_classifiers::registry::{ModelRegistry, RegistrySet};

/// Environment variable naming the read-only default registry.
pub const DEFAULT_MODELS_ENV: &str = "SCANNOT_DEFAULT_MODELS";

pub fn validate_tsv_or_csv_file(path: &str) -> Result<()> {
    let pb = PathBuf::from(path);

    let ext = pb.extension().and_then(|s| s.to_str()).map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("csv") => {}
        _ => anyhow::bail!("File must have a .tsv or .csv extension: {}", path),
    }

    if !pb.exists() {
        anyhow::bail!("File does not exist: {}", path);
    }

    Ok(())
}

/// Default registry location taken from [`DEFAULT_MODELS_ENV`], if set.
pub fn default_models_from_env() -> Option<String> {
    std::env::var(DEFAULT_MODELS_ENV)
        .ok()
        .filter(|dir| !dir.trim().is_empty())
}

/// Read a JSON configuration file.
pub fn load_json_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
}

/// Split a comma separated list, dropping empty entries.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Compose the user registry (created when missing) with the optional
/// read-only default registry.
pub fn open_registries(user: Option<&str>, defaults: Option<&str>) -> Result<RegistrySet> {
    let user = user
        .map(|dir| {
            ModelRegistry::open(dir).with_context(|| format!("Failed to open registry: {}", dir))
        })
        .transpose()?;
    let defaults = defaults
        .map(|dir| {
            ModelRegistry::open_read_only(dir)
                .with_context(|| format!("Failed to open default registry: {}", dir))
        })
        .transpose()?;
    Ok(RegistrySet::new(user, defaults))
}
