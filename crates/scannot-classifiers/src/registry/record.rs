//! On-disk form of a classifier.
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::classifier::CellTypeClassifier;
use crate::error::{ClassifierError, Result};
use crate::models::SvmClassifier;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ClassifierRecord {
    format_version: u32,
    cell_type: String,
    marker_genes: Vec<String>,
    threshold: f64,
    parent_type: Option<String>,
    created_at: DateTime<Utc>,
    model: SvmClassifier,
}

impl ClassifierRecord {
    pub(crate) fn from_classifier(classifier: &CellTypeClassifier<SvmClassifier>) -> Self {
        ClassifierRecord {
            format_version: FORMAT_VERSION,
            cell_type: classifier.cell_type().to_string(),
            marker_genes: classifier.marker_genes().to_vec(),
            threshold: classifier.threshold(),
            parent_type: classifier.parent_type().map(str::to_string),
            created_at: Utc::now(),
            model: classifier.model().clone(),
        }
    }

    /// Rebuild the classifier, re-running every field validation.
    pub(crate) fn into_classifier(self) -> Result<CellTypeClassifier<SvmClassifier>> {
        if self.format_version > FORMAT_VERSION {
            return Err(ClassifierError::Validation(format!(
                "classifier '{}' uses record format {} (supported: {})",
                self.cell_type, self.format_version, FORMAT_VERSION
            )));
        }
        CellTypeClassifier::new(
            &self.cell_type,
            self.model,
            self.marker_genes,
            self.threshold,
            self.parent_type,
        )
    }
}

/// Write `classifier` to `path`, replacing the file atomically.
///
/// The record is written to a temporary file next to `path` and renamed
/// into place, so readers never observe a partial file.
pub fn write_classifier_file<P: AsRef<Path>>(
    path: P,
    classifier: &CellTypeClassifier<SvmClassifier>,
) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let record = ClassifierRecord::from_classifier(classifier);
    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, &record)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| ClassifierError::Io(e.error))?;

    log::debug!("Wrote classifier '{}' to {}", classifier.cell_type(), path.display());
    Ok(())
}

/// Read a classifier written by [`write_classifier_file`].
pub fn read_classifier_file<P: AsRef<Path>>(path: P) -> Result<CellTypeClassifier<SvmClassifier>> {
    let file = File::open(path.as_ref())?;
    let record: ClassifierRecord = serde_json::from_reader(BufReader::new(file))?;
    record.into_classifier()
}
