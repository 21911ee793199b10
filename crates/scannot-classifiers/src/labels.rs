//! Per-cell binary labels relative to one target cell type.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};
use crate::population::CellPopulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Positive,
    Negative,
    /// Missing or incoherent label; excluded from training and scoring.
    Ambiguous,
}

impl Label {
    pub fn is_ambiguous(self) -> bool {
        self == Label::Ambiguous
    }

    /// `Some(true)` for positive, `Some(false)` for negative.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Label::Positive => Some(true),
            Label::Negative => Some(false),
            Label::Ambiguous => None,
        }
    }
}

/// Where the per-cell labels of a training or evaluation run come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// Raw cell-type annotations resolved against the target type.
    Annotation {
        column: String,
        /// Additional annotation values counted as the target type
        /// (sub-types grouped under an umbrella type).
        #[serde(default)]
        equivalents: Vec<String>,
    },
    /// Explicit binary tags (`yes`/`no`), bypassing resolution.
    Tags { column: String },
}

impl LabelSource {
    pub fn annotation(column: &str) -> Self {
        LabelSource::Annotation {
            column: column.to_string(),
            equivalents: Vec::new(),
        }
    }

    pub fn tags(column: &str) -> Self {
        LabelSource::Tags {
            column: column.to_string(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            LabelSource::Annotation { column, .. } | LabelSource::Tags { column } => column,
        }
    }

    /// Resolve one label per cell of `population` for `cell_type`.
    pub fn resolve<P: CellPopulation + ?Sized>(
        &self,
        population: &P,
        cell_type: &str,
    ) -> Result<Vec<Label>> {
        let values = population.annotation(self.column()).ok_or_else(|| {
            ClassifierError::Data(format!("Annotation column '{}' not found", self.column()))
        })?;

        Ok(match self {
            LabelSource::Annotation { equivalents, .. } => {
                LabelResolver::new(cell_type, equivalents.iter().cloned()).resolve(values)
            }
            LabelSource::Tags { .. } => resolve_tags(values),
        })
    }
}

/// Maps raw annotation values onto positive / negative / ambiguous.
#[derive(Debug, Clone)]
pub struct LabelResolver {
    target: String,
    equivalents: HashSet<String>,
}

impl LabelResolver {
    pub fn new<I: IntoIterator<Item = String>>(target: &str, equivalents: I) -> Self {
        LabelResolver {
            target: target.to_string(),
            equivalents: equivalents.into_iter().collect(),
        }
    }

    pub fn label(&self, value: Option<&str>) -> Label {
        match value {
            None => Label::Ambiguous,
            Some(v) if is_missing(v) => Label::Ambiguous,
            Some(v) if v == self.target || self.equivalents.contains(v) => Label::Positive,
            Some(_) => Label::Negative,
        }
    }

    pub fn resolve(&self, values: &[Option<String>]) -> Vec<Label> {
        values.iter().map(|v| self.label(v.as_deref())).collect()
    }
}

/// Textual spellings of a missing value.
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("nan")
        || trimmed.eq_ignore_ascii_case("null")
}

fn tag_label(value: Option<&str>) -> Label {
    let Some(value) = value else {
        return Label::Ambiguous;
    };
    match value.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" | "positive" => Label::Positive,
        "no" | "false" | "0" | "negative" => Label::Negative,
        _ => Label::Ambiguous,
    }
}

pub fn resolve_tags(values: &[Option<String>]) -> Vec<Label> {
    values.iter().map(|v| tag_label(v.as_deref())).collect()
}

/// Demote cells labeled positive but rejected by the parent filter.
///
/// Returns the number of demoted cells.
pub fn demote_incoherent(labels: &mut [Label], parent_positive: &[bool]) -> usize {
    let mut demoted = 0;
    for (label, &passed) in labels.iter_mut().zip(parent_positive) {
        if *label == Label::Positive && !passed {
            *label = Label::Ambiguous;
            demoted += 1;
        }
    }
    demoted
}

/// (positive, negative, ambiguous) counts.
pub fn count_labels(labels: &[Label]) -> (usize, usize, usize) {
    labels.iter().fold((0, 0, 0), |(p, n, a), label| match label {
        Label::Positive => (p + 1, n, a),
        Label::Negative => (p, n + 1, a),
        Label::Ambiguous => (p, n, a + 1),
    })
}

/// Restrict labels to the cells that passed the parent filter.
///
/// Positive cells rejected by the parent are incoherent and demoted;
/// negative cells outside the parent's positive set are dropped as well.
/// Returns `(demoted, outside)` counts.
pub fn restrict_to_parent(labels: &mut [Label], parent_positive: &[bool]) -> (usize, usize) {
    let demoted = demote_incoherent(labels, parent_positive);
    let mut outside = 0;
    for (label, &passed) in labels.iter_mut().zip(parent_positive) {
        if !passed && *label == Label::Negative {
            *label = Label::Ambiguous;
            outside += 1;
        }
    }
    (demoted, outside)
}
