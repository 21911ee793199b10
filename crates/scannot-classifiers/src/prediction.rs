//! Top-down prediction over a taxonomy of classifiers.
//!
//! Every tree is walked from its root. A classifier only scores the cells
//! that passed all of its ancestors, so a cell rejected high up never
//! reaches the descendants. Trees are independent and are evaluated in
//! parallel with rayon.
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classifier::CellTypeClassifier;
use crate::error::{ClassifierError, Result};
use crate::models::ClassifierModel;
use crate::population::CellPopulation;
use crate::taxonomy::{DetachReason, Taxonomy};

/// Which classifiers compete for the most probable type of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MostProbableScope {
    /// Only the types the cell passed.
    #[default]
    Passing,
    /// Every type that scored the cell, passed or not.
    Evaluated,
}

impl FromStr for MostProbableScope {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "passing" => Ok(MostProbableScope::Passing),
            "evaluated" | "all" => Ok(MostProbableScope::Evaluated),
            other => Err(ClassifierError::Validation(format!(
                "unknown most-probable scope '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionOptions {
    /// Expression layer to score; `None` uses the population default.
    pub assay: Option<String>,
    /// Report only the deepest passing types, dropping their ancestors.
    pub ignore_ambiguous: bool,
    pub most_probable: MostProbableScope,
}

/// A classifier that could not be applied, together with the descendants
/// that were skipped because of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchWarning {
    pub cell_type: String,
    pub skipped: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CellPrediction {
    /// Passing types ordered by depth, then name.
    pub predicted_types: Vec<String>,
    pub most_probable_type: Option<String>,
}

impl CellPrediction {
    /// `predicted_types` joined by `separator`, `None` when empty.
    pub fn joined(&self, separator: &str) -> Option<String> {
        if self.predicted_types.is_empty() {
            None
        } else {
            Some(self.predicted_types.join(separator))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaxonomyPrediction {
    /// One entry per cell of the population.
    pub cells: Vec<CellPrediction>,
    /// Probability per classifier and cell; `None` where the cell was not scored.
    pub probabilities: BTreeMap<String, Vec<Option<f64>>>,
    pub warnings: Vec<BranchWarning>,
}

/// Result of walking one tree.
struct TreeScores {
    /// (node, probability per cell) for every classifier that ran.
    scored: Vec<(usize, Vec<Option<f64>>)>,
    warnings: Vec<BranchWarning>,
}

/// Build a taxonomy from `classifiers` and predict every cell of `population`.
pub fn predict_cell_types<M, P>(
    population: &P,
    classifiers: &[CellTypeClassifier<M>],
    options: &PredictionOptions,
) -> Result<TaxonomyPrediction>
where
    M: ClassifierModel,
    P: CellPopulation + ?Sized,
{
    let taxonomy = Taxonomy::build(classifiers)?;
    predict_taxonomy(population, &taxonomy, options)
}

/// Predict every cell of `population` against `taxonomy`.
///
/// A classifier that fails (typically because marker genes are missing)
/// disables its own branch only; the failure is logged and returned in
/// [`TaxonomyPrediction::warnings`]. An unknown assay is fatal.
pub fn predict_taxonomy<M, P>(
    population: &P,
    taxonomy: &Taxonomy<'_, M>,
    options: &PredictionOptions,
) -> Result<TaxonomyPrediction>
where
    M: ClassifierModel,
    P: CellPopulation + ?Sized,
{
    let assay = options.assay.as_deref();
    if let Some(name) = assay {
        if !population.assay_names().iter().any(|a| a == name) {
            return Err(ClassifierError::NotFound(format!("assay '{}'", name)));
        }
    }

    let n_cells = population.n_cells();
    let trees: Vec<TreeScores> = taxonomy
        .root_ids()
        .par_iter()
        .map(|&root| score_tree(population, taxonomy, root, assay))
        .collect();

    let mut warnings: Vec<BranchWarning> = taxonomy
        .detached()
        .into_iter()
        .map(|(cell_type, reason)| {
            let reason = match reason {
                DetachReason::UnresolvedParent(parent) => {
                    format!("parent '{}' is not loaded", parent)
                }
                DetachReason::Cycle => "parent chain forms a cycle".to_string(),
            };
            BranchWarning {
                cell_type: cell_type.to_string(),
                skipped: Vec::new(),
                reason,
            }
        })
        .collect();

    let mut scored: Vec<(usize, Vec<Option<f64>>)> = Vec::new();
    for tree in trees {
        scored.extend(tree.scored);
        warnings.extend(tree.warnings);
    }
    scored.sort_by(|(a, _), (b, _)| {
        let (a, b) = (taxonomy.node(*a), taxonomy.node(*b));
        taxonomy
            .depth(a.cell_type())
            .cmp(&taxonomy.depth(b.cell_type()))
            .then_with(|| a.cell_type().cmp(b.cell_type()))
    });

    let mut cells = Vec::with_capacity(n_cells);
    for cell in 0..n_cells {
        let mut passing: Vec<(&str, usize, f64)> = Vec::new();
        let mut evaluated: Vec<(&str, usize, f64)> = Vec::new();
        for (node, proba) in &scored {
            let Some(p) = proba[cell] else { continue };
            if !p.is_finite() {
                continue;
            }
            let classifier = taxonomy.node(*node);
            let entry = (classifier.cell_type(), taxonomy.node_depth(*node), p);
            if classifier.is_positive(p) {
                passing.push(entry);
            }
            evaluated.push(entry);
        }

        let candidates = match options.most_probable {
            MostProbableScope::Passing => &passing,
            MostProbableScope::Evaluated => &evaluated,
        };
        let most_probable_type = candidates
            .iter()
            .max_by(|a, b| {
                a.2.total_cmp(&b.2)
                    .then(a.1.cmp(&b.1))
                    .then_with(|| Reverse(a.0).cmp(&Reverse(b.0)))
            })
            .map(|(name, _, _)| name.to_string());

        let mut predicted_types: Vec<&str> = passing.iter().map(|(name, _, _)| *name).collect();
        if options.ignore_ambiguous {
            let all = predicted_types.clone();
            predicted_types.retain(|t| !all.iter().any(|other| taxonomy.is_ancestor(t, other)));
        }

        cells.push(CellPrediction {
            predicted_types: predicted_types.into_iter().map(str::to_string).collect(),
            most_probable_type,
        });
    }

    let mut probabilities = BTreeMap::new();
    for (node, proba) in scored {
        probabilities.insert(taxonomy.node(node).cell_type().to_string(), proba);
    }
    for warning in &warnings {
        for name in std::iter::once(&warning.cell_type).chain(&warning.skipped) {
            probabilities
                .entry(name.clone())
                .or_insert_with(|| vec![None; n_cells]);
        }
    }

    let classified = cells.iter().filter(|c| !c.predicted_types.is_empty()).count();
    log::info!(
        "{} of {} cells received at least one cell type from {} classifiers",
        classified,
        n_cells,
        probabilities.len()
    );

    Ok(TaxonomyPrediction {
        cells,
        probabilities,
        warnings,
    })
}

fn score_tree<M, P>(
    population: &P,
    taxonomy: &Taxonomy<'_, M>,
    root: usize,
    assay: Option<&str>,
) -> TreeScores
where
    M: ClassifierModel,
    P: CellPopulation + ?Sized,
{
    let n_cells = population.n_cells();
    let mut scored = Vec::new();
    let mut warnings = Vec::new();
    let mut stack: Vec<(usize, Vec<usize>)> = vec![(root, (0..n_cells).collect())];

    while let Some((node, active)) = stack.pop() {
        let classifier = taxonomy.node(node);
        let proba = match classifier.predict_proba(population, assay, Some(&active)) {
            Ok(proba) => proba,
            Err(e) => {
                let skipped = descendants(taxonomy, node);
                log::warn!(
                    "Skipping '{}' and {} descendant classifiers: {}",
                    classifier.cell_type(),
                    skipped.len(),
                    e
                );
                warnings.push(BranchWarning {
                    cell_type: classifier.cell_type().to_string(),
                    skipped,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let mut column = vec![None; n_cells];
        let mut passed = Vec::new();
        for (&cell, &p) in active.iter().zip(&proba) {
            column[cell] = Some(p);
            if classifier.is_positive(p) {
                passed.push(cell);
            }
        }
        log::debug!(
            "'{}' passed {} of {} cells",
            classifier.cell_type(),
            passed.len(),
            active.len()
        );
        scored.push((node, column));

        for &child in taxonomy.child_ids(node) {
            stack.push((child, passed.clone()));
        }
    }

    TreeScores { scored, warnings }
}

fn descendants<M: ClassifierModel>(taxonomy: &Taxonomy<'_, M>, node: usize) -> Vec<String> {
    let mut names = Vec::new();
    let mut stack: Vec<usize> = taxonomy.child_ids(node).to_vec();
    while let Some(next) = stack.pop() {
        names.push(taxonomy.node(next).cell_type().to_string());
        stack.extend_from_slice(taxonomy.child_ids(next));
    }
    names.sort();
    names
}
