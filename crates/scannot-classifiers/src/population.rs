//! Cell populations: expression values per cell and gene plus per-cell
//! annotation columns.
//!
//! Classifiers only ever talk to the [`CellPopulation`] trait. The in-memory
//! [`ExpressionMatrix`] is the implementation used by the readers and the CLI.
use std::collections::{BTreeMap, HashMap, HashSet};

use ndarray::{Array2, Axis};

use crate::error::{ClassifierError, Result};

/// Name given to the expression layer when none is specified.
pub const DEFAULT_ASSAY: &str = "counts";

/// What the classifiers need from an expression-matrix container.
pub trait CellPopulation: Sync {
    fn n_cells(&self) -> usize;

    fn cell_ids(&self) -> &[String];

    /// Gene (feature) names, shared by every assay.
    fn gene_names(&self) -> &[String];

    fn gene_index(&self, gene: &str) -> Option<usize>;

    fn assay_names(&self) -> Vec<String>;

    /// Dense cells x genes sub-matrix for `genes`, in the given order.
    ///
    /// `assay = None` selects the default layer; `cells = None` selects every
    /// cell. Fails with `MissingGenes` listing every absent gene.
    fn expression(
        &self,
        assay: Option<&str>,
        genes: &[String],
        cells: Option<&[usize]>,
    ) -> Result<Array2<f64>>;

    /// Categorical per-cell column; `None` entries are missing values.
    fn annotation(&self, column: &str) -> Option<&[Option<String>]>;

    fn set_annotation(&mut self, column: &str, values: Vec<Option<String>>) -> Result<()>;

    /// Numeric per-cell column.
    fn scores(&self, column: &str) -> Option<&[Option<f64>]>;

    fn set_scores(&mut self, column: &str, values: Vec<Option<f64>>) -> Result<()>;

    /// Genes from `genes` that are not part of the feature set.
    fn missing_genes(&self, genes: &[String]) -> Vec<String> {
        genes
            .iter()
            .filter(|g| self.gene_index(g).is_none())
            .cloned()
            .collect()
    }
}

/// In-memory population with one or more named cells x genes layers.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    cell_ids: Vec<String>,
    gene_names: Vec<String>,
    gene_lookup: HashMap<String, usize>,
    assays: BTreeMap<String, Array2<f64>>,
    default_assay: String,
    annotations: BTreeMap<String, Vec<Option<String>>>,
    scores: BTreeMap<String, Vec<Option<f64>>>,
}

impl ExpressionMatrix {
    /// Create a population whose default assay is `x` (rows = cells).
    pub fn new(cell_ids: Vec<String>, gene_names: Vec<String>, x: Array2<f64>) -> Result<Self> {
        if x.nrows() != cell_ids.len() || x.ncols() != gene_names.len() {
            return Err(ClassifierError::Data(format!(
                "Expression matrix is {}x{} but {} cell ids and {} gene names were given",
                x.nrows(),
                x.ncols(),
                cell_ids.len(),
                gene_names.len()
            )));
        }

        let mut gene_lookup = HashMap::with_capacity(gene_names.len());
        for (idx, gene) in gene_names.iter().enumerate() {
            if gene_lookup.insert(gene.clone(), idx).is_some() {
                return Err(ClassifierError::Data(format!("Duplicated gene name '{}'", gene)));
            }
        }

        let mut assays = BTreeMap::new();
        assays.insert(DEFAULT_ASSAY.to_string(), x);

        Ok(ExpressionMatrix {
            cell_ids,
            gene_names,
            gene_lookup,
            assays,
            default_assay: DEFAULT_ASSAY.to_string(),
            annotations: BTreeMap::new(),
            scores: BTreeMap::new(),
        })
    }

    /// Add (or replace) a named layer with the same shape as the default one.
    pub fn with_assay(mut self, name: &str, x: Array2<f64>) -> Result<Self> {
        if x.dim() != (self.cell_ids.len(), self.gene_names.len()) {
            return Err(ClassifierError::Data(format!(
                "Assay '{}' has shape {:?}, expected ({}, {})",
                name,
                x.dim(),
                self.cell_ids.len(),
                self.gene_names.len()
            )));
        }
        self.assays.insert(name.to_string(), x);
        Ok(self)
    }

    pub fn with_annotation(mut self, column: &str, values: Vec<Option<String>>) -> Result<Self> {
        self.set_annotation(column, values)?;
        Ok(self)
    }

    pub fn default_assay(&self) -> &str {
        &self.default_assay
    }

    pub fn set_default_assay(&mut self, name: &str) -> Result<()> {
        if !self.assays.contains_key(name) {
            return Err(ClassifierError::NotFound(format!("assay '{}'", name)));
        }
        self.default_assay = name.to_string();
        Ok(())
    }

    /// Rename a layer, keeping it the default when it was.
    pub fn rename_assay(&mut self, from: &str, to: &str) -> Result<()> {
        if self.assays.contains_key(to) {
            return Err(ClassifierError::Data(format!("Assay '{}' already exists", to)));
        }
        let x = self
            .assays
            .remove(from)
            .ok_or_else(|| ClassifierError::NotFound(format!("assay '{}'", from)))?;
        self.assays.insert(to.to_string(), x);
        if self.default_assay == from {
            self.default_assay = to.to_string();
        }
        Ok(())
    }

    pub fn annotation_columns(&self) -> Vec<String> {
        self.annotations.keys().cloned().collect()
    }

    pub fn score_columns(&self) -> Vec<String> {
        self.scores.keys().cloned().collect()
    }

    fn layer(&self, assay: Option<&str>) -> Result<&Array2<f64>> {
        let name = assay.unwrap_or(&self.default_assay);
        self.assays
            .get(name)
            .ok_or_else(|| ClassifierError::NotFound(format!("assay '{}'", name)))
    }

    /// Sub-population restricted to `indices` (in that order).
    ///
    /// Every layer and per-cell column is subset together; gene names are
    /// retained as-is.
    pub fn select_cells(&self, indices: &[usize]) -> ExpressionMatrix {
        let pick = |values: &Vec<Option<String>>| {
            indices.iter().map(|&i| values[i].clone()).collect::<Vec<_>>()
        };

        ExpressionMatrix {
            cell_ids: indices.iter().map(|&i| self.cell_ids[i].clone()).collect(),
            gene_names: self.gene_names.clone(),
            gene_lookup: self.gene_lookup.clone(),
            assays: self
                .assays
                .iter()
                .map(|(name, x)| (name.clone(), x.select(Axis(0), indices)))
                .collect(),
            default_assay: self.default_assay.clone(),
            annotations: self
                .annotations
                .iter()
                .map(|(name, values)| (name.clone(), pick(values)))
                .collect(),
            scores: self
                .scores
                .iter()
                .map(|(name, values)| (name.clone(), indices.iter().map(|&i| values[i]).collect()))
                .collect(),
        }
    }

    fn check_column_len(&self, column: &str, len: usize) -> Result<()> {
        if len != self.cell_ids.len() {
            return Err(ClassifierError::Data(format!(
                "Column '{}' has {} values for {} cells",
                column,
                len,
                self.cell_ids.len()
            )));
        }
        Ok(())
    }
}

impl CellPopulation for ExpressionMatrix {
    fn n_cells(&self) -> usize {
        self.cell_ids.len()
    }

    fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    fn gene_names(&self) -> &[String] {
        &self.gene_names
    }

    fn gene_index(&self, gene: &str) -> Option<usize> {
        self.gene_lookup.get(gene).copied()
    }

    fn assay_names(&self) -> Vec<String> {
        self.assays.keys().cloned().collect()
    }

    fn expression(
        &self,
        assay: Option<&str>,
        genes: &[String],
        cells: Option<&[usize]>,
    ) -> Result<Array2<f64>> {
        let layer = self.layer(assay)?;

        let missing = self.missing_genes(genes);
        if !missing.is_empty() {
            return Err(ClassifierError::MissingGenes(missing));
        }

        let columns: Vec<usize> = genes.iter().filter_map(|g| self.gene_index(g)).collect();
        let by_gene = layer.select(Axis(1), &columns);
        Ok(match cells {
            Some(rows) => {
                if let Some(&bad) = rows.iter().find(|&&r| r >= self.cell_ids.len()) {
                    return Err(ClassifierError::Data(format!(
                        "Cell index {} out of range for {} cells",
                        bad,
                        self.cell_ids.len()
                    )));
                }
                by_gene.select(Axis(0), rows)
            }
            None => by_gene,
        })
    }

    fn annotation(&self, column: &str) -> Option<&[Option<String>]> {
        self.annotations.get(column).map(|v| v.as_slice())
    }

    fn set_annotation(&mut self, column: &str, values: Vec<Option<String>>) -> Result<()> {
        self.check_column_len(column, values.len())?;
        self.annotations.insert(column.to_string(), values);
        Ok(())
    }

    fn scores(&self, column: &str) -> Option<&[Option<f64>]> {
        self.scores.get(column).map(|v| v.as_slice())
    }

    fn set_scores(&mut self, column: &str, values: Vec<Option<f64>>) -> Result<()> {
        self.check_column_len(column, values.len())?;
        self.scores.insert(column.to_string(), values);
        Ok(())
    }

    fn missing_genes(&self, genes: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        genes
            .iter()
            .filter(|g| !self.gene_lookup.contains_key(g.as_str()) && seen.insert(g.as_str()))
            .cloned()
            .collect()
    }
}
