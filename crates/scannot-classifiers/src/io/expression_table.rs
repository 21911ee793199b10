//! Cell-by-gene expression tables in CSV/TSV form.
//!
//! One row per cell: a cell id column, optional metadata columns and one
//! numeric column per gene.
use std::collections::HashSet;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use ndarray::Array2;

use crate::labels::is_missing;
use crate::population::{CellPopulation, ExpressionMatrix, DEFAULT_ASSAY};

/// Configuration for reading expression tables.
#[derive(Debug, Clone)]
pub struct ExpressionReaderConfig {
    /// Column holding the cell identifiers.
    pub cell_id_column: String,
    /// Columns kept as per-cell annotations instead of genes.
    pub metadata_columns: Vec<String>,
    /// Name of the expression layer built from the gene columns.
    pub assay: String,
}

impl Default for ExpressionReaderConfig {
    fn default() -> Self {
        Self {
            cell_id_column: "cell_id".to_string(),
            metadata_columns: Vec::new(),
            assay: DEFAULT_ASSAY.to_string(),
        }
    }
}

impl ExpressionReaderConfig {
    pub fn with_metadata<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// `,` for `.csv` files, tab otherwise.
pub fn delimiter_for<P: AsRef<Path>>(path: P) -> u8 {
    match path
        .as_ref()
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("csv") => b',',
        _ => b'\t',
    }
}

/// Read an expression table into an [`ExpressionMatrix`].
///
/// Metadata values spelled `""`, `NA`, `NaN` or `null` become missing.
pub fn read_expression_table<P: AsRef<Path>>(
    path: P,
    config: &ExpressionReaderConfig,
) -> Result<ExpressionMatrix> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter_for(path))
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to open expression table: {}", path.display()))?;

    let headers = reader
        .headers()
        .context("Failed to read expression table header row")?
        .clone();

    let cell_id_idx = find_column(&headers, &config.cell_id_column)
        .ok_or_else(|| anyhow!("Missing cell id column '{}'", config.cell_id_column))?;

    let mut metadata_idx = Vec::with_capacity(config.metadata_columns.len());
    for name in &config.metadata_columns {
        let idx = find_column(&headers, name)
            .ok_or_else(|| anyhow!("Missing metadata column '{}'", name))?;
        metadata_idx.push(idx);
    }

    let reserved: HashSet<usize> = metadata_idx
        .iter()
        .copied()
        .chain(std::iter::once(cell_id_idx))
        .collect();
    let gene_idx: Vec<usize> = (0..headers.len()).filter(|i| !reserved.contains(i)).collect();
    if gene_idx.is_empty() {
        return Err(anyhow!("No gene columns found in {}", path.display()));
    }

    let mut cell_ids = Vec::new();
    let mut values = Vec::new();
    let mut metadata: Vec<Vec<Option<String>>> = vec![Vec::new(); metadata_idx.len()];

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let cell_id = record
            .get(cell_id_idx)
            .ok_or_else(|| anyhow!("Missing cell id at row {}", row_idx + 1))?;
        cell_ids.push(cell_id.trim().to_string());

        for (column, &idx) in metadata.iter_mut().zip(&metadata_idx) {
            let value = record.get(idx).unwrap_or_default();
            column.push(if is_missing(value) {
                None
            } else {
                Some(value.trim().to_string())
            });
        }

        for &idx in &gene_idx {
            let value = record
                .get(idx)
                .ok_or_else(|| anyhow!("Missing expression value at row {}", row_idx + 1))?;
            let parsed = value.trim().parse::<f64>().with_context(|| {
                format!(
                    "Invalid expression value for '{}' at row {}",
                    headers.get(idx).unwrap_or(""),
                    row_idx + 1
                )
            })?;
            values.push(parsed);
        }
    }

    let gene_names: Vec<String> = gene_idx
        .iter()
        .map(|&idx| headers.get(idx).unwrap_or("").to_string())
        .collect();
    let x = Array2::from_shape_vec((cell_ids.len(), gene_names.len()), values)
        .context("Failed to build expression matrix")?;

    let n_cells = cell_ids.len();
    let mut population = ExpressionMatrix::new(cell_ids, gene_names, x)?;
    if config.assay != DEFAULT_ASSAY {
        population.rename_assay(DEFAULT_ASSAY, &config.assay)?;
    }
    for (name, column) in config.metadata_columns.iter().zip(metadata) {
        population.set_annotation(name, column)?;
    }

    log::info!(
        "Loaded {} cells x {} genes from {}",
        n_cells,
        gene_idx.len(),
        path.display()
    );
    Ok(population)
}

/// Write cell ids and the named annotation or score columns of `population`.
///
/// Missing values are written as empty fields.
pub fn write_annotations_table<P, Q>(path: Q, population: &P, columns: &[String]) -> Result<()>
where
    P: CellPopulation + ?Sized,
    Q: AsRef<Path>,
{
    let path = path.as_ref();
    let mut cells: Vec<Vec<String>> = vec![Vec::with_capacity(columns.len()); population.n_cells()];
    for column in columns {
        if let Some(values) = population.annotation(column) {
            for (row, value) in cells.iter_mut().zip(values) {
                row.push(value.clone().unwrap_or_default());
            }
        } else if let Some(values) = population.scores(column) {
            for (row, value) in cells.iter_mut().zip(values) {
                row.push(value.map(|v| v.to_string()).unwrap_or_default());
            }
        } else {
            return Err(anyhow!("Column '{}' is not present in the population", column));
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter_for(path))
        .from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    let mut header = vec!["cell_id".to_string()];
    header.extend(columns.iter().cloned());
    writer.write_record(&header)?;

    for (cell_id, row) in population.cell_ids().iter().zip(cells) {
        writer.write_record(std::iter::once(cell_id.clone()).chain(row))?;
    }
    writer.flush()?;

    log::info!("Wrote {} columns for {} cells to {}", columns.len(), population.n_cells(), path.display());
    Ok(())
}

fn find_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.eq_ignore_ascii_case(name))
}
