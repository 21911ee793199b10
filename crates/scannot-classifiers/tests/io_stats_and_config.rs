//! Integration tests for expression tables, ROC statistics and config types.

mod common;

use std::fs;

use tempfile::tempdir;

use common::{annotations, population, strings};
use scannot_classifiers::config::{Kernel, MissingGenePolicy, ModelConfig, TrainingConfig};
use scannot_classifiers::io::{read_expression_table, write_annotations_table, ExpressionReaderConfig};
use scannot_classifiers::population::CellPopulation;
use scannot_classifiers::stats::{accuracy, roc_auc, roc_curve};

// ---------------------------------------------------------------------------
// Expression tables
// ---------------------------------------------------------------------------

#[test]
fn read_tsv_with_metadata() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cells.tsv");
    fs::write(
        &path,
        "cell_id\tcell_type\tCD19\tHLA-DRA\n\
         c1\tB cells\t3.5\t1.0\n\
         c2\tNA\t0.0\t2.0\n\
         c3\t\t0.5\t0.0\n",
    )
    .unwrap();

    let config = ExpressionReaderConfig::default().with_metadata(["cell_type"]);
    let data = read_expression_table(&path, &config).unwrap();

    assert_eq!(data.n_cells(), 3);
    assert_eq!(data.cell_ids(), strings(&["c1", "c2", "c3"]).as_slice());
    assert_eq!(data.gene_names(), strings(&["CD19", "HLA-DRA"]).as_slice());
    assert_eq!(
        data.annotation("cell_type").unwrap(),
        annotations(&[Some("B cells"), None, None]).as_slice()
    );

    let x = data
        .expression(None, &strings(&["HLA-DRA", "CD19"]), Some(&[0, 2][..]))
        .unwrap();
    assert_eq!(x.shape(), &[2, 2]);
    assert_eq!(x[[0, 0]], 1.0);
    assert_eq!(x[[1, 1]], 0.5);
}

#[test]
fn read_csv_into_named_assay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cells.csv");
    fs::write(&path, "barcode,CD3E\nAAAC,1.5\nAAAG,0.25\n").unwrap();

    let config = ExpressionReaderConfig {
        cell_id_column: "barcode".to_string(),
        assay: "logcounts".to_string(),
        ..ExpressionReaderConfig::default()
    };
    let data = read_expression_table(&path, &config).unwrap();
    assert_eq!(data.assay_names(), strings(&["logcounts"]));
    assert_eq!(data.default_assay(), "logcounts");
    let x = data
        .expression(Some("logcounts"), &strings(&["CD3E"]), None)
        .unwrap();
    assert_eq!(x[[1, 0]], 0.25);
}

#[test]
fn invalid_expression_values_are_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cells.tsv");
    fs::write(&path, "cell_id\tCD19\nc1\thigh\n").unwrap();
    let err = read_expression_table(&path, &ExpressionReaderConfig::default()).unwrap_err();
    assert!(format!("{:#}", err).contains("CD19"));
}

#[test]
fn missing_id_column_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cells.tsv");
    fs::write(&path, "id\tCD19\nc1\t1\n").unwrap();
    assert!(read_expression_table(&path, &ExpressionReaderConfig::default()).is_err());
}

#[test]
fn write_annotation_and_score_columns() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.tsv");
    let mut data = population(&["CD19"], &[vec![1.0], vec![0.0]])
        .with_annotation("label", annotations(&[Some("B cells"), None]))
        .unwrap();
    data.set_scores("B cells_p", vec![Some(0.75), None]).unwrap();

    write_annotations_table(&path, &data, &strings(&["label", "B cells_p"])).unwrap();
    let written = fs::read_to_string(&path).unwrap();
    assert_eq!(
        written,
        "cell_id\tlabel\tB cells_p\ncell_0\tB cells\t0.75\ncell_1\t\t\n"
    );

    assert!(write_annotations_table(&path, &data, &strings(&["nope"])).is_err());
}

// ---------------------------------------------------------------------------
// ROC statistics
// ---------------------------------------------------------------------------

#[test]
fn perfect_separation_has_unit_auc() {
    let scores = [0.9, 0.8, 0.3, 0.1];
    let labels = [true, true, false, false];
    assert!((roc_auc(&scores, &labels).unwrap() - 1.0).abs() < 1e-12);
}

#[test]
fn tied_scores_move_together() {
    let scores = [0.5, 0.5, 0.5, 0.5];
    let labels = [true, false, true, false];
    let curve = roc_curve(&scores, &labels).unwrap();
    assert_eq!(curve.points.len(), 2);
    assert!((curve.auc - 0.5).abs() < 1e-12);
}

#[test]
fn roc_rejects_single_class_and_nan() {
    assert!(roc_curve(&[0.1, 0.2], &[true, true]).is_err());
    assert!(roc_curve(&[0.1, f64::NAN], &[true, false]).is_err());
    assert!(roc_curve(&[0.1], &[true, false]).is_err());
}

#[test]
fn accuracy_counts_matches() {
    assert_eq!(accuracy(&[true, false, true, true], &[true, false, false, true]), 0.75);
    assert_eq!(accuracy(&[], &[]), 0.0);
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[test]
fn kernel_from_str() {
    assert_eq!("linear".parse::<Kernel>().unwrap(), Kernel::Linear);
    assert!(matches!("RBF".parse::<Kernel>().unwrap(), Kernel::Gaussian { .. }));
    assert!(matches!("poly".parse::<Kernel>().unwrap(), Kernel::Polynomial { .. }));
    assert!("random_forest".parse::<Kernel>().is_err());
}

#[test]
fn training_config_reads_partial_json() {
    let config: TrainingConfig =
        serde_json::from_str(r#"{"seed": 11, "missing_genes": "drop", "model": {"kernel": {"gaussian": {"eps": 0.5}}}}"#)
            .unwrap();
    assert_eq!(config.seed, Some(11));
    assert_eq!(config.missing_genes, MissingGenePolicy::Drop);
    assert_eq!(config.model.kernel, Kernel::Gaussian { eps: 0.5 });
    assert_eq!(config.model.c, ModelConfig::default().c);
}

#[test]
fn model_config_serializes_to_json() {
    let json = serde_json::to_string(&ModelConfig::default()).unwrap();
    assert!(json.contains("\"kernel\":\"linear\""));
    assert!(json.contains("eps"));
}
