//! CLI binary smoke tests using assert_cmd.
//!
//! These tests exercise the compiled `scannot` binary to verify that
//! argument parsing, help text, templates and error handling work end-to-end.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("scannot").unwrap();
    cmd.env_remove("SCANNOT_DEFAULT_MODELS");
    cmd
}

/// Labeled table with well separated B and T cells.
fn write_training_table(path: &Path) {
    let mut table = String::from("cell_id\tcell_type\tCD19\tMS4A1\tCD3E\n");
    for i in 0..20 {
        let jitter = (i % 7) as f64 * 0.1;
        writeln!(
            table,
            "b_{}\tB cells\t{:.2}\t{:.2}\t{:.2}",
            i,
            4.0 + jitter,
            3.5 + jitter,
            0.1 * jitter
        )
        .unwrap();
    }
    for i in 0..20 {
        let jitter = (i % 5) as f64 * 0.1;
        writeln!(
            table,
            "t_{}\tT cells\t{:.2}\t{:.2}\t{:.2}",
            i,
            0.1 * jitter,
            0.2 * jitter,
            4.0 + jitter
        )
        .unwrap();
    }
    std::fs::write(path, table).unwrap();
}

// ---------------------------------------------------------------------------
// Top-level
// ---------------------------------------------------------------------------

#[test]
fn no_args_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_flag() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("train"))
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("models"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("scannot"));
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[test]
fn train_no_config_prints_template() {
    cmd()
        .arg("train")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"train_data\""))
        .stdout(predicate::str::contains("\"marker_genes\""))
        .stderr(predicate::str::contains("No config file provided"));
}

#[test]
fn evaluate_no_config_prints_template() {
    cmd()
        .arg("evaluate")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"test_data\""))
        .stdout(predicate::str::contains("\"report_file\""))
        .stderr(predicate::str::contains("No config file provided"));
}

#[test]
fn classify_no_config_prints_template() {
    cmd()
        .arg("classify")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ignore_ambiguous\""))
        .stdout(predicate::str::contains("\"unclassified\""))
        .stderr(predicate::str::contains("No config file provided"));
}

#[test]
fn train_nonexistent_config_errors() {
    cmd()
        .args(["train", "/nonexistent/config.json"])
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// Models subcommand
// ---------------------------------------------------------------------------

#[test]
fn models_no_subcommand_errors() {
    cmd().arg("models").assert().failure();
}

#[test]
fn models_list_empty_registry_prints_nothing() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["models", "list", "--registry"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn models_delete_unknown_errors() {
    let dir = tempfile::tempdir().unwrap();
    cmd()
        .args(["models", "delete", "B cells", "--registry"])
        .arg(dir.path())
        .assert()
        .failure();
}

#[test]
fn classify_without_registry_errors() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("cells.tsv");
    write_training_table(&data);
    let config = dir.path().join("classify.json");
    std::fs::write(&config, "{}").unwrap();

    cmd()
        .arg("classify")
        .arg(&config)
        .arg("--data")
        .arg(&data)
        .assert()
        .failure();
}

// ---------------------------------------------------------------------------
// Train, list and classify
// ---------------------------------------------------------------------------

/// Train a `B cells` classifier on a fresh table in `dir`, saving it into
/// `registry`. Returns the table and the written classifier file.
fn train_b_cells(dir: &Path, registry: &Path) -> (PathBuf, PathBuf) {
    let data = dir.join("cells.tsv");
    write_training_table(&data);

    let train_config = dir.join("train.json");
    std::fs::write(
        &train_config,
        r#"{ "cell_type": "B cells", "marker_genes": ["CD19", "MS4A1"], "training": { "seed": 3 } }"#,
    )
    .unwrap();
    let classifier_file = dir.join("b_cells.json");

    cmd()
        .arg("train")
        .arg(&train_config)
        .arg("--train_data")
        .arg(&data)
        .arg("--output_file")
        .arg(&classifier_file)
        .arg("--registry")
        .arg(registry)
        .assert()
        .success();
    assert!(classifier_file.exists());
    (data, classifier_file)
}

#[test]
fn train_then_classify_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry");
    let (data, _) = train_b_cells(dir.path(), &registry);

    cmd()
        .args(["models", "list", "--registry"])
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("B cells\t-\t0.5\tuser\tCD19,MS4A1"));

    let classify_config = dir.path().join("classify.json");
    std::fs::write(&classify_config, r#"{ "metadata_columns": ["cell_type"] }"#).unwrap();
    let output = dir.path().join("predictions.tsv");

    cmd()
        .arg("classify")
        .arg(&classify_config)
        .arg("--data")
        .arg(&data)
        .arg("--output_file")
        .arg(&output)
        .arg("--registry")
        .arg(&registry)
        .assert()
        .success();

    let written = std::fs::read_to_string(&output).unwrap();
    let header = written.lines().next().unwrap();
    assert_eq!(
        header,
        "cell_id\tcell_type\tpredicted_cell_type\tmost_probable_cell_type\tB cells_p"
    );
    assert_eq!(written.lines().count(), 41);
}

#[test]
fn train_then_evaluate_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry");
    let (data, classifier_file) = train_b_cells(dir.path(), &registry);

    let config = dir.path().join("evaluate.json");
    std::fs::write(&config, "{}").unwrap();
    let report_file = dir.path().join("report.json");

    cmd()
        .arg("evaluate")
        .arg(&config)
        .arg("--test_data")
        .arg(&data)
        .arg("--model")
        .arg(&classifier_file)
        .arg("--output_file")
        .arg(&report_file)
        .assert()
        .success();

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_file).unwrap()).unwrap();
    assert_eq!(report["cell_type"], "B cells");
    let accuracy = report["accuracy"].as_f64().unwrap();
    let auc = report["auc"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&accuracy));
    assert!((0.0..=1.0).contains(&auc));
    assert_eq!(report["cells"].as_array().unwrap().len(), 40);

    // the stored classifier can be evaluated by name as well
    let by_name = dir.path().join("report_by_name.json");
    cmd()
        .arg("evaluate")
        .arg(&config)
        .arg("--test_data")
        .arg(&data)
        .arg("--name")
        .arg("B cells")
        .arg("--registry")
        .arg(&registry)
        .arg("--output_file")
        .arg(&by_name)
        .assert()
        .success();
    assert!(by_name.exists());
}

// ---------------------------------------------------------------------------
// Registry management
// ---------------------------------------------------------------------------

#[test]
fn set_threshold_updates_the_listing() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry");
    train_b_cells(dir.path(), &registry);

    cmd()
        .args(["models", "set-threshold", "B cells", "0.7", "--registry"])
        .arg(&registry)
        .assert()
        .success();
    cmd()
        .args(["models", "list", "--registry"])
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("B cells\t-\t0.7\tuser"));
}

#[test]
fn set_threshold_rejects_non_positive_values() {
    let dir = tempfile::tempdir().unwrap();
    let registry = dir.path().join("registry");
    train_b_cells(dir.path(), &registry);

    cmd()
        .args(["models", "set-threshold", "B cells", "0", "--registry"])
        .arg(&registry)
        .assert()
        .failure();
    cmd()
        .args(["models", "list", "--registry"])
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("B cells\t-\t0.5\tuser"));
}

#[test]
fn set_threshold_copies_a_default_classifier_into_the_user_registry() {
    let dir = tempfile::tempdir().unwrap();
    let defaults = dir.path().join("defaults");
    train_b_cells(dir.path(), &defaults);
    let user = dir.path().join("user");

    cmd()
        .args(["models", "set-threshold", "B cells", "0.8", "--registry"])
        .arg(&user)
        .arg("--default-models")
        .arg(&defaults)
        .assert()
        .success();

    cmd()
        .args(["models", "list", "--registry"])
        .arg(&user)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("B cells\t-\t0.8\tuser"));
    cmd()
        .args(["models", "list", "--default-models"])
        .arg(&defaults)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("B cells\t-\t0.5\tdefault"));
}

#[test]
fn models_add_imports_a_file_and_refuses_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let (_, classifier_file) = train_b_cells(dir.path(), &dir.path().join("training"));
    let registry = dir.path().join("imported");

    cmd()
        .args(["models", "add"])
        .arg(&classifier_file)
        .arg("--registry")
        .arg(&registry)
        .assert()
        .success();
    cmd()
        .args(["models", "list", "--registry"])
        .arg(&registry)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("B cells\t-\t0.5\tuser"));

    cmd()
        .args(["models", "add"])
        .arg(&classifier_file)
        .arg("--registry")
        .arg(&registry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    cmd()
        .args(["models", "add"])
        .arg(&classifier_file)
        .arg("--registry")
        .arg(&registry)
        .arg("--overwrite")
        .assert()
        .success();
}
