//! Integration tests for the classifier entity and label resolution.

mod common;

use common::{annotations, scored, strings, GeneScore};
use scannot_classifiers::classifier::{CellTypeClassifier, DEFAULT_THRESHOLD};
use scannot_classifiers::error::ClassifierError;
use scannot_classifiers::labels::{count_labels, restrict_to_parent, Label, LabelResolver, LabelSource};
use scannot_classifiers::population::ExpressionMatrix;

fn validation_error<T: std::fmt::Debug>(result: Result<T, ClassifierError>) -> bool {
    matches!(result, Err(ClassifierError::Validation(_)))
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

#[test]
fn construct_valid_classifier() {
    let c = scored("B cells", "CD19", None);
    assert_eq!(c.cell_type(), "B cells");
    assert_eq!(c.marker_genes(), ["CD19".to_string()].as_slice());
    assert_eq!(c.threshold(), DEFAULT_THRESHOLD);
    assert!(c.is_root());
}

#[test]
fn construct_rejects_malformed_fields() {
    let genes = strings(&["CD19"]);
    assert!(validation_error(CellTypeClassifier::new(
        "", GeneScore::on("CD19"), genes.clone(), 0.5, None
    )));
    assert!(validation_error(CellTypeClassifier::new(
        "   ", GeneScore::on("CD19"), genes.clone(), 0.5, None
    )));
    assert!(validation_error(CellTypeClassifier::new(
        "B cells", GeneScore::unfitted(), Vec::new(), 0.5, None
    )));
    assert!(validation_error(CellTypeClassifier::new(
        "B cells", GeneScore::unfitted(), strings(&["CD19", " "]), 0.5, None
    )));
    assert!(validation_error(CellTypeClassifier::new(
        "B cells", GeneScore::unfitted(), strings(&["CD19", "CD19"]), 0.5, None
    )));
    assert!(validation_error(CellTypeClassifier::new(
        "B cells", GeneScore::on("CD19"), genes.clone(), 0.0, None
    )));
    assert!(validation_error(CellTypeClassifier::new(
        "B cells", GeneScore::on("CD19"), genes.clone(), f64::NAN, None
    )));
    assert!(validation_error(CellTypeClassifier::new(
        "B cells", GeneScore::on("CD19"), genes, 0.5, Some(String::new())
    )));
}

#[test]
fn construct_requires_markers_matching_fitted_features() {
    let result = CellTypeClassifier::new(
        "B cells",
        GeneScore::on("CD19"),
        strings(&["MS4A1"]),
        0.5,
        None,
    );
    assert!(validation_error(result));
}

#[test]
fn hyphenated_markers_are_restored_from_features() {
    let c = CellTypeClassifier::new(
        "Dendritic cells",
        GeneScore::on("HLA-DRA"),
        strings(&["HLA-DRA"]),
        0.5,
        None,
    )
    .unwrap();
    assert_eq!(c.marker_genes(), ["HLA-DRA".to_string()].as_slice());
}

// ---------------------------------------------------------------------------
// Setters
// ---------------------------------------------------------------------------

#[test]
fn threshold_setter_accepts_only_positive_values() {
    let mut c = scored("B cells", "CD19", None);
    for v in [0.1, 0.7, 1.0, 2.5] {
        assert!(c.set_threshold(v).is_ok());
        assert_eq!(c.threshold(), v);
    }
    for v in [0.0, -0.3, f64::NAN, f64::INFINITY] {
        assert!(validation_error(c.set_threshold(v)));
    }
    assert_eq!(c.threshold(), 2.5);
}

#[test]
fn threshold_controls_positive_calls() {
    let mut c = scored("B cells", "CD19", None);
    assert!(!c.is_positive(0.5));
    assert!(c.is_positive(0.51));
    c.set_threshold(0.8).unwrap();
    assert!(!c.is_positive(0.7));
}

#[test]
fn parent_setter_rejects_empty_names() {
    let mut c = scored("Plasma cells", "PRDM1", None);
    c.set_parent(Some("B cells")).unwrap();
    assert_eq!(c.parent_type(), Some("B cells"));
    assert!(validation_error(c.set_parent(Some(""))));
    assert_eq!(c.parent_type(), Some("B cells"));
    c.set_parent(None).unwrap();
    assert!(c.is_root());
}

#[test]
fn marker_genes_follow_the_model() {
    let mut c = scored("B cells", "CD19", None);
    assert!(!c.set_marker_genes(strings(&["MS4A1"])).unwrap());
    assert_eq!(c.marker_genes(), ["CD19".to_string()].as_slice());

    c.set_model(GeneScore::on("MS4A1")).unwrap();
    assert_eq!(c.marker_genes(), ["MS4A1".to_string()].as_slice());
}

#[test]
fn marker_genes_settable_without_fitted_model() {
    let mut c = CellTypeClassifier::new(
        "B cells",
        GeneScore::unfitted(),
        strings(&["CD19"]),
        0.5,
        None,
    )
    .unwrap();
    assert!(c.set_marker_genes(strings(&["CD19", "MS4A1"])).unwrap());
    assert_eq!(c.marker_genes().len(), 2);
    assert!(validation_error(c.set_marker_genes(Vec::new())));
}

#[test]
fn rename_validates_cell_type() {
    let mut c = scored("B cells", "CD19", None);
    c.set_cell_type("B lymphocytes").unwrap();
    assert_eq!(c.cell_type(), "B lymphocytes");
    assert!(validation_error(c.set_cell_type("")));
}

// ---------------------------------------------------------------------------
// Label resolution
// ---------------------------------------------------------------------------

#[test]
fn resolver_maps_values_to_labels() {
    let resolver = LabelResolver::new("B cells", strings(&["Naive B cells"]));
    let values = annotations(&[
        Some("B cells"),
        Some("Naive B cells"),
        Some("T cells"),
        None,
        Some("NA"),
        Some(""),
    ]);
    assert_eq!(
        resolver.resolve(&values),
        vec![
            Label::Positive,
            Label::Positive,
            Label::Negative,
            Label::Ambiguous,
            Label::Ambiguous,
            Label::Ambiguous,
        ]
    );
}

#[test]
fn missing_annotation_never_counts() {
    let resolver = LabelResolver::new("B cells", Vec::new());
    let labels = resolver.resolve(&annotations(&[None, Some("B cells"), Some("T cells")]));
    assert_eq!(count_labels(&labels), (1, 1, 1));
}

#[test]
fn tag_column_bypasses_resolution() {
    let x = ndarray::Array2::zeros((5, 1));
    let population = ExpressionMatrix::new(
        strings(&["a", "b", "c", "d", "e"]),
        strings(&["CD19"]),
        x,
    )
    .unwrap()
    .with_annotation(
        "is_b",
        annotations(&[Some("yes"), Some("No"), Some("TRUE"), Some("maybe"), None]),
    )
    .unwrap();

    let labels = LabelSource::tags("is_b").resolve(&population, "B cells").unwrap();
    assert_eq!(
        labels,
        vec![
            Label::Positive,
            Label::Negative,
            Label::Positive,
            Label::Ambiguous,
            Label::Ambiguous,
        ]
    );
}

#[test]
fn unknown_label_column_is_a_data_error() {
    let population = ExpressionMatrix::new(
        strings(&["a"]),
        strings(&["CD19"]),
        ndarray::Array2::zeros((1, 1)),
    )
    .unwrap();
    let result = LabelSource::annotation("cell_type").resolve(&population, "B cells");
    assert!(matches!(result, Err(ClassifierError::Data(_))));
}

#[test]
fn parent_restriction_demotes_incoherent_cells() {
    let mut labels = vec![
        Label::Positive,
        Label::Positive,
        Label::Negative,
        Label::Negative,
        Label::Ambiguous,
    ];
    let passed = [true, false, true, false, false];
    let (demoted, outside) = restrict_to_parent(&mut labels, &passed);
    assert_eq!((demoted, outside), (1, 1));
    assert_eq!(
        labels,
        vec![
            Label::Positive,
            Label::Ambiguous,
            Label::Negative,
            Label::Ambiguous,
            Label::Ambiguous,
        ]
    );
}
