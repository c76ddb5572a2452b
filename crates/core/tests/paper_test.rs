use marginalia_core::classes::class_by_name;
use marginalia_core::error::AnnotError;
use marginalia_core::geom::{BBX, LabelledBox};
use marginalia_core::layer::{AnnotationLayer, QueryMode};
use marginalia_core::paper::Paper;

fn sample_layer() -> AnnotationLayer {
    let mut layer = AnnotationLayer::new();
    layer.add_box(LabelledBox::new(
        BBX::new(1, 72.0, 72.0, 540.0, 200.0),
        "front",
        0,
    ));
    layer.add_box(LabelledBox::new(
        BBX::new(1, 72.0, 220.0, 540.0, 700.0),
        "body",
        0,
    ));
    layer
}

#[test]
fn layer_lifecycle_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut paper = Paper::new("1901.00001", "paper.pdf", dir.path()).unwrap();
    assert!(paper.meta_dir().is_dir());
    assert!(paper.layers().is_empty());

    let info = paper
        .add_annotation_layer("segmentation", Some(&sample_layer()))
        .unwrap();
    assert_eq!(info.class_name, "segmentation");
    assert_eq!(paper.layers().len(), 1);

    let loaded = paper.get_annotation_layer(&info.id);
    assert_eq!(loaded.len(), 2);
    let label = loaded.get_label_or_outside(
        &BBX::new(1, 100.0, 100.0, 120.0, 120.0),
        QueryMode::Intersect,
    );
    assert_eq!(label, "front");

    paper.remove_annotation_layer(&info.id).unwrap();
    assert!(paper.layers().is_empty());
    assert!(matches!(
        paper.get_layer_info(&info.id),
        Err(AnnotError::LayerNotFound(_))
    ));
}

#[test]
fn best_layer_is_the_most_recent_of_its_class() {
    let dir = tempfile::tempdir().unwrap();
    let mut paper = Paper::new("1901.00002", "paper.pdf", dir.path()).unwrap();

    let older = paper.add_annotation_layer("segmentation", None).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    let newer = paper.add_annotation_layer("segmentation", None).unwrap();
    paper.add_annotation_layer("header", None).unwrap();

    let best = paper.get_best_layer("segmentation").unwrap();
    assert_eq!(best.id, newer.id);
    assert_ne!(best.id, older.id);
    assert!(paper.get_best_layer("results").is_none());
}

#[test]
fn box_validator_resolves_parent_layers() {
    let dir = tempfile::tempdir().unwrap();
    let mut paper = Paper::new("1901.00003", "paper.pdf", dir.path()).unwrap();
    paper
        .add_annotation_layer("segmentation", Some(&sample_layer()))
        .unwrap();

    // results boxes must sit in segmentation body or annex regions.
    let results = class_by_name("results").unwrap();
    let validator = paper.get_box_validator(results);
    assert!(validator.is_valid(&BBX::new(1, 100.0, 300.0, 200.0, 320.0)));
    assert!(!validator.is_valid(&BBX::new(1, 100.0, 100.0, 200.0, 120.0)));

    let misc = class_by_name("misc").unwrap();
    let unconstrained = paper.get_box_validator(misc);
    assert!(unconstrained.is_valid(&BBX::new(3, 0.0, 0.0, 1.0, 1.0)));
}
