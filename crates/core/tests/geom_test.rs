use marginalia_core::geom::{BBX, LabelledBox};

#[test]
fn extended_box_contains_original() {
    let boxes = [
        BBX::new(1, 0.0, 0.0, 10.0, 10.0),
        BBX::new(1, 5.5, 3.25, 120.0, 40.0),
        BBX::new(3, 100.0, 100.0, 100.0, 100.0),
    ];
    for b in &boxes {
        for d in [0.0, 0.5, 10.0] {
            assert!(b.extend(d).contains(b), "{b:?} extend({d})");
        }
    }
}

#[test]
fn group_with_covers_both_operands() {
    let a = BBX::new(2, 10.0, 10.0, 20.0, 20.0);
    let b = BBX::new(2, 50.0, 5.0, 70.0, 15.0);
    let merged = a.group_with(&b);
    assert!(merged.contains(&a));
    assert!(merged.contains(&b));
    assert_eq!(merged, b.group_with(&a));
}

#[test]
#[should_panic]
fn group_with_across_pages_panics() {
    let a = BBX::new(1, 0.0, 0.0, 10.0, 10.0);
    let b = BBX::new(2, 0.0, 0.0, 10.0, 10.0);
    let _ = a.group_with(&b);
}

#[test]
fn touching_corner_counts_as_intersection() {
    let a = BBX::new(1, 0.0, 0.0, 10.0, 10.0);
    let b = BBX::new(1, 10.0, 10.0, 20.0, 20.0);
    assert!(a.intersects(&b));
    assert!(b.intersects(&a));
}

#[test]
fn different_pages_never_interact() {
    let a = BBX::new(1, 0.0, 0.0, 10.0, 10.0);
    let b = BBX::new(2, 0.0, 0.0, 10.0, 10.0);
    assert!(!a.intersects(&b));
    assert!(!a.contains(&b));
    assert!(!a.extend(100.0).contains(&b));
}

#[test]
fn from_list_builds_one_hull_per_page() {
    let hulls = BBX::from_list(&[
        BBX::new(1, 0.0, 0.0, 10.0, 10.0),
        BBX::new(2, 5.0, 5.0, 15.0, 15.0),
        BBX::new(1, 20.0, 20.0, 30.0, 30.0),
    ]);
    assert_eq!(hulls.len(), 2);
    assert_eq!(hulls[0], BBX::new(1, 0.0, 0.0, 30.0, 30.0));
    assert_eq!(hulls[1], BBX::new(2, 5.0, 5.0, 15.0, 15.0));
}

#[test]
fn labelled_box_group_key() {
    let b = LabelledBox::new(BBX::new(1, 0.0, 0.0, 1.0, 1.0), "theorem", 3);
    let (label, group) = b.group_key();
    assert_eq!(label, "theorem");
    assert_eq!(group, 3);
}
