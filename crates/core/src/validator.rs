//! Scoping predicate for candidate boxes.
//!
//! A class that declares parent filters only admits boxes lying inside a
//! matching region of a resolved parent layer. The validator is built once
//! per paper and queried per box.

use smol_str::SmolStr;

use crate::geom::BBX;
use crate::layer::{AnnotationLayer, QueryMode};

/// One resolved parent constraint: a concrete layer plus the labels that
/// count as admissible regions in it.
pub struct ParentFilter {
    pub layer: AnnotationLayer,
    pub labels: Vec<SmolStr>,
}

/// Tests whether a box falls inside an admissible parent region.
///
/// With no filters every box is valid; with several, any one admitting the
/// box suffices.
#[derive(Default)]
pub struct BoxValidator {
    filters: Vec<ParentFilter>,
}

impl BoxValidator {
    /// A validator with no constraints; accepts everything.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn new(filters: Vec<ParentFilter>) -> Self {
        Self { filters }
    }

    pub fn push(&mut self, layer: AnnotationLayer, labels: Vec<SmolStr>) {
        self.filters.push(ParentFilter { layer, labels });
    }

    pub fn is_valid(&self, target: &BBX) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        self.filters.iter().any(|f| {
            f.layer
                .get(target, QueryMode::Full)
                .is_some_and(|b| f.labels.iter().any(|l| *l == b.label))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::LabelledBox;

    #[test]
    fn no_filters_accepts_everything() {
        let v = BoxValidator::unconstrained();
        assert!(v.is_valid(&BBX::new(1, 0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn filter_admits_only_listed_labels() {
        let mut parent = AnnotationLayer::new();
        parent.add_box(LabelledBox::new(
            BBX::new(1, 0.0, 0.0, 100.0, 100.0),
            "body",
            0,
        ));
        parent.add_box(LabelledBox::new(
            BBX::new(1, 0.0, 200.0, 100.0, 300.0),
            "front",
            0,
        ));

        let mut v = BoxValidator::default();
        v.push(parent, vec!["body".into()]);

        assert!(v.is_valid(&BBX::new(1, 10.0, 10.0, 20.0, 20.0)));
        assert!(!v.is_valid(&BBX::new(1, 10.0, 210.0, 20.0, 220.0)));
        assert!(!v.is_valid(&BBX::new(2, 10.0, 10.0, 20.0, 20.0)));
    }
}
