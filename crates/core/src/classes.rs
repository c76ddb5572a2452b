//! Annotation classes: the label vocabularies layers are typed with.
//!
//! A class names its permitted labels and, optionally, the regions of a
//! parent class its boxes must fall inside (the header class lives in the
//! front matter of the segmentation class, results live in the body or
//! annex).

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A subset of one class's labels, used to scope where a child class may
/// place its boxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassFilter {
    pub name: SmolStr,
    pub labels: Vec<SmolStr>,
}

impl ClassFilter {
    pub fn new(name: &str, labels: &[&str]) -> Self {
        Self {
            name: name.into(),
            labels: labels.iter().map(|&l| l.into()).collect(),
        }
    }
}

/// A label vocabulary plus the parent regions its boxes are confined to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationClass {
    pub name: SmolStr,
    pub labels: Vec<SmolStr>,
    /// Parent classes this class can exist in; empty means anywhere.
    pub parents: Vec<ClassFilter>,
}

impl AnnotationClass {
    pub fn new(name: &str, labels: &[&str], parents: Vec<ClassFilter>) -> Self {
        Self {
            name: name.into(),
            labels: labels.iter().map(|&l| l.into()).collect(),
            parents,
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Coarse document segmentation.
pub static SEGMENTATION_CLASS: Lazy<AnnotationClass> = Lazy::new(|| {
    AnnotationClass::new(
        "segmentation",
        &[
            "acknowledgement",
            "front",
            "headnote",
            "footnote",
            "body",
            "bibliography",
            "page",
            "annex",
        ],
        Vec::new(),
    )
});

/// Header information, confined to the front matter.
pub static HEADER_CLASS: Lazy<AnnotationClass> = Lazy::new(|| {
    AnnotationClass::new(
        "header",
        &["title"],
        vec![ClassFilter::new("segmentation", &["front"])],
    )
});

/// Theoretical results of a maths or computer science paper, confined to
/// the body and annexes.
pub static RESULTS_CLASS: Lazy<AnnotationClass> = Lazy::new(|| {
    AnnotationClass::new(
        "results",
        &[
            "lemma",
            "theorem",
            "proposition",
            "definition",
            "remark",
            "corollary",
            "claim",
            "conjecture",
            "assumption",
            "proof",
        ],
        vec![ClassFilter::new("segmentation", &["body", "annex"])],
    )
});

/// Catch-all class with no labels of its own.
pub static MISC_CLASS: Lazy<AnnotationClass> =
    Lazy::new(|| AnnotationClass::new("misc", &[], Vec::new()));

/// Every built-in class, in display order.
pub static ALL_CLASSES: Lazy<Vec<AnnotationClass>> = Lazy::new(|| {
    vec![
        SEGMENTATION_CLASS.clone(),
        HEADER_CLASS.clone(),
        RESULTS_CLASS.clone(),
        MISC_CLASS.clone(),
    ]
});

/// Looks a built-in class up by name.
pub fn class_by_name(name: &str) -> Option<&'static AnnotationClass> {
    ALL_CLASSES.iter().find(|c| c.name == name)
}
