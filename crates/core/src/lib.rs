//! marginalia - spatial annotation layers and layout feature tables for
//! research papers.

pub mod alto;
pub mod classes;
pub mod error;
pub mod features;
pub mod geom;
pub mod layer;
pub mod paper;
pub mod params;
pub mod spatial;
pub mod validator;

pub use alto::{Document, NodeKind};
pub use classes::{ALL_CLASSES, AnnotationClass, ClassFilter};
pub use error::{AnnotError, Result};
pub use features::cache::FeatureCache;
pub use features::{DocumentFeatures, FeatureRecord, FeatureTable, FeatureValue};
pub use geom::{BBX, LabelledBox, OUTSIDE_LABEL};
pub use layer::{AnnotationLayer, QueryMode};
pub use paper::{LayerInfo, Paper};
pub use params::{FeatureParams, QueryParams};
pub use validator::BoxValidator;
