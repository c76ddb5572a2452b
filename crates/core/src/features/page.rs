//! Page-level features: position within the document.

use crate::features::{FeatureRecord, FeatureValue, position_tag};

pub struct PageFeatures;

impl PageFeatures {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, index: usize, page_count: usize) -> FeatureRecord {
        let mut f = FeatureRecord::new();
        f.insert(
            "page_position".into(),
            FeatureValue::Text(position_tag(index, page_count).into()),
        );
        f
    }
}

impl Default for PageFeatures {
    fn default() -> Self {
        Self::new()
    }
}
