//! Block-level features: position in page, margin offsets, vertical gaps.

use crate::alto::Page;
use crate::features::{FeatureRecord, FeatureValue, position_tag};

pub struct BlockFeatures;

impl BlockFeatures {
    pub fn new() -> Self {
        Self
    }

    /// Features of `page.blocks[index]`.
    pub fn extract(&self, page: &Page, index: usize) -> FeatureRecord {
        let block = &page.blocks[index];
        let geom = &block.geometry;

        // The page's top edge and bottom edge stand in for missing
        // neighbors.
        let prev_bottom = if index > 0 {
            page.blocks[index - 1].geometry.bottom()
        } else {
            0.0
        };
        let next_top = if index + 1 < page.blocks.len() {
            page.blocks[index + 1].geometry.vpos
        } else {
            page.geometry.height
        };

        let mut f = FeatureRecord::new();
        // geometry
        f.insert(
            "block_position".into(),
            FeatureValue::Text(position_tag(index, page.blocks.len()).into()),
        );
        f.insert("prev_delta_h".into(), FeatureValue::Num(geom.hpos));
        f.insert(
            "next_delta_h".into(),
            FeatureValue::Num(page.geometry.width - geom.right()),
        );
        f.insert(
            "prev_delta_v".into(),
            FeatureValue::Num(geom.vpos - prev_bottom),
        );
        f.insert(
            "next_delta_v".into(),
            FeatureValue::Num(next_top - geom.bottom()),
        );
        f
    }
}

impl Default for BlockFeatures {
    fn default() -> Self {
        Self::new()
    }
}
