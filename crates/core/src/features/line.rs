//! Line-level features: position in block, edge offsets, vertical gaps,
//! running-header/footer repetition detection.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::alto::{Block, Document};
use crate::features::{FeatureRecord, FeatureValue, position_tag};
use crate::params::FeatureParams;

static NON_PATTERN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9 ]").unwrap());
static DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new("[0-9]").unwrap());

/// Folds a line of text into the pattern used for repetition matching:
/// everything but letters, digits, and spaces is stripped, digits collapse
/// to a placeholder, case is ignored. "Page 12 of 30" and "Page 3 of 30"
/// fold to the same pattern.
pub(crate) fn fold_pattern(text: &str) -> String {
    let kept = NON_PATTERN_RE.replace_all(text, "");
    DIGIT_RE.replace_all(&kept, "X").to_lowercase()
}

/// Identifies a block by (page index, block index within page).
type BlockPos = (usize, usize);

/// Per-line feature extractor.
///
/// Construction scans a small fixed sample of blocks per page (the leading
/// few and the last) and tabulates their first-line patterns; lines near
/// block edges whose pattern recurs in that sample are flagged as
/// repetitive, which catches running headers and footers.
pub struct LineFeatures {
    params: FeatureParams,
    pattern_counts: FxHashMap<String, u32>,
    pattern_first: FxHashMap<String, BlockPos>,
}

impl LineFeatures {
    pub fn new(doc: &Document, params: &FeatureParams) -> Self {
        let mut pattern_counts: FxHashMap<String, u32> = FxHashMap::default();
        let mut pattern_first: FxHashMap<String, BlockPos> = FxHashMap::default();

        for (pi, page) in doc.pages.iter().enumerate() {
            let n = page.blocks.len();
            if n == 0 {
                continue;
            }
            let mut sample: Vec<usize> = (0..n.min(params.repetition_leading_blocks)).collect();
            if !sample.contains(&(n - 1)) {
                sample.push(n - 1);
            }
            for bi in sample {
                let pattern = fold_pattern(&page.blocks[bi].first_line_text());
                if pattern.len() < params.repetition_min_pattern_len {
                    continue;
                }
                *pattern_counts.entry(pattern.clone()).or_insert(0) += 1;
                pattern_first.entry(pattern).or_insert((pi, bi));
            }
        }

        Self {
            params: params.clone(),
            pattern_counts,
            pattern_first,
        }
    }

    /// Features of `block.lines[index]`, where `block_pos` locates the
    /// block in the document.
    pub fn extract(&self, block: &Block, block_pos: BlockPos, index: usize) -> FeatureRecord {
        let line = &block.lines[index];
        let geom = &line.geometry;
        let block_geom = &block.geometry;

        let prev_bottom = if index > 0 {
            block.lines[index - 1].geometry.bottom()
        } else {
            geom.vpos
        };
        let next_top = if index + 1 < block.lines.len() {
            block.lines[index + 1].geometry.vpos
        } else {
            geom.bottom()
        };

        // A negative gap means the line jumped back up: a column break,
        // not a real overlap.
        let mut prev_delta_v = geom.vpos - prev_bottom;
        if prev_delta_v < 0.0 {
            prev_delta_v = self.params.column_break_sentinel;
        }

        let mut repetitive = false;
        let mut repetitive_first = false;
        let window = self.params.repetition_line_window;
        if index < window || index + 1 >= block.lines.len() {
            let pattern = fold_pattern(&line.text());
            if self.pattern_counts.get(&pattern).copied().unwrap_or(0) >= 2 {
                repetitive = true;
                repetitive_first = self.pattern_first.get(&pattern) == Some(&block_pos);
            }
        }

        let mut f = FeatureRecord::new();
        // geometry
        f.insert(
            "line_position".into(),
            FeatureValue::Text(position_tag(index, block.lines.len()).into()),
        );
        f.insert(
            "prev_delta_h".into(),
            FeatureValue::Num(geom.hpos - block_geom.hpos),
        );
        f.insert(
            "next_delta_h".into(),
            FeatureValue::Num(block_geom.right() - geom.right()),
        );
        f.insert("prev_delta_v".into(), FeatureValue::Num(prev_delta_v));
        f.insert(
            "next_delta_v".into(),
            FeatureValue::Num(next_top - geom.bottom()),
        );
        f.insert("repetitive".into(), FeatureValue::Bool(repetitive));
        f.insert(
            "repetitive_first".into(),
            FeatureValue::Bool(repetitive_first),
        );
        f
    }
}
