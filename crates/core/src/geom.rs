//! Bounding-box geometry for page annotations.
//!
//! Coordinates are in page pixel units of the layout XML, with the origin at
//! the top-left of the page. Page numbers are 1-based physical image indices.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Reserved label for "outside any annotated region".
pub const OUTSIDE_LABEL: &str = "O";

/// An axis-aligned bounding box on a single page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBX {
    pub page_num: u32,
    pub min_h: f64,
    pub min_v: f64,
    pub max_h: f64,
    pub max_v: f64,
}

impl BBX {
    /// Creates a bounding box, clamping the maxima so that
    /// `max_h >= min_h` and `max_v >= min_v` always hold.
    pub fn new(page_num: u32, min_h: f64, min_v: f64, max_h: f64, max_v: f64) -> Self {
        Self {
            page_num,
            min_h,
            min_v,
            max_h: max_h.max(min_h),
            max_v: max_v.max(min_v),
        }
    }

    /// Checks whether this box fully contains `other` (inclusive bounds).
    /// Boxes on different pages never contain each other.
    pub fn contains(&self, other: &BBX) -> bool {
        self.page_num == other.page_num
            && other.min_h >= self.min_h
            && other.min_v >= self.min_v
            && other.max_h <= self.max_h
            && other.max_v <= self.max_v
    }

    /// Checks whether this box intersects `other`. Touching edges and
    /// corners count as intersecting. Boxes on different pages never
    /// intersect.
    pub fn intersects(&self, other: &BBX) -> bool {
        self.page_num == other.page_num
            && other.max_h >= self.min_h
            && self.max_h >= other.min_h
            && other.max_v >= self.min_v
            && self.max_v >= other.min_v
    }

    /// Returns a copy grown by `d` on all four sides.
    pub fn extend(&self, d: f64) -> BBX {
        BBX::new(
            self.page_num,
            self.min_h - d,
            self.min_v - d,
            self.max_h + d,
            self.max_v + d,
        )
    }

    /// Returns the bounding rectangle of `self` and `other`.
    ///
    /// # Panics
    /// Panics if the boxes are on different pages; merging across pages is
    /// a programming error, not a recoverable condition.
    pub fn group_with(&self, other: &BBX) -> BBX {
        assert_eq!(
            self.page_num, other.page_num,
            "cannot merge boxes from different pages"
        );
        BBX::new(
            self.page_num,
            self.min_h.min(other.min_h),
            self.min_v.min(other.min_v),
            self.max_h.max(other.max_h),
            self.max_v.max(other.max_v),
        )
    }

    /// Like [`BBX::group_with`], but also returns the strips the merged
    /// rectangle adds around `self` — one per side that grew, up to four.
    ///
    /// Callers use the strips to test whether growing the accumulated box
    /// would sweep over anything that is not already part of the merge,
    /// rather than re-testing the full merged rectangle.
    pub fn group_with_extension(&self, other: &BBX) -> (BBX, Vec<BBX>) {
        let merged = self.group_with(other);
        let mut strips = Vec::with_capacity(4);

        if merged.min_h < self.min_h {
            strips.push(BBX::new(
                merged.page_num,
                merged.min_h,
                merged.min_v,
                self.min_h,
                merged.max_v,
            ));
        }
        if merged.max_h > self.max_h {
            strips.push(BBX::new(
                merged.page_num,
                self.max_h,
                merged.min_v,
                merged.max_h,
                merged.max_v,
            ));
        }
        if merged.min_v < self.min_v {
            strips.push(BBX::new(
                merged.page_num,
                merged.min_h,
                merged.min_v,
                merged.max_h,
                self.min_v,
            ));
        }
        if merged.max_v > self.max_v {
            strips.push(BBX::new(
                merged.page_num,
                merged.min_h,
                self.max_v,
                merged.max_h,
                merged.max_v,
            ));
        }

        (merged, strips)
    }

    /// Grows this box in place to cover `other` (same page only).
    pub fn merge(&mut self, other: &BBX) {
        *self = self.group_with(other);
    }

    /// Collapses an arbitrary set of boxes into one hull per page,
    /// in first-seen page order.
    pub fn from_list(boxes: &[BBX]) -> Vec<BBX> {
        let mut hulls: Vec<BBX> = Vec::new();
        for b in boxes {
            match hulls.iter_mut().find(|h| h.page_num == b.page_num) {
                Some(hull) => hull.merge(b),
                None => hulls.push(*b),
            }
        }
        hulls
    }

    /// The rectangle as `[min_h, min_v, max_h, max_v]`, the order the
    /// spatial index expects.
    pub fn to_coor(&self) -> [f64; 4] {
        [self.min_h, self.min_v, self.max_h, self.max_v]
    }
}

/// A labelled, grouped bounding box carried by an annotation layer.
///
/// `group` disambiguates multiple same-label regions on a paper (theorem #1
/// vs theorem #2); `user_data` is an opaque payload extractors may attach
/// (for example per-box feature vectors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledBox {
    #[serde(flatten)]
    pub bbx: BBX,
    pub label: SmolStr,
    pub group: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<serde_json::Value>,
}

impl LabelledBox {
    pub fn new(bbx: BBX, label: impl Into<SmolStr>, group: u32) -> Self {
        Self {
            bbx,
            label: label.into(),
            group,
            user_data: None,
        }
    }

    pub fn with_user_data(mut self, user_data: serde_json::Value) -> Self {
        self.user_data = Some(user_data);
        self
    }

    pub fn page_num(&self) -> u32 {
        self.bbx.page_num
    }

    /// `(label, group)` key identifying the merge group this box belongs to.
    pub fn group_key(&self) -> (SmolStr, u32) {
        (self.label.clone(), self.group)
    }
}

impl std::fmt::Display for LabelledBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}-{}:{}|{}|{}|{}@{}",
            self.label,
            self.group,
            self.bbx.min_h,
            self.bbx.min_v,
            self.bbx.max_h,
            self.bbx.max_v,
            self.bbx.page_num
        )
    }
}
