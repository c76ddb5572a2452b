//! Tunable parameters for annotation queries and feature extraction.
//!
//! The defaults reproduce the constants the annotation tooling has always
//! shipped with; they are surfaced here instead of being buried in the
//! algorithms so callers can tune them per corpus.

/// Parameters for spatial queries against an annotation layer.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParams {
    /// How far a stored box is grown on each side before testing whether it
    /// fully contains a query box. Absorbs small jitter between the layout
    /// engine's geometry and hand-drawn annotation rectangles. In page
    /// pixel units.
    pub full_tolerance: f64,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            full_tolerance: 10.0,
        }
    }
}

/// Parameters for per-node feature extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureParams {
    /// Minimum folded-pattern length for a line to participate in
    /// running-header/footer repetition detection. Shorter patterns (page
    /// numbers alone, stray marks) repeat by accident. The default only
    /// admits patterns longer than eight characters.
    pub repetition_min_pattern_len: usize,

    /// Number of leading blocks per page sampled for repetition patterns.
    /// Together with the last block this covers headers and footers.
    pub repetition_leading_blocks: usize,

    /// Number of leading and trailing lines of a block that are tested
    /// against the repeated-pattern table.
    pub repetition_line_window: usize,

    /// Value emitted for a line's vertical gap when the computed gap is
    /// negative, which happens at column breaks.
    pub column_break_sentinel: f64,
}

impl Default for FeatureParams {
    fn default() -> Self {
        Self {
            repetition_min_pattern_len: 9,
            repetition_leading_blocks: 2,
            repetition_line_window: 2,
            column_break_sentinel: 100.0,
        }
    }
}
