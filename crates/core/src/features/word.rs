//! Word-level features: position in line, neighbor gaps, font attributes,
//! raw text.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::alto::{Document, Line};
use crate::features::{FeatureRecord, FeatureValue, position_tag};

// Font-family name fragments that identify the classic TeX/Type1 font
// classes seen in pdfalto output.
static ITALIC_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)((TI)[0-9]+|Ital|rsfs|EUSM)").unwrap());
static BOLD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(CMBX|Bold|NimbusRomNo9L-Medi)").unwrap());
static MATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)((CM)(SY|MI|EX)|math|MSAM|MSBM|LASY|cmex|StandardSymL)").unwrap()
});
static DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new("[0-9]").unwrap());

#[derive(Debug, Clone, Copy, Default)]
struct Font {
    italic: bool,
    bold: bool,
    math: bool,
    size: f64,
}

/// Per-word feature extractor. Classifies the document's font table once
/// up front.
pub struct WordFeatures {
    fonts: FxHashMap<String, Font>,
}

impl WordFeatures {
    pub fn new(doc: &Document) -> Self {
        let mut fonts = FxHashMap::default();
        for (id, style) in &doc.styles {
            fonts.insert(
                id.clone(),
                Font {
                    italic: ITALIC_RE.is_match(&style.font_family),
                    bold: BOLD_RE.is_match(&style.font_family),
                    math: MATH_RE.is_match(&style.font_family),
                    size: style.font_size,
                },
            );
        }
        Self { fonts }
    }

    /// Features of `line.words[index]`.
    pub fn extract(&self, line: &Line, index: usize) -> FeatureRecord {
        let word = &line.words[index];
        let geom = &word.geometry;

        // Neighbor edges fall back to the line's own edges at either end.
        let prev_edge = if index > 0 {
            line.words[index - 1].geometry.right()
        } else {
            line.geometry.hpos
        };
        let next_edge = if index + 1 < line.words.len() {
            line.words[index + 1].geometry.hpos
        } else {
            line.geometry.right()
        };

        let font = word
            .style_ref
            .as_deref()
            .and_then(|id| self.fonts.get(id))
            .copied()
            .unwrap_or_default();

        let mut f = FeatureRecord::new();
        // geometry
        f.insert(
            "word_position".into(),
            FeatureValue::Text(position_tag(index, line.words.len()).into()),
        );
        f.insert(
            "length".into(),
            FeatureValue::Num(word.content.chars().count() as f64),
        );
        f.insert(
            "prev_delta_h".into(),
            FeatureValue::Num(geom.hpos - prev_edge),
        );
        f.insert(
            "next_delta_h".into(),
            FeatureValue::Num(next_edge - geom.right()),
        );
        // appearance
        f.insert("italic".into(), FeatureValue::Bool(font.italic));
        f.insert("math".into(), FeatureValue::Bool(font.math));
        f.insert("bold".into(), FeatureValue::Bool(font.bold));
        f.insert("size".into(), FeatureValue::Num(font.size));
        // textual info
        f.insert("word".into(), FeatureValue::Text(word.content.clone()));
        f.insert(
            "word_lower".into(),
            FeatureValue::Text(word.content.to_lowercase()),
        );
        f.insert(
            "has_number".into(),
            FeatureValue::Bool(DIGIT_RE.is_match(&word.content)),
        );
        f
    }
}
