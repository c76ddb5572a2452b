//! Typed ALTO-style layout document tree.
//!
//! The layout converter emits a fixed four-level hierarchy
//! (Page > TextBlock > TextLine > String) with pixel geometry on every node.
//! The tree is modelled as a closed set of structs plus the [`NodeKind`]
//! enum; nothing in the crate dispatches on raw tag names.

pub mod parser;

use rustc_hash::FxHashMap;

use crate::geom::BBX;

/// The tracked node kinds, ordered coarse to fine by containment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Page,
    Block,
    Line,
    Word,
}

impl NodeKind {
    /// Containment hierarchy, coarsest first.
    pub const HIERARCHY: [NodeKind; 4] =
        [NodeKind::Page, NodeKind::Block, NodeKind::Line, NodeKind::Word];

    /// The ALTO tag this kind corresponds to, also used as the feature
    /// table prefix.
    pub fn table_name(self) -> &'static str {
        match self {
            NodeKind::Page => "Page",
            NodeKind::Block => "TextBlock",
            NodeKind::Line => "TextLine",
            NodeKind::Word => "String",
        }
    }

    pub fn from_table_name(name: &str) -> Option<NodeKind> {
        match name {
            "Page" => Some(NodeKind::Page),
            "TextBlock" => Some(NodeKind::Block),
            "TextLine" => Some(NodeKind::Line),
            "String" => Some(NodeKind::Word),
            _ => None,
        }
    }

    /// The next coarser tracked kind.
    pub fn parent(self) -> Option<NodeKind> {
        match self {
            NodeKind::Page => None,
            NodeKind::Block => Some(NodeKind::Page),
            NodeKind::Line => Some(NodeKind::Block),
            NodeKind::Word => Some(NodeKind::Line),
        }
    }
}

/// Pixel geometry of one node. Missing attributes default to 0 rather than
/// erroring; the converter omits WIDTH/HEIGHT on degenerate nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Geometry {
    pub hpos: f64,
    pub vpos: f64,
    pub width: f64,
    pub height: f64,
}

impl Geometry {
    pub fn right(&self) -> f64 {
        self.hpos + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.vpos + self.height
    }

    pub fn bbx(&self, page_num: u32) -> BBX {
        BBX::new(page_num, self.hpos, self.vpos, self.right(), self.bottom())
    }
}

/// Entry of the font-style table referenced by words via STYLEREFS.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub font_family: String,
    pub font_size: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Word {
    pub geometry: Geometry,
    pub content: String,
    pub style_ref: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Line {
    pub geometry: Geometry,
    pub words: Vec<Word>,
}

impl Line {
    /// Concatenated word text, space separated.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, w) in self.words.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            out.push_str(&w.content);
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub geometry: Geometry,
    pub lines: Vec<Line>,
}

impl Block {
    pub fn first_line_text(&self) -> String {
        self.lines.first().map(Line::text).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    /// 1-based physical image number from PHYSICAL_IMG_NR.
    pub physical_num: u32,
    pub geometry: Geometry,
    pub blocks: Vec<Block>,
}

/// A parsed layout document: the page tree plus the font-style table.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub pages: Vec<Page>,
    pub styles: FxHashMap<String, TextStyle>,
}

/// A flat view of one node, for callers that only need its footprint.
#[derive(Debug, Clone)]
pub struct NodeView {
    pub kind: NodeKind,
    pub bbx: BBX,
    /// Word content; None for non-word kinds.
    pub text: Option<String>,
}

impl Document {
    /// Flattens all nodes of `kind` in document order.
    pub fn nodes(&self, kind: NodeKind) -> Vec<NodeView> {
        let mut out = Vec::new();
        for page in &self.pages {
            let pn = page.physical_num;
            match kind {
                NodeKind::Page => out.push(NodeView {
                    kind,
                    bbx: page.geometry.bbx(pn),
                    text: None,
                }),
                NodeKind::Block => {
                    for b in &page.blocks {
                        out.push(NodeView {
                            kind,
                            bbx: b.geometry.bbx(pn),
                            text: None,
                        });
                    }
                }
                NodeKind::Line => {
                    for b in &page.blocks {
                        for l in &b.lines {
                            out.push(NodeView {
                                kind,
                                bbx: l.geometry.bbx(pn),
                                text: None,
                            });
                        }
                    }
                }
                NodeKind::Word => {
                    for b in &page.blocks {
                        for l in &b.lines {
                            for w in &l.words {
                                out.push(NodeView {
                                    kind,
                                    bbx: w.geometry.bbx(pn),
                                    text: Some(w.content.clone()),
                                });
                            }
                        }
                    }
                }
            }
        }
        out
    }

    pub fn word_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|p| &p.blocks)
            .flat_map(|b| &b.lines)
            .map(|l| l.words.len())
            .sum()
    }
}
