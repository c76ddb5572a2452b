//! Multi-scale feature tables over the layout tree.
//!
//! One flat table per node kind, one row per node, with integer
//! back-reference columns linking each row to its parent's row. The
//! aggregator in [`aggregate`] rolls these tables up to any requested leaf
//! granularity.

pub mod aggregate;
pub mod block;
pub mod cache;
pub mod line;
pub mod page;
pub mod word;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::alto::NodeKind;

/// Position of a node among its same-kind siblings: the first is "start",
/// the last is "end", everything else is "in". A lone sibling is "start".
pub(crate) fn position_tag(index: usize, count: usize) -> &'static str {
    if index == 0 {
        "start"
    } else if index + 1 == count {
        "end"
    } else {
        "in"
    }
}

/// A single feature cell.
///
/// `Bag` only appears after aggregation: it is the multiset of a group's
/// values for a non-numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    Num(f64),
    Bool(bool),
    Text(String),
    Bag(IndexMap<String, u32>),
}

impl FeatureValue {
    /// Numeric view: numbers as-is, booleans as 0/1, otherwise None.
    pub fn as_num(&self) -> Option<f64> {
        match self {
            FeatureValue::Num(v) => Some(*v),
            FeatureValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, FeatureValue::Num(_) | FeatureValue::Bool(_))
    }

    /// Neutral value of the same shape, used to pad missing child rows.
    pub fn neutral(&self) -> FeatureValue {
        match self {
            FeatureValue::Num(_) => FeatureValue::Num(0.0),
            FeatureValue::Bool(_) => FeatureValue::Bool(false),
            FeatureValue::Text(_) => FeatureValue::Text(String::new()),
            FeatureValue::Bag(_) => FeatureValue::Bag(IndexMap::new()),
        }
    }
}

/// One node's features, in stable column order.
pub type FeatureRecord = IndexMap<String, FeatureValue>;

/// A flat table: one row per node of one kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRecord>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names, taken from the first row.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }
}

/// The per-kind tables of one document, keyed by table name
/// (`Page`, `TextBlock`, `TextLine`, `String`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentFeatures {
    pub tables: IndexMap<String, FeatureTable>,
}

impl DocumentFeatures {
    pub fn table(&self, kind: NodeKind) -> Option<&FeatureTable> {
        self.tables.get(kind.table_name())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(FeatureTable::is_empty)
    }
}
