//! Tree walk and multi-granularity feature rollup.
//!
//! Step 1 builds one flat table per node kind in a single pass over the
//! document, recording each row's parent index. Step 2 rolls the tables up
//! from the finest kind towards the requested leaf granularity: kinds finer
//! than the leaf are collapsed with min/max/std/mean aggregates, value bags,
//! and verbatim first/second/last child rows; kinds coarser than the leaf
//! are broadcast down onto every leaf row. Steps 3 and 4 optionally append
//! neighboring-row deltas and z-score standardize.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use itertools::Itertools;
use itertools::MinMaxResult;

use crate::alto::{Document, NodeKind};
use crate::error::{AnnotError, Result};
use crate::features::block::BlockFeatures;
use crate::features::line::LineFeatures;
use crate::features::page::PageFeatures;
use crate::features::word::WordFeatures;
use crate::features::{DocumentFeatures, FeatureRecord, FeatureTable, FeatureValue};
use crate::params::FeatureParams;

/// Builds the per-kind feature tables for a document.
///
/// Every row of a non-Page table carries an extra numeric column, named
/// after the parent kind's table, holding the 0-based row index of its
/// parent in that table.
pub fn build_tables(doc: &Document, params: &FeatureParams) -> DocumentFeatures {
    let word_x = WordFeatures::new(doc);
    let line_x = LineFeatures::new(doc, params);
    let block_x = BlockFeatures::new();
    let page_x = PageFeatures::new();

    let mut pages = FeatureTable::default();
    let mut blocks = FeatureTable::default();
    let mut lines = FeatureTable::default();
    let mut words = FeatureTable::default();

    for (pi, page) in doc.pages.iter().enumerate() {
        pages.rows.push(page_x.extract(pi, doc.pages.len()));
        let page_idx = pages.rows.len() - 1;

        for (bi, block) in page.blocks.iter().enumerate() {
            let mut row = block_x.extract(page, bi);
            row.insert(
                NodeKind::Page.table_name().into(),
                FeatureValue::Num(page_idx as f64),
            );
            blocks.rows.push(row);
            let block_idx = blocks.rows.len() - 1;

            for (li, line) in block.lines.iter().enumerate() {
                let mut row = line_x.extract(block, (pi, bi), li);
                row.insert(
                    NodeKind::Block.table_name().into(),
                    FeatureValue::Num(block_idx as f64),
                );
                lines.rows.push(row);
                let line_idx = lines.rows.len() - 1;

                for wi in 0..line.words.len() {
                    let mut row = word_x.extract(line, wi);
                    row.insert(
                        NodeKind::Line.table_name().into(),
                        FeatureValue::Num(line_idx as f64),
                    );
                    words.rows.push(row);
                }
            }
        }
    }

    let mut out = DocumentFeatures::default();
    out.tables.insert(NodeKind::Page.table_name().into(), pages);
    out.tables.insert(NodeKind::Block.table_name().into(), blocks);
    out.tables.insert(NodeKind::Line.table_name().into(), lines);
    out.tables.insert(NodeKind::Word.table_name().into(), words);
    out
}

/// Rolls the per-kind tables up to one row per `leaf` node.
pub fn get_features(
    features: &DocumentFeatures,
    leaf: NodeKind,
    standardize: bool,
    add_context: bool,
) -> Result<FeatureTable> {
    let mut result: Option<FeatureTable> = None;
    let mut prefix = String::new();

    // Finest kind first; each iteration merges in the next coarser kind.
    for kind in NodeKind::HIERARCHY.iter().rev() {
        let Some(table) = features.table(*kind) else {
            continue;
        };
        let old_prefix = std::mem::replace(&mut prefix, format!("{}.", kind.table_name()));

        match result.take() {
            None => {
                result = Some(prefix_table(table, &prefix));
            }
            Some(acc) => {
                let key_col = format!("{}{}", old_prefix, kind.table_name());

                let joined = if *kind >= leaf {
                    // Collapse the accumulated finer rows to this kind's
                    // granularity, then attach this kind's own features.
                    let mut joined = FeatureTable::default();
                    for (parent_idx, mut row) in aggregate_groups(&acc, &key_col) {
                        if let Some(target) = table.rows.get(parent_idx) {
                            for (k, v) in target {
                                row.insert(format!("{prefix}{k}"), v.clone());
                            }
                        }
                        joined.rows.push(row);
                    }
                    joined
                } else {
                    // Coarser than the leaf: broadcast this kind's features
                    // onto every accumulated row, consuming the join key.
                    let mut joined = acc;
                    for row in &mut joined.rows {
                        let key = row
                            .shift_remove(&key_col)
                            .and_then(|v| v.as_num())
                            .map(|v| v as usize);
                        if let Some(target) = key.and_then(|k| table.rows.get(k)) {
                            for (k, v) in target {
                                row.insert(format!("{prefix}{k}"), v.clone());
                            }
                        }
                    }
                    joined
                };

                result = Some(joined);
            }
        }
    }

    let mut table = result.ok_or(AnnotError::NoFeatures)?;
    if table.rows.is_empty() {
        return Err(AnnotError::NoFeatures);
    }

    if add_context {
        add_context_deltas(&mut table);
    }
    if standardize {
        standardize_table(&mut table);
    }
    Ok(table)
}

/// Like [`get_features`] but takes the leaf kind by table name, for callers
/// holding a string; an unknown name is a configuration error.
pub fn get_features_by_name(
    features: &DocumentFeatures,
    leaf: &str,
    standardize: bool,
    add_context: bool,
) -> Result<FeatureTable> {
    let kind = NodeKind::from_table_name(leaf)
        .ok_or_else(|| AnnotError::UnknownLeafKind(leaf.to_string()))?;
    get_features(features, kind, standardize, add_context)
}

fn prefix_table(table: &FeatureTable, prefix: &str) -> FeatureTable {
    FeatureTable {
        rows: table
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(k, v)| (format!("{prefix}{k}"), v.clone()))
                    .collect()
            })
            .collect(),
    }
}

/// Collapses rows sharing a `key_col` value into one aggregated record per
/// group, keyed by the group's parent index, in ascending parent order.
///
/// Numeric and boolean columns yield `_min`/`_max`/`_std`/`_mean` columns;
/// other columns yield a bag of values; every column additionally yields
/// the first, second, and last child's value verbatim (suffixed `.first`,
/// `.second`, `.last`), padded with a neutral value when the group is too
/// small.
fn aggregate_groups(table: &FeatureTable, key_col: &str) -> Vec<(usize, FeatureRecord)> {
    let mut groups: BTreeMap<usize, Vec<&FeatureRecord>> = BTreeMap::new();
    for row in &table.rows {
        if let Some(key) = row.get(key_col).and_then(FeatureValue::as_num) {
            groups.entry(key as usize).or_default().push(row);
        }
    }

    let columns: Vec<String> = table
        .columns()
        .into_iter()
        .filter(|c| c != key_col)
        .collect();

    groups
        .into_iter()
        .map(|(key, rows)| {
            let mut out = FeatureRecord::new();

            for col in &columns {
                if rows[0].get(col).is_some_and(FeatureValue::is_numeric) {
                    let vals: Vec<f64> = rows
                        .iter()
                        .filter_map(|r| r.get(col).and_then(FeatureValue::as_num))
                        .collect();
                    let (min, max) = match vals.iter().copied().minmax() {
                        MinMaxResult::NoElements => (0.0, 0.0),
                        MinMaxResult::OneElement(v) => (v, v),
                        MinMaxResult::MinMax(lo, hi) => (lo, hi),
                    };
                    out.insert(format!("{col}_min"), FeatureValue::Num(min));
                    out.insert(format!("{col}_max"), FeatureValue::Num(max));
                    out.insert(format!("{col}_std"), FeatureValue::Num(sample_std(&vals)));
                    out.insert(format!("{col}_mean"), FeatureValue::Num(mean(&vals)));
                }
            }

            for col in &columns {
                if !rows[0].get(col).is_some_and(FeatureValue::is_numeric) {
                    let mut bag: IndexMap<String, u32> = IndexMap::new();
                    for row in &rows {
                        match row.get(col) {
                            Some(FeatureValue::Text(s)) => *bag.entry(s.clone()).or_insert(0) += 1,
                            Some(FeatureValue::Bag(b)) => {
                                for (k, v) in b {
                                    *bag.entry(k.clone()).or_insert(0) += v;
                                }
                            }
                            _ => {}
                        }
                    }
                    out.insert(col.clone(), FeatureValue::Bag(bag));
                }
            }

            append_child_row(&mut out, &columns, rows[0], rows[0], ".first");
            append_child_row(
                &mut out,
                &columns,
                rows.get(1).copied().unwrap_or(rows[0]),
                rows[0],
                ".second",
            );
            append_child_row(&mut out, &columns, rows[rows.len() - 1], rows[0], ".last");
            if rows.len() < 2 {
                // No real second child: replace the copied values with
                // neutral ones so small groups keep the full schema.
                for col in &columns {
                    if let Some(v) = out.get_mut(&format!("{col}.second")) {
                        *v = v.neutral();
                    }
                }
            }

            (key, out)
        })
        .collect()
}

fn append_child_row(
    out: &mut FeatureRecord,
    columns: &[String],
    row: &FeatureRecord,
    template: &FeatureRecord,
    suffix: &str,
) {
    for col in columns {
        let value = row
            .get(col)
            .cloned()
            .or_else(|| template.get(col).map(FeatureValue::neutral))
            .unwrap_or(FeatureValue::Num(0.0));
        out.insert(format!("{col}{suffix}"), value);
    }
}

fn mean(vals: &[f64]) -> f64 {
    if vals.is_empty() {
        return 0.0;
    }
    vals.iter().sum::<f64>() / vals.len() as f64
}

/// Sample standard deviation (ddof = 1); 0 for groups of fewer than two.
fn sample_std(vals: &[f64]) -> f64 {
    if vals.len() < 2 {
        return 0.0;
    }
    let m = mean(vals);
    let var = vals.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (vals.len() - 1) as f64;
    var.sqrt()
}

/// Appends `_next` and `_prev` first-difference columns for every plain
/// numeric column (booleans excluded); edge rows get 0.
fn add_context_deltas(table: &mut FeatureTable) {
    let cols: Vec<String> = table
        .rows
        .first()
        .map(|row| {
            row.iter()
                .filter(|(_, v)| matches!(v, FeatureValue::Num(_)))
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default();

    let n = table.rows.len();
    let mut deltas: Vec<(String, Vec<f64>, Vec<f64>)> = Vec::with_capacity(cols.len());
    for col in &cols {
        let vals: Vec<f64> = table
            .rows
            .iter()
            .map(|r| r.get(col).and_then(FeatureValue::as_num).unwrap_or(0.0))
            .collect();
        let next: Vec<f64> = (0..n)
            .map(|i| if i + 1 < n { vals[i] - vals[i + 1] } else { 0.0 })
            .collect();
        let prev: Vec<f64> = (0..n)
            .map(|i| if i > 0 { vals[i] - vals[i - 1] } else { 0.0 })
            .collect();
        deltas.push((col.clone(), next, prev));
    }

    for (i, row) in table.rows.iter_mut().enumerate() {
        for (col, next, _) in &deltas {
            row.insert(format!("{col}_next"), FeatureValue::Num(next[i]));
        }
        for (col, _, prev) in &deltas {
            row.insert(format!("{col}_prev"), FeatureValue::Num(prev[i]));
        }
    }
}

/// Z-scores every numeric column across the whole table (population
/// variance, constant columns untouched at 0) and remaps booleans to ±1.
fn standardize_table(table: &mut FeatureTable) {
    let columns = table.columns();
    for col in &columns {
        let Some(first) = table.rows.first().and_then(|r| r.get(col)) else {
            continue;
        };
        match first {
            FeatureValue::Num(_) => {
                let vals: Vec<f64> = table
                    .rows
                    .iter()
                    .map(|r| r.get(col).and_then(FeatureValue::as_num).unwrap_or(0.0))
                    .collect();
                let m = mean(&vals);
                let var = vals.iter().map(|v| (v - m).powi(2)).sum::<f64>() / vals.len() as f64;
                let denom = if var > 0.0 { var.sqrt() } else { 1.0 };
                for (row, v) in table.rows.iter_mut().zip(vals) {
                    row.insert(col.clone(), FeatureValue::Num((v - m) / denom));
                }
            }
            FeatureValue::Bool(_) => {
                for row in &mut table.rows {
                    let flag = row.get(col).and_then(FeatureValue::as_num).unwrap_or(0.0);
                    row.insert(
                        col.clone(),
                        FeatureValue::Num(if flag > 0.0 { 1.0 } else { -1.0 }),
                    );
                }
            }
            _ => {}
        }
    }
}

/// Convenience wrapper: walk, roll up, and post-process in one call.
pub fn document_features(
    doc: &Document,
    params: &FeatureParams,
    leaf: NodeKind,
    standardize: bool,
    add_context: bool,
) -> Result<FeatureTable> {
    let tables = build_tables(doc, params);
    get_features(&tables, leaf, standardize, add_context)
}
