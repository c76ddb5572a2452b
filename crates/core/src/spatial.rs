//! Per-page spatial indexing for annotation layers.
//!
//! Each page of a document gets its own dynamic R-tree; entries are keyed by
//! an internal sequential slot number, never by the public box id. The
//! [`BiMap`] keeps the slot↔id correspondence in one place so the two sides
//! cannot drift apart.

use rstar::{AABB, RTree, RTreeObject};
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::geom::BBX;

/// Public identifier of a box within an annotation layer.
pub type BoxId = SmolStr;

/// Internal sequential key used inside the spatial index.
pub type Slot = usize;

#[derive(Clone, Debug)]
struct IndexNode {
    slot: Slot,
    rect: [f64; 4],
}

impl PartialEq for IndexNode {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl RTreeObject for IndexNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners([self.rect[0], self.rect[1]], [self.rect[2], self.rect[3]])
    }
}

/// Dynamic rectangle index for one page.
#[derive(Default)]
pub struct PageIndex {
    tree: RTree<IndexNode>,
    rects: FxHashMap<Slot, [f64; 4]>,
}

impl PageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a rectangle under the given slot. The slot must not already
    /// be present on this page.
    pub fn insert(&mut self, slot: Slot, bbx: &BBX) {
        debug_assert!(!self.rects.contains_key(&slot));
        let rect = bbx.to_coor();
        self.tree.insert(IndexNode { slot, rect });
        self.rects.insert(slot, rect);
    }

    /// Removes the entry for `slot`. Returns false if the slot was unknown.
    pub fn remove(&mut self, slot: Slot) -> bool {
        let Some(rect) = self.rects.remove(&slot) else {
            return false;
        };
        self.tree.remove(&IndexNode { slot, rect }).is_some()
    }

    /// Replaces the rectangle stored for `slot`.
    pub fn update(&mut self, slot: Slot, bbx: &BBX) -> bool {
        if !self.remove(slot) {
            return false;
        }
        self.insert(slot, bbx);
        true
    }

    /// Returns the slots of all entries whose rectangle intersects `bbx`,
    /// with touching edges counting as intersection.
    pub fn intersection(&self, bbx: &BBX) -> Vec<Slot> {
        let env = AABB::from_corners([bbx.min_h, bbx.min_v], [bbx.max_h, bbx.max_v]);
        self.tree
            .locate_in_envelope_intersecting(&env)
            .filter(|node| {
                node.rect[2] >= bbx.min_h
                    && bbx.max_h >= node.rect[0]
                    && node.rect[3] >= bbx.min_v
                    && bbx.max_v >= node.rect[1]
            })
            .map(|node| node.slot)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }
}

/// Typed bidirectional map between public box ids and index slots.
///
/// Invariant: the two directions always describe the same pairing.
#[derive(Default)]
pub struct BiMap {
    id_of: FxHashMap<Slot, BoxId>,
    slot_of: FxHashMap<BoxId, Slot>,
}

impl BiMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the pairing `slot <-> id`. Neither side may already be bound.
    pub fn insert(&mut self, slot: Slot, id: BoxId) {
        debug_assert!(!self.id_of.contains_key(&slot));
        debug_assert!(!self.slot_of.contains_key(&id));
        self.slot_of.insert(id.clone(), slot);
        self.id_of.insert(slot, id);
    }

    /// Removes the pairing for `id`, returning its slot.
    pub fn remove_by_id(&mut self, id: &str) -> Option<Slot> {
        let slot = self.slot_of.remove(id)?;
        self.id_of.remove(&slot);
        Some(slot)
    }

    pub fn slot(&self, id: &str) -> Option<Slot> {
        self.slot_of.get(id).copied()
    }

    pub fn id(&self, slot: Slot) -> Option<&BoxId> {
        self.id_of.get(&slot)
    }

    pub fn len(&self) -> usize {
        self.id_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_of.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_edges_intersect() {
        let mut index = PageIndex::new();
        index.insert(0, &BBX::new(1, 0.0, 0.0, 10.0, 10.0));
        let hits = index.intersection(&BBX::new(1, 10.0, 10.0, 20.0, 20.0));
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn remove_then_query_is_empty() {
        let mut index = PageIndex::new();
        let b = BBX::new(1, 0.0, 0.0, 10.0, 10.0);
        index.insert(7, &b);
        assert!(index.remove(7));
        assert!(!index.remove(7));
        assert!(index.intersection(&b).is_empty());
    }

    #[test]
    fn bimap_round_trip() {
        let mut map = BiMap::new();
        map.insert(3, BoxId::from("abc"));
        assert_eq!(map.slot("abc"), Some(3));
        assert_eq!(map.id(3).map(|s| s.as_str()), Some("abc"));
        assert_eq!(map.remove_by_id("abc"), Some(3));
        assert!(map.is_empty());
    }
}
