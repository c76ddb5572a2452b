//! Annotation layers: labelled boxes over a paper, spatially indexed per page.
//!
//! A layer owns its boxes and one [`PageIndex`] per page. Every box id has
//! exactly one entry in the index of its page and vice versa; all mutation
//! goes through methods that maintain both sides.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AnnotError, Result};
use crate::geom::{BBX, LabelledBox, OUTSIDE_LABEL};
use crate::params::QueryParams;
use crate::spatial::{BiMap, BoxId, PageIndex, Slot};

/// Bumped whenever the serialized layer blob changes shape.
const LAYER_FORMAT_VERSION: u32 = 1;

/// How a spatial lookup decides that a stored box matches the query box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Any overlap between the stored box and the query box.
    Intersect,
    /// The stored box, grown by the configured tolerance, fully contains
    /// the query box.
    Full,
}

impl FromStr for QueryMode {
    type Err = AnnotError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "intersect" => Ok(QueryMode::Intersect),
            "full" => Ok(QueryMode::Full),
            other => Err(AnnotError::UnknownMode(other.to_string())),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct LayerBlob {
    version: u32,
    boxes: IndexMap<BoxId, LabelledBox>,
}

/// A set of labelled boxes over one paper, one spatial index per page.
pub struct AnnotationLayer {
    location: Option<PathBuf>,
    boxes: IndexMap<BoxId, LabelledBox>,
    pages: rustc_hash::FxHashMap<u32, PageIndex>,
    ids: BiMap,
    next_slot: Slot,
    params: QueryParams,
}

impl Default for AnnotationLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationLayer {
    /// Creates an empty layer with no storage location.
    pub fn new() -> Self {
        Self {
            location: None,
            boxes: IndexMap::new(),
            pages: rustc_hash::FxHashMap::default(),
            ids: BiMap::new(),
            next_slot: 0,
            params: QueryParams::default(),
        }
    }

    /// Loads a layer from its serialized blob at `location`.
    ///
    /// Layers are routinely referenced before they have ever been saved, so
    /// a missing or unreadable file yields an empty layer bound to that
    /// location, with a warning, never an error.
    pub fn load(location: impl Into<PathBuf>) -> Self {
        let location = location.into();
        let mut layer = Self::new();

        match Self::read_blob(&location) {
            Ok(boxes) => {
                for (id, b) in boxes {
                    layer.insert_with_id(id, b);
                }
            }
            Err(err) => {
                warn!(location = %location.display(), %err, "loading annotation layer failed, starting empty");
            }
        }

        layer.location = Some(location);
        layer
    }

    fn read_blob(location: &Path) -> Result<IndexMap<BoxId, LabelledBox>> {
        let file = File::open(location)?;
        let blob: LayerBlob = serde_json::from_reader(BufReader::new(GzDecoder::new(file)))?;
        if blob.version != LAYER_FORMAT_VERSION {
            return Err(AnnotError::UnsupportedVersion(blob.version));
        }
        Ok(blob.boxes)
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    pub fn set_location(&mut self, location: impl Into<PathBuf>) {
        self.location = Some(location.into());
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// All boxes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&BoxId, &LabelledBox)> {
        self.boxes.iter()
    }

    pub fn get_box(&self, id: &str) -> Option<&LabelledBox> {
        self.boxes.get(id)
    }

    /// Highest page number carrying at least one box, 0 if empty.
    pub fn last_annotated_page(&self) -> u32 {
        self.pages
            .iter()
            .filter(|(_, idx)| !idx.is_empty())
            .map(|(page, _)| *page)
            .max()
            .unwrap_or(0)
    }

    fn insert_with_id(&mut self, id: BoxId, b: LabelledBox) {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.pages
            .entry(b.page_num())
            .or_default()
            .insert(slot, &b.bbx);
        self.ids.insert(slot, id.clone());
        self.boxes.insert(id, b);
    }

    /// Stores a box, returning its freshly minted id.
    pub fn add_box(&mut self, b: LabelledBox) -> BoxId {
        let id = BoxId::from(Uuid::new_v4().simple().to_string());
        self.insert_with_id(id.clone(), b);
        id
    }

    /// Replaces the box stored under `id`, updating the spatial index in
    /// place. The replacement must stay on the same page; callers that need
    /// to move a box across pages delete and re-add it.
    pub fn move_box(&mut self, id: &str, b: LabelledBox) -> Result<()> {
        let slot = self
            .ids
            .slot(id)
            .ok_or_else(|| AnnotError::BoxNotFound(id.to_string()))?;
        let old_page = self.boxes[id].page_num();
        debug_assert_eq!(
            old_page,
            b.page_num(),
            "move_box cannot change pages; delete and re-add instead"
        );

        self.pages
            .get_mut(&old_page)
            .expect("page index exists for every stored box")
            .update(slot, &b.bbx);
        self.boxes.insert(BoxId::from(id), b);
        Ok(())
    }

    /// Removes the box stored under `id` from both the box map and the
    /// spatial index.
    pub fn delete_box(&mut self, id: &str) -> Result<()> {
        let slot = self
            .ids
            .remove_by_id(id)
            .ok_or_else(|| AnnotError::BoxNotFound(id.to_string()))?;
        let b = self
            .boxes
            .shift_remove(id)
            .expect("id map and box map agree");
        self.pages
            .get_mut(&b.page_num())
            .expect("page index exists for every stored box")
            .remove(slot);
        Ok(())
    }

    /// Finds some box matching `target` under the given mode, or None.
    ///
    /// Candidates are narrowed by the page's spatial index first, then
    /// tested precisely. When several boxes match, which one is returned is
    /// unspecified; callers must not depend on the choice.
    pub fn get(&self, target: &BBX, mode: QueryMode) -> Option<&LabelledBox> {
        let index = self.pages.get(&target.page_num)?;

        for slot in index.intersection(target) {
            let id = self.ids.id(slot)?;
            let b = &self.boxes[id.as_str()];
            let matches = match mode {
                QueryMode::Intersect => b.bbx.intersects(target),
                QueryMode::Full => b.bbx.extend(self.params.full_tolerance).contains(target),
            };
            if matches {
                return Some(b);
            }
        }
        None
    }

    /// Like [`AnnotationLayer::get`] but returns the matched label, or
    /// `default` when nothing matches.
    pub fn get_label(&self, target: &BBX, mode: QueryMode, default: &str) -> SmolStr {
        self.get(target, mode)
            .map(|b| b.label.clone())
            .unwrap_or_else(|| SmolStr::from(default))
    }

    /// [`AnnotationLayer::get_label`] with the standard outside sentinel.
    pub fn get_label_or_outside(&self, target: &BBX, mode: QueryMode) -> SmolStr {
        self.get_label(target, mode, OUTSIDE_LABEL)
    }

    /// Deletes every box for which the predicate returns false.
    pub fn filter(&mut self, predicate: impl Fn(&LabelledBox) -> bool) {
        let doomed: Vec<BoxId> = self
            .boxes
            .iter()
            .filter(|(_, b)| !predicate(b))
            .map(|(id, _)| id.clone())
            .collect();
        for id in doomed {
            self.delete_box(&id).expect("filtered id exists");
        }
    }

    /// Rewrites every box's label and group through `f`; a None return
    /// deletes the box.
    pub fn filter_map(&mut self, f: impl Fn(&str, u32) -> Option<(SmolStr, u32)>) {
        let mut doomed: Vec<BoxId> = Vec::new();
        for (id, b) in self.boxes.iter_mut() {
            match f(&b.label, b.group) {
                Some((label, group)) => {
                    b.label = label;
                    b.group = group;
                }
                None => doomed.push(id.clone()),
            }
        }
        for id in doomed {
            self.delete_box(&id).expect("filtered id exists");
        }
    }

    /// Merges contiguous same-label, same-group boxes into minimal covering
    /// rectangles, producing a new layer; this layer is untouched.
    ///
    /// Within one `(label, group)` run, the accumulated box absorbs the next
    /// box only when every index entry intersected by the merge's extension
    /// strips belongs to the group itself. A merge that would sweep over
    /// someone else's box is rejected and the accumulator is flushed, so
    /// reduction never silently captures foreign regions.
    pub fn reduce(&self) -> AnnotationLayer {
        let mut groups: IndexMap<(SmolStr, u32), Vec<&BoxId>> = IndexMap::new();
        for (id, b) in &self.boxes {
            groups.entry(b.group_key()).or_default().push(id);
        }
        debug!(boxes = self.boxes.len(), groups = groups.len(), "reduce: start");

        let mut out = AnnotationLayer::new().with_params(self.params.clone());

        for ((label, group), member_ids) in groups {
            let member_slots: FxHashSet<Slot> = member_ids
                .iter()
                .filter_map(|id| self.ids.slot(id))
                .collect();

            let mut members = member_ids.iter().map(|id| &self.boxes[id.as_str()]);
            let first = members.next().expect("groups are non-empty");
            let mut acc = first.bbx;
            let mut acc_data = first.user_data.clone();

            for b in members {
                if b.page_num() != acc.page_num {
                    // Page change forces a flush.
                    out.add_box(LabelledBox {
                        bbx: acc,
                        label: label.clone(),
                        group,
                        user_data: acc_data.take(),
                    });
                    acc = b.bbx;
                    acc_data = b.user_data.clone();
                    continue;
                }

                let (merged, strips) = acc.group_with_extension(&b.bbx);
                let mut swept: FxHashSet<Slot> = FxHashSet::default();
                if let Some(index) = self.pages.get(&merged.page_num) {
                    for strip in &strips {
                        swept.extend(index.intersection(strip));
                    }
                }

                if swept.is_subset(&member_slots) {
                    acc = merged;
                } else {
                    out.add_box(LabelledBox {
                        bbx: acc,
                        label: label.clone(),
                        group,
                        user_data: acc_data.take(),
                    });
                    acc = b.bbx;
                    acc_data = b.user_data.clone();
                }
            }

            out.add_box(LabelledBox {
                bbx: acc,
                label: label.clone(),
                group,
                user_data: acc_data,
            });
        }

        debug!(boxes = out.len(), "reduce: done");
        out
    }

    /// Builds a layer from the converter's link-annotation XML: one box per
    /// URI link action, labelled with the link destination, group 0.
    pub fn from_link_annotations(xml: &str) -> Result<AnnotationLayer> {
        let mut layer = AnnotationLayer::new();
        for b in crate::alto::parser::parse_link_annotations(xml)? {
            layer.add_box(b);
        }
        Ok(layer)
    }

    /// Writes the layer as a compressed, versioned blob.
    ///
    /// Uses `location` when given, otherwise the location the layer was
    /// created with; with neither this is a configuration error.
    pub fn save(&self, location: Option<&Path>) -> Result<()> {
        let target = location
            .or(self.location.as_deref())
            .ok_or(AnnotError::NoLocation)?;

        let blob = LayerBlob {
            version: LAYER_FORMAT_VERSION,
            boxes: self.boxes.clone(),
        };
        let file = File::create(target)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, &blob)?;
        // Drop would swallow a failed flush of the gzip trailer; finish and
        // flush explicitly so write errors surface here.
        encoder.finish()?.flush()?;
        Ok(())
    }
}
