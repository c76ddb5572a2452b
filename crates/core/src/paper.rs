//! One paper and its derived artifacts: the converted layout XML, the
//! annotation layers drawn over it, and the cached feature tables.
//!
//! The PDF-to-XML converter (pdfalto) is an opaque subprocess boundary; its
//! output is compressed and kept next to the layers under the paper's
//! metadata directory.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use rayon::prelude::*;
use smol_str::SmolStr;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::alto::parser::parse_document;
use crate::alto::{Document, NodeKind};
use crate::classes::{AnnotationClass, ClassFilter};
use crate::error::{AnnotError, Result};
use crate::features::aggregate::{build_tables, get_features_by_name};
use crate::features::cache::FeatureCache;
use crate::features::{DocumentFeatures, FeatureTable};
use crate::geom::{LabelledBox, OUTSIDE_LABEL};
use crate::layer::{AnnotationLayer, QueryMode};
use crate::params::FeatureParams;
use crate::validator::BoxValidator;

/// Metadata record of one annotation layer living on a paper.
#[derive(Debug, Clone)]
pub struct LayerInfo {
    pub id: SmolStr,
    pub class_name: SmolStr,
    pub created: SystemTime,
}

/// A paper: its source PDF, a metadata directory for derived files, and the
/// list of annotation layers drawn over it.
pub struct Paper {
    pub id: String,
    pub pdf_path: PathBuf,
    meta_dir: PathBuf,
    layers: Vec<LayerInfo>,
    pub title: Option<String>,
}

impl Paper {
    /// Registers a paper, (re)creating its metadata directory under
    /// `data_dir`.
    pub fn new(id: &str, pdf_path: impl Into<PathBuf>, data_dir: &Path) -> Result<Self> {
        let meta_dir = data_dir.join("papers").join(id);
        if meta_dir.exists() {
            std::fs::remove_dir_all(&meta_dir)?;
        }
        std::fs::create_dir_all(&meta_dir)?;

        Ok(Self {
            id: id.to_string(),
            pdf_path: pdf_path.into(),
            meta_dir,
            layers: Vec::new(),
            title: None,
        })
    }

    /// Reattaches to an existing metadata directory without touching it.
    pub fn open(id: &str, pdf_path: impl Into<PathBuf>, data_dir: &Path) -> Self {
        Self {
            id: id.to_string(),
            pdf_path: pdf_path.into(),
            meta_dir: data_dir.join("papers").join(id),
            layers: Vec::new(),
            title: None,
        }
    }

    pub fn meta_dir(&self) -> &Path {
        &self.meta_dir
    }

    pub fn layers(&self) -> &[LayerInfo] {
        &self.layers
    }

    fn layer_location(&self, layer_id: &str) -> PathBuf {
        self.meta_dir.join(format!("annot_{layer_id}.json.gz"))
    }

    /// The most recently created layer of a class, if any.
    pub fn get_best_layer(&self, class_name: &str) -> Option<&LayerInfo> {
        self.layers
            .iter()
            .filter(|l| l.class_name == class_name)
            .max_by_key(|l| l.created)
    }

    pub fn get_layer_info(&self, layer_id: &str) -> Result<&LayerInfo> {
        self.layers
            .iter()
            .find(|l| l.id == layer_id)
            .ok_or_else(|| AnnotError::LayerNotFound(layer_id.to_string()))
    }

    /// Loads a layer's boxes from disk; missing blobs yield an empty layer
    /// bound to the expected location.
    pub fn get_annotation_layer(&self, layer_id: &str) -> AnnotationLayer {
        AnnotationLayer::load(self.layer_location(layer_id))
    }

    /// Registers a new layer of `class_name`, persisting `content` to the
    /// layer's location when given.
    pub fn add_annotation_layer(
        &mut self,
        class_name: &str,
        content: Option<&AnnotationLayer>,
    ) -> Result<LayerInfo> {
        let info = LayerInfo {
            id: SmolStr::from(Uuid::new_v4().simple().to_string()),
            class_name: class_name.into(),
            created: SystemTime::now(),
        };

        if let Some(layer) = content {
            layer.save(Some(&self.layer_location(&info.id)))?;
        }

        self.layers.push(info.clone());
        Ok(info)
    }

    /// Drops a layer's metadata record and its on-disk blob. A missing blob
    /// is only logged; the record must exist.
    pub fn remove_annotation_layer(&mut self, layer_id: &str) -> Result<()> {
        let pos = self
            .layers
            .iter()
            .position(|l| l.id == layer_id)
            .ok_or_else(|| AnnotError::LayerNotFound(layer_id.to_string()))?;

        let location = self.layer_location(layer_id);
        if let Err(err) = std::fs::remove_file(&location) {
            warn!(location = %location.display(), %err, "removing layer blob failed");
        }
        self.layers.remove(pos);
        Ok(())
    }

    fn layout_path(&self) -> PathBuf {
        self.meta_dir.join("article.xml.gz")
    }

    fn link_annotations_path(&self) -> PathBuf {
        self.meta_dir.join("article_annot.xml")
    }

    /// Runs the converter, compressing the layout XML it writes. A non-zero
    /// exit is fatal.
    fn run_converter(&self) -> Result<()> {
        let xml_path = self.meta_dir.join("article.xml");
        debug!(paper = %self.id, "converting pdf to layout xml");

        let status = Command::new("pdfalto")
            .arg("-readingOrder")
            .arg("-blocks")
            .arg("-annotation")
            .arg(&self.pdf_path)
            .arg(&xml_path)
            .status()?;
        if !status.success() {
            return Err(AnnotError::ConversionFailed {
                status: status.code().unwrap_or(-1),
            });
        }

        let mut raw = Vec::new();
        File::open(&xml_path)?.read_to_end(&mut raw)?;
        let out = File::create(self.layout_path())?;
        let mut encoder = GzEncoder::new(BufWriter::new(out), Compression::default());
        encoder.write_all(&raw)?;
        encoder.finish()?.flush()?;
        std::fs::remove_file(&xml_path)?;
        Ok(())
    }

    /// The parsed layout document, converting the PDF first if needed.
    pub fn get_document(&self) -> Result<Document> {
        if !self.layout_path().exists() {
            self.run_converter()?;
        }
        let file = File::open(self.layout_path())?;
        let mut xml = String::new();
        GzDecoder::new(BufReader::new(file)).read_to_string(&mut xml)?;
        parse_document(&xml)
    }

    /// The PDF's own link annotations as a layer, converting first if
    /// needed.
    pub fn get_pdf_annotations(&self) -> Result<AnnotationLayer> {
        if !self.link_annotations_path().exists() {
            self.run_converter()?;
        }
        let xml = std::fs::read_to_string(self.link_annotations_path())?;
        AnnotationLayer::from_link_annotations(&xml)
    }

    /// The paper's per-kind feature tables, built through the cache.
    pub fn build_features(
        &self,
        cache: &FeatureCache,
        params: &FeatureParams,
        force: bool,
    ) -> Result<DocumentFeatures> {
        cache.get_or_build(&self.id, force, || {
            let doc = self.get_document()?;
            Ok(build_tables(&doc, params))
        })
    }

    /// One feature row per `leaf_node` of the document.
    pub fn get_features(
        &self,
        cache: &FeatureCache,
        params: &FeatureParams,
        leaf_node: &str,
        standardize: bool,
        add_context: bool,
    ) -> Result<FeatureTable> {
        let tables = self.build_features(cache, params, false)?;
        get_features_by_name(&tables, leaf_node, standardize, add_context)
    }

    /// Builds the validator scoping `class` boxes to their parent regions.
    /// Parent filters whose class has no layer on this paper yet are
    /// skipped.
    pub fn get_box_validator(&self, class: &AnnotationClass) -> BoxValidator {
        let mut validator = BoxValidator::default();
        for filter in &class.parents {
            if let Some(info) = self.get_best_layer(&filter.name) {
                let id = info.id.clone();
                validator.push(self.get_annotation_layer(&id), filter.labels.clone());
            }
        }
        validator
    }

    /// Projects `annotations` onto every `target` node of the document,
    /// producing a layer with one labelled box per covered node.
    ///
    /// When `only_for` filters are given, only nodes lying inside a matching
    /// region of the named classes' best layers are considered; a filter
    /// whose class has no layer on this paper is an error.
    pub fn apply_annotations_on(
        &self,
        annotations: &AnnotationLayer,
        target: NodeKind,
        only_for: &[ClassFilter],
    ) -> Result<AnnotationLayer> {
        let mut parents: Vec<(AnnotationLayer, &[SmolStr])> = Vec::new();
        for filter in only_for {
            let info = self
                .get_best_layer(&filter.name)
                .ok_or_else(|| AnnotError::ParentLayerNotFound(filter.name.to_string()))?;
            let id = info.id.clone();
            parents.push((self.get_annotation_layer(&id), &filter.labels));
        }

        let doc = self.get_document()?;
        let mut layer = AnnotationLayer::new();

        for node in doc.nodes(target) {
            let admitted = parents.is_empty()
                || parents.iter().any(|(parent, labels)| {
                    let label = parent.get_label_or_outside(&node.bbx, QueryMode::Full);
                    labels.iter().any(|l| *l == label)
                });
            if !admitted {
                continue;
            }

            if let Some(found) = annotations.get(&node.bbx, QueryMode::Full) {
                let mut b = LabelledBox::new(node.bbx, &*found.label, found.group);
                b.user_data = found.user_data.clone();
                layer.add_box(b);
            }
        }

        Ok(layer)
    }

    /// Concatenates the text of every `target` node covered by a labelled
    /// box, in document order. Stops scanning past the last annotated page.
    pub fn extract_raw_text(
        &self,
        annotations: &AnnotationLayer,
        target: NodeKind,
    ) -> Result<String> {
        let doc = self.get_document()?;
        let last_page = annotations.last_annotated_page();
        let mut parts: Vec<String> = Vec::new();

        for node in doc.nodes(target) {
            if node.bbx.page_num > last_page {
                break;
            }
            if annotations.get_label_or_outside(&node.bbx, QueryMode::Full) != OUTSIDE_LABEL {
                if let Some(text) = node.text {
                    parts.push(text);
                }
            }
        }

        Ok(parts.join(" "))
    }

    /// Recomputes the title from the words covered by the best header
    /// layer's `title` boxes; no header layer clears the title.
    pub fn refresh_title(&mut self) -> Result<()> {
        let Some(info) = self.get_best_layer("header") else {
            self.title = Some(String::new());
            return Ok(());
        };
        let id = info.id.clone();

        let mut header = self.get_annotation_layer(&id);
        header.filter(|b| b.label == "title");
        self.title = Some(self.extract_raw_text(&header, NodeKind::Word)?);
        Ok(())
    }
}

/// Builds feature tables for many papers in parallel, one worker per paper.
pub fn build_features_batch(
    papers: &[Paper],
    cache: &FeatureCache,
    params: &FeatureParams,
    force: bool,
) -> Vec<Result<DocumentFeatures>> {
    papers
        .par_iter()
        .map(|paper| paper.build_features(cache, params, force))
        .collect()
}
