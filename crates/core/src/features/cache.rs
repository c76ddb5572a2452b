//! On-disk cache of per-document feature tables.
//!
//! Table construction walks every node of the document and is by far the
//! slowest step of annotation workflows, so the built tables are persisted
//! as gzipped JSON next to the rest of a paper's derived data. A corrupt or
//! stale cache entry is rebuilt, never an error.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::{debug, warn};

use crate::error::Result;
use crate::features::DocumentFeatures;

/// File-backed cache. One gzipped JSON file per document id.
pub struct FeatureCache {
    dir: PathBuf,
    /// When set, every lookup rebuilds and overwrites its entry.
    rebuild_all: bool,
}

impl FeatureCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            rebuild_all: false,
        }
    }

    /// A cache that ignores existing entries and rebuilds everything.
    pub fn rebuilding(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            rebuild_all: true,
        }
    }

    fn entry_path(&self, doc_id: &str) -> PathBuf {
        self.dir.join(format!("{doc_id}.features.json.gz"))
    }

    /// Returns the cached tables for `doc_id`, building and persisting them
    /// with `build` on a miss (or when `force` is set).
    pub fn get_or_build<F>(&self, doc_id: &str, force: bool, build: F) -> Result<DocumentFeatures>
    where
        F: FnOnce() -> Result<DocumentFeatures>,
    {
        let path = self.entry_path(doc_id);

        if !force && !self.rebuild_all {
            if let Some(cached) = read_entry(&path) {
                debug!(doc_id, "feature cache hit");
                return Ok(cached);
            }
        }

        debug!(doc_id, "building feature tables");
        let features = build()?;
        self.store(&path, &features)?;
        Ok(features)
    }

    /// Drops the cached entry for `doc_id`, if any.
    pub fn invalidate(&self, doc_id: &str) -> Result<()> {
        let path = self.entry_path(doc_id);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    fn store(&self, path: &Path, features: &DocumentFeatures) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, features)?;
        encoder.finish()?.flush()?;
        Ok(())
    }
}

/// None on any miss: absent file, unreadable gzip, or stale schema.
fn read_entry(path: &Path) -> Option<DocumentFeatures> {
    let file = File::open(path).ok()?;
    let decoder = GzDecoder::new(BufReader::new(file));
    match serde_json::from_reader(decoder) {
        Ok(features) => Some(features),
        Err(err) => {
            warn!(path = %path.display(), %err, "discarding unreadable feature cache entry");
            None
        }
    }
}
