//! Error types for the marginalia annotation core.

use thiserror::Error;

/// Primary error type for annotation and feature operations.
#[derive(Error, Debug)]
pub enum AnnotError {
    #[error("no storage location given for annotation layer")]
    NoLocation,

    #[error("unknown query mode: {0}")]
    UnknownMode(String),

    #[error("unknown leaf kind: {0}")]
    UnknownLeafKind(String),

    #[error("box not found: {0}")]
    BoxNotFound(String),

    #[error("annotation layer not found: {0}")]
    LayerNotFound(String),

    #[error("no parent layer of class {0} on this paper")]
    ParentLayerNotFound(String),

    #[error("no features generated: document has no tracked nodes")]
    NoFeatures,

    #[error("unsupported layer format version {0}")]
    UnsupportedVersion(u32),

    #[error("layout conversion failed with status {status}")]
    ConversionFailed { status: i32 },

    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed layout xml: {0}")]
    MalformedXml(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias for AnnotError.
pub type Result<T> = std::result::Result<T, AnnotError>;
