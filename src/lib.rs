pub mod cache;
pub mod config;
pub mod download;
pub mod dynamic_zone;
pub mod fetch;
pub mod field;
pub mod local;
pub mod node;


pub use download::{DownloadReport, ExtractContext, download_media_files};
pub use dynamic_zone::is_dynamic_zone;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
#[error("{context}: {detail}")]
pub struct Error {
    pub context: Box<ErrorContext>,
    pub detail: Box<ErrorDetail>,
}

/// Location of a field inside the batch being processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub entity_type: String,
    pub index: usize,
    /// JSON pointer relative to the entity root.
    pub pointer: String,
}

impl ErrorContext {
    pub(crate) fn new(entity_type: impl Into<String>, index: usize) -> Self {
        Self {
            entity_type: entity_type.into(),
            index,
            pointer: String::new(),
        }
    }

    pub(crate) fn child(&self, segment: impl std::fmt::Display) -> Self {
        let segment = segment.to_string().replace('~', "~0").replace('/', "~1");
        Self {
            entity_type: self.entity_type.clone(),
            index: self.index,
            pointer: format!("{}/{segment}", self.pointer),
        }
    }

    pub(crate) fn error(&self, detail: ErrorDetail) -> Error {
        Error {
            context: Box::new(self.clone()),
            detail: Box::new(detail),
        }
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]{}", self.entity_type, self.index, self.pointer)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorDetail {
    #[error("Failed to fetch remote media: {0}")]
    Fetch(fetch::Error),
    #[error("Media cache error: {0}")]
    Cache(BoxError),
    #[error("Node store error: {0}")]
    NodeStore(BoxError),
    #[error("Failed to encode cache record: {0}")]
    EncodeRecord(serde_json::Error),
}

impl ErrorDetail {
    pub(crate) fn cache(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Cache(Box::new(error))
    }

    pub(crate) fn node_store(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::NodeStore(Box::new(error))
    }
}
