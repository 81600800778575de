//! Error types for the preview engine

use thiserror::Error;

/// Error returned by host-supplied collaborators (content mapper, renderer).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Document '{content_id}' not found in webspace '{webspace_key}' for locale '{locale}'")]
    DocumentNotFound {
        content_id: String,
        webspace_key: String,
        locale: String,
    },

    #[error("Unknown field path '{path}': {reason}")]
    UnknownFieldPath { path: String, reason: String },

    #[error("Invalid value for '{path}': {reason}")]
    InvalidValue { path: String, reason: String },

    #[error("Structure '{0}' is not defined")]
    StructureNotFound(String),

    #[error("No preview session for {0}; send 'start' first")]
    State(String),

    #[error("Render error: {0}")]
    Render(#[source] BoxError),

    #[error("Content error: {0}")]
    Content(#[source] BoxError),

    #[error("Markup error: {0}")]
    Crawl(#[from] draftview_crawler::CrawlError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl PreviewError {
    /// Stable identifier sent to clients in error responses
    pub fn code(&self) -> &'static str {
        match self {
            PreviewError::DocumentNotFound { .. } => "document_not_found",
            PreviewError::UnknownFieldPath { .. } => "unknown_field_path",
            PreviewError::InvalidValue { .. } => "invalid_value",
            PreviewError::StructureNotFound(_) => "structure_not_found",
            PreviewError::State(_) => "state",
            PreviewError::Render(_) => "render",
            PreviewError::Content(_) => "content",
            PreviewError::Crawl(_) => "markup",
            PreviewError::Cache(_) => "cache",
        }
    }

    pub(crate) fn unknown_path(path: impl ToString, reason: impl Into<String>) -> Self {
        PreviewError::UnknownFieldPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(path: impl ToString, reason: impl Into<String>) -> Self {
        PreviewError::InvalidValue {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

pub type PreviewResult<T> = Result<T, PreviewError>;
