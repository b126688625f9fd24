//! Error types for search-core.
//!
//! Ingestion errors are per document and never abort a build; search errors
//! fail the whole query.

use thiserror::Error;

/// Errors raised while ingesting a single document.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Reading the document's content failed
    #[error("failed to read {doc_id}: {source}")]
    Io {
        doc_id: String,
        #[source]
        source: std::io::Error,
    },
    /// The document source failed before a document could be produced
    #[error("document source error: {0}")]
    Source(String),
}

impl IngestError {
    /// Id of the document that failed, when one is known.
    pub fn doc_id(&self) -> Option<&str> {
        match self {
            IngestError::Io { doc_id, .. } => Some(doc_id),
            IngestError::Source(_) => None,
        }
    }
}

/// Errors that fail a whole query.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchError {
    /// A per-term scoring task failed; no partial ranking is returned
    #[error("scoring task for term {term:?} failed: {reason}")]
    TaskFailed { term: String, reason: String },
    /// The caller cancelled the query
    #[error("query cancelled")]
    Cancelled,
    /// The worker pool could not be created
    #[error("worker pool unavailable: {0}")]
    Pool(String),
}
