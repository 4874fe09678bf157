//! Core error taxonomy.
//!
//! Errors here classify failures at the retrieval-core seams: document
//! loading, the embedding store, and the generation backend. Command-level
//! orchestration wraps these in `anyhow` as usual.
//!
//! Note that "no relevant content found" is deliberately *not* an error —
//! an empty result set after thresholding is a normal retrieval outcome,
//! represented as an empty `Vec` and turned into fallback text by the
//! context assembler.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The document loaded but yielded no extractable text (e.g. a scanned
    /// PDF). Recovered per file: the coordinator records it and continues
    /// with the rest of the batch.
    #[error("no text could be extracted from '{path}'")]
    EmptyDocument { path: String },

    /// The document bytes could not be parsed at all.
    #[error("could not read '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    /// The persistence layer cannot be reached or written. Fatal for the
    /// current operation; the caller must not update its processed set on
    /// this path so a retry stays idempotent.
    #[error("embedding store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    /// The embedding provider failed after retries.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The generation backend did not respond within its deadline.
    /// Retryable: retrieval results already computed are kept.
    #[error("generation backend timed out after {elapsed_secs:.0}s (retry possible)")]
    GenerationTimeout { elapsed_secs: f64 },

    /// Any other generation backend failure.
    #[error("generation backend error: {0}")]
    Generation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the caller may retry the operation without re-running
    /// retrieval or ingestion.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::GenerationTimeout { .. })
    }
}
