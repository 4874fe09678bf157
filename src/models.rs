//! Core data models used throughout the retrieval pipeline.
//!
//! These types represent the documents, chunks, and results that flow from
//! ingestion through the embedding store to context assembly.

use serde::{Deserialize, Serialize};

/// One page of extracted document text, before chunking.
#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub text: String,
    /// 1-based page number.
    pub page_no: usize,
}

/// A fixed-size overlapping text window extracted from one document — the
/// unit of embedding and retrieval. Immutable once added to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    /// Stable source identifier (file path), the sole deletion/filter key.
    pub source: String,
    /// 1-based page holding the window's first character.
    pub page: i64,
    pub text: String,
    /// SHA-256 of the whitespace-normalized text; the content fingerprint
    /// used for cross-subquery aggregation.
    pub hash: String,
}

/// A ranked chunk returned from the retriever.
///
/// `distance` is the L2 distance to the query embedding, possibly rescaled
/// by keyword boosting; in aggregate mode it holds the reciprocal of the
/// accumulated relevance score so lower remains better everywhere.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub text: String,
    pub source: String,
    pub page: i64,
    pub hash: String,
    pub distance: f64,
}

/// Chunks of one source document, cleaned and concatenated in retrieval
/// order. Produced by per-source grouping for whole-document extraction.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub source: String,
    pub text: String,
}

/// Outcome of ingesting a single document.
#[derive(Debug, Clone)]
pub enum IngestStatus {
    Accepted { chunks: usize },
    /// Source already embedded; ingestion is idempotent.
    Duplicate,
    /// Document skipped; sibling documents in the batch are unaffected.
    Rejected { reason: String },
}

/// Per-file failure recorded during a batch ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestFailure {
    pub source: String,
    pub reason: String,
}

/// Partial-success report for a batch: accepted files plus an error list,
/// never all-or-nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// (source, chunk count) per newly embedded document.
    pub accepted: Vec<(String, usize)>,
    pub duplicates: Vec<String>,
    pub deleted: Vec<String>,
    pub errors: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
            && self.duplicates.is_empty()
            && self.deleted.is_empty()
            && self.errors.is_empty()
    }
}

fn unknown() -> String {
    "Unknown".to_string()
}

/// One record of the aggregate-extraction output. Every content field the
/// model fails to produce defaults to the literal `"Unknown"` sentinel;
/// response time and source count are stamped on by the caller after
/// parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRecord {
    #[serde(default = "unknown")]
    pub topic: String,
    #[serde(default = "unknown")]
    pub student: String,
    #[serde(default = "unknown")]
    pub student_id: String,
    #[serde(default = "unknown")]
    pub email: String,
    #[serde(default = "unknown")]
    pub supervisor: String,
    #[serde(default = "unknown")]
    pub external_supervisor: String,
    #[serde(default)]
    pub response_time: String,
    #[serde(default)]
    pub sources_examined: usize,
}

impl ExtractedRecord {
    /// A record with every content field set to the `"Unknown"` sentinel.
    pub fn unknown() -> Self {
        Self {
            topic: unknown(),
            student: unknown(),
            student_id: unknown(),
            email: unknown(),
            supervisor: unknown(),
            external_supervisor: unknown(),
            response_time: String::new(),
            sources_examined: 0,
        }
    }
}
