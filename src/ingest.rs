//! Ingestion coordination.
//!
//! The [`Coordinator`] drives documents through the pipeline: extract →
//! chunk → embed → store, keeps the set of already-processed sources as an
//! explicit state object (never a global), and reconciles the store against
//! the watched folder via a pluggable [`ChangeDetector`].
//!
//! Per-source lifecycle: an unseen file is chunked and embedded, then
//! remembered in the processed set; a chunking or embedding failure rejects
//! just that file (recorded in the batch report, siblings unaffected, not
//! retried automatically); a deletion request or a disappearance on disk
//! removes the source's records and forgets it. Re-processing a known
//! source is a no-op, so ingestion is idempotent.
//!
//! The processed set is rebuilt from the store's persisted sources at
//! construction, so a restart never re-embeds documents that already made
//! it in. Mutating operations take `&mut self`, which keeps writes to the
//! shared store serialized by construction.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chunk;
use crate::config::{ChunkingConfig, Config};
use crate::error::Result;
use crate::extract;
use crate::models::{IngestFailure, IngestReport, IngestStatus};
use crate::progress::{IngestProgressEvent, IngestProgressReporter, SilentProgress};
use crate::store::EmbeddingStore;
use crate::watch::ChangeDetector;

/// Stable source identifier for a document path: the canonical absolute
/// path when resolvable, the path as given otherwise.
pub fn source_id(path: &Path) -> String {
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

pub struct Coordinator {
    store: EmbeddingStore,
    chunking: ChunkingConfig,
    processed: BTreeSet<String>,
    /// Sources rejected for document reasons (unreadable, no text). The
    /// reconcile loop skips these instead of re-chunking them every pass;
    /// store and embedding failures are *not* recorded here, so those stay
    /// retryable.
    rejected: BTreeSet<String>,
}

impl Coordinator {
    /// Build a coordinator over the store, rebuilding the processed set
    /// from the sources already persisted.
    pub async fn new(store: EmbeddingStore, config: &Config) -> Result<Self> {
        let processed = store.list_sources().await?;

        Ok(Self {
            store,
            chunking: config.chunking.clone(),
            processed,
            rejected: BTreeSet::new(),
        })
    }

    pub fn store(&self) -> &EmbeddingStore {
        &self.store
    }

    pub fn processed(&self) -> &BTreeSet<String> {
        &self.processed
    }

    pub async fn close(self) {
        self.store.close().await;
    }

    /// Ingest one document. Never fails the caller: problems are folded
    /// into the returned status.
    pub async fn ingest_file(&mut self, path: &Path) -> IngestStatus {
        let source = source_id(path);

        if self.processed.contains(&source) {
            tracing::debug!(source = %source, "already embedded, skipping");
            return IngestStatus::Duplicate;
        }

        let pages = match extract::load_pages(path) {
            Ok(pages) => pages,
            Err(e) => {
                self.rejected.insert(source);
                return IngestStatus::Rejected {
                    reason: e.to_string(),
                };
            }
        };

        let chunks = match chunk::split(
            &pages,
            &source,
            self.chunking.chunk_size,
            self.chunking.overlap,
        ) {
            Ok(chunks) => chunks,
            Err(e) => {
                self.rejected.insert(source);
                return IngestStatus::Rejected {
                    reason: e.to_string(),
                };
            }
        };

        match self.store.add(&chunks).await {
            Ok(()) => {
                tracing::info!(source = %source, chunks = chunks.len(), "document embedded");
                self.processed.insert(source);
                IngestStatus::Accepted {
                    chunks: chunks.len(),
                }
            }
            // The processed set stays untouched on store/embedding
            // failures, so retrying the file later is safe.
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "embedding store rejected document");
                IngestStatus::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Ingest a batch of documents, producing a partial-success report:
    /// every file is attempted regardless of its siblings' failures.
    pub async fn ingest_batch(
        &mut self,
        paths: &[PathBuf],
        progress: &dyn IngestProgressReporter,
    ) -> IngestReport {
        let mut report = IngestReport::default();
        let total = paths.len() as u64;

        for (i, path) in paths.iter().enumerate() {
            let source = source_id(path);
            progress.report(IngestProgressEvent::Ingesting {
                n: i as u64 + 1,
                total,
                source: &source,
            });

            match self.ingest_file(path).await {
                IngestStatus::Accepted { chunks } => report.accepted.push((source, chunks)),
                IngestStatus::Duplicate => report.duplicates.push(source),
                IngestStatus::Rejected { reason } => {
                    report.errors.push(IngestFailure { source, reason });
                }
            }
        }

        report
    }

    /// Delete a source's records and forget it. Returns whether the source
    /// was actually known; deleting an unknown source is a no-op either way.
    pub async fn delete_source(&mut self, source: &str) -> Result<bool> {
        let known = self.processed.contains(source);

        self.store.delete(source).await?;
        self.processed.remove(source);

        if known {
            tracing::info!(source = %source, "document and embeddings deleted");
        }
        Ok(known)
    }

    /// One reconciliation pass: ingest files that appeared, delete sources
    /// that disappeared.
    pub async fn reconcile(
        &mut self,
        detector: &mut dyn ChangeDetector,
    ) -> anyhow::Result<IngestReport> {
        let changes = detector.detect_changes(&self.processed)?;
        if changes.is_empty() {
            return Ok(IngestReport::default());
        }

        // Documents rejected for document reasons are not retried
        // automatically; forgetting ones that left the disk gives a
        // recreated file a fresh chance.
        self.rejected.retain(|s| Path::new(s).exists());
        let added: Vec<PathBuf> = changes
            .added
            .into_iter()
            .filter(|p| !self.rejected.contains(&source_id(p)))
            .collect();

        let mut report = self.ingest_batch(&added, &SilentProgress).await;

        for source in &changes.removed {
            match self.delete_source(source).await {
                Ok(_) => report.deleted.push(source.clone()),
                Err(e) => report.errors.push(IngestFailure {
                    source: source.clone(),
                    reason: e.to_string(),
                }),
            }
        }

        Ok(report)
    }

    /// Long-lived ingestion loop: reconcile, sleep, repeat. A failing pass
    /// is logged and retried on the next tick rather than killing the loop.
    pub async fn run(
        &mut self,
        detector: &mut dyn ChangeDetector,
        interval: Duration,
    ) -> anyhow::Result<()> {
        loop {
            match self.reconcile(detector).await {
                Ok(report) => {
                    if !report.is_empty() {
                        println!(
                            "watch: {} added, {} removed, {} errors",
                            report.accepted.len(),
                            report.deleted.len(),
                            report.errors.len()
                        );
                        for failure in &report.errors {
                            eprintln!("  skipped {}: {}", failure.source, failure.reason);
                        }
                    }
                }
                Err(e) => tracing::warn!(error = %e, "reconciliation pass failed"),
            }

            tokio::time::sleep(interval).await;
        }
    }
}
