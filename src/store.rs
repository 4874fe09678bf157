//! Persistent embedding store.
//!
//! Chunks and their vectors live in SQLite: a `chunks` metadata table
//! (id → text, source, page, fingerprint) with a parallel `chunk_vectors`
//! table holding little-endian f32 BLOBs, plus a `documents` table recording
//! each ingested source. Every mutation runs inside a committed transaction
//! before the call returns, so callers can treat the store as
//! crash-consistent.
//!
//! Similarity search embeds the query, scans the candidate vectors
//! (optionally restricted to one source), and ranks by L2 distance in Rust.

use sqlx::{Row, SqlitePool};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{Config, EmbeddingConfig};
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::migrate;
use crate::models::{Chunk, RetrievalResult};

pub struct EmbeddingStore {
    pool: SqlitePool,
    embedding: EmbeddingConfig,
    provider: Box<dyn EmbeddingProvider>,
}

impl EmbeddingStore {
    /// Open (and if necessary create) the store at the configured path.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.store.path).await?;
        migrate::run_migrations(&pool).await?;
        let provider = embedding::create_provider(&config.embedding)?;

        Ok(Self {
            pool,
            embedding: config.embedding.clone(),
            provider,
        })
    }

    /// Embed and persist a batch of chunks. The batch may mix chunks from
    /// multiple sources.
    pub async fn add(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.embedding.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let batch_vectors =
                embedding::embed_texts(self.provider.as_ref(), &self.embedding, &texts)
                    .await
                    .map_err(|e| Error::Embedding(e.to_string()))?;
            vectors.extend(batch_vectors);
        }

        self.add_embedded(chunks, &vectors).await
    }

    /// Persist chunks with precomputed embedding vectors (one per chunk,
    /// in order).
    pub async fn add_embedded(&self, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(Error::Embedding(format!(
                "got {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let now = chrono::Utc::now().timestamp();
        let model = self.provider.model_name().to_string();

        let mut tx = self.pool.begin().await?;

        // One document row per source in the batch, page_count = highest
        // page seen.
        let mut page_counts: BTreeMap<&str, i64> = BTreeMap::new();
        for chunk in chunks {
            let entry = page_counts.entry(chunk.source.as_str()).or_insert(0);
            *entry = (*entry).max(chunk.page);
        }
        for (source, page_count) in page_counts {
            sqlx::query(
                r#"
                INSERT INTO documents (source, page_count, ingested_at)
                VALUES (?, ?, ?)
                ON CONFLICT(source) DO UPDATE SET
                    page_count = MAX(page_count, excluded.page_count),
                    ingested_at = excluded.ingested_at
                "#,
            )
            .bind(source)
            .bind(page_count)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query("INSERT INTO chunks (id, source, page, text, hash) VALUES (?, ?, ?, ?, ?)")
                .bind(&chunk.id)
                .bind(&chunk.source)
                .bind(chunk.page)
                .bind(&chunk.text)
                .bind(&chunk.hash)
                .execute(&mut *tx)
                .await?;

            let blob = embedding::vec_to_blob(vector);
            sqlx::query(
                "INSERT INTO chunk_vectors (chunk_id, source, embedding, model, dims) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(&blob)
            .bind(&model)
            .bind(vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }

        // The commit is the durability flush the callers rely on.
        tx.commit().await?;
        Ok(())
    }

    /// Remove every record whose source equals the given value. A no-op
    /// when nothing matches, so duplicate deletes never error.
    pub async fn delete(&self, source: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chunks WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM documents WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Nearest-neighbor search: embed the query and return up to `k`
    /// results ordered by ascending L2 distance, optionally restricted to
    /// one source.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<RetrievalResult>> {
        let query_vec = embedding::embed_query(self.provider.as_ref(), &self.embedding, query)
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?;

        self.search_with_vector(&query_vec, k, source_filter).await
    }

    /// Search with an already-computed query vector.
    pub async fn search_with_vector(
        &self,
        query_vec: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<RetrievalResult>> {
        let base = r#"
            SELECT cv.embedding, c.text, c.source, c.page, c.hash
            FROM chunk_vectors cv
            JOIN chunks c ON c.id = cv.chunk_id
        "#;

        let rows = match source_filter {
            Some(source) => {
                sqlx::query(&format!("{} WHERE c.source = ?", base))
                    .bind(source)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => sqlx::query(base).fetch_all(&self.pool).await?,
        };

        let mut results: Vec<RetrievalResult> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = embedding::blob_to_vec(&blob);
                RetrievalResult {
                    text: row.get("text"),
                    source: row.get("source"),
                    page: row.get("page"),
                    hash: row.get("hash"),
                    distance: f64::from(embedding::l2_distance(query_vec, &vector)),
                }
            })
            .collect();

        // Ascending distance; source and page break ties deterministically.
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source.cmp(&b.source))
                .then_with(|| a.page.cmp(&b.page))
        });
        results.truncate(k);

        Ok(results)
    }

    /// Distinct source identifiers currently stored.
    pub async fn list_sources(&self) -> Result<BTreeSet<String>> {
        let sources: Vec<String> = sqlx::query_scalar("SELECT source FROM documents")
            .fetch_all(&self.pool)
            .await?;

        Ok(sources.into_iter().collect())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
