use anyhow::Result;
use sqlx::SqlitePool;

/// Create the store schema. Idempotent; safe to run on every open.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Documents: one row per ingested source
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            source TEXT PRIMARY KEY,
            page_count INTEGER NOT NULL,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Chunks: metadata table mapping chunk id -> {text, source, page}
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            page INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            FOREIGN KEY (source) REFERENCES documents(source)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Vectors: one embedding per chunk, little-endian f32 BLOB
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunk_vectors (
            chunk_id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            embedding BLOB NOT NULL,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes for the source-filtered paths
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(source)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunk_vectors_source ON chunk_vectors(source)")
        .execute(pool)
        .await?;

    Ok(())
}
