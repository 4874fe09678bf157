//! Store statistics and health overview.
//!
//! Provides a quick summary of what's embedded: document counts, chunk
//! counts, vector coverage, and per-source breakdowns. Used by
//! `pdfctx stats` to give confidence that ingestion is working as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::migrate;

/// Per-source breakdown of chunk and vector counts.
struct SourceStats {
    source: String,
    page_count: i64,
    chunk_count: i64,
    embedded_count: i64,
}

/// Run the stats command: query the store and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(&config.store.path).await?;
    migrate::run_migrations(&pool).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;

    let total_chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
        .fetch_one(&pool)
        .await?;

    let total_embedded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.store.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("PDF Context — Store Stats");
    println!("=========================");
    println!();
    println!("  Store:       {}", config.store.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Documents:   {}", total_docs);
    println!("  Chunks:      {}", total_chunks);
    println!(
        "  Embedded:    {} / {} ({}%)",
        total_embedded,
        total_chunks,
        if total_chunks > 0 {
            (total_embedded * 100) / total_chunks
        } else {
            0
        }
    );

    let rows = sqlx::query(
        r#"
        SELECT d.source, d.page_count,
               (SELECT COUNT(*) FROM chunks c WHERE c.source = d.source) AS chunk_count,
               (SELECT COUNT(*) FROM chunk_vectors cv WHERE cv.source = d.source) AS embedded_count
        FROM documents d
        ORDER BY d.source
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let per_source: Vec<SourceStats> = rows
        .iter()
        .map(|row| SourceStats {
            source: row.get("source"),
            page_count: row.get("page_count"),
            chunk_count: row.get("chunk_count"),
            embedded_count: row.get("embedded_count"),
        })
        .collect();

    if !per_source.is_empty() {
        println!();
        println!(
            "  {:<48} {:>6} {:>8} {:>9}",
            "SOURCE", "PAGES", "CHUNKS", "EMBEDDED"
        );
        for stats in per_source {
            println!(
                "  {:<48} {:>6} {:>8} {:>9}",
                stats.source, stats.page_count, stats.chunk_count, stats.embedded_count
            );
        }
    }

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;

    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_format_scales_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
