//! # PDF Context CLI (`pdfctx`)
//!
//! The `pdfctx` binary is the interface standing in for the web layer: it
//! calls the retrieval core with (query, optional source filter, model
//! choice) and relays the streamed answer or JSON records.
//!
//! ## Usage
//!
//! ```bash
//! pdfctx --config ./config/pdfctx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pdfctx init` | Create the SQLite store and run schema migrations |
//! | `pdfctx ingest <FILES...>` | Embed documents; per-file accepted/duplicate/error report |
//! | `pdfctx watch` | Keep the store in sync with the watched folder |
//! | `pdfctx delete <SOURCE>` | Remove a document and all its embeddings |
//! | `pdfctx sources` | List stored source documents |
//! | `pdfctx stats` | Store statistics |
//! | `pdfctx search "<query>"` | Ranked retrieval without generation |
//! | `pdfctx ask "<query>"` | Answer a question from a selected document |
//! | `pdfctx extract` | Extract structured records across all documents |

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use pdf_context::config::{self, BoostRule};
use pdf_context::context;
use pdf_context::generate::{self, GenerationClient};
use pdf_context::ingest::{self, Coordinator};
use pdf_context::progress::StderrProgress;
use pdf_context::retrieve::{self, RetrievalOptions};
use pdf_context::store::EmbeddingStore;
use pdf_context::watch::{ChangeDetector, EventDetector, PollDetector};
use pdf_context::{chunk, extract_info, stats};

/// PDF Context — a local-first retrieval core for chatting with PDF
/// documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "pdfctx",
    about = "PDF Context — retrieval and context-building for local PDF chat",
    version,
    long_about = "PDF Context ingests PDF and plain-text documents from uploads or a watched \
    folder, embeds them into a persistent SQLite store, and answers queries via similarity \
    search, keyword boosting, and per-document context assembly, delegating generation to an \
    Ollama-compatible chat backend."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pdfctx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the store schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Embed one or more documents.
    ///
    /// Every file is attempted: the result is a partial-success report of
    /// accepted files, duplicates, and per-file errors. Re-ingesting an
    /// already-embedded source is a no-op.
    Ingest {
        /// Paths of PDF or plain-text documents.
        files: Vec<PathBuf>,
    },

    /// Watch the configured folder and keep the store in sync.
    ///
    /// New matching files are embedded; files that disappear have their
    /// embeddings removed.
    Watch {
        /// Change-detection strategy: `poll` (periodic scan) or `events`
        /// (OS file notifications).
        #[arg(long, default_value = "poll")]
        strategy: String,
    },

    /// Delete a document and all of its embeddings.
    Delete {
        /// Source identifier (the path the document was ingested under).
        source: String,
    },

    /// List stored source documents.
    Sources,

    /// Show store statistics.
    Stats,

    /// Ranked retrieval without generation.
    ///
    /// Prints the surviving chunks with their distances; useful for tuning
    /// thresholds and boost rules.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one source document.
        #[arg(long)]
        source: Option<String>,

        /// Maximum number of results (defaults to retrieval.k).
        #[arg(long)]
        limit: Option<usize>,

        /// Distance threshold override (defaults to retrieval.chat_threshold).
        #[arg(long)]
        threshold: Option<f64>,

        /// Extra boost rules as `term=factor` pairs (factor < 1 boosts).
        #[arg(long = "boost", value_parser = parse_boost)]
        boosts: Vec<BoostRule>,
    },

    /// Answer a question from a selected document.
    ///
    /// Retrieves the most relevant chunks of the selected source, builds
    /// the context, and streams the model's answer. Without `--source` the
    /// model is instructed to ask the user to pick a document.
    Ask {
        /// The question.
        query: String,

        /// Source document to answer from.
        #[arg(long)]
        source: Option<String>,

        /// Model selector from [generation.models] (defaults to
        /// generation.default_model).
        #[arg(long)]
        model: Option<String>,
    },

    /// Extract structured records across all stored documents.
    ///
    /// Prints a JSON array with one record per registration form, every
    /// missing field defaulting to "Unknown".
    Extract {
        /// Model selector from [generation.models].
        #[arg(long)]
        model: Option<String>,
    },
}

/// Parse a `term=factor` pair for `--boost` arguments.
fn parse_boost(s: &str) -> Result<BoostRule, String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid TERM=FACTOR: no '=' found in '{}'", s))?;
    let factor: f64 = s[pos + 1..]
        .parse()
        .map_err(|_| format!("invalid factor in '{}'", s))?;

    Ok(BoostRule {
        term: s[..pos].to_string(),
        aliases: Vec::new(),
        factor,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = EmbeddingStore::open(&cfg).await?;
            store.close().await;
            println!("Store initialized successfully.");
        }
        Commands::Ingest { files } => {
            if files.is_empty() {
                bail!("No files given. Usage: pdfctx ingest <FILES...>");
            }

            let store = EmbeddingStore::open(&cfg).await?;
            let mut coordinator = Coordinator::new(store, &cfg).await?;
            let report = coordinator.ingest_batch(&files, &StderrProgress).await;

            println!("ingest");
            for (source, chunks) in &report.accepted {
                println!("  embedded {} ({} chunks)", source, chunks);
            }
            for source in &report.duplicates {
                println!("  skipped {} (already embedded)", source);
            }
            for failure in &report.errors {
                println!("  error {}: {}", failure.source, failure.reason);
            }
            println!(
                "  accepted: {}  duplicates: {}  errors: {}",
                report.accepted.len(),
                report.duplicates.len(),
                report.errors.len()
            );
            println!("ok");
            coordinator.close().await;
        }
        Commands::Watch { strategy } => {
            let Some(watch_cfg) = cfg.watch.clone() else {
                bail!("No [watch] section in config. Set watch.folder to use pdfctx watch.");
            };

            let store = EmbeddingStore::open(&cfg).await?;
            let mut coordinator = Coordinator::new(store, &cfg).await?;
            let interval = Duration::from_secs(watch_cfg.poll_interval_secs);

            let mut detector: Box<dyn ChangeDetector> = match strategy.as_str() {
                "poll" => Box::new(PollDetector::new(&watch_cfg)?),
                "events" => Box::new(EventDetector::new(&watch_cfg)?),
                other => bail!("Unknown watch strategy: '{}'. Use poll or events.", other),
            };

            println!(
                "watching {} ({} strategy, every {}s)",
                watch_cfg.folder.display(),
                strategy,
                watch_cfg.poll_interval_secs
            );
            coordinator.run(detector.as_mut(), interval).await?;
        }
        Commands::Delete { source } => {
            let store = EmbeddingStore::open(&cfg).await?;
            let mut coordinator = Coordinator::new(store, &cfg).await?;

            // Accept both the stored identifier and a path spelling of it.
            let mut known = coordinator.delete_source(&source).await?;
            let canonical = ingest::source_id(Path::new(&source));
            if !known && canonical != source {
                known = coordinator.delete_source(&canonical).await?;
            }

            if known {
                println!("Deleted {} and its embeddings.", source);
            } else {
                println!("Not found: {} (nothing to delete).", source);
            }
            coordinator.close().await;
        }
        Commands::Sources => {
            let store = EmbeddingStore::open(&cfg).await?;
            let sources = store.list_sources().await?;

            if sources.is_empty() {
                println!("No documents stored.");
            } else {
                for source in &sources {
                    println!("{}", source);
                }
                println!("{} document(s)", sources.len());
            }
            store.close().await;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Search {
            query,
            source,
            limit,
            threshold,
            boosts,
        } => {
            let store = EmbeddingStore::open(&cfg).await?;

            let mut all_boosts = cfg.retrieval.boost.clone();
            all_boosts.extend(boosts);

            let opts = RetrievalOptions {
                k: limit.unwrap_or(cfg.retrieval.k),
                source_filter: source.map(|s| resolve_source(&s)),
                threshold: threshold.unwrap_or(cfg.retrieval.chat_threshold),
                boosts: all_boosts,
            };

            let results = retrieve::retrieve(&store, &query, &opts).await?;
            if results.is_empty() {
                println!("No results.");
            } else {
                for (i, result) in results.iter().enumerate() {
                    println!(
                        "{}. [{:.3}] {} (page {})",
                        i + 1,
                        result.distance,
                        result.source,
                        result.page
                    );
                    println!(
                        "   excerpt: \"{}\"",
                        truncate_chars(&chunk::normalize_whitespace(&result.text), 160)
                    );
                }
            }
            store.close().await;
        }
        Commands::Ask {
            query,
            source,
            model,
        } => {
            let model_id = GenerationClient::resolve_model(&cfg.generation, model.as_deref())?;
            let store = EmbeddingStore::open(&cfg).await?;

            let opts = RetrievalOptions {
                k: cfg.retrieval.k,
                source_filter: source.as_ref().map(|s| resolve_source(s)),
                threshold: cfg.retrieval.chat_threshold,
                boosts: cfg.retrieval.boost.clone(),
            };

            let results = retrieve::retrieve(&store, &query, &opts).await?;
            let context_text = context::assemble(
                &results,
                opts.source_filter.is_some(),
                &context::FallbackMessages::default(),
            );
            let prompt = generate::build_chat_prompt(&context_text, &query);

            let client = GenerationClient::new(&cfg.generation);
            let deadline = Duration::from_secs(cfg.generation.timeout_secs);

            match client
                .chat(&model_id, &prompt, deadline, |token| {
                    print!("{}", token);
                    let _ = std::io::stdout().flush();
                })
                .await
            {
                Ok(outcome) => {
                    println!();
                    println!("response time: {:.2}s", outcome.elapsed_secs);
                }
                Err(e) if e.is_retryable() => {
                    eprintln!("{}", e);
                    eprintln!("Run the command again to retry with the same question.");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
            store.close().await;
        }
        Commands::Extract { model } => {
            let model_id = GenerationClient::resolve_model(&cfg.generation, model.as_deref())?;
            let store = EmbeddingStore::open(&cfg).await?;

            match extract_info::prepare(&store, &cfg).await? {
                None => {
                    // Empty corpus: answer without invoking the model.
                    println!(
                        "{}",
                        serde_json::json!({ "message": "no PDF documents uploaded" })
                    );
                }
                Some(session) => {
                    let client = GenerationClient::new(&cfg.generation);
                    let deadline = Duration::from_secs(cfg.generation.extract_timeout_secs);

                    match session.run(&client, &model_id, deadline).await {
                        Ok(records) => {
                            println!("{}", serde_json::to_string_pretty(&records)?);
                        }
                        Err(e) if e.is_retryable() => {
                            eprintln!("{}", e);
                            eprintln!(
                                "The retrieved context is kept; run the command again to retry."
                            );
                            std::process::exit(1);
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            store.close().await;
        }
    }

    Ok(())
}

/// Map a user-supplied source argument onto the stored identifier: the
/// canonical path when the file still exists, the argument as given
/// otherwise.
fn resolve_source(source: &str) -> String {
    ingest::source_id(Path::new(source))
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}
