//! # PDF Context
//!
//! A local-first retrieval and context-building core for chatting with PDF
//! documents.
//!
//! PDF Context ingests documents from uploads or a watched folder, splits
//! them into overlapping character windows, embeds and persists them in
//! SQLite, and answers queries by nearest-neighbor search with keyword
//! boosting, distance thresholding, and per-document grouping. The ranked
//! context is handed to an external Ollama-compatible chat backend, either
//! as a streamed single-document Q&A or as a bulk structured extraction
//! across the whole corpus.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────┐
//! │  Watched     │──▶│   Pipeline   │──▶│  SQLite   │
//! │  folder /    │   │ Extract →    │   │ chunks +  │
//! │  uploads     │   │ Chunk → Embed│   │ vectors   │
//! └──────────────┘   └──────────────┘   └────┬──────┘
//!                                            │
//!                        ┌───────────────────┤
//!                        ▼                   ▼
//!                  ┌───────────┐      ┌────────────┐
//!                  │ Retrieval │      │ Aggregate  │
//!                  │ + context │      │ extraction │
//!                  └─────┬─────┘      └─────┬──────┘
//!                        └───────┬──────────┘
//!                                ▼
//!                        ┌──────────────┐
//!                        │ Ollama /api/ │
//!                        │ chat backend │
//!                        └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pdfctx init                          # create the store
//! pdfctx ingest uploads/form.pdf       # embed a document
//! pdfctx watch                         # or let the folder watcher do it
//! pdfctx search "supervisor name"      # ranked retrieval, no generation
//! pdfctx ask "Who is the supervisor?" --source uploads/form.pdf
//! pdfctx extract --model deepseek      # JSON records across all documents
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Core error taxonomy |
//! | [`models`] | Core data types |
//! | [`extract`] | Page-wise PDF / plain-text extraction |
//! | [`chunk`] | Sliding-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Persistent embedding store |
//! | [`retrieve`] | Ranking, boosting, aggregation, grouping |
//! | [`context`] | Context assembly and fallback messages |
//! | [`ingest`] | Ingestion coordinator |
//! | [`watch`] | Folder change-detection strategies |
//! | [`generate`] | Generation backend client |
//! | [`extract_info`] | Bulk structured extraction |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chunk;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod extract_info;
pub mod generate;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod retrieve;
pub mod stats;
pub mod store;
pub mod watch;
