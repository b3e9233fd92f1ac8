//! # pdfchat
//!
//! Ask questions about your PDF documents and get answers that cite the
//! document and page they came from.
//!
//! ## How it works
//!
//! Uploaded PDFs are read through their text layer, split into overlapping
//! chunks, embedded through a hosted embedding API and stored in a small
//! on-disk vector index. Each question is embedded the same way, the nearest
//! chunks are pulled from the index, and a hosted chat model writes the answer
//! from that context.
//!
//! ## Pipeline Overview
//!
//! ```text
//! processing (once per upload set)
//!  ├─ 1. Input    local file or URL → in-memory document
//!  ├─ 2. Extract  page text + "--- Page N of document NAME ---" markers (lopdf)
//!  ├─ 3. Chunk    1000-char windows, 200-char overlap
//!  └─ 4. Index    embeddings → lancedb tables (replaced wholesale)
//!
//! questions (repeatable)
//!  ├─ 5. Retrieve embed the question, 4 nearest chunks
//!  └─ 6. Answer   prompt template → chat model (temperature 0.7)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfchat::{AskOutcome, PdfChatConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Keys are read from GEMINI_API_KEY / GOOGLE_API_KEY
//!     let mut session = Session::new(PdfChatConfig::default());
//!     session.upload_from("report.pdf").await?;
//!     session.process().await?;
//!     if let AskOutcome::Answered(answer) = session.ask("What is the revenue?").await? {
//!         println!("{}", answer.text);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfchat` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfchat = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod error;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod query;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::Fingerprint;
pub use config::{EmbeddingProviderKind, PdfChatConfig, PdfChatConfigBuilder};
pub use error::PdfChatError;
pub use index::VectorIndex;
pub use output::{Answer, Chunk, Corpus, PageRecord, ProcessingReport, RetrievedChunk};
pub use pipeline::embed::{Embedder, ProviderEmbedder};
pub use pipeline::input::Document;
pub use pipeline::llm::{ChatModel, Generation, GenerationOptions};
pub use process::process_documents;
pub use progress::{NoopProgressCallback, ProcessingProgressCallback, ProgressCallback, Stage};
pub use query::{ask, retrieve};
pub use session::{AskOutcome, ProcessOutcome, Session, SessionState};
