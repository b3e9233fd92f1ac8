//! Progress-callback trait for document processing events.
//!
//! Inject an [`Arc<dyn ProcessingProgressCallback>`] via
//! [`crate::config::PdfChatConfigBuilder::progress_callback`] to receive
//! stage changes and per-page extraction progress while documents are
//! processed.
//!
//! Extraction is strictly sequential, so events arrive in order: one
//! `on_extraction_start`, then one `on_page_extracted` per page with a
//! monotonically increasing `pages_processed`, then `on_extraction_complete`.
//!
//! # Example
//!
//! ```rust
//! use pdfchat::{ProcessingProgressCallback, PdfChatConfig};
//! use std::sync::{Arc, Mutex};
//!
//! struct Recorder {
//!     fractions: Mutex<Vec<f64>>,
//! }
//!
//! impl ProcessingProgressCallback for Recorder {
//!     fn on_page_extracted(&self, pages_processed: usize, total_pages: usize, _document: &str) {
//!         let f = pdfchat::progress::fraction(pages_processed, total_pages);
//!         self.fractions.lock().unwrap().push(f);
//!     }
//! }
//!
//! let recorder = Arc::new(Recorder { fractions: Mutex::new(Vec::new()) });
//! let config = PdfChatConfig::builder()
//!     .progress_callback(recorder as Arc<dyn ProcessingProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

/// The user-visible stages of a processing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Reading the text layer of every uploaded PDF.
    Extracting,
    /// Splitting the corpus into overlapping chunks.
    Chunking,
    /// Embedding chunks and persisting the vector index.
    Indexing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Extracting => f.write_str("Extracting text from the PDFs..."),
            Stage::Chunking => f.write_str("Splitting the text into chunks..."),
            Stage::Indexing => f.write_str("Building the vector index..."),
        }
    }
}

/// Called by the processing pipeline as it works through the uploads.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ProcessingProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called once before the first page is extracted.
    ///
    /// # Arguments
    /// * `total_pages` — page count summed over every uploaded document
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after each page's text has been appended to the corpus.
    ///
    /// # Arguments
    /// * `pages_processed` — pages done so far, cumulative across documents
    /// * `total_pages`     — page count summed over every uploaded document
    /// * `document`        — name of the document the page belongs to
    fn on_page_extracted(&self, pages_processed: usize, total_pages: usize, document: &str) {
        let _ = (pages_processed, total_pages, document);
    }

    /// Called once after the last page of the last document.
    fn on_extraction_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after each embedding request returns.
    ///
    /// # Arguments
    /// * `chunks_embedded` — chunks embedded so far
    /// * `total_chunks`    — chunks in this run
    fn on_chunks_embedded(&self, chunks_embedded: usize, total_chunks: usize) {
        let _ = (chunks_embedded, total_chunks);
    }

    /// Called once the index has been persisted (or reused from cache).
    fn on_processing_complete(&self, chunk_count: usize, cache_hit: bool) {
        let _ = (chunk_count, cache_hit);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ProcessingProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PdfChatConfig`].
pub type ProgressCallback = Arc<dyn ProcessingProgressCallback>;

/// Fractional progress `done / total`, clamped to `0.0..=1.0`.
///
/// An empty run (`total == 0`) reports `0.0`: nothing was processed, so the
/// bar never shows completion for work that did not happen.
pub fn fraction(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64).clamp(0.0, 1.0)
}
