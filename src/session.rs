//! Session state for one interactive user: the current uploads and whether a
//! processing run has completed.
//!
//! ```text
//!            process() with ≥1 upload, success
//!   ┌──────┐ ─────────────────────────────────▶ ┌───────┐
//!   │ Idle │                                    │ Ready │ ◀─┐ process() again
//!   └──────┘ ◀─┐ process() with no uploads      └───────┘ ──┘
//!       └──────┘ (warning, state unchanged)
//! ```
//!
//! There is no transition back to Idle. Uploads can be added or removed in
//! either state without touching the flag; the index on disk keeps answering
//! for the last processed set until the next successful run replaces it.
//!
//! Each [`Session`] owns its own flag, so several sessions in one process do
//! not interfere with each other's state. They do share the index directory
//! from their config.

use crate::config::PdfChatConfig;
use crate::error::PdfChatError;
use crate::output::{Answer, ProcessingReport};
use crate::pipeline::input::{self, Document};
use crate::{process, query};
use std::path::PathBuf;
use tracing::{info, warn};

/// Where a session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing processed yet; questions get a warning.
    Idle,
    /// At least one processing run completed; questions go to the retriever.
    Ready,
}

/// Result of a "process" action.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The index now reflects the current uploads.
    Processed(ProcessingReport),
    /// Nothing was uploaded; the state is unchanged.
    NoDocuments,
}

/// Result of a question.
#[derive(Debug)]
pub enum AskOutcome {
    Answered(Answer),
    /// The session has not processed anything yet.
    NotProcessed,
    /// The session is Ready but the index is gone from disk.
    IndexMissing { path: PathBuf },
}

/// One user's interactive session.
pub struct Session {
    config: PdfChatConfig,
    uploads: Vec<Document>,
    processed: bool,
}

impl Session {
    pub fn new(config: PdfChatConfig) -> Self {
        Self {
            config,
            uploads: Vec::new(),
            processed: false,
        }
    }

    pub fn config(&self) -> &PdfChatConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        if self.processed {
            SessionState::Ready
        } else {
            SessionState::Idle
        }
    }

    /// The "processing completed" flag.
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    /// Current uploads, in upload order.
    pub fn uploads(&self) -> &[Document] {
        &self.uploads
    }

    /// Add a document. An upload with the same name is replaced in place.
    ///
    /// Returns `true` when an existing upload was replaced.
    pub fn upload(&mut self, document: Document) -> bool {
        if let Some(existing) = self.uploads.iter_mut().find(|d| d.name == document.name) {
            *existing = document;
            return true;
        }
        info!("Uploaded {} ({} bytes)", document.name, document.bytes.len());
        self.uploads.push(document);
        false
    }

    /// Load a local path or URL and add it to the uploads.
    pub async fn upload_from(&mut self, input: &str) -> Result<&Document, PdfChatError> {
        let document = input::load_document(input, self.config.download_timeout_secs).await?;
        let name = document.name.clone();
        self.upload(document);
        self.uploads
            .iter()
            .find(|d| d.name == name)
            .ok_or_else(|| PdfChatError::Internal(format!("upload '{}' vanished", name)))
    }

    /// Remove an upload by name.
    pub fn remove(&mut self, name: &str) -> Option<Document> {
        let pos = self.uploads.iter().position(|d| d.name == name)?;
        Some(self.uploads.remove(pos))
    }

    pub fn clear_uploads(&mut self) {
        self.uploads.clear();
    }

    /// Run extraction, chunking and indexing over the current uploads.
    ///
    /// With no uploads this is a warning, not an error: the state stays as it
    /// was. On success the session becomes Ready.
    pub async fn process(&mut self) -> Result<ProcessOutcome, PdfChatError> {
        if self.uploads.is_empty() {
            warn!("Process requested with no uploaded documents");
            return Ok(ProcessOutcome::NoDocuments);
        }
        let report = process::process_documents(&self.uploads, &self.config).await?;
        self.processed = true;
        Ok(ProcessOutcome::Processed(report))
    }

    /// Answer a question, or explain why it cannot be answered yet.
    pub async fn ask(&self, question: &str) -> Result<AskOutcome, PdfChatError> {
        if !self.processed {
            warn!("Question asked before any document was processed");
            return Ok(AskOutcome::NotProcessed);
        }
        match query::ask(question, &self.config).await {
            Ok(answer) => Ok(AskOutcome::Answered(answer)),
            Err(PdfChatError::IndexMissing { path }) => Ok(AskOutcome::IndexMissing { path }),
            Err(e) => Err(e),
        }
    }
}
