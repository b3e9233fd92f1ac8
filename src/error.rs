//! Error types for the pdfchat library.
//!
//! Every failure the pipeline can hit is a variant of [`PdfChatError`]. Two
//! of them are *expected* in normal use and are not really failures at all:
//!
//! * [`PdfChatError::NoDocuments`]  — "process" was requested with nothing uploaded
//! * [`PdfChatError::IndexMissing`] — no persisted index exists at the configured path
//!
//! A question asked before processing never reaches the engine; the session
//! answers it with [`crate::AskOutcome::NotProcessed`].
//!
//! [`PdfChatError::is_not_ready`] groups them so the presentation layer can show
//! a warning instead of an error. Everything else (bad PDF, embedding or model
//! API failures) ends the current action and is reported as-is.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdfchat library.
#[derive(Debug, Error)]
pub enum PdfChatError {
    // ── Session-state errors ─────────────────────────────────────────────
    /// Processing was requested but no document has been uploaded.
    #[error("No PDF documents uploaded.\nUpload at least one PDF before processing.")]
    NoDocuments,

    /// The vector index does not exist on disk.
    #[error("Vector index not found at '{path}'.\nUpload and process a PDF first.")]
    IndexMissing { path: PathBuf },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The upload is not a PDF.
    #[error("'{document}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { document: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The PDF structure could not be parsed or its text could not be read.
    #[error("PDF '{document}' could not be read: {detail}")]
    CorruptPdf { document: String, detail: String },

    /// The PDF is encrypted.
    #[error("PDF '{document}' is encrypted; decrypt it before uploading.")]
    PasswordRequired { document: String },

    // ── External service errors ───────────────────────────────────────────
    /// The embedding or chat provider is not initialised (missing API key etc.).
    #[error("Provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Transport failure or unexpected HTTP status from an external API.
    #[error("Request to {service} failed: {detail}")]
    Network { service: String, detail: String },

    /// The external API reported HTTP 429 / quota exhaustion.
    #[error("Quota exceeded for {service}: {detail}")]
    QuotaExceeded { service: String, detail: String },

    /// The external API rejected the credentials (401/403).
    #[error("Authentication error from {service}: {detail}")]
    AuthError { service: String, detail: String },

    /// The external API answered with a body that does not match the expected shape.
    #[error("Malformed response from {service}: {detail}")]
    MalformedResponse { service: String, detail: String },

    /// The chat model returned a non-retryable error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    // ── Index errors ──────────────────────────────────────────────────────
    /// Query embedding and index vectors have different lengths.
    #[error("Embedding dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The index exists but its tables cannot be read.
    #[error("Vector index at '{path}' is corrupt: {detail}\nReprocess your documents to rebuild it.")]
    IndexCorrupt { path: PathBuf, detail: String },

    /// Could not write the index tables.
    #[error("Failed to write vector index '{path}': {detail}")]
    IndexWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PdfChatError {
    /// `true` for the "not ready yet" conditions the user can fix by uploading
    /// or processing documents.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            PdfChatError::NoDocuments | PdfChatError::IndexMissing { .. }
        )
    }

    /// Map a non-success HTTP status from an external API to a typed error.
    pub fn from_status(service: &str, status: u16, body: String) -> Self {
        let service = service.to_string();
        match status {
            429 => PdfChatError::QuotaExceeded {
                service,
                detail: body,
            },
            401 | 403 => PdfChatError::AuthError {
                service,
                detail: body,
            },
            _ => PdfChatError::Network {
                service,
                detail: format!("HTTP {status}: {body}"),
            },
        }
    }
}
