//! Upload handling: turn a user-supplied path or URL into an in-memory [`Document`].
//!
//! Documents are held as bytes for the lifetime of a processing request only;
//! nothing is written to disk. The `%PDF` magic bytes are checked up front so
//! a stray `.docx` is rejected with [`PdfChatError::NotAPdf`] instead of
//! failing deep inside the parser.

use crate::error::PdfChatError;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// A named PDF blob.
#[derive(Clone, PartialEq, Eq)]
pub struct Document {
    /// Display name (the file name, or the last URL path segment).
    pub name: String,
    /// Raw PDF bytes.
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Build a document from bytes, rejecting anything that is not a PDF.
    pub fn from_pdf_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, PdfChatError> {
        let name = name.into();
        check_magic(&name, &bytes)?;
        Ok(Self { name, bytes })
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("name", &self.name)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local file or download a URL into a [`Document`].
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<Document, PdfChatError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(Path::new(input))
    }
}

/// Read a local file, validating existence and PDF magic bytes.
pub fn load_local(path: &Path) -> Result<Document, PdfChatError> {
    let path = path.to_path_buf();
    if !path.exists() {
        return Err(PdfChatError::FileNotFound { path });
    }

    let mut bytes = Vec::new();
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            f.read_to_end(&mut bytes)
                .map_err(|e| PdfChatError::Internal(format!("Failed to read {}: {e}", path.display())))?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfChatError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PdfChatError::FileNotFound { path });
        }
    }

    let name = display_name(&path);
    check_magic(&name, &bytes)?;
    debug!("Loaded local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(Document { name, bytes })
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Document, PdfChatError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PdfChatError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PdfChatError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| PdfChatError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    check_magic(&name, &bytes)?;
    info!("Downloaded {} ({} bytes)", name, bytes.len());
    Ok(Document { name, bytes })
}

/// Reject byte buffers that do not start with `%PDF`.
fn check_magic(name: &str, bytes: &[u8]) -> Result<(), PdfChatError> {
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        return Err(PdfChatError::NotAPdf {
            document: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Extract a reasonable filename from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}
