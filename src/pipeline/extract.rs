//! Text extraction: read the text layer of every uploaded PDF into one corpus.
//!
//! ## Why spawn_blocking?
//!
//! Parsing a PDF and decoding its content streams is CPU-bound and
//! synchronous. [`extract_corpus`] moves the whole run onto the blocking pool
//! so the async runtime stays responsive, while the pages themselves are still
//! visited strictly one after another.
//!
//! ## Corpus layout
//!
//! Documents are visited in upload order and pages in document order. Each
//! page's text is followed by a marker line,
//! `--- Page N of document NAME ---`, where `N` counts pages across the whole
//! run starting at 1. The model later relies on these markers to cite its
//! sources.

use crate::error::PdfChatError;
use crate::output::{Corpus, PageRecord};
use crate::pipeline::clean::clean_page_text;
use crate::pipeline::input::Document;
use crate::progress::ProgressCallback;
use std::sync::Arc;
use tracing::{debug, info};

/// A parsed PDF ready for page-by-page extraction.
struct OpenedPdf<'a> {
    name: &'a str,
    document: lopdf::Document,
    /// 1-indexed page numbers in document order.
    pages: Vec<u32>,
}

/// Extract every page of every document into a single corpus.
///
/// Runs inside `spawn_blocking`. Progress is reported through
/// `progress.on_page_extracted` after each page.
///
/// # Errors
/// The first document that cannot be parsed aborts the run with
/// [`PdfChatError::CorruptPdf`] (or [`PdfChatError::PasswordRequired`]); no
/// partial corpus is returned.
pub async fn extract_corpus(
    documents: Arc<Vec<Document>>,
    progress: Option<ProgressCallback>,
) -> Result<Corpus, PdfChatError> {
    tokio::task::spawn_blocking(move || extract_corpus_blocking(&documents, progress.as_ref()))
        .await
        .map_err(|e| PdfChatError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of [`extract_corpus`].
pub fn extract_corpus_blocking(
    documents: &[Document],
    progress: Option<&ProgressCallback>,
) -> Result<Corpus, PdfChatError> {
    // Open everything first: the total page count drives the progress fraction.
    let opened = documents
        .iter()
        .map(open_pdf)
        .collect::<Result<Vec<_>, _>>()?;
    let total_pages: usize = opened.iter().map(|pdf| pdf.pages.len()).sum();
    info!(
        "Extracting text from {} documents ({} pages)",
        opened.len(),
        total_pages
    );

    if let Some(cb) = progress {
        cb.on_extraction_start(total_pages);
    }

    let mut corpus = Corpus {
        documents: documents.iter().map(|d| d.name.clone()).collect(),
        ..Corpus::default()
    };

    for pdf in &opened {
        for &page in &pdf.pages {
            let raw = pdf
                .document
                .extract_text(&[page])
                .map_err(|e| PdfChatError::CorruptPdf {
                    document: pdf.name.to_string(),
                    detail: format!("page {}: {}", page, e),
                })?;

            let record = PageRecord {
                document: pdf.name.to_string(),
                page_number: corpus.page_count + 1,
                text: clean_page_text(&raw),
            };
            debug!(
                "Extracted page {}/{} ({} chars) from {}",
                record.page_number,
                total_pages,
                record.text.len(),
                record.document
            );
            corpus.push_page(&record);

            if let Some(cb) = progress {
                cb.on_page_extracted(corpus.page_count, total_pages, pdf.name);
            }
        }
    }

    if let Some(cb) = progress {
        cb.on_extraction_complete(total_pages);
    }

    info!(
        "Extraction complete: {} pages, {} chars",
        corpus.page_count,
        corpus.text.chars().count()
    );
    Ok(corpus)
}

fn open_pdf(document: &Document) -> Result<OpenedPdf<'_>, PdfChatError> {
    let parsed =
        lopdf::Document::load_mem(&document.bytes).map_err(|e| PdfChatError::CorruptPdf {
            document: document.name.clone(),
            detail: e.to_string(),
        })?;

    if parsed.is_encrypted() {
        return Err(PdfChatError::PasswordRequired {
            document: document.name.clone(),
        });
    }

    let pages: Vec<u32> = parsed.get_pages().keys().copied().collect();
    debug!("Opened {}: {} pages", document.name, pages.len());

    Ok(OpenedPdf {
        name: &document.name,
        document: parsed,
        pages,
    })
}
