//! Result structures produced by each pipeline stage.
//!
//! Every stage returns a concrete type rather than loose strings or JSON
//! values, so a malformed response from an external service fails at the
//! boundary where it was decoded (see [`crate::error::PdfChatError::MalformedResponse`]).

use serde::{Deserialize, Serialize};

/// One extracted page: (document name, page number, text).
///
/// Produced during extraction and folded into the [`Corpus`]; not retained
/// individually after chunking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Name of the source document.
    pub document: String,
    /// 1-indexed page number, cumulative across all documents of the run.
    pub page_number: usize,
    /// Normalised page text, without the trailing marker.
    pub text: String,
}

impl PageRecord {
    /// The boundary marker appended after this page's text in the corpus.
    pub fn marker(&self) -> String {
        page_marker(self.page_number, &self.document)
    }
}

/// Marker line identifying a page and its source document.
pub fn page_marker(page_number: usize, document: &str) -> String {
    format!("\n--- Page {page_number} of document {document} ---\n")
}

/// Concatenated, marker-annotated text of every uploaded document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpus {
    /// Full text, in document-then-page order.
    pub text: String,
    /// Number of pages extracted.
    pub page_count: usize,
    /// Document names in upload order.
    pub documents: Vec<String>,
}

impl Corpus {
    /// Append a page and its marker.
    pub fn push_page(&mut self, page: &PageRecord) {
        self.text.push_str(&page.text);
        self.text.push_str(&page.marker());
        self.page_count += 1;
    }
}

/// A bounded-length slice of the corpus, the unit of embedding and retrieval.
///
/// Chunks carry no page provenance beyond whatever marker lines fall inside
/// their text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in the chunk sequence (0-based).
    pub index: usize,
    /// Offset of the first character in the corpus, in characters.
    pub start: usize,
    /// Chunk text.
    pub text: String,
}

impl Chunk {
    /// Length in characters (Unicode scalar values).
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Offset one past the last character in the corpus, in characters.
    pub fn end(&self) -> usize {
        self.start + self.char_len()
    }
}

/// Summary of one processing run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingReport {
    /// Documents processed, in upload order.
    pub documents: Vec<String>,
    /// Pages extracted across all documents (0 on a cache hit).
    pub page_count: usize,
    /// Characters in the corpus (0 on a cache hit).
    pub corpus_chars: usize,
    /// Chunks in the persisted index.
    pub chunk_count: usize,
    /// Embedding dimension of the persisted index.
    pub dimension: usize,
    /// Content fingerprint of the document set.
    pub fingerprint: String,
    /// True when the existing index already matched the document set.
    pub cache_hit: bool,
    /// Time spent extracting text.
    pub extract_duration_ms: u64,
    /// Time spent embedding chunks and writing the index.
    pub index_duration_ms: u64,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
}

/// A chunk returned by the retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Rank in the result list (0 = nearest).
    pub rank: usize,
    /// Squared Euclidean distance to the query vector (lower = closer).
    pub distance: f32,
    /// Chunk text.
    pub text: String,
}

/// The model's answer to one question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// Raw model output, unmodified.
    pub text: String,
    /// The chunks that were placed in the prompt, nearest first.
    pub sources: Vec<RetrievedChunk>,
    /// Prompt tokens reported by the provider.
    pub input_tokens: usize,
    /// Completion tokens reported by the provider.
    pub output_tokens: usize,
    /// Time spent in the model call.
    pub duration_ms: u64,
}
