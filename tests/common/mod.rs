//! Shared fixtures for the integration tests: in-memory PDFs and stub
//! embedding/chat backends that never touch the network.

#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, Stream};
use pdfchat::{
    ChatModel, Embedder, Generation, GenerationOptions, PdfChatConfig, PdfChatError,
    ProcessingProgressCallback, Stage,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── PDFs ─────────────────────────────────────────────────────────────────────

/// Build a PDF with one page per entry; each line of an entry becomes a line
/// of text on that page.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    build_pdf(pages, false)
}

/// Like [`pdf_with_pages`], with a standard security handler in the trailer.
pub fn encrypted_pdf(pages: &[&str]) -> Vec<u8> {
    build_pdf(pages, true)
}

fn build_pdf(pages: &[&str], encrypted: bool) -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        // One text object per line: the extractor ends a line at each ET.
        let mut operations = Vec::new();
        for (i, line) in text.lines().enumerate() {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
                Operation::new(
                    "Td",
                    vec![Object::Integer(72), Object::Integer(720 - 14 * i as i64)],
                ),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ]);
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    if encrypted {
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => Object::Integer(1),
            "R" => Object::Integer(2),
            "O" => Object::string_literal(vec![0u8; 32]),
            "U" => Object::string_literal(vec![0u8; 32]),
            "P" => Object::Integer(-4),
        });
        doc.trailer.set("Encrypt", encrypt_id);
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialise pdf");
    bytes
}

pub fn pdf_document(name: &str, pages: &[&str]) -> pdfchat::Document {
    pdfchat::Document::from_pdf_bytes(name, pdf_with_pages(pages)).expect("valid pdf")
}

// ── Embedder ─────────────────────────────────────────────────────────────────

const DIMENSION: usize = 64;

/// Deterministic bag-of-words embedder: every lowercase alphanumeric token is
/// hashed (FNV-1a) into one of 64 buckets.
#[derive(Default)]
pub struct StubEmbedder {
    pub document_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub chunks_embedded: AtomicUsize,
}

impl StubEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn total_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst) + self.query_calls.load(Ordering::SeqCst)
    }

    fn vectorise(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; DIMENSION];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for b in token.to_lowercase().bytes() {
                hash ^= b as u64;
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
            v[(hash % DIMENSION as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    fn model(&self) -> &str {
        "stub-bow-64"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PdfChatError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        self.chunks_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vectorise(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PdfChatError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vectorise(text))
    }
}

// ── Chat model ───────────────────────────────────────────────────────────────

/// Returns the prompt it was given, so tests can see exactly which context
/// reached the model.
#[derive(Default)]
pub struct EchoChat {
    pub calls: AtomicUsize,
    pub last_temperature: Mutex<Option<f32>>,
}

impl EchoChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ChatModel for EchoChat {
    fn name(&self) -> String {
        "stub/echo".into()
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, PdfChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_temperature.lock().unwrap() = Some(options.temperature);
        Ok(Generation {
            text: prompt.to_string(),
            input_tokens: prompt.len() / 4,
            output_tokens: prompt.len() / 4,
        })
    }
}

// ── Progress recorder ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Recorder {
    pub stages: Mutex<Vec<Stage>>,
    pub fractions: Mutex<Vec<f64>>,
    pub documents: Mutex<Vec<String>>,
    pub completions: Mutex<Vec<(usize, bool)>>,
}

impl ProcessingProgressCallback for Recorder {
    fn on_stage(&self, stage: Stage) {
        self.stages.lock().unwrap().push(stage);
    }

    fn on_page_extracted(&self, pages_processed: usize, total_pages: usize, document: &str) {
        self.fractions
            .lock()
            .unwrap()
            .push(pdfchat::progress::fraction(pages_processed, total_pages));
        self.documents.lock().unwrap().push(document.to_string());
    }

    fn on_processing_complete(&self, chunk_count: usize, cache_hit: bool) {
        self.completions
            .lock()
            .unwrap()
            .push((chunk_count, cache_hit));
    }
}

// ── Config ───────────────────────────────────────────────────────────────────

pub fn config(
    index_dir: &Path,
    embedder: &Arc<StubEmbedder>,
    chat: &Arc<EchoChat>,
    progress: Option<Arc<Recorder>>,
) -> PdfChatConfig {
    let mut builder = PdfChatConfig::builder()
        .index_dir(index_dir)
        .embedder(Arc::clone(embedder) as Arc<dyn Embedder>)
        .chat_model_client(Arc::clone(chat) as Arc<dyn ChatModel>)
        .embedding_batch_size(8);
    if let Some(recorder) = progress {
        builder = builder.progress_callback(recorder as Arc<dyn ProcessingProgressCallback>);
    }
    builder.build().expect("valid test config")
}
