//! Full-session tests against in-memory PDFs and stub backends.
//!
//! Run with:
//!   cargo test --test pipeline

mod common;

use common::{config, encrypted_pdf, pdf_document, EchoChat, Recorder, StubEmbedder};
use pdfchat::pipeline::extract::extract_corpus_blocking;
use pdfchat::{
    AskOutcome, Document, PdfChatError, ProcessOutcome, Session, SessionState, Stage, VectorIndex,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

fn processed(outcome: ProcessOutcome) -> pdfchat::ProcessingReport {
    match outcome {
        ProcessOutcome::Processed(report) => report,
        ProcessOutcome::NoDocuments => panic!("expected Processed, got NoDocuments"),
    }
}

fn answered(outcome: AskOutcome) -> pdfchat::Answer {
    match outcome {
        AskOutcome::Answered(answer) => answer,
        other => panic!("expected Answered, got {other:?}"),
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn revenue_question_cites_page_one() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let mut session = Session::new(config(dir.path(), &embedder, &chat, None));

    session.upload(pdf_document("report.pdf", &["Revenue: $5M", "Costs: $2M"]));
    let report = processed(session.process().await.unwrap());
    assert_eq!(report.page_count, 2);
    assert_eq!(report.chunk_count, 1);
    assert!(!report.cache_hit);
    assert_eq!(session.state(), SessionState::Ready);

    let answer = answered(session.ask("What is the revenue?").await.unwrap());
    assert!(answer.text.contains("$5M"), "answer: {}", answer.text);
    assert!(answer
        .text
        .contains("--- Page 1 of document report.pdf ---"));
    assert!(answer.text.contains("What is the revenue?"));
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(*chat.last_temperature.lock().unwrap(), Some(0.7));
}

#[tokio::test]
async fn question_before_processing_makes_no_network_calls() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let cfg = config(&dir.path().join("pdf_index"), &embedder, &chat, None);

    // Engine level: the index is absent.
    let err = pdfchat::ask("What is the revenue?", &cfg).await.unwrap_err();
    assert!(matches!(err, PdfChatError::IndexMissing { .. }));
    assert!(err.is_not_ready());

    // Session level: the question is turned into a warning.
    let session = Session::new(cfg);
    let outcome = session.ask("What is the revenue?").await.unwrap();
    assert!(matches!(outcome, AskOutcome::NotProcessed));

    assert_eq!(embedder.total_calls(), 0);
    assert_eq!(chat.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn processing_zero_uploads_warns_and_keeps_flag_false() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let mut session = Session::new(config(dir.path(), &embedder, &chat, None));

    let outcome = session.process().await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::NoDocuments));
    assert!(!session.is_processed());
    assert!(!VectorIndex::exists(dir.path()));
    assert_eq!(embedder.total_calls(), 0);
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[test]
fn markers_follow_document_then_page_order() {
    let docs = vec![
        pdf_document("a.pdf", &["alpha one", "alpha two"]),
        pdf_document("b.pdf", &["beta one"]),
    ];
    let corpus = extract_corpus_blocking(&docs, None).unwrap();
    assert_eq!(corpus.page_count, 3);

    let markers = [
        "--- Page 1 of document a.pdf ---",
        "--- Page 2 of document a.pdf ---",
        "--- Page 3 of document b.pdf ---",
    ];
    let positions: Vec<usize> = markers
        .iter()
        .map(|m| corpus.text.find(m).unwrap_or_else(|| panic!("missing {m}")))
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));

    // Each page's text comes right before its marker.
    let alpha_two = corpus.text.find("alpha two").unwrap();
    assert!(positions[0] < alpha_two && alpha_two < positions[1]);
}

#[tokio::test]
async fn progress_is_cumulative_and_reaches_one_at_the_end() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let recorder = Arc::new(Recorder::default());
    let mut session = Session::new(config(
        dir.path(),
        &embedder,
        &chat,
        Some(Arc::clone(&recorder)),
    ));

    session.upload(pdf_document("a.pdf", &["first", "second"]));
    session.upload(pdf_document("b.pdf", &["third"]));
    processed(session.process().await.unwrap());

    let fractions = recorder.fractions.lock().unwrap().clone();
    assert_eq!(fractions.len(), 3);
    assert!((fractions[0] - 1.0 / 3.0).abs() < 1e-9);
    assert!((fractions[1] - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(fractions[2], 1.0);
    assert!(fractions[..2].iter().all(|&f| f < 1.0));

    assert_eq!(
        *recorder.documents.lock().unwrap(),
        vec!["a.pdf", "a.pdf", "b.pdf"]
    );
    assert_eq!(
        *recorder.stages.lock().unwrap(),
        vec![Stage::Extracting, Stage::Chunking, Stage::Indexing]
    );
}

#[tokio::test]
async fn corrupt_pdf_ends_the_action_and_keeps_idle() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let mut session = Session::new(config(dir.path(), &embedder, &chat, None));

    session.upload(Document::new("broken.pdf", b"%PDF-1.4\nnot really".to_vec()));
    let err = session.process().await.unwrap_err();
    match err {
        PdfChatError::CorruptPdf { document, .. } => assert_eq!(document, "broken.pdf"),
        other => panic!("expected CorruptPdf, got {other:?}"),
    }
    assert!(!session.is_processed());
    assert!(!VectorIndex::exists(dir.path()));
    assert_eq!(embedder.total_calls(), 0);
}

#[tokio::test]
async fn password_protected_pdf_keeps_idle() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let mut session = Session::new(config(dir.path(), &embedder, &chat, None));

    let bytes = encrypted_pdf(&["Salaries: confidential"]);
    session.upload(Document::from_pdf_bytes("locked.pdf", bytes).unwrap());
    let err = session.process().await.unwrap_err();
    match err {
        PdfChatError::PasswordRequired { document } => assert_eq!(document, "locked.pdf"),
        other => panic!("expected PasswordRequired, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!VectorIndex::exists(dir.path()));
    assert_eq!(embedder.total_calls(), 0);
}

// ── Chunking and indexing ────────────────────────────────────────────────────

fn long_page(topic: &str, lines: usize) -> String {
    (0..lines)
        .map(|i| format!("Line {i} of the {topic} section describes quarterly results in detail."))
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn persisted_chunks_respect_size_and_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let mut session = Session::new(config(dir.path(), &embedder, &chat, None));

    let pages: Vec<String> = ["sales", "costs", "outlook", "risks"]
        .iter()
        .map(|t| long_page(t, 25))
        .collect();
    let page_refs: Vec<&str> = pages.iter().map(String::as_str).collect();
    session.upload(pdf_document("annual.pdf", &page_refs));
    let report = processed(session.process().await.unwrap());
    assert!(report.chunk_count > 4);

    let index = VectorIndex::load(dir.path()).await.unwrap();
    assert_eq!(index.len(), report.chunk_count);
    assert_eq!(index.embedding_model(), "stub-bow-64");
    assert_eq!(index.dimension(), 64);
    assert_eq!(index.manifest().key.chunk_size, 1000);
    assert_eq!(index.manifest().key.chunk_overlap, 200);

    let entries = index.entries().await.unwrap();
    assert_eq!(entries.len(), report.chunk_count);
    for entry in &entries {
        assert!(entry.text.chars().count() <= 1000);
    }
    for pair in entries.windows(2) {
        let prev: Vec<char> = pair[0].text.chars().collect();
        let next: Vec<char> = pair[1].text.chars().collect();
        assert_eq!(prev[prev.len() - 200..], next[..200]);
    }

    // Batch size 8: one embedding request per 8 chunks.
    let expected_calls = report.chunk_count.div_ceil(8);
    assert_eq!(embedder.document_calls.load(Ordering::SeqCst), expected_calls);
    assert_eq!(
        embedder.chunks_embedded.load(Ordering::SeqCst),
        report.chunk_count
    );
}

#[tokio::test]
async fn reprocessing_replaces_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let mut session = Session::new(config(dir.path(), &embedder, &chat, None));

    session.upload(pdf_document("apples.pdf", &["Apple harvest volume doubled"]));
    processed(session.process().await.unwrap());
    let before = answered(session.ask("apple harvest").await.unwrap());
    assert!(before.sources.iter().any(|s| s.text.contains("Apple harvest")));

    session.remove("apples.pdf");
    session.upload(pdf_document("bananas.pdf", &["Banana exports fell sharply"]));
    let report = processed(session.process().await.unwrap());
    assert!(!report.cache_hit);

    let after = answered(session.ask("apple harvest").await.unwrap());
    assert!(!after.sources.is_empty());
    assert!(after.sources.iter().all(|s| !s.text.contains("Apple")));
    assert!(!after.text.contains("apples.pdf"));
}

// ── Content-addressed cache ──────────────────────────────────────────────────

#[tokio::test]
async fn unchanged_uploads_reuse_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let recorder = Arc::new(Recorder::default());
    let mut session = Session::new(config(
        dir.path(),
        &embedder,
        &chat,
        Some(Arc::clone(&recorder)),
    ));

    session.upload(pdf_document("report.pdf", &["Revenue: $5M", "Costs: $2M"]));
    let first = processed(session.process().await.unwrap());
    let calls_after_first = embedder.document_calls.load(Ordering::SeqCst);

    let second = processed(session.process().await.unwrap());
    assert!(second.cache_hit);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(second.chunk_count, first.chunk_count);
    assert_eq!(
        embedder.document_calls.load(Ordering::SeqCst),
        calls_after_first
    );
    assert_eq!(
        *recorder.completions.lock().unwrap(),
        vec![(first.chunk_count, false), (first.chunk_count, true)]
    );
}

#[tokio::test]
async fn changed_chunk_settings_rebuild_the_index() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let page = long_page("sales", 60);

    let mut first = Session::new(config(dir.path(), &embedder, &chat, None));
    first.upload(pdf_document("a.pdf", &[page.as_str()]));
    let wide = processed(first.process().await.unwrap());
    assert!(!wide.cache_hit);

    let narrow_config = pdfchat::PdfChatConfig {
        chunk_size: 300,
        chunk_overlap: 50,
        ..config(dir.path(), &embedder, &chat, None)
    };
    let mut second = Session::new(narrow_config);
    second.upload(pdf_document("a.pdf", &[page.as_str()]));
    let narrow = processed(second.process().await.unwrap());
    assert!(!narrow.cache_hit);
    assert_eq!(narrow.fingerprint, wide.fingerprint);
    assert!(narrow.chunk_count > wide.chunk_count);

    let index = VectorIndex::load(dir.path()).await.unwrap();
    assert_eq!(index.manifest().key.chunk_size, 300);
    let entries = index.entries().await.unwrap();
    assert!(entries.iter().all(|e| e.text.chars().count() <= 300));
}

#[tokio::test]
async fn a_new_upload_invalidates_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let mut session = Session::new(config(dir.path(), &embedder, &chat, None));

    session.upload(pdf_document("report.pdf", &["Revenue: $5M"]));
    let first = processed(session.process().await.unwrap());

    session.upload(pdf_document("notes.pdf", &["Headcount grew to 40"]));
    let second = processed(session.process().await.unwrap());
    assert!(!second.cache_hit);
    assert_ne!(second.fingerprint, first.fingerprint);
    assert_eq!(second.page_count, 2);
}

// ── Session flag ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn changing_uploads_does_not_reset_ready() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let mut session = Session::new(config(dir.path(), &embedder, &chat, None));

    session.upload(pdf_document("report.pdf", &["Revenue: $5M"]));
    processed(session.process().await.unwrap());

    session.clear_uploads();
    assert_eq!(session.state(), SessionState::Ready);

    // The last processed index still answers.
    let answer = answered(session.ask("revenue").await.unwrap());
    assert!(answer.text.contains("$5M"));

    // Processing nothing is a warning, and Ready stays Ready.
    let outcome = session.process().await.unwrap();
    assert!(matches!(outcome, ProcessOutcome::NoDocuments));
    assert!(session.is_processed());
}

#[tokio::test]
async fn deleted_index_while_ready_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let index_dir = dir.path().join("pdf_index");
    let embedder = StubEmbedder::new();
    let chat = EchoChat::new();
    let mut session = Session::new(config(&index_dir, &embedder, &chat, None));

    session.upload(pdf_document("report.pdf", &["Revenue: $5M"]));
    processed(session.process().await.unwrap());
    std::fs::remove_dir_all(&index_dir).unwrap();

    let queries_before = embedder.query_calls.load(Ordering::SeqCst);
    let outcome = session.ask("revenue").await.unwrap();
    assert!(matches!(outcome, AskOutcome::IndexMissing { .. }));
    assert_eq!(embedder.query_calls.load(Ordering::SeqCst), queries_before);
}
