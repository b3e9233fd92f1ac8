//! Processing orchestration: uploads → corpus → chunks → persisted index.
//!
//! [`process_documents`] runs the three stages strictly in sequence and only
//! touches the on-disk index at the very end, so a failure in extraction or
//! embedding leaves the previous index in place.

use crate::cache::Fingerprint;
use crate::config::PdfChatConfig;
use crate::error::PdfChatError;
use crate::index::{IndexKey, VectorIndex};
use crate::output::ProcessingReport;
use crate::pipeline::{chunk, embed, extract, input::Document};
use crate::progress::Stage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Build (or reuse) the vector index for an ordered set of uploads.
///
/// ## Steps
///
/// 1. Reject an empty upload set with [`PdfChatError::NoDocuments`]
/// 2. Fingerprint the uploads; if the index on disk was built with the same
///    [`IndexKey`] (fingerprint, embedding model, chunk size and overlap),
///    stop here (`cache_hit = true`)
/// 3. Extract every page into one marker-annotated corpus
/// 4. Split the corpus into overlapping chunks
/// 5. Embed the chunks batch by batch and replace the index on disk
///
/// # Errors
/// Any extraction, embedding or write failure ends the run. The previous
/// index is only replaced once every chunk has been embedded.
pub async fn process_documents(
    documents: &[Document],
    config: &PdfChatConfig,
) -> Result<ProcessingReport, PdfChatError> {
    let total_start = Instant::now();

    if documents.is_empty() {
        return Err(PdfChatError::NoDocuments);
    }

    let fingerprint = Fingerprint::of_documents(documents);
    let names: Vec<String> = documents.iter().map(|d| d.name.clone()).collect();
    info!(
        "Processing {} documents (fingerprint {})",
        documents.len(),
        fingerprint.short()
    );

    let embedder = embed::resolve_embedder(config)?;
    let progress = config.progress_callback.as_ref();
    let key = IndexKey {
        fingerprint: fingerprint.clone(),
        embedding_model: embedder.model().to_string(),
        chunk_size: config.chunk_size,
        chunk_overlap: config.chunk_overlap,
    };

    // ── Cache check ──────────────────────────────────────────────────────
    if config.reuse_cached_index {
        if let Some(cached) = cached_index(config, &key).await {
            info!(
                "Index at {} already matches these documents; skipping processing",
                config.index_dir.display()
            );
            if let Some(cb) = progress {
                cb.on_processing_complete(cached.len(), true);
            }
            return Ok(ProcessingReport {
                documents: names,
                chunk_count: cached.len(),
                dimension: cached.dimension(),
                fingerprint: fingerprint.to_string(),
                cache_hit: true,
                total_duration_ms: total_start.elapsed().as_millis() as u64,
                ..ProcessingReport::default()
            });
        }
    }

    // ── Stage 1: Extract ─────────────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_stage(Stage::Extracting);
    }
    let extract_start = Instant::now();
    let corpus =
        extract::extract_corpus(Arc::new(documents.to_vec()), config.progress_callback.clone())
            .await?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    let corpus_chars = corpus.text.chars().count();

    // ── Stage 2: Chunk ───────────────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_stage(Stage::Chunking);
    }
    let chunks = chunk::split_text(&corpus.text, config.chunk_size, config.chunk_overlap);
    info!(
        "Split {} chars from {} pages into {} chunks",
        corpus_chars,
        corpus.page_count,
        chunks.len()
    );
    if chunks.is_empty() {
        warn!("No text could be extracted; the index will be empty");
    }

    // ── Stage 3: Embed + persist ─────────────────────────────────────────
    if let Some(cb) = progress {
        cb.on_stage(Stage::Indexing);
    }
    let index_start = Instant::now();
    let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
    let vectors =
        embed::embed_in_batches(embedder.as_ref(), &texts, config.embedding_batch_size, progress)
            .await?;
    let index = VectorIndex::create(&config.index_dir, key, texts, vectors).await?;
    let index_duration_ms = index_start.elapsed().as_millis() as u64;

    if let Some(cb) = progress {
        cb.on_processing_complete(index.len(), false);
    }

    let report = ProcessingReport {
        documents: names,
        page_count: corpus.page_count,
        corpus_chars,
        chunk_count: index.len(),
        dimension: index.dimension(),
        fingerprint: fingerprint.to_string(),
        cache_hit: false,
        extract_duration_ms,
        index_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Processing complete: {} pages, {} chunks in {}ms",
        report.page_count, report.chunk_count, report.total_duration_ms
    );
    Ok(report)
}

/// The on-disk index, if it was built with exactly this key.
async fn cached_index(config: &PdfChatConfig, key: &IndexKey) -> Option<VectorIndex> {
    match VectorIndex::load(&config.index_dir).await {
        Ok(index) if index.manifest().key == *key => Some(index),
        Ok(_) => {
            debug!(
                "Index at {} was built with different inputs; rebuilding",
                config.index_dir.display()
            );
            None
        }
        Err(PdfChatError::IndexMissing { .. }) => None,
        Err(e) => {
            warn!("Ignoring unreadable index: {}", e);
            None
        }
    }
}
