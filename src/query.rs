//! Question answering: retrieve the nearest chunks, then ask the chat model.
//!
//! The persisted index is loaded before anything else. When it is absent the
//! question fails with [`PdfChatError::IndexMissing`] without a single network
//! call, so an unconfigured or offline setup still gets a clear "process a
//! document first" answer.

use crate::config::PdfChatConfig;
use crate::error::PdfChatError;
use crate::index::VectorIndex;
use crate::output::{Answer, RetrievedChunk};
use crate::pipeline::{embed, llm};
use crate::prompts::{render_qa_prompt, QA_PROMPT_TEMPLATE};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Return up to `config.top_k` chunks nearest to `question`, nearest first.
pub async fn retrieve(
    question: &str,
    config: &PdfChatConfig,
) -> Result<Vec<RetrievedChunk>, PdfChatError> {
    let index = VectorIndex::load(&config.index_dir).await?;
    let embedder = embed::resolve_embedder(config)?;
    if embedder.model() != index.embedding_model() {
        warn!(
            "Index was built with {} but queries use {}; reprocess to rebuild it",
            index.embedding_model(),
            embedder.model()
        );
    }

    let query_vector = embedder.embed_query(question).await?;
    let hits = index.search(&query_vector, config.top_k).await?;
    debug!(
        "Retrieved {} chunks (nearest distance {:?})",
        hits.len(),
        hits.first().map(|h| h.distance)
    );
    Ok(hits)
}

/// Answer `question` from the persisted index.
///
/// Retrieved chunk texts are joined with blank lines into `{context}`; the
/// model's reply is returned verbatim alongside the sources it was shown.
pub async fn ask(question: &str, config: &PdfChatConfig) -> Result<Answer, PdfChatError> {
    let sources = retrieve(question, config).await?;
    let chat = llm::resolve_chat_model(config)?;

    let template = config
        .prompt_template
        .as_deref()
        .unwrap_or(QA_PROMPT_TEMPLATE);
    let context: Vec<&str> = sources.iter().map(|s| s.text.as_str()).collect();
    let prompt = render_qa_prompt(template, &context, question);

    let start = Instant::now();
    let generation = chat
        .generate(&prompt, &llm::GenerationOptions::from_config(config))
        .await?;
    let duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Answered with {}: {} input tokens, {} output tokens, {}ms",
        chat.name(),
        generation.input_tokens,
        generation.output_tokens,
        duration_ms
    );

    Ok(Answer {
        text: generation.text,
        sources,
        input_tokens: generation.input_tokens,
        output_tokens: generation.output_tokens,
        duration_ms,
    })
}
