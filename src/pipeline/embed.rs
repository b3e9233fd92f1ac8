//! Embedding stage: turn chunk texts and questions into vectors.
//!
//! The [`Embedder`] trait is the seam between the pipeline and the hosted
//! embedding service. The shipped implementation, [`ProviderEmbedder`], wraps
//! an `edgequake_llm` [`EmbeddingProvider`]:
//!
//! | `embedding_provider` | edgequake provider   | Key                                |
//! |----------------------|----------------------|------------------------------------|
//! | `gemini`             | [`GeminiProvider`]   | `GEMINI_API_KEY` / `GOOGLE_API_KEY` |
//! | `openai`             | [`OpenAIProvider`]   | `OPENAI_API_KEY`                   |
//!
//! Tests and embedding hosts not listed here plug in through
//! [`crate::config::PdfChatConfigBuilder::embedder`].
//!
//! Requests are never retried: a quota or auth failure surfaces immediately as
//! a typed [`PdfChatError`] and ends the current action.

use crate::config::{EmbeddingProviderKind, PdfChatConfig};
use crate::error::PdfChatError;
use crate::pipeline::llm::classify_provider_error;
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use edgequake_llm::{EmbeddingProvider, GeminiProvider, OpenAIProvider};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Model used for the OpenAI backend when the configured model is a Gemini one.
pub const OPENAI_DEFAULT_MODEL: &str = "text-embedding-3-small";

/// A text embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, persisted in the index so a model switch invalidates it.
    fn model(&self) -> &str;

    /// Embed a batch of chunk texts, preserving order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PdfChatError>;

    /// Embed one search query.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PdfChatError>;
}

/// [`Embedder`] backed by an `edgequake_llm` embedding provider.
pub struct ProviderEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    service: String,
    timeout: Duration,
}

impl ProviderEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, timeout: Duration) -> Self {
        let service = format!("{} embeddings", provider.name());
        Self {
            provider,
            service,
            timeout,
        }
    }

    /// Run one provider call under the configured API timeout.
    async fn call<T, F>(&self, request: F) -> Result<T, PdfChatError>
    where
        F: Future<Output = edgequake_llm::Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify_provider_error(&self.service, &e).unwrap_or_else(|| {
                PdfChatError::Network {
                    service: self.service.clone(),
                    detail: e.to_string(),
                }
            })),
            Err(_) => Err(PdfChatError::Network {
                service: self.service.clone(),
                detail: format!("no response after {}s", self.timeout.as_secs()),
            }),
        }
    }
}

#[async_trait]
impl Embedder for ProviderEmbedder {
    fn model(&self) -> &str {
        self.provider.model()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PdfChatError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.call(self.provider.embed(texts)).await?;
        check_count(&self.service, vectors.len(), texts.len())?;
        Ok(vectors)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PdfChatError> {
        self.call(self.provider.embed_one(text)).await
    }
}

fn check_count(service: &str, got: usize, expected: usize) -> Result<(), PdfChatError> {
    if got != expected {
        return Err(PdfChatError::MalformedResponse {
            service: service.to_string(),
            detail: format!("returned {} embeddings for {} inputs", got, expected),
        });
    }
    Ok(())
}

// ── Resolution and batching ──────────────────────────────────────────────────

/// Pick the embedder for a run.
///
/// Resolution order:
/// 1. `config.embedder` (injected instance)
/// 2. `config.embedding_provider` with `config.embedding_api_key`
/// 3. the same provider with its key read from the environment
///    (`GEMINI_API_KEY` / `GOOGLE_API_KEY`, or `OPENAI_API_KEY`)
///
/// A missing key is [`PdfChatError::ProviderNotConfigured`]; there is no
/// fallback to a mock provider.
pub fn resolve_embedder(config: &PdfChatConfig) -> Result<Arc<dyn Embedder>, PdfChatError> {
    if let Some(ref embedder) = config.embedder {
        return Ok(Arc::clone(embedder));
    }
    let provider = create_embedding_provider(config)?;
    info!(
        "Using {} embeddings ({})",
        provider.name(),
        provider.model()
    );
    Ok(Arc::new(ProviderEmbedder::new(
        provider,
        Duration::from_secs(config.api_timeout_secs),
    )))
}

fn create_embedding_provider(
    config: &PdfChatConfig,
) -> Result<Arc<dyn EmbeddingProvider>, PdfChatError> {
    match config.embedding_provider {
        EmbeddingProviderKind::Gemini => {
            let key = api_key(config, &["GEMINI_API_KEY", "GOOGLE_API_KEY"]).ok_or_else(|| {
                PdfChatError::ProviderNotConfigured {
                    provider: "gemini".into(),
                    hint: "Set GEMINI_API_KEY (or GOOGLE_API_KEY) to use Gemini embeddings."
                        .into(),
                }
            })?;
            if config.embedding_base_url.is_some() {
                warn!("embedding_base_url only applies to OpenAI-compatible embeddings; ignoring it");
            }
            let model = gemini_model_id(&config.embedding_model);
            Ok(Arc::new(
                GeminiProvider::new(key.trim()).with_embedding_model(model),
            ))
        }
        EmbeddingProviderKind::OpenAi => {
            let key = api_key(config, &["OPENAI_API_KEY"]).ok_or_else(|| {
                PdfChatError::ProviderNotConfigured {
                    provider: "openai".into(),
                    hint: "Set OPENAI_API_KEY to use OpenAI embeddings.".into(),
                }
            })?;
            let model = if config.embedding_model.starts_with("models/") {
                OPENAI_DEFAULT_MODEL
            } else {
                config.embedding_model.as_str()
            };
            let provider = match config.embedding_base_url {
                Some(ref base) => OpenAIProvider::compatible(key.trim(), base.as_str()),
                None => OpenAIProvider::new(key.trim()),
            };
            Ok(Arc::new(provider.with_embedding_model(model)))
        }
    }
}

/// The Gemini provider adds the `models/` prefix itself.
fn gemini_model_id(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

fn api_key(config: &PdfChatConfig, env_vars: &[&str]) -> Option<String> {
    config
        .embedding_api_key
        .clone()
        .or_else(|| env_vars.iter().find_map(|var| std::env::var(var).ok()))
        .filter(|key| !key.trim().is_empty())
}

/// Embed `texts` in sequential batches of at most `batch_size`.
///
/// Reports `on_chunks_embedded(done, total)` after each batch and checks that
/// every returned vector has the same, non-zero dimension.
pub async fn embed_in_batches(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<Vec<f32>>, PdfChatError> {
    let batch_size = batch_size.max(1);
    let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let embedded = embedder.embed_documents(batch).await?;
        check_count(embedder.model(), embedded.len(), batch.len())?;
        vectors.extend(embedded);
        debug!("Embedded {}/{} chunks", vectors.len(), texts.len());
        if let Some(cb) = progress {
            cb.on_chunks_embedded(vectors.len(), texts.len());
        }
    }

    if let Some(first) = vectors.first() {
        let dimension = first.len();
        if dimension == 0 {
            return Err(PdfChatError::MalformedResponse {
                service: embedder.model().to_string(),
                detail: "returned an empty embedding vector".to_string(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(PdfChatError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::LlmError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model(&self) -> &str {
            "counting"
        }

        async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PdfChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, PdfChatError> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    /// Provider that answers with a fixed result for every call.
    struct ScriptedProvider {
        reply: fn(&[String]) -> edgequake_llm::Result<Vec<Vec<f32>>>,
    }

    #[async_trait]
    impl EmbeddingProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-embed"
        }

        fn dimension(&self) -> usize {
            2
        }

        fn max_tokens(&self) -> usize {
            512
        }

        async fn embed(&self, texts: &[String]) -> edgequake_llm::Result<Vec<Vec<f32>>> {
            (self.reply)(texts)
        }
    }

    fn wrap(reply: fn(&[String]) -> edgequake_llm::Result<Vec<Vec<f32>>>) -> ProviderEmbedder {
        ProviderEmbedder::new(
            Arc::new(ScriptedProvider { reply }),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn provider_vectors_pass_through() {
        let embedder = wrap(|texts| Ok(texts.iter().map(|t| vec![t.len() as f32, 0.5]).collect()));
        assert_eq!(embedder.model(), "scripted-embed");

        let docs = embedder
            .embed_documents(&["ab".to_string(), "abcd".to_string()])
            .await
            .unwrap();
        assert_eq!(docs, vec![vec![2.0, 0.5], vec![4.0, 0.5]]);

        let query = embedder.embed_query("abc").await.unwrap();
        assert_eq!(query, vec![3.0, 0.5]);
    }

    #[tokio::test]
    async fn short_provider_reply_is_malformed() {
        let embedder = wrap(|_| Ok(vec![vec![1.0, 1.0]]));
        let err = embedder
            .embed_documents(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, PdfChatError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn provider_rate_limit_is_quota() {
        let embedder = wrap(|_| Err(LlmError::RateLimited("slow down".into())));
        let err = embedder.embed_query("q").await.unwrap_err();
        match err {
            PdfChatError::QuotaExceeded { service, .. } => {
                assert_eq!(service, "scripted embeddings")
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unclassified_provider_error_is_network() {
        let embedder = wrap(|_| Err(LlmError::ApiError("502 bad gateway".into())));
        let err = embedder
            .embed_documents(&["a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, PdfChatError::Network { .. }));
    }

    #[test]
    fn gemini_model_prefix_is_stripped() {
        assert_eq!(gemini_model_id("models/embedding-001"), "embedding-001");
        assert_eq!(gemini_model_id("text-embedding-004"), "text-embedding-004");
    }

    #[test]
    fn injected_embedder_wins() {
        let injected: Arc<dyn Embedder> = Arc::new(CountingEmbedder {
            calls: AtomicUsize::new(0),
        });
        let config = PdfChatConfig::builder()
            .embedder(Arc::clone(&injected))
            .build()
            .unwrap();
        let resolved = resolve_embedder(&config).unwrap();
        assert_eq!(resolved.model(), "counting");
    }

    #[test]
    fn openai_backend_swaps_gemini_default_model() {
        let config = PdfChatConfig::builder()
            .embedding_provider(EmbeddingProviderKind::OpenAi)
            .embedding_api_key("sk-test")
            .build()
            .unwrap();
        let resolved = resolve_embedder(&config).unwrap();
        assert_eq!(resolved.model(), OPENAI_DEFAULT_MODEL);
    }

    #[test]
    fn gemini_backend_uses_configured_model() {
        let config = PdfChatConfig::builder()
            .embedding_api_key("test-key")
            .embedding_model("models/text-embedding-004")
            .build()
            .unwrap();
        let resolved = resolve_embedder(&config).unwrap();
        assert_eq!(resolved.model(), "text-embedding-004");
    }

    #[tokio::test]
    async fn batches_are_sequential_and_sized() {
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let texts: Vec<String> = (0..7).map(|i| format!("chunk {i}")).collect();
        let vectors = embed_in_batches(&embedder, &texts, 3, None).await.unwrap();
        assert_eq!(vectors.len(), 7);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_texts_no_calls() {
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
        };
        let vectors = embed_in_batches(&embedder, &[], 3, None).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }
}
