//! Configuration types for document processing and question answering.
//!
//! Everything the pipeline needs is held in [`PdfChatConfig`], built via its
//! [`PdfChatConfigBuilder`]. One struct is shared by the processing side
//! (extract → chunk → index) and the question side (retrieve → answer), so
//! both always agree on the index location and the embedding model.

use crate::error::PdfChatError;
use crate::pipeline::embed::Embedder;
use crate::pipeline::llm::ChatModel;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default directory holding the persisted vector index.
pub const DEFAULT_INDEX_DIR: &str = "pdf_index";

/// Configuration for processing documents and answering questions.
///
/// # Example
/// ```rust
/// use pdfchat::PdfChatConfig;
///
/// let config = PdfChatConfig::builder()
///     .index_dir("/tmp/my_index")
///     .top_k(6)
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_size, 1000);
/// ```
#[derive(Clone)]
pub struct PdfChatConfig {
    /// Directory holding the persisted vector index. Default: `pdf_index`.
    ///
    /// The path is fixed for the process: every session reads and replaces the
    /// same artifact.
    pub index_dir: PathBuf,

    /// Maximum chunk length in characters. Default: 1000.
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks. Default: 200.
    pub chunk_overlap: usize,

    /// Number of chunks retrieved per question. Default: 4.
    pub top_k: usize,

    /// Embedding backend used when no [`Embedder`] is injected. Default: Gemini.
    pub embedding_provider: EmbeddingProviderKind,

    /// Embedding model identifier. Default: `models/embedding-001`.
    pub embedding_model: String,

    /// API key for the embedding endpoint. If None, read from the environment.
    pub embedding_api_key: Option<String>,

    /// Base URL override for the embedding endpoint.
    pub embedding_base_url: Option<String>,

    /// Chunks sent per embedding request. Default: 100.
    pub embedding_batch_size: usize,

    /// Pre-constructed embedder. Takes precedence over `embedding_provider`.
    pub embedder: Option<Arc<dyn Embedder>>,

    /// Chat provider name for the answer model (e.g. "gemini", "openai").
    /// If None, uses environment auto-detection.
    pub chat_provider: Option<String>,

    /// Chat model identifier. Default: `gemini-1.5-flash`.
    pub chat_model: String,

    /// Pre-constructed chat model. Takes precedence over `chat_provider`.
    pub chat_model_client: Option<Arc<dyn ChatModel>>,

    /// Sampling temperature for the answer. Default: 0.7.
    pub temperature: f32,

    /// Maximum tokens the model may generate per answer. Default: 2048.
    pub max_tokens: usize,

    /// Timeout for each embedding HTTP request in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Download timeout for URL uploads in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Skip reprocessing when the on-disk index was built from the same
    /// document set. Default: true.
    pub reuse_cached_index: bool,

    /// Custom prompt template with `{context}` and `{question}` placeholders.
    /// If None, uses [`crate::prompts::QA_PROMPT_TEMPLATE`].
    pub prompt_template: Option<String>,

    /// Receiver for extraction progress and stage events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PdfChatConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
            embedding_provider: EmbeddingProviderKind::default(),
            embedding_model: "models/embedding-001".to_string(),
            embedding_api_key: None,
            embedding_base_url: None,
            embedding_batch_size: 100,
            embedder: None,
            chat_provider: None,
            chat_model: "gemini-1.5-flash".to_string(),
            chat_model_client: None,
            temperature: 0.7,
            max_tokens: 2048,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            reuse_cached_index: true,
            prompt_template: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PdfChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfChatConfig")
            .field("index_dir", &self.index_dir)
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("top_k", &self.top_k)
            .field("embedding_provider", &self.embedding_provider)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_api_key", &self.embedding_api_key.as_ref().map(|_| "<redacted>"))
            .field("embedding_base_url", &self.embedding_base_url)
            .field("embedding_batch_size", &self.embedding_batch_size)
            .field("embedder", &self.embedder.as_ref().map(|_| "<dyn Embedder>"))
            .field("chat_provider", &self.chat_provider)
            .field("chat_model", &self.chat_model)
            .field(
                "chat_model_client",
                &self.chat_model_client.as_ref().map(|_| "<dyn ChatModel>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("reuse_cached_index", &self.reuse_cached_index)
            .finish()
    }
}

impl PdfChatConfig {
    /// Create a new builder for `PdfChatConfig`.
    pub fn builder() -> PdfChatConfigBuilder {
        PdfChatConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PdfChatConfig`].
#[derive(Debug)]
pub struct PdfChatConfigBuilder {
    config: PdfChatConfig,
}

impl PdfChatConfigBuilder {
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.index_dir = dir.into();
        self
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.config.chunk_size = n;
        self
    }

    pub fn chunk_overlap(mut self, n: usize) -> Self {
        self.config.chunk_overlap = n;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    pub fn embedding_provider(mut self, kind: EmbeddingProviderKind) -> Self {
        self.config.embedding_provider = kind;
        self
    }

    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    pub fn embedding_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.embedding_api_key = Some(key.into());
        self
    }

    pub fn embedding_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.embedding_base_url = Some(url.into());
        self
    }

    pub fn embedding_batch_size(mut self, n: usize) -> Self {
        self.config.embedding_batch_size = n;
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.config.embedder = Some(embedder);
        self
    }

    pub fn chat_provider(mut self, name: impl Into<String>) -> Self {
        self.config.chat_provider = Some(name.into());
        self
    }

    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.config.chat_model = model.into();
        self
    }

    pub fn chat_model_client(mut self, client: Arc<dyn ChatModel>) -> Self {
        self.config.chat_model_client = Some(client);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn reuse_cached_index(mut self, v: bool) -> Self {
        self.config.reuse_cached_index = v;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PdfChatConfig, PdfChatError> {
        let c = &self.config;
        if c.chunk_size == 0 {
            return Err(PdfChatError::InvalidConfig(
                "chunk_size must be ≥ 1".into(),
            ));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(PdfChatError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if c.top_k == 0 {
            return Err(PdfChatError::InvalidConfig("top_k must be ≥ 1".into()));
        }
        if !c.temperature.is_finite() {
            return Err(PdfChatError::InvalidConfig(format!(
                "temperature must be a number between 0.0 and 2.0, got {}",
                c.temperature
            )));
        }
        if c.embedding_batch_size == 0 {
            return Err(PdfChatError::InvalidConfig(
                "embedding_batch_size must be ≥ 1".into(),
            ));
        }
        if c.embedding_model.trim().is_empty() {
            return Err(PdfChatError::InvalidConfig(
                "embedding_model must not be empty".into(),
            ));
        }
        if let Some(ref template) = c.prompt_template {
            crate::prompts::validate_template(template)?;
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which hosted embedding API turns chunks into vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Google Generative Language API (`batchEmbedContents`). (default)
    #[default]
    Gemini,
    /// Any OpenAI-compatible `/embeddings` endpoint.
    OpenAi,
}

impl EmbeddingProviderKind {
    /// Parse a provider name as accepted on the command line.
    pub fn parse(name: &str) -> Result<Self, PdfChatError> {
        match name.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => Err(PdfChatError::InvalidConfig(format!(
                "unsupported embedding provider '{other}'; use gemini or openai"
            ))),
        }
    }
}

impl fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => f.write_str("gemini"),
            Self::OpenAi => f.write_str("openai"),
        }
    }
}
