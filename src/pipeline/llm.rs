//! Answer generation: send the rendered QA prompt to the hosted chat model.
//!
//! The whole prompt (instructions, retrieved context and question) travels as
//! a single user message; the model's reply is returned verbatim. All prompt
//! wording lives in [`crate::prompts`] so it can change without touching the
//! provider plumbing here.
//!
//! ## No Retries
//!
//! A failed call ends the current question. Rate-limit and credential
//! failures are reported as [`PdfChatError::QuotaExceeded`] and
//! [`PdfChatError::AuthError`] so the user can tell "wait and ask again" apart
//! from "fix your key".

use crate::config::PdfChatConfig;
use crate::error::PdfChatError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Sampling settings for one generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl GenerationOptions {
    pub fn from_config(config: &PdfChatConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Raw model output plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// A hosted text-generation model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Human-readable `provider/model` label for logs.
    fn name(&self) -> String;

    /// Generate a completion for `prompt`.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, PdfChatError>;
}

/// [`ChatModel`] backed by an `edgequake_llm` provider.
pub struct EdgequakeChatModel {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl EdgequakeChatModel {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }
}

#[async_trait]
impl ChatModel for EdgequakeChatModel {
    fn name(&self) -> String {
        self.label.clone()
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<Generation, PdfChatError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];
        let options = build_options(options);

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| classify_llm_error(&self.label, &e))?;

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            self.label,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        Ok(Generation {
            text: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

fn build_options(options: &GenerationOptions) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(options.temperature),
        max_tokens: Some(options.max_tokens),
        ..Default::default()
    }
}

/// Map an `edgequake_llm` error onto the typed error classes shared by chat
/// and embedding calls.
///
/// Returns `None` for failures that fit no class; the caller picks the
/// fallback (`LlmApiError` for chat, `Network` for embeddings).
pub(crate) fn classify_provider_error(service: &str, error: &LlmError) -> Option<PdfChatError> {
    let service = service.to_string();
    let detail = error.to_string();
    match error {
        LlmError::RateLimited(_) => Some(PdfChatError::QuotaExceeded { service, detail }),
        LlmError::AuthError(_) => Some(PdfChatError::AuthError { service, detail }),
        LlmError::NetworkError(_) | LlmError::Timeout => {
            Some(PdfChatError::Network { service, detail })
        }
        LlmError::SerializationError(_) => {
            Some(PdfChatError::MalformedResponse { service, detail })
        }
        LlmError::ConfigError(_) => Some(PdfChatError::ProviderNotConfigured {
            provider: service,
            hint: detail,
        }),
        // Providers report most HTTP failures as free text.
        _ => {
            let lower = detail.to_lowercase();
            if lower.contains("429")
                || lower.contains("rate limit")
                || lower.contains("quota")
                || lower.contains("resource_exhausted")
            {
                Some(PdfChatError::QuotaExceeded { service, detail })
            } else if lower.contains("401")
                || lower.contains("403")
                || lower.contains("unauthorized")
                || lower.contains("permission_denied")
                || lower.contains("invalid api key")
                || lower.contains("api key not valid")
            {
                Some(PdfChatError::AuthError { service, detail })
            } else {
                None
            }
        }
    }
}

fn classify_llm_error(service: &str, error: &LlmError) -> PdfChatError {
    classify_provider_error(service, error).unwrap_or_else(|| PdfChatError::LlmApiError {
        message: error.to_string(),
    })
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn ChatModel>, PdfChatError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PdfChatError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    info!("Using chat model {}/{}", provider_name, model);
    Ok(Arc::new(EdgequakeChatModel::new(
        provider,
        format!("{}/{}", provider_name, model),
    )))
}

fn env_set(var: &str) -> bool {
    std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false)
}

/// Resolve the chat model, from most-specific to least-specific.
///
/// 1. **Injected client** (`config.chat_model_client`), used as-is.
/// 2. **Named provider** (`config.chat_provider`) with `config.chat_model`.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **Gemini** when `GEMINI_API_KEY` or `GOOGLE_API_KEY` is set.
/// 5. **OpenAI** when `OPENAI_API_KEY` is set.
/// 6. Whatever `ProviderFactory::from_env` can auto-detect.
pub fn resolve_chat_model(config: &PdfChatConfig) -> Result<Arc<dyn ChatModel>, PdfChatError> {
    if let Some(ref client) = config.chat_model_client {
        return Ok(Arc::clone(client));
    }

    if let Some(ref name) = config.chat_provider {
        return create_provider(name, &config.chat_model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if env_set("GEMINI_API_KEY") || env_set("GOOGLE_API_KEY") {
        return create_provider("gemini", &config.chat_model);
    }

    if env_set("OPENAI_API_KEY") {
        let model = if config.chat_model.starts_with("gemini") {
            "gpt-4.1-nano"
        } else {
            config.chat_model.as_str()
        };
        return create_provider("openai", model);
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PdfChatError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No chat model could be auto-detected from environment.\n\
                Set GEMINI_API_KEY or OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;
    Ok(Arc::new(EdgequakeChatModel::new(provider, "auto")))
}
