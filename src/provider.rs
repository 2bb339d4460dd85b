//! LLM provider resolution shared by the transcription and generation stages.

use crate::error::Pdf2AnkiError;
use edgequake_llm::{
    AnthropicProvider, GeminiProvider, LLMProvider, OpenAIProvider, OpenRouterProvider,
    ProviderFactory, XAIProvider,
};
use std::sync::Arc;
use tracing::debug;

/// Provider chosen when only an API key is supplied.
pub const DEFAULT_KEYED_PROVIDER: &str = "gemini";

/// Default model for a provider when the caller names none.
pub fn default_model(provider_name: &str) -> &'static str {
    match provider_name.to_ascii_lowercase().as_str() {
        "gemini" | "google" | "vertexai" => "gemini-2.5-pro",
        "anthropic" | "claude" => "claude-sonnet-4-20250514",
        "mistral" => "pixtral-12b-2409",
        "ollama" => "llama3.2-vision",
        _ => "gpt-4.1-nano",
    }
}

/// Environment variable the named provider reads its API key from.
pub fn api_key_env_var(provider_name: &str) -> Option<&'static str> {
    match provider_name.to_ascii_lowercase().as_str() {
        "openai" => Some("OPENAI_API_KEY"),
        "anthropic" | "claude" => Some("ANTHROPIC_API_KEY"),
        "gemini" | "google" => Some("GEMINI_API_KEY"),
        "mistral" => Some("MISTRAL_API_KEY"),
        "openrouter" => Some("OPENROUTER_API_KEY"),
        "xai" => Some("XAI_API_KEY"),
        _ => None,
    }
}

/// What the caller asked for, most specific first.
#[derive(Clone, Copy)]
pub struct ProviderRequest<'a> {
    pub provider: Option<&'a Arc<dyn LLMProvider>>,
    pub provider_name: Option<&'a str>,
    pub model: Option<&'a str>,
    pub api_key: Option<&'a str>,
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider**, used as-is.
/// 2. **Named provider** (+ model). With an `api_key` the provider is
///    built around that key; without one the factory reads the provider's
///    environment variable. An `api_key` with no name selects
///    [`DEFAULT_KEYED_PROVIDER`].
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(req: ProviderRequest<'_>) -> Result<Arc<dyn LLMProvider>, Pdf2AnkiError> {
    if let Some(provider) = req.provider {
        return Ok(Arc::clone(provider));
    }

    let name = req
        .provider_name
        .or(req.api_key.map(|_| DEFAULT_KEYED_PROVIDER));

    if let Some(name) = name {
        let model = req.model.unwrap_or_else(|| default_model(name));
        return match req.api_key {
            Some(key) => keyed_provider(name, key, model),
            None => create_provider(name, model),
        };
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, req.model.unwrap_or(&model));
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = req.model.unwrap_or_else(|| default_model("openai"));
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Pdf2AnkiError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --api-key.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Build a provider around an explicit key. The process environment is
/// left untouched.
fn keyed_provider(
    provider_name: &str,
    key: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Pdf2AnkiError> {
    debug!("Creating keyed provider '{}' with model '{}'", provider_name, model);
    let provider: Arc<dyn LLMProvider> = match provider_name.to_ascii_lowercase().as_str() {
        "openai" => Arc::new(OpenAIProvider::new(key).with_model(model)),
        "anthropic" | "claude" => Arc::new(AnthropicProvider::new(key).with_model(model)),
        "gemini" | "google" => Arc::new(GeminiProvider::new(key).with_model(model)),
        "openrouter" => Arc::new(OpenRouterProvider::new(key).with_model(model)),
        "xai" | "grok" => Arc::new(
            XAIProvider::new(key.to_string(), model.to_string(), None).map_err(|e| {
                Pdf2AnkiError::ProviderNotConfigured {
                    provider: provider_name.to_string(),
                    hint: format!("{e}"),
                }
            })?,
        ),
        _ => {
            let hint = match api_key_env_var(provider_name) {
                Some(var) => format!("Set {var} instead of passing --api-key."),
                None => "This provider does not take an API key; drop --api-key.".to_string(),
            };
            return Err(Pdf2AnkiError::ProviderNotConfigured {
                provider: provider_name.to_string(),
                hint,
            });
        }
    };
    Ok(provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Pdf2AnkiError> {
    debug!("Creating provider '{}' with model '{}'", provider_name, model);
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Pdf2AnkiError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}
