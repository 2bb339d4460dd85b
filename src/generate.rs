//! Markdown → flashcard CSV: the generation stage.
//!
//! One prompt, one request. The reply is returned exactly as the model
//! wrote it; nothing here parses or repairs the CSV.

use crate::config::FlashcardConfig;
use crate::error::Pdf2AnkiError;
use crate::output::{count_rows, GeneratedCsv};
use crate::prompts::build_flashcard_prompt;
use crate::provider::{resolve_provider, ProviderRequest};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Generate question/answer pairs for `markdown`.
///
/// # Errors
/// - [`Pdf2AnkiError::EmptyMarkdown`] when there is no text to send
/// - [`Pdf2AnkiError::ProviderNotConfigured`] when no provider resolves
/// - [`Pdf2AnkiError::GenerationFailed`] / [`Pdf2AnkiError::GenerationTimeout`]
///   when the call itself fails
pub async fn generate_qa_csv(
    markdown: &str,
    config: &FlashcardConfig,
) -> Result<GeneratedCsv, Pdf2AnkiError> {
    if markdown.trim().is_empty() {
        return Err(Pdf2AnkiError::EmptyMarkdown);
    }

    let provider = generation_provider(config)?;
    generate_with_provider(&provider, markdown, config).await
}

/// Generate with an already-resolved provider.
pub async fn generate_with_provider(
    provider: &Arc<dyn LLMProvider>,
    markdown: &str,
    config: &FlashcardConfig,
) -> Result<GeneratedCsv, Pdf2AnkiError> {
    if markdown.trim().is_empty() {
        return Err(Pdf2AnkiError::EmptyMarkdown);
    }

    let prompt = build_flashcard_prompt(markdown, config.prompt.as_deref());
    debug!("Flashcard prompt: {} bytes", prompt.len());

    let progress = config.conversion.progress_callback.as_ref();
    if let Some(cb) = progress {
        cb.on_generation_start(markdown.len());
    }

    let messages = vec![ChatMessage::user(prompt)];
    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    };

    let start = Instant::now();
    let response = tokio::time::timeout(
        Duration::from_secs(config.api_timeout_secs),
        provider.chat(&messages, Some(&options)),
    )
    .await
    .map_err(|_| Pdf2AnkiError::GenerationTimeout {
        secs: config.api_timeout_secs,
    })?
    .map_err(|e| Pdf2AnkiError::GenerationFailed {
        message: e.to_string(),
    })?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let rows = count_rows(&response.content);
    info!(
        "Generated {} rows in {}ms ({} tokens in / {} out)",
        rows, duration_ms, response.prompt_tokens, response.completion_tokens
    );

    if let Some(cb) = progress {
        cb.on_generation_complete(rows);
    }

    Ok(GeneratedCsv {
        csv: response.content,
        rows,
        input_tokens: response.prompt_tokens as u64,
        output_tokens: response.completion_tokens as u64,
        duration_ms,
    })
}

/// Resolve the provider for generation, inheriting from the conversion
/// settings wherever the flashcard settings are silent.
///
/// A pre-built conversion provider is reused only when neither a model nor a
/// provider name is set for generation. A model override alone keeps the
/// same provider family (the pre-built provider's `name()`) with the new model.
pub(crate) fn generation_provider(
    config: &FlashcardConfig,
) -> Result<Arc<dyn LLMProvider>, Pdf2AnkiError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let overridden = config.model.is_some() || config.provider_name.is_some();
    let prebuilt = config.conversion.provider.as_ref();
    if let (Some(provider), false) = (prebuilt, overridden) {
        return Ok(Arc::clone(provider));
    }

    let provider_name = config
        .effective_provider_name()
        .or_else(|| prebuilt.map(|p| p.name()));

    // The API key belongs to the conversion provider.
    let same_provider = config.provider_name.is_none()
        || config.provider_name == config.conversion.provider_name;
    let api_key = config
        .conversion
        .api_key
        .as_deref()
        .filter(|_| same_provider);

    resolve_provider(ProviderRequest {
        provider: None,
        provider_name,
        model: config.effective_model(),
        api_key,
    })
}
