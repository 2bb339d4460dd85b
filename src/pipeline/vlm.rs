//! VLM interaction: turn one rasterised page into Markdown.
//!
//! Each page gets exactly one request, bounded by `api_timeout_secs`. A
//! failure never propagates: it is recorded in the returned [`PageResult`]
//! so one unreadable slide doesn't cost the whole deck.

use crate::config::ConversionConfig;
use crate::error::PageError;
use crate::output::PageResult;
use crate::prompts::{maintain_format_context, transcription_prompt};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Build the chat messages for one page.
///
/// Layout: system prompt, optional prior-page context (maintain_format),
/// then a user turn carrying the page image with empty text.
fn build_messages(
    image_data: ImageData,
    prior_page: Option<&str>,
    config: &ConversionConfig,
) -> Vec<ChatMessage> {
    let system_prompt = config
        .system_prompt
        .clone()
        .unwrap_or_else(|| transcription_prompt(config.fidelity));

    let mut messages = vec![ChatMessage::system(system_prompt)];

    if config.maintain_format {
        if let Some(prior) = prior_page.filter(|p| !p.trim().is_empty()) {
            messages.push(ChatMessage::system(maintain_format_context(prior)));
        }
    }

    messages.push(ChatMessage::user_with_images("", vec![image_data]));
    messages
}

/// Transcribe a single page (1-indexed `page_num`).
pub async fn process_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image_data: ImageData,
    prior_page: Option<&str>,
    config: &ConversionConfig,
) -> PageResult {
    let start = Instant::now();
    let messages = build_messages(image_data, prior_page, config);
    let options = build_options(config);
    let timeout = Duration::from_secs(config.api_timeout_secs);

    let outcome = tokio::time::timeout(timeout, provider.chat(&messages, Some(&options))).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(Ok(response)) => {
            debug!(
                "Page {}: {} input tokens, {} output tokens, {}ms",
                page_num, response.prompt_tokens, response.completion_tokens, duration_ms
            );
            PageResult {
                page_num,
                markdown: response.content,
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
                duration_ms,
                error: None,
            }
        }
        Ok(Err(e)) => {
            warn!("Page {}: LLM call failed: {}", page_num, e);
            PageResult::failed(
                page_num,
                PageError::LlmFailed {
                    page: page_num,
                    detail: e.to_string(),
                },
                duration_ms,
            )
        }
        Err(_) => {
            warn!("Page {}: LLM call timed out after {}s", page_num, config.api_timeout_secs);
            PageResult::failed(
                page_num,
                PageError::Timeout {
                    page: page_num,
                    secs: config.api_timeout_secs,
                },
                duration_ms,
            )
        }
    }
}

/// Build `CompletionOptions` from the conversion config.
fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
