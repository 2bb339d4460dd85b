//! Scripted LLM provider for offline tests.

use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LLMResponse, LlmError};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Replies are handed out in order; an `Err` entry becomes `LlmError::ApiError`.
/// Every `chat` call is recorded.
pub(crate) struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<LLMResponse, String>>>,
    delay: Duration,
    pub(crate) calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub(crate) fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn reply(self, content: &str, prompt_tokens: usize, completion_tokens: usize) -> Self {
        let mut response = LLMResponse::new(content, "scripted-model");
        response.prompt_tokens = prompt_tokens;
        response.completion_tokens = completion_tokens;
        response.total_tokens = prompt_tokens + completion_tokens;
        self.replies.lock().unwrap().push_back(Ok(response));
        self
    }

    pub(crate) fn fail(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next(&self) -> edgequake_llm::Result<LLMResponse> {
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(LlmError::ApiError(message)),
            None => Err(LlmError::ApiError("no scripted reply left".into())),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn max_context_length(&self) -> usize {
        128_000
    }

    async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
        self.next()
    }

    async fn complete_with_options(
        &self,
        _prompt: &str,
        _options: &CompletionOptions,
    ) -> edgequake_llm::Result<LLMResponse> {
        self.next()
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _options: Option<&CompletionOptions>,
    ) -> edgequake_llm::Result<LLMResponse> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.next()
    }
}
