// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    Capabilities, ErrorKind, GenerateRequest, GenerateResponse, Message, Provider, ProviderError,
    ResponseContent, ToolCall, Usage,
};

type TokenCounter = Box<dyn Fn(&[Message]) -> Result<usize, ProviderError> + Send + Sync>;

/// Pre-scripted provider for tests.  Each `generate` call pops the next
/// scripted outcome; every request is recorded so tests can inspect exactly
/// what the orchestrator sent.  No network access.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ResponseContent, ProviderError>>>,
    /// Every `GenerateRequest` seen, in order.
    pub requests: Mutex<Vec<GenerateRequest>>,
    counter: TokenCounter,
    context_window: usize,
    max_output_tokens: usize,
    model: Mutex<String>,
    models: Vec<String>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            counter: Box::new(|history| {
                Ok(history.iter().map(Message::approx_tokens).sum())
            }),
            context_window: 128_000,
            max_output_tokens: 4_096,
            model: Mutex::new("scripted-model".into()),
            models: vec!["scripted-model".into(), "scripted-model-pro".into()],
        }
    }

    /// Queue a plain text reply.
    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(ResponseContent::Text(text.into())));
        self
    }

    /// Queue a single tool call (args given as a JSON object).
    pub fn then_tool_call(self, id: &str, name: &str, args: Value) -> Self {
        let call = ToolCall {
            id: id.into(),
            name: name.into(),
            args: args.as_object().cloned().unwrap_or_default(),
        };
        self.push(Ok(ResponseContent::ToolCalls(vec![call])));
        self
    }

    /// Queue a multi-call turn.
    pub fn then_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.push(Ok(ResponseContent::ToolCalls(calls)));
        self
    }

    /// Queue a refusal.
    pub fn then_refusal(self, reason: impl Into<String>) -> Self {
        self.push(Ok(ResponseContent::Refusal(reason.into())));
        self
    }

    /// Queue a provider error.
    pub fn then_error(self, err: ProviderError) -> Self {
        self.push(Err(err));
        self
    }

    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window = tokens;
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: usize) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Replace the token counter.  Lets tests simulate counting failures or
    /// pathological estimators that never report a reduction.
    pub fn with_counter(
        mut self,
        counter: impl Fn(&[Message]) -> Result<usize, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        self.counter = Box::new(counter);
        self
    }

    fn push(&self, outcome: Result<ResponseContent, ProviderError>) {
        self.replies.lock().expect("lock poisoned").push_back(outcome);
    }

    /// Number of `generate` calls observed so far.
    pub fn generate_calls(&self) -> usize {
        self.requests.lock().expect("lock poisoned").len()
    }

    /// The history of the most recent `generate` request.
    pub fn last_history(&self) -> Vec<Message> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .last()
            .map(|r| r.history.clone())
            .unwrap_or_default()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        self.requests.lock().expect("lock poisoned").push(req);
        let outcome = self
            .replies
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .unwrap_or(Ok(ResponseContent::Text("[script exhausted]".into())));
        outcome.map(|content| GenerateResponse {
            content,
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
            model: self.get_model(),
        })
    }

    async fn count_tokens(&self, history: &[Message]) -> Result<usize, ProviderError> {
        (self.counter)(history)
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_streaming: false,
            supports_tool_calling: true,
            supports_json_mode: false,
            max_context_tokens: self.context_window,
            max_output_tokens: self.max_output_tokens,
        }
    }

    fn get_model(&self) -> String {
        self.model.lock().expect("lock poisoned").clone()
    }

    fn set_model(&self, name: &str) -> Result<(), ProviderError> {
        if !self.models.iter().any(|m| m == name) {
            return Err(ProviderError::new(
                ErrorKind::InvalidModel,
                format!("unknown model '{name}'"),
            ));
        }
        *self.model.lock().expect("lock poisoned") = name.to_string();
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.models.clone())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
