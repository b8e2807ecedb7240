// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::{
    Capabilities, GenerateRequest, GenerateResponse, Message, ProviderError, ToolDefinition,
};

/// Interface between the orchestrator and a concrete model backend.
///
/// A single provider handle is shared between the REPL task and the
/// command-handler task, so every method takes `&self` and implementations
/// must be safe for concurrent invocation (`set_model` uses interior
/// mutability).  Cancellation is applied by the caller via `select!` around
/// the returned futures, never inside the provider.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name for status display.
    fn name(&self) -> &str;

    /// Run one completion over the full history and return the model's
    /// text, tool calls, or refusal.
    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse, ProviderError>;

    /// Estimate tokens for the given history, as the backend would bill it.
    async fn count_tokens(&self, history: &[Message]) -> Result<usize, ProviderError>;

    /// Context window of the current model, in tokens.
    fn context_window(&self) -> usize;

    fn capabilities(&self) -> Capabilities;

    /// Model identifier as reported to users.
    fn get_model(&self) -> String;

    /// Switch the model used for subsequent requests.
    fn set_model(&self, name: &str) -> Result<(), ProviderError>;

    /// List model names available from this provider.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError>;

    /// Pre-register tool definitions with the backend.
    ///
    /// Backends that accept tools per-request (Gemini) cache these as a
    /// fallback for requests that carry none; the default is a no-op.
    async fn define_tools(&self, _definitions: &[ToolDefinition]) -> Result<(), ProviderError> {
        Ok(())
    }
}
