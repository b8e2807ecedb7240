// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// Trait that every tool visible to the agent loop implements.
///
/// `execute` never panics by contract: any internal fault is reported as an
/// `Err`, and the orchestrator additionally isolates each execution so that
/// a violation of the contract still cannot unwind the loop.  Errors are
/// conversation data: they are mirrored back to the model as a tool-result
/// error, never surfaced as a framework failure.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable identifier the model calls the tool by.
    fn name(&self) -> &str;

    /// Free-form description included in the model's tool prompt.
    fn description(&self) -> &str;

    /// JSON-Schema-shaped parameter object: `type`, `properties`,
    /// `required`, `items`, `enum`, nested to arbitrary depth.
    fn definition(&self) -> Value;

    /// Run the tool with the model-supplied argument map.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        args: &Map<String, Value>,
    ) -> anyhow::Result<String>;
}
