// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::tool::Tool;
use crate::workspace::Workspace;

/// A typed argument struct decoded from the model's untyped argument map.
///
/// `validate` runs after decoding; failures surface as tool errors in the
/// conversation, never as framework errors, so the model can correct itself.
pub trait ToolRequest: DeserializeOwned + Send {
    fn validate(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A tool implemented against typed request/response structs.
///
/// [`Adapter`] wraps any `TypedTool` into the uniform [`Tool`] capability
/// the agent loop dispatches on: decode args → validate → run → render.
#[async_trait]
pub trait TypedTool: Send + Sync {
    type Req: ToolRequest;
    type Resp: Serialize + Send;

    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters(&self) -> Value;

    async fn run(
        &self,
        cancel: &CancellationToken,
        ws: &Workspace,
        req: Self::Req,
    ) -> anyhow::Result<Self::Resp>;
}

/// The single polymorphic adapter: one type, parameterized over the typed
/// tool, instead of one hand-written decoder per tool.
pub struct Adapter<T> {
    tool: T,
    ws: Arc<Workspace>,
}

impl<T: TypedTool> Adapter<T> {
    pub fn new(tool: T, ws: Arc<Workspace>) -> Self {
        Self { tool, ws }
    }
}

#[async_trait]
impl<T: TypedTool> Tool for Adapter<T> {
    fn name(&self) -> &str {
        self.tool.name()
    }

    fn description(&self) -> &str {
        self.tool.description()
    }

    fn definition(&self) -> Value {
        self.tool.parameters()
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        args: &Map<String, Value>,
    ) -> anyhow::Result<String> {
        let req: T::Req = serde_json::from_value(Value::Object(args.clone()))
            .with_context(|| format!("invalid arguments for {}", self.tool.name()))?;
        req.validate()?;
        let resp = self.tool.run(cancel, &self.ws, req).await?;
        render_response(resp)
    }
}

/// Render a typed response as the result string stored in history.
/// Plain strings pass through unquoted; structured responses become JSON.
fn render_response<R: Serialize>(resp: R) -> anyhow::Result<String> {
    match serde_json::to_value(resp).context("serializing tool response")? {
        Value::String(s) => Ok(s),
        v => Ok(v.to_string()),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
