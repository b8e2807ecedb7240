// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Message types ────────────────────────────────────────────────────────────

/// Who produced a turn in the conversation.
///
/// `assistant` is accepted as an input alias of `model`; serialization
/// always emits `model` so outbound provider requests see one spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Model,
    Function,
    System,
}

/// A single turn in the conversation history.
///
/// `tool_calls` is non-empty only when `role == Model`; `tool_results` is
/// non-empty only when `role == Function`.  The orchestrator keeps every
/// `Function` message immediately after the `Model` message that requested
/// it, paired element-wise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
            tool_calls: vec![],
            tool_results: vec![],
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
            tool_calls: vec![],
            tool_results: vec![],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            content: text.into(),
            tool_calls: vec![],
            tool_results: vec![],
        }
    }

    pub fn model_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Model,
            content: String::new(),
            tool_calls: calls,
            tool_results: vec![],
        }
    }

    pub fn function_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::Function,
            content: String::new(),
            tool_calls: vec![],
            tool_results: results,
        }
    }

    /// Approximate token count (4-chars-per-token heuristic).  Used by tests
    /// and by the mock provider's default counter; real providers count
    /// server-side.
    pub fn approx_tokens(&self) -> usize {
        let mut chars = self.content.len();
        for tc in &self.tool_calls {
            chars += tc.name.len() + Value::Object(tc.args.clone()).to_string().len();
        }
        for tr in &self.tool_results {
            chars += tr.name.len()
                + tr.content.len()
                + tr.error.as_deref().map(str::len).unwrap_or(0);
        }
        (chars / 4).max(1)
    }
}

/// A single tool invocation requested by the model.
///
/// `id` is turn-unique and opaque; it may be empty when the provider does
/// not issue call ids, in which case call/result pairing is positional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

/// The outcome of one tool invocation, mirrored back to the model.
///
/// `content` carries the primary payload on success; `error` carries the
/// failure text.  Both may be present when a tool produced partial output
/// before failing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            error: None,
        }
    }

    pub fn err(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            id: call.id.clone(),
            name: call.name.clone(),
            content: String::new(),
            error: Some(error.into()),
        }
    }
}

// ─── Tool schema ──────────────────────────────────────────────────────────────

/// A tool made available to the model.
///
/// `parameters` is a JSON-Schema-shaped object: `type`, `properties`,
/// `required`, `items`, `enum`, `description`, nested to arbitrary depth.
/// Providers translate it into their own schema dialect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

// ─── Request / response ───────────────────────────────────────────────────────

/// Request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub history: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// What the model produced for one request.
#[derive(Debug, Clone)]
pub enum ResponseContent {
    Text(String),
    ToolCalls(Vec<ToolCall>),
    /// The provider blocked the response (safety or policy); the payload is
    /// the stated reason.  Not an error; the orchestrator records it in
    /// history and continues.
    Refusal(String),
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: ResponseContent,
    pub usage: Usage,
    /// Model name that served the request.
    pub model: String,
}

/// Token usage from one turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Static feature flags for a provider/model combination.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub supports_streaming: bool,
    pub supports_tool_calling: bool,
    pub supports_json_mode: bool,
    pub max_context_tokens: usize,
    pub max_output_tokens: usize,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
