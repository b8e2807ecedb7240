// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::RwLock;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use kodo_config::ModelConfig;

use crate::{
    Capabilities, ErrorKind, GenerateRequest, GenerateResponse, Message, Provider, ProviderError,
    ResponseContent, Role, ToolCall, ToolDefinition, Usage,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Fallback output-token reservation when the model is not in the catalog.
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8_192;

/// Context window for models missing from the catalog.
const DEFAULT_CONTEXT_WINDOW: u32 = 131_072;

/// Minimal model catalog: (name prefix, context window).
/// First prefix match wins; config `context_window` overrides everything.
const CATALOG: &[(&str, u32)] = &[
    ("gemini-2.5", 1_048_576),
    ("gemini-2.0", 1_048_576),
    ("gemini-1.5-pro", 2_097_152),
    ("gemini-1.5", 1_048_576),
];

fn catalog_context_window(model: &str) -> u32 {
    CATALOG
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, cw)| *cw)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

/// Google Gemini driver (REST `generateContent` / `countTokens`).
///
/// Non-streaming: one request, one parsed response.  The handle is shared
/// between the REPL and command-handler tasks, so the mutable model name
/// lives behind an `RwLock`.
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: RwLock<String>,
    /// Tool definitions registered via `define_tools`, used as a fallback
    /// for requests that carry none.
    defined_tools: RwLock<Vec<ToolDefinition>>,
    context_window_override: Option<u32>,
    max_output_tokens: u32,
    temperature: Option<f32>,
}

impl GeminiProvider {
    /// Build a driver from config.  Fails when the API key env var is unset
    /// so a misconfigured session dies at startup, not mid-conversation.
    pub fn from_config(cfg: &ModelConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env).map_err(|_| {
            anyhow::anyhow!(
                "environment variable {} is not set (required for the Gemini API)",
                cfg.api_key_env
            )
        })?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: RwLock::new(cfg.name.clone()),
            defined_tools: RwLock::new(Vec::new()),
            context_window_override: cfg.context_window,
            max_output_tokens: cfg.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
            temperature: cfg.temperature,
        })
    }

    fn url(&self, model: &str, verb: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.base_url, model, verb, self.api_key
        )
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, ProviderError> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body_text, retry_after));
        }

        resp.json::<Value>().await.map_err(|e| {
            ProviderError::new(ErrorKind::InvalidRequest, format!("malformed response: {e}"))
        })
    }
}

#[async_trait::async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let model = self.get_model();
        let mut body = json!({
            "contents": contents_from_history(&req.history),
        });

        let tools = if req.tools.is_empty() {
            self.defined_tools.read().expect("lock poisoned").clone()
        } else {
            req.tools
        };
        if !tools.is_empty() {
            body["tools"] = json!([{
                "functionDeclarations": tools
                    .iter()
                    .map(|t| json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": to_gemini_schema(&t.parameters),
                    }))
                    .collect::<Vec<_>>()
            }]);
        }

        let mut generation_config = Map::new();
        if let Some(t) = req.temperature.or(self.temperature) {
            generation_config.insert("temperature".into(), json!(t));
        }
        let max_out = req.max_output_tokens.unwrap_or(self.max_output_tokens);
        generation_config.insert("maxOutputTokens".into(), json!(max_out));
        body["generationConfig"] = Value::Object(generation_config);

        debug!(model = %model, messages = req.history.len(), "gemini generate");
        let value = self.post(&self.url(&model, "generateContent"), &body).await?;
        parse_generate_response(&value, &model)
    }

    async fn count_tokens(&self, history: &[Message]) -> Result<usize, ProviderError> {
        let model = self.get_model();
        let body = json!({ "contents": contents_from_history(history) });
        let value = self.post(&self.url(&model, "countTokens"), &body).await?;
        value["totalTokens"]
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| {
                ProviderError::new(
                    ErrorKind::InvalidRequest,
                    "countTokens response missing totalTokens",
                )
            })
    }

    fn context_window(&self) -> usize {
        self.context_window_override
            .unwrap_or_else(|| catalog_context_window(&self.get_model())) as usize
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_streaming: false,
            supports_tool_calling: true,
            supports_json_mode: true,
            max_context_tokens: self.context_window(),
            max_output_tokens: self.max_output_tokens as usize,
        }
    }

    fn get_model(&self) -> String {
        self.model.read().expect("lock poisoned").clone()
    }

    fn set_model(&self, name: &str) -> Result<(), ProviderError> {
        if name.is_empty() {
            return Err(ProviderError::new(
                ErrorKind::InvalidModel,
                "model name is empty",
            ));
        }
        *self.model.write().expect("lock poisoned") = name.to_string();
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models?key={}", self.base_url, self.api_key);
        let resp = self.http.get(&url).send().await.map_err(request_error)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body, None));
        }
        let value: Value = resp.json().await.map_err(|e| {
            ProviderError::new(ErrorKind::InvalidRequest, format!("malformed response: {e}"))
        })?;
        let names = value["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["name"].as_str())
                    .map(|n| n.strip_prefix("models/").unwrap_or(n).to_string())
                    .collect()
            })
            .unwrap_or_default();
        Ok(names)
    }

    async fn define_tools(&self, definitions: &[ToolDefinition]) -> Result<(), ProviderError> {
        *self.defined_tools.write().expect("lock poisoned") = definitions.to_vec();
        Ok(())
    }
}

// ─── Wire mapping ─────────────────────────────────────────────────────────────

/// Map conversation history into Gemini `contents`.
///
/// The wire format knows only `user` and `model` roles.  Function results
/// become `user` turns carrying `functionResponse` parts; system messages
/// that appear mid-history (refusal notes, error notices) become tagged
/// `user` text so the model still sees them.
fn contents_from_history(history: &[Message]) -> Vec<Value> {
    history
        .iter()
        .map(|msg| match msg.role {
            Role::User => json!({
                "role": "user",
                "parts": [{ "text": msg.content }],
            }),
            Role::System => json!({
                "role": "user",
                "parts": [{ "text": format!("[system] {}", msg.content) }],
            }),
            Role::Model => {
                let mut parts: Vec<Value> = Vec::new();
                if !msg.content.is_empty() {
                    parts.push(json!({ "text": msg.content }));
                }
                for tc in &msg.tool_calls {
                    parts.push(json!({
                        "functionCall": {
                            "name": tc.name,
                            "args": Value::Object(tc.args.clone()),
                        }
                    }));
                }
                json!({ "role": "model", "parts": parts })
            }
            Role::Function => {
                let parts: Vec<Value> = msg
                    .tool_results
                    .iter()
                    .map(|tr| {
                        let response = match &tr.error {
                            Some(e) if tr.content.is_empty() => json!({ "error": e }),
                            Some(e) => json!({ "output": tr.content, "error": e }),
                            None => json!({ "output": tr.content }),
                        };
                        json!({
                            "functionResponse": {
                                "name": tr.name,
                                "response": response,
                            }
                        })
                    })
                    .collect();
                json!({ "role": "user", "parts": parts })
            }
        })
        .collect()
}

/// Translate a JSON-Schema-shaped parameter object into Gemini's schema
/// dialect: uppercase type tags, recursive `properties` / `items`,
/// `required` and `enum` preserved, unsupported keywords dropped.
///
/// Recursion is load-bearing: tool parameters include arrays of objects
/// (edit operations, todo items) nested to arbitrary depth.
fn to_gemini_schema(schema: &Value) -> Value {
    let obj = match schema.as_object() {
        Some(o) => o,
        // Tolerate a bare type string ("string") from hand-written schemas.
        None => {
            return match schema.as_str() {
                Some(t) => json!({ "type": t.to_uppercase() }),
                None => json!({ "type": "OBJECT" }),
            }
        }
    };

    let mut out = Map::new();
    let ty = obj.get("type").and_then(|v| v.as_str()).unwrap_or("object");
    out.insert("type".into(), json!(ty.to_uppercase()));

    if let Some(desc) = obj.get("description") {
        out.insert("description".into(), desc.clone());
    }
    if let Some(en) = obj.get("enum") {
        out.insert("enum".into(), en.clone());
    }
    if let Some(props) = obj.get("properties").and_then(|v| v.as_object()) {
        let converted: Map<String, Value> = props
            .iter()
            .map(|(k, v)| (k.clone(), to_gemini_schema(v)))
            .collect();
        out.insert("properties".into(), Value::Object(converted));
    }
    if let Some(items) = obj.get("items") {
        out.insert("items".into(), to_gemini_schema(items));
    }
    if let Some(req) = obj.get("required") {
        out.insert("required".into(), req.clone());
    }

    Value::Object(out)
}

/// Parse one `generateContent` response into text, tool calls, or refusal.
fn parse_generate_response(value: &Value, model: &str) -> Result<GenerateResponse, ProviderError> {
    let usage = Usage {
        input_tokens: value["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
        output_tokens: value["usageMetadata"]["candidatesTokenCount"]
            .as_u64()
            .unwrap_or(0) as u32,
    };

    // Prompt-level block: no candidates at all.
    if let Some(reason) = value["promptFeedback"]["blockReason"].as_str() {
        return Ok(GenerateResponse {
            content: ResponseContent::Refusal(reason.to_string()),
            usage,
            model: model.to_string(),
        });
    }

    let candidate = value["candidates"].get(0).ok_or_else(|| {
        ProviderError::new(ErrorKind::InvalidRequest, "response has no candidates")
    })?;

    let finish = candidate["finishReason"].as_str().unwrap_or("");
    if matches!(finish, "SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST") {
        return Ok(GenerateResponse {
            content: ResponseContent::Refusal(finish.to_string()),
            usage,
            model: model.to_string(),
        });
    }

    let mut text = String::new();
    let mut calls: Vec<ToolCall> = Vec::new();
    if let Some(parts) = candidate["content"]["parts"].as_array() {
        for part in parts {
            if let Some(t) = part["text"].as_str() {
                text.push_str(t);
            } else if let Some(fc) = part.get("functionCall") {
                let name = fc["name"].as_str().unwrap_or_default().to_string();
                if name.is_empty() {
                    warn!("dropping function call with empty name");
                    continue;
                }
                let args = fc["args"].as_object().cloned().unwrap_or_default();
                // Gemini does not issue call ids; synthesize one so that
                // call/result pairing downstream never relies on position
                // alone.
                calls.push(ToolCall {
                    id: format!("call-{}", uuid::Uuid::new_v4().simple()),
                    name,
                    args,
                });
            }
        }
    }

    let content = if !calls.is_empty() {
        ResponseContent::ToolCalls(calls)
    } else {
        ResponseContent::Text(text)
    };
    Ok(GenerateResponse {
        content,
        usage,
        model: model.to_string(),
    })
}

// ─── Error mapping ────────────────────────────────────────────────────────────

fn request_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::new(ErrorKind::Timeout, e.to_string())
    } else {
        ProviderError::new(ErrorKind::Network, e.to_string())
    }
}

fn status_error(status: u16, body: &str, retry_after: Option<Duration>) -> ProviderError {
    let message = extract_api_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    let kind = match status {
        400 if message.contains("token") && message.contains("exceed") => {
            ErrorKind::ContextLengthExceeded
        }
        400 => ErrorKind::InvalidRequest,
        401 => ErrorKind::AuthenticationFailed,
        403 => ErrorKind::PermissionDenied,
        404 => ErrorKind::InvalidModel,
        429 if message.contains("quota") => ErrorKind::QuotaExceeded,
        429 => ErrorKind::RateLimit,
        500..=599 => ErrorKind::ServiceUnavailable,
        _ => ErrorKind::InvalidRequest,
    };
    let mut err = ProviderError::new(kind, message);
    if let Some(after) = retry_after {
        err = err.with_retry_after(after);
    }
    err
}

/// Pull the human-readable message out of a Gemini error body:
/// `{"error": {"code": 429, "message": "...", "status": "RESOURCE_EXHAUSTED"}}`.
fn extract_api_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(str::to_string)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
