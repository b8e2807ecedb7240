// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::adapter::{ToolRequest, TypedTool};
use crate::workspace::Workspace;

/// A structured todo item managed by write_todos.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    /// One of: "pending", "in_progress", "completed", "cancelled"
    pub status: String,
}

const VALID_STATUSES: [&str; 4] = ["pending", "in_progress", "completed", "cancelled"];

/// In-memory todo list shared between read_todos and write_todos.  Session
/// scoped; nothing persists across restarts.
pub type TodoStore = Arc<Mutex<Vec<TodoItem>>>;

pub fn new_todo_store() -> TodoStore {
    Arc::new(Mutex::new(Vec::new()))
}

fn format_todos(items: &[TodoItem]) -> String {
    if items.is_empty() {
        return "No todos.".to_string();
    }
    let lines: Vec<String> = items
        .iter()
        .map(|t| {
            let icon = match t.status.as_str() {
                "completed" => "✓",
                "in_progress" => "→",
                "cancelled" => "✗",
                _ => "○",
            };
            format!("{icon} [{}] {}", t.id, t.content)
        })
        .collect();
    lines.join("\n")
}

// ─── read_todos ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReadTodosRequest {}

impl ToolRequest for ReadTodosRequest {}

pub struct ReadTodosTool {
    pub todos: TodoStore,
}

#[async_trait]
impl TypedTool for ReadTodosTool {
    type Req = ReadTodosRequest;
    type Resp = String;

    fn name(&self) -> &'static str {
        "read_todos"
    }

    fn description(&self) -> &'static str {
        "Read the current session todo list."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn run(
        &self,
        _cancel: &CancellationToken,
        _ws: &Workspace,
        _req: Self::Req,
    ) -> anyhow::Result<Self::Resp> {
        Ok(format_todos(&self.todos.lock().await))
    }
}

// ─── write_todos ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WriteTodosRequest {
    pub todos: Vec<TodoItem>,
}

impl ToolRequest for WriteTodosRequest {
    fn validate(&self) -> anyhow::Result<()> {
        for item in &self.todos {
            if item.id.is_empty() {
                anyhow::bail!("todo item has an empty 'id'");
            }
            if !VALID_STATUSES.contains(&item.status.as_str()) {
                anyhow::bail!("invalid status '{}' for todo '{}'", item.status, item.id);
            }
        }
        let in_progress = self
            .todos
            .iter()
            .filter(|t| t.status == "in_progress")
            .count();
        if in_progress > 1 {
            anyhow::bail!("at most one todo can be 'in_progress' at a time");
        }
        Ok(())
    }
}

pub struct WriteTodosTool {
    pub todos: TodoStore,
}

#[async_trait]
impl TypedTool for WriteTodosTool {
    type Req = WriteTodosRequest;
    type Resp = String;

    fn name(&self) -> &'static str {
        "write_todos"
    }

    fn description(&self) -> &'static str {
        "Replace the session todo list. Each item needs a unique id, content, \
         and a status out of pending | in_progress | completed | cancelled. \
         Only one item may be in_progress at a time. Use for multi-step tasks \
         (3+ steps); skip it for trivial one-shot requests. Calling write_todos \
         replaces the entire list, not a merge."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "description": "Todo items replacing the existing list",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {
                                "type": "string",
                                "description": "Unique identifier for the task"
                            },
                            "content": {
                                "type": "string",
                                "description": "Description of the task"
                            },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed", "cancelled"],
                                "description": "Current status of the task"
                            }
                        },
                        "required": ["id", "content", "status"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    async fn run(
        &self,
        _cancel: &CancellationToken,
        _ws: &Workspace,
        req: Self::Req,
    ) -> anyhow::Result<Self::Resp> {
        let summary = if req.todos.is_empty() {
            "Todo list cleared.".to_string()
        } else {
            format!("Todos updated:\n{}", format_todos(&req.todos))
        };
        *self.todos.lock().await = req.todos;
        Ok(summary)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
