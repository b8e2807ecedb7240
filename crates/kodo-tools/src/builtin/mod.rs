// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
pub mod edit_file;
pub mod find_file;
pub mod list_dir;
pub mod read_file;
pub mod search_content;
pub mod shell;
pub mod todos;
pub mod write_file;

use std::sync::Arc;

use crate::adapter::Adapter;
use crate::registry::ToolRegistry;
use crate::workspace::Workspace;

use edit_file::EditFileTool;
use find_file::FindFileTool;
use list_dir::ListDirectoryTool;
use read_file::ReadFileTool;
use search_content::SearchContentTool;
use shell::RunShellTool;
use todos::{ReadTodosTool, TodoStore, WriteTodosTool};
use write_file::WriteFileTool;

/// Build the standard registry with every built-in tool wired to the given
/// workspace and shared todo store.
pub fn builtin_registry(
    ws: Arc<Workspace>,
    todos: TodoStore,
    shell_timeout_secs: u64,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Adapter::new(ReadFileTool, ws.clone()));
    registry.register(Adapter::new(WriteFileTool, ws.clone()));
    registry.register(Adapter::new(EditFileTool, ws.clone()));
    registry.register(Adapter::new(ListDirectoryTool, ws.clone()));
    registry.register(Adapter::new(FindFileTool, ws.clone()));
    registry.register(Adapter::new(SearchContentTool, ws.clone()));
    registry.register(Adapter::new(
        RunShellTool {
            timeout_secs: shell_timeout_secs,
        },
        ws.clone(),
    ));
    registry.register(Adapter::new(
        ReadTodosTool {
            todos: todos.clone(),
        },
        ws.clone(),
    ));
    registry.register(Adapter::new(WriteTodosTool { todos }, ws));
    registry
}
