// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
pub mod adapter;
pub mod builtin;
pub mod registry;
pub mod tool;
pub mod workspace;

pub use adapter::{Adapter, ToolRequest, TypedTool};
pub use registry::{ToolRegistry, ToolSchema};
pub use tool::Tool;
pub use workspace::{CommandGate, Workspace};

pub use builtin::edit_file::EditFileTool;
pub use builtin::find_file::FindFileTool;
pub use builtin::list_dir::ListDirectoryTool;
pub use builtin::read_file::ReadFileTool;
pub use builtin::search_content::SearchContentTool;
pub use builtin::shell::RunShellTool;
pub use builtin::todos::{new_todo_store, ReadTodosTool, TodoItem, TodoStore, WriteTodosTool};
pub use builtin::write_file::WriteFileTool;

pub use builtin::builtin_registry;
