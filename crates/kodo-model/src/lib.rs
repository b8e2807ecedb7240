// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod error;
mod gemini;
mod mock;
mod provider;
mod types;

pub use error::{ErrorKind, ProviderError};
pub use gemini::GeminiProvider;
pub use mock::ScriptedProvider;
pub use provider::Provider;
pub use types::{
    Capabilities, GenerateRequest, GenerateResponse, Message, ResponseContent, Role, ToolCall,
    ToolDefinition, ToolResult, Usage,
};
