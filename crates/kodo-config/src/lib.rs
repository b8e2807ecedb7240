// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod loader;
mod schema;

pub use loader::load;
pub use schema::{AgentConfig, Config, ModelConfig, PolicyConfig, PolicyList, ToolsConfig};
