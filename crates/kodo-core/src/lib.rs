// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod history;
mod orchestrator;
mod policy;
pub mod scripted_ui;
mod supervisor;
mod truncate;
mod ui;
#[cfg(test)]
mod tests;

pub use history::History;
pub use orchestrator::Orchestrator;
pub use policy::PolicyService;
pub use supervisor::{run_interactive, Deps};
pub use truncate::truncate_history;
pub use ui::{PermissionDecision, StatusPhase, ToolPreview, Ui, UiCommand};
