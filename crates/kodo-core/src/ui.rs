// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The user's answer to a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Allow,
    Deny,
    /// Allow now and for the rest of the session (recorded in the policy's
    /// session-allow set).
    AllowAlways,
}

/// Coarse activity phase for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPhase {
    Thinking,
    Executing,
    Blocked,
    Ready,
}

/// Structured hint rendered at a permission prompt.  Unknown operations
/// prompt bare; these two carry enough detail to show the user what they
/// are approving.
#[derive(Debug, Clone)]
pub enum ToolPreview {
    ShellCommand {
        command: Vec<String>,
    },
    EditOperations {
        path: String,
        operations: Vec<serde_json::Value>,
    },
}

/// Out-of-band commands the user issues from the UI (slash commands).
/// Unknown input never reaches this channel; the UI drops it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    ListModels,
    SwitchModel { model: String },
}

/// Interface between the core and the terminal front-end.
///
/// Channel discipline: `write_*` methods are lossy and non-blocking; a
/// backed-up display drops telemetry rather than stalling the orchestrator.
/// `read_input` and `read_permission` are synchronous rendezvous: the
/// orchestrator blocks until the user answers or the token cancels.
#[async_trait]
pub trait Ui: Send + Sync {
    /// Resolves once the UI event loop is live.  The supervisor awaits this
    /// before any provider construction starts.
    async fn ready(&self);

    /// Run the UI until the user quits.  Blocking; the return value is the
    /// UI's exit status.
    async fn start(&self) -> anyhow::Result<()>;

    /// Prompt for a line of input.  Errors mean the UI is gone and the run
    /// cannot continue.
    async fn read_input(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
    ) -> anyhow::Result<String>;

    /// Ask the user to approve an operation.
    async fn read_permission(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        preview: Option<&ToolPreview>,
    ) -> anyhow::Result<PermissionDecision>;

    /// Show a message from the model (lossy).
    fn write_message(&self, text: &str);

    /// Update the status line (lossy).
    fn write_status(&self, phase: StatusPhase, text: &str);

    /// Show the provider's model list (lossy).
    fn write_model_list(&self, names: &[String]);

    /// Echo a model switch (lossy).
    fn set_model(&self, name: &str);

    /// Hand over the receiving end of the UI command stream.  Yields
    /// `Some` exactly once; the command-handler task owns it afterwards.
    fn take_commands(&self) -> Option<mpsc::Receiver<UiCommand>>;
}
