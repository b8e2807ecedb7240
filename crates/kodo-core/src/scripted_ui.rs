// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Deterministic UI double for orchestrator and supervisor tests.
//!
//! Inputs and permission decisions are queued up front; everything the core
//! writes (messages, statuses, previews, model lists) is recorded for
//! assertions.  No terminal involved.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use crate::ui::{PermissionDecision, StatusPhase, ToolPreview, Ui, UiCommand};

pub struct ScriptedUi {
    inputs: Mutex<VecDeque<String>>,
    permissions: Mutex<VecDeque<PermissionDecision>>,
    messages: Mutex<Vec<String>>,
    statuses: Mutex<Vec<(StatusPhase, String)>>,
    model_lists: Mutex<Vec<Vec<String>>>,
    model_switches: Mutex<Vec<String>>,
    previews: Mutex<Vec<Option<ToolPreview>>>,
    /// Shared event log for cross-component ordering assertions.
    events: Arc<Mutex<Vec<String>>>,
    commands_rx: Mutex<Option<mpsc::Receiver<UiCommand>>>,
    commands_tx: mpsc::Sender<UiCommand>,
    quit: Notify,
}

impl ScriptedUi {
    pub fn new() -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(8);
        Self {
            inputs: Mutex::new(VecDeque::new()),
            permissions: Mutex::new(VecDeque::new()),
            messages: Mutex::new(Vec::new()),
            statuses: Mutex::new(Vec::new()),
            model_lists: Mutex::new(Vec::new()),
            model_switches: Mutex::new(Vec::new()),
            previews: Mutex::new(Vec::new()),
            events: Arc::new(Mutex::new(Vec::new())),
            commands_rx: Mutex::new(Some(commands_rx)),
            commands_tx,
            quit: Notify::new(),
        }
    }

    /// Queue a line the next `read_input` call returns.
    pub fn with_input(self, text: impl Into<String>) -> Self {
        self.inputs.lock().expect("lock poisoned").push_back(text.into());
        self
    }

    /// Queue a permission decision.
    pub fn with_permission(self, decision: PermissionDecision) -> Self {
        self.permissions
            .lock()
            .expect("lock poisoned")
            .push_back(decision);
        self
    }

    /// Share an external event log (for ordering assertions that span the
    /// UI and other components).
    pub fn with_events(mut self, events: Arc<Mutex<Vec<String>>>) -> Self {
        self.events = events;
        self
    }

    /// Sender half of the command channel, for driving the command handler.
    pub fn command_sender(&self) -> mpsc::Sender<UiCommand> {
        self.commands_tx.clone()
    }

    /// Unblock `start()`.
    pub fn trigger_quit(&self) {
        self.quit.notify_one();
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("lock poisoned").clone()
    }

    pub fn statuses(&self) -> Vec<(StatusPhase, String)> {
        self.statuses.lock().expect("lock poisoned").clone()
    }

    pub fn model_lists(&self) -> Vec<Vec<String>> {
        self.model_lists.lock().expect("lock poisoned").clone()
    }

    pub fn model_switches(&self) -> Vec<String> {
        self.model_switches.lock().expect("lock poisoned").clone()
    }

    pub fn previews(&self) -> Vec<Option<ToolPreview>> {
        self.previews.lock().expect("lock poisoned").clone()
    }

    pub fn permission_prompts(&self) -> usize {
        self.previews.lock().expect("lock poisoned").len()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("lock poisoned").clone()
    }
}

impl Default for ScriptedUi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ui for ScriptedUi {
    async fn ready(&self) {
        self.events
            .lock()
            .expect("lock poisoned")
            .push("READY".to_string());
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.quit.notified().await;
        Ok(())
    }

    async fn read_input(
        &self,
        cancel: &CancellationToken,
        _prompt: &str,
    ) -> anyhow::Result<String> {
        if cancel.is_cancelled() {
            anyhow::bail!("cancelled");
        }
        self.inputs
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("input channel closed"))
    }

    async fn read_permission(
        &self,
        cancel: &CancellationToken,
        _prompt: &str,
        preview: Option<&ToolPreview>,
    ) -> anyhow::Result<PermissionDecision> {
        if cancel.is_cancelled() {
            anyhow::bail!("cancelled");
        }
        self.previews
            .lock()
            .expect("lock poisoned")
            .push(preview.cloned());
        self.permissions
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("permission channel closed"))
    }

    fn write_message(&self, text: &str) {
        self.messages
            .lock()
            .expect("lock poisoned")
            .push(text.to_string());
    }

    fn write_status(&self, phase: StatusPhase, text: &str) {
        self.statuses
            .lock()
            .expect("lock poisoned")
            .push((phase, text.to_string()));
    }

    fn write_model_list(&self, names: &[String]) {
        self.model_lists
            .lock()
            .expect("lock poisoned")
            .push(names.to_vec());
    }

    fn set_model(&self, name: &str) {
        self.model_switches
            .lock()
            .expect("lock poisoned")
            .push(name.to_string());
    }

    fn take_commands(&self) -> Option<mpsc::Receiver<UiCommand>> {
        self.commands_rx.lock().expect("lock poisoned").take()
    }
}
