// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! Terminal front-end implementing the core's `Ui` contract.
//!
//! Channel discipline mirrors the contract exactly: message/status streams
//! are bounded and lossy (`try_send`, drop-if-full; the display must never
//! stall the agent), while input and permission requests are synchronous
//! rendezvous carrying a oneshot reply.

use std::sync::Mutex;

use async_trait::async_trait;
use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::layout::{Constraint, Layout};
use ratatui::DefaultTerminal;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use kodo_core::{PermissionDecision, StatusPhase, ToolPreview, Ui, UiCommand};

use crate::commands::{looks_like_command, parse_command};
use crate::widgets;

/// Lossy display traffic.
pub(crate) enum DisplayEvent {
    Message(String),
    Status(StatusPhase, String),
    ModelList(Vec<String>),
    ModelSwitched(String),
}

/// Synchronous requests awaiting a user answer.
pub(crate) enum UiRequest {
    Input {
        prompt: String,
        reply: oneshot::Sender<String>,
    },
    Permission {
        prompt: String,
        preview: Option<ToolPreview>,
        reply: oneshot::Sender<PermissionDecision>,
    },
}

struct LoopChannels {
    display_rx: mpsc::Receiver<DisplayEvent>,
    request_rx: mpsc::Receiver<UiRequest>,
    commands_tx: mpsc::Sender<UiCommand>,
}

/// Handle given to the core.  All methods are callable from any task; the
/// event loop behind [`TerminalUi::start`] owns the terminal.
pub struct TerminalUi {
    display_tx: mpsc::Sender<DisplayEvent>,
    request_tx: mpsc::Sender<UiRequest>,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
    commands_rx: Mutex<Option<mpsc::Receiver<UiCommand>>>,
    loop_channels: Mutex<Option<LoopChannels>>,
}

impl TerminalUi {
    pub fn new() -> Self {
        let (display_tx, display_rx) = mpsc::channel(64);
        let (request_tx, request_rx) = mpsc::channel(4);
        let (commands_tx, commands_rx) = mpsc::channel(8);
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            display_tx,
            request_tx,
            ready_tx,
            ready_rx,
            commands_rx: Mutex::new(Some(commands_rx)),
            loop_channels: Mutex::new(Some(LoopChannels {
                display_rx,
                request_rx,
                commands_tx,
            })),
        }
    }
}

impl Default for TerminalUi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ui for TerminalUi {
    async fn ready(&self) {
        let mut rx = self.ready_rx.clone();
        let _ = rx.wait_for(|live| *live).await;
    }

    async fn start(&self) -> anyhow::Result<()> {
        let channels = self
            .loop_channels
            .lock()
            .expect("lock poisoned")
            .take()
            .ok_or_else(|| anyhow::anyhow!("UI already started"))?;
        let terminal = ratatui::init();
        let _ = self.ready_tx.send(true);
        let result = App::new(channels).run(terminal).await;
        ratatui::restore();
        result
    }

    async fn read_input(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
    ) -> anyhow::Result<String> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request_tx
            .send(UiRequest::Input {
                prompt: prompt.to_string(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("ui closed"))?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => anyhow::bail!("cancelled"),
            r = reply_rx => r.map_err(|_| anyhow::anyhow!("ui closed")),
        }
    }

    async fn read_permission(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        preview: Option<&ToolPreview>,
    ) -> anyhow::Result<PermissionDecision> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.request_tx
            .send(UiRequest::Permission {
                prompt: prompt.to_string(),
                preview: preview.cloned(),
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("ui closed"))?;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => anyhow::bail!("cancelled"),
            r = reply_rx => r.map_err(|_| anyhow::anyhow!("ui closed")),
        }
    }

    fn write_message(&self, text: &str) {
        let _ = self
            .display_tx
            .try_send(DisplayEvent::Message(text.to_string()));
    }

    fn write_status(&self, phase: StatusPhase, text: &str) {
        let _ = self
            .display_tx
            .try_send(DisplayEvent::Status(phase, text.to_string()));
    }

    fn write_model_list(&self, names: &[String]) {
        let _ = self
            .display_tx
            .try_send(DisplayEvent::ModelList(names.to_vec()));
    }

    fn set_model(&self, name: &str) {
        let _ = self
            .display_tx
            .try_send(DisplayEvent::ModelSwitched(name.to_string()));
    }

    fn take_commands(&self) -> Option<mpsc::Receiver<UiCommand>> {
        self.commands_rx.lock().expect("lock poisoned").take()
    }
}

// ─── Event loop ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryKind {
    User,
    Agent,
    Note,
    Error,
}

pub(crate) struct Entry {
    pub kind: EntryKind,
    pub text: String,
}

/// Transcript entries kept in memory; older ones fall off.
const MAX_ENTRIES: usize = 1000;

struct App {
    display_rx: mpsc::Receiver<DisplayEvent>,
    request_rx: mpsc::Receiver<UiRequest>,
    commands_tx: mpsc::Sender<UiCommand>,
    entries: Vec<Entry>,
    status: (StatusPhase, String),
    model: String,
    input: String,
    pending: Option<UiRequest>,
}

impl App {
    fn new(channels: LoopChannels) -> Self {
        Self {
            display_rx: channels.display_rx,
            request_rx: channels.request_rx,
            commands_tx: channels.commands_tx,
            entries: vec![Entry {
                kind: EntryKind::Note,
                text: "kodo: /models lists models, /model <name> switches, ctrl-c quits"
                    .to_string(),
            }],
            status: (StatusPhase::Ready, "starting".to_string()),
            model: String::new(),
            input: String::new(),
            pending: None,
        }
    }

    async fn run(mut self, mut terminal: DefaultTerminal) -> anyhow::Result<()> {
        let mut events = EventStream::new();
        loop {
            terminal.draw(|frame| {
                let [transcript, status, input] = Layout::vertical([
                    Constraint::Min(3),
                    Constraint::Length(1),
                    Constraint::Length(3),
                ])
                .areas(frame.area());

                widgets::draw_transcript(frame, transcript, &self.entries);
                widgets::draw_status(frame, status, self.status.0, &self.status.1, &self.model);
                widgets::draw_input(frame, input, &self.input, self.pending_is_input());

                if let Some(UiRequest::Permission {
                    prompt, preview, ..
                }) = &self.pending
                {
                    widgets::draw_permission(frame, transcript, prompt, preview.as_ref());
                }
            })?;

            tokio::select! {
                Some(ev) = self.display_rx.recv() => self.apply_display(ev),
                Some(req) = self.request_rx.recv() => self.accept_request(req),
                maybe_event = events.next() => match maybe_event {
                    Some(Ok(event)) => {
                        if self.handle_event(event) {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("terminal event error: {e}");
                        break;
                    }
                    None => break,
                }
            }
        }
        Ok(())
    }

    fn pending_is_input(&self) -> bool {
        matches!(self.pending, Some(UiRequest::Input { .. }))
    }

    fn push_entry(&mut self, kind: EntryKind, text: impl Into<String>) {
        self.entries.push(Entry {
            kind,
            text: text.into(),
        });
        if self.entries.len() > MAX_ENTRIES {
            let excess = self.entries.len() - MAX_ENTRIES;
            self.entries.drain(..excess);
        }
    }

    fn apply_display(&mut self, ev: DisplayEvent) {
        match ev {
            DisplayEvent::Message(text) => self.push_entry(EntryKind::Agent, text),
            DisplayEvent::Status(phase, text) => self.status = (phase, text),
            DisplayEvent::ModelList(names) => {
                let body = if names.is_empty() {
                    "models: (none)".to_string()
                } else {
                    format!("models:\n{}", names.join("\n"))
                };
                self.push_entry(EntryKind::Note, body);
            }
            DisplayEvent::ModelSwitched(name) => {
                self.push_entry(EntryKind::Note, format!("model switched to {name}"));
                self.model = name;
            }
        }
    }

    fn accept_request(&mut self, req: UiRequest) {
        if let UiRequest::Input { prompt, .. } = &req {
            self.push_entry(EntryKind::Note, prompt.clone());
        }
        self.pending = Some(req);
    }

    /// Returns `true` when the app should quit.
    fn handle_event(&mut self, event: Event) -> bool {
        let key = match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => key,
            _ => return false,
        };

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d')) {
            return true;
        }

        if matches!(self.pending, Some(UiRequest::Permission { .. })) {
            self.answer_permission(key.code);
            return false;
        }

        match key.code {
            KeyCode::Char(c) => self.input.push(c),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Enter => self.submit_line(),
            _ => {}
        }
        false
    }

    fn answer_permission(&mut self, code: KeyCode) {
        let decision = match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => PermissionDecision::Allow,
            KeyCode::Char('a') | KeyCode::Char('A') => PermissionDecision::AllowAlways,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => PermissionDecision::Deny,
            _ => return,
        };
        if let Some(UiRequest::Permission { reply, .. }) = self.pending.take() {
            let label = match decision {
                PermissionDecision::Allow => "allowed",
                PermissionDecision::AllowAlways => "always allowed",
                PermissionDecision::Deny => "denied",
            };
            self.push_entry(EntryKind::Note, format!("permission {label}"));
            let _ = reply.send(decision);
        }
    }

    fn submit_line(&mut self) {
        let line = std::mem::take(&mut self.input);
        let trimmed = line.trim().to_string();
        if trimmed.is_empty() {
            return;
        }

        if looks_like_command(&trimmed) {
            match parse_command(&trimmed) {
                Some(cmd) => {
                    self.push_entry(EntryKind::Note, trimmed);
                    // Unknown commands never reach the core; a full channel
                    // just drops the command.
                    let _ = self.commands_tx.try_send(cmd);
                }
                None => {
                    self.push_entry(EntryKind::Error, format!("unknown command: {trimmed}"));
                }
            }
            return;
        }

        match self.pending.take() {
            Some(UiRequest::Input { reply, .. }) => {
                self.push_entry(EntryKind::User, trimmed.clone());
                let _ = reply.send(trimmed);
            }
            Some(pending @ UiRequest::Permission { .. }) => {
                self.pending = Some(pending);
                self.push_entry(
                    EntryKind::Error,
                    "answer the permission prompt with y / n / a",
                );
            }
            None => {
                self.push_entry(EntryKind::Error, "the agent is busy; wait for the prompt");
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
