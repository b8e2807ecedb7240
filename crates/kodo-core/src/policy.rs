// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use kodo_config::{PolicyConfig, PolicyList};
use kodo_tools::CommandGate;

use crate::ui::{PermissionDecision, ToolPreview, Ui};

/// Which static list matched during lookup.
enum Verdict {
    Allowed,
    Denied,
    NoMatch,
}

#[derive(Clone, Copy)]
enum Domain {
    Shell,
    Tool,
}

#[derive(Default)]
struct SessionAllow {
    shell: HashSet<String>,
    tool: HashSet<String>,
}

/// Decides whether a tool invocation (and, for shell, a command) may run.
///
/// Lookup order is `session_allow → allow → deny`; a miss everywhere
/// escalates to the user via the UI permission prompt.  "Allow always"
/// answers grow the session set, which lives for the whole process.
///
/// One reader/writer lock guards both session sets.  Critical sections are
/// straight-line; the UI prompt happens with no lock held, so concurrent
/// checks from other sessions are never blocked on a human.
pub struct PolicyService {
    shell: PolicyList,
    tool: PolicyList,
    session: RwLock<SessionAllow>,
    ui: Arc<dyn Ui>,
}

impl PolicyService {
    pub fn new(cfg: &PolicyConfig, ui: Arc<dyn Ui>) -> Self {
        Self {
            shell: cfg.shell.clone(),
            tool: cfg.tool.clone(),
            session: RwLock::new(SessionAllow::default()),
            ui,
        }
    }

    /// Check a shell command.  The key is the command root: the basename of
    /// `argv[0]`.
    pub async fn check_shell(
        &self,
        cancel: &CancellationToken,
        argv: &[String],
    ) -> anyhow::Result<()> {
        let key = argv
            .first()
            .map(|program| command_root(program))
            .unwrap_or_default();
        if key.is_empty() {
            anyhow::bail!("empty shell command");
        }
        let preview = ToolPreview::ShellCommand {
            command: argv.to_vec(),
        };
        self.check(
            cancel,
            Domain::Shell,
            &key,
            &format!("Run shell command '{key}'?"),
            Some(preview),
        )
        .await
    }

    /// Check a tool invocation.  The key is the tool name verbatim; the
    /// args are only used to build a preview for the prompt.
    pub async fn check_tool(
        &self,
        cancel: &CancellationToken,
        name: &str,
        args: &Map<String, Value>,
    ) -> anyhow::Result<()> {
        if name.is_empty() {
            anyhow::bail!("empty tool name");
        }
        let preview = preview_for(name, args);
        self.check(
            cancel,
            Domain::Tool,
            name,
            &format!("Allow tool '{name}'?"),
            preview,
        )
        .await
    }

    async fn check(
        &self,
        cancel: &CancellationToken,
        domain: Domain,
        key: &str,
        prompt: &str,
        preview: Option<ToolPreview>,
    ) -> anyhow::Result<()> {
        match self.lookup(domain, key) {
            Verdict::Allowed => return Ok(()),
            Verdict::Denied => anyhow::bail!("'{key}' is denied by policy"),
            Verdict::NoMatch => {}
        }

        // No lock is held across this await.
        let decision = self
            .ui
            .read_permission(cancel, prompt, preview.as_ref())
            .await?;
        match decision {
            PermissionDecision::Allow => Ok(()),
            PermissionDecision::Deny => anyhow::bail!("user denied"),
            PermissionDecision::AllowAlways => {
                debug!(key, "session allow added");
                let mut session = self.session.write().expect("lock poisoned");
                match domain {
                    Domain::Shell => session.shell.insert(key.to_string()),
                    Domain::Tool => session.tool.insert(key.to_string()),
                };
                Ok(())
            }
        }
    }

    fn lookup(&self, domain: Domain, key: &str) -> Verdict {
        let (list, session_hit) = {
            let session = self.session.read().expect("lock poisoned");
            match domain {
                Domain::Shell => (&self.shell, session.shell.contains(key)),
                Domain::Tool => (&self.tool, session.tool.contains(key)),
            }
        };
        if session_hit || list.allow.iter().any(|entry| entry == key) {
            Verdict::Allowed
        } else if list.deny.iter().any(|entry| entry == key) {
            Verdict::Denied
        } else {
            Verdict::NoMatch
        }
    }
}

/// Route the shell tool's command gate through the shell policy.
#[async_trait]
impl CommandGate for PolicyService {
    async fn check(&self, cancel: &CancellationToken, argv: &[String]) -> anyhow::Result<()> {
        self.check_shell(cancel, argv).await
    }
}

/// Basename of the program path: `/usr/bin/git` and `git` share one key.
fn command_root(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Build a preview for operations that carry renderable information.
fn preview_for(name: &str, args: &Map<String, Value>) -> Option<ToolPreview> {
    match name {
        "run_shell" => {
            let command = args
                .get("command")?
                .as_array()?
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect::<Vec<_>>();
            Some(ToolPreview::ShellCommand { command })
        }
        "edit_file" => {
            let path = args.get("path")?.as_str()?.to_string();
            let operations = args.get("operations")?.as_array()?.clone();
            Some(ToolPreview::EditOperations { path, operations })
        }
        _ => None,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
