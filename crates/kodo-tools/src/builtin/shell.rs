// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;

use async_trait::async_trait;
#[cfg(unix)]
use libc;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::adapter::{ToolRequest, TypedTool};
use crate::workspace::Workspace;

/// Hard byte ceiling for combined stdout + stderr returned to the model.
const OUTPUT_LIMIT_BYTES: usize = 20_000;

/// Number of lines kept from the head of oversized output.
const HEAD_LINES: usize = 100;

/// Number of lines kept from the tail of oversized output.  Errors and
/// summaries almost always appear at the end of build/test output, so the
/// tail matters at least as much as the head.
const TAIL_LINES: usize = 100;

#[derive(Debug, Deserialize)]
pub struct RunShellRequest {
    /// Argv array: `command[0]` is the program, the rest are its arguments.
    /// No shell interpolation happens; quoting and globbing are literal.
    pub command: Vec<String>,
    pub timeout_secs: Option<u64>,
}

impl ToolRequest for RunShellRequest {
    fn validate(&self) -> anyhow::Result<()> {
        if self.command.is_empty() {
            anyhow::bail!("'command' must contain at least the program name");
        }
        if self.command[0].is_empty() {
            anyhow::bail!("'command[0]' (the program) must not be empty");
        }
        Ok(())
    }
}

pub struct RunShellTool {
    pub timeout_secs: u64,
}

impl Default for RunShellTool {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[async_trait]
impl TypedTool for RunShellTool {
    type Req = RunShellRequest;
    type Resp = String;

    fn name(&self) -> &'static str {
        "run_shell"
    }

    fn description(&self) -> &'static str {
        "Run a program with arguments (argv array, no shell interpolation) in \
         the workspace root and return stdout + stderr. Output is capped at \
         ~20 KB; when larger, the first 100 and last 100 lines are preserved \
         with an omission marker in the middle. Prefer non-interactive \
         commands; anything needing a TTY will hang until the timeout. Do NOT \
         use this for file operations; read_file, edit_file, find_file and \
         search_content exist for those."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "array",
                    "description": "Program and arguments, e.g. [\"cargo\", \"test\"]",
                    "items": { "type": "string" }
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Execution timeout in seconds (optional)"
                }
            },
            "required": ["command"]
        })
    }

    async fn run(
        &self,
        cancel: &CancellationToken,
        ws: &Workspace,
        req: Self::Req,
    ) -> anyhow::Result<Self::Resp> {
        // The command gate is the policy seam: commands the shell policy
        // does not admit never spawn.
        if let Some(gate) = ws.gate() {
            gate.check(cancel, &req.command).await?;
        }

        let timeout = req.timeout_secs.unwrap_or(self.timeout_secs);
        debug!(cmd = ?req.command, timeout, "run_shell");

        let mut cmd = Command::new(&req.command[0]);
        cmd.args(&req.command[1..]);
        cmd.current_dir(ws.root());
        // Isolate the subprocess from the TUI's terminal: with stdin at
        // /dev/null, isatty(0) is false and terminal-manipulation code paths
        // are skipped.  kill_on_drop ensures the child receives SIGKILL when
        // the timeout or cancellation drops the future.
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);
        // setsid() detaches the child from the controlling terminal so it
        // cannot open /dev/tty and emit escape sequences into the TUI.
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        let output = tokio::select! {
            _ = cancel.cancelled() => anyhow::bail!("cancelled"),
            result = tokio::time::timeout(
                std::time::Duration::from_secs(timeout),
                cmd.output(),
            ) => match result {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => anyhow::bail!("spawn error: {e}"),
                Err(_) => anyhow::bail!("timeout after {timeout}s"),
            },
        };

        let mut content = String::new();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.is_empty() {
            content.push_str(&head_tail_truncate(&stdout));
        }
        if !stderr.is_empty() {
            if !content.is_empty() {
                content.push('\n');
            }
            content.push_str("[stderr]\n");
            content.push_str(&head_tail_truncate(&stderr));
        }

        let code = output.status.code().unwrap_or(-1);
        if code == 0 {
            if content.is_empty() {
                content = "[exit 0]".to_string();
            }
            Ok(content)
        } else if code == 1 {
            // Exit code 1 is the Unix convention for "no matches" (grep) and
            // "condition false" (test); treating it as a hard failure
            // confuses the model into believing the command itself broke.
            Ok(format!("[exit 1]\n{content}"))
        } else {
            anyhow::bail!("[exit {code}]\n{content}")
        }
    }
}

/// Truncate `s` to fit within `OUTPUT_LIMIT_BYTES`, keeping the first
/// `HEAD_LINES` and last `TAIL_LINES` verbatim with an omission marker in
/// the middle.
pub(crate) fn head_tail_truncate(s: &str) -> String {
    if s.len() <= OUTPUT_LIMIT_BYTES {
        return s.to_string();
    }

    let lines: Vec<&str> = s.lines().collect();
    let total = lines.len();

    if total <= HEAD_LINES + TAIL_LINES {
        // Byte budget exceeded by very long lines; fall back to a byte-level
        // head + tail split.
        let head_str = &s[..(OUTPUT_LIMIT_BYTES / 2).min(s.len())];
        let tail_str = &s[s.len().saturating_sub(OUTPUT_LIMIT_BYTES / 2)..];
        let omitted = s.len() - head_str.len() - tail_str.len();
        return format!("{head_str}\n...[{omitted} bytes omitted]...\n{tail_str}");
    }

    let head = lines[..HEAD_LINES].join("\n");
    let tail = lines[total - TAIL_LINES..].join("\n");
    let omitted_lines = total - HEAD_LINES - TAIL_LINES;
    let omitted_bytes = s.len().saturating_sub(head.len() + tail.len());
    format!("{head}\n...[{omitted_lines} lines / ~{omitted_bytes} bytes omitted]...\n{tail}")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapter::Adapter;
    use crate::tool::Tool;
    use crate::workspace::CommandGate;

    fn ws() -> Arc<Workspace> {
        Arc::new(Workspace::new(std::env::temp_dir()))
    }

    fn args(v: Value) -> serde_json::Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn runs_argv_and_captures_stdout() {
        let tool = Adapter::new(RunShellTool::default(), ws());
        let out = tool
            .execute(
                &CancellationToken::new(),
                &args(json!({"command": ["echo", "hello"]})),
            )
            .await
            .unwrap();
        assert!(out.contains("hello"));
    }

    #[tokio::test]
    async fn argv_is_not_shell_interpolated() {
        let tool = Adapter::new(RunShellTool::default(), ws());
        let out = tool
            .execute(
                &CancellationToken::new(),
                &args(json!({"command": ["echo", "$HOME"]})),
            )
            .await
            .unwrap();
        assert!(out.contains("$HOME"), "no expansion should occur: {out}");
    }

    #[tokio::test]
    async fn nonzero_exit_beyond_one_is_error() {
        let tool = Adapter::new(RunShellTool::default(), ws());
        let err = tool
            .execute(
                &CancellationToken::new(),
                &args(json!({"command": ["sh", "-c", "exit 2"]})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("[exit 2]"));
    }

    #[tokio::test]
    async fn exit_one_is_reported_but_not_error() {
        let tool = Adapter::new(RunShellTool::default(), ws());
        let out = tool
            .execute(
                &CancellationToken::new(),
                &args(json!({"command": ["sh", "-c", "exit 1"]})),
            )
            .await
            .unwrap();
        assert!(out.contains("[exit 1]"));
    }

    #[tokio::test]
    async fn empty_command_rejected_by_validate() {
        let tool = Adapter::new(RunShellTool::default(), ws());
        let err = tool
            .execute(&CancellationToken::new(), &args(json!({"command": []})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at least the program name"));
    }

    #[tokio::test]
    async fn timeout_kills_the_child() {
        let tool = Adapter::new(RunShellTool { timeout_secs: 1 }, ws());
        let err = tool
            .execute(
                &CancellationToken::new(),
                &args(json!({"command": ["sleep", "60"], "timeout_secs": 1})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[tokio::test]
    async fn pre_cancelled_token_aborts_before_running() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let tool = Adapter::new(RunShellTool::default(), ws());
        let err = tool
            .execute(&cancel, &args(json!({"command": ["sleep", "60"]})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    struct DenyAll;

    #[async_trait]
    impl CommandGate for DenyAll {
        async fn check(
            &self,
            _cancel: &CancellationToken,
            argv: &[String],
        ) -> anyhow::Result<()> {
            anyhow::bail!("user denied '{}'", argv[0])
        }
    }

    #[tokio::test]
    async fn gate_denial_prevents_spawn() {
        let ws = Arc::new(Workspace::new(std::env::temp_dir()).with_gate(Arc::new(DenyAll)));
        let tool = Adapter::new(RunShellTool::default(), ws);
        let err = tool
            .execute(
                &CancellationToken::new(),
                &args(json!({"command": ["echo", "x"]})),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("user denied 'echo'"));
    }

    #[test]
    fn short_output_passes_through_unchanged() {
        let s = "hello\nworld\n";
        assert_eq!(head_tail_truncate(s), s);
    }

    #[test]
    fn large_output_keeps_head_and_tail() {
        let mut lines: Vec<String> = vec!["BUILD START".to_string()];
        for i in 0..800 {
            lines.push(format!("middle line {i} padding padding padding padding"));
        }
        lines.push("BUILD ERROR".to_string());
        let content = lines.join("\n");
        let result = head_tail_truncate(&content);
        assert!(result.contains("BUILD START"));
        assert!(result.contains("BUILD ERROR"));
        assert!(result.contains("omitted"));
    }
}
