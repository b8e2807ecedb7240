// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::adapter::{ToolRequest, TypedTool};
use crate::workspace::Workspace;

/// Result-count ceiling so a `*` pattern on a large tree does not flood the
/// model context.
const MAX_RESULTS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct FindFileRequest {
    pub pattern: String,
}

impl ToolRequest for FindFileRequest {
    fn validate(&self) -> anyhow::Result<()> {
        if self.pattern.is_empty() {
            anyhow::bail!("'pattern' must not be empty");
        }
        Ok(())
    }
}

pub struct FindFileTool;

#[async_trait]
impl TypedTool for FindFileTool {
    type Req = FindFileRequest;
    type Resp = String;

    fn name(&self) -> &'static str {
        "find_file"
    }

    fn description(&self) -> &'static str {
        "Find files whose name matches a glob pattern (`*` matches anything, \
         `?` matches one character), searching the whole workspace tree. \
         Returns workspace-relative paths, one per line, capped at 200 results."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern matched against file names, e.g. '*.rs'"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn run(
        &self,
        _cancel: &CancellationToken,
        ws: &Workspace,
        req: Self::Req,
    ) -> anyhow::Result<Self::Resp> {
        let re = glob_to_regex(&req.pattern)
            .ok_or_else(|| anyhow::anyhow!("invalid pattern '{}'", req.pattern))?;

        let root = ws.root().to_path_buf();
        // walkdir is synchronous; the tree walk runs on the blocking pool so
        // the agent loop stays responsive on big workspaces.
        let matches = tokio::task::spawn_blocking(move || {
            let mut found: Vec<String> = Vec::new();
            let mut total = 0usize;
            for entry in WalkDir::new(&root)
                .into_iter()
                .filter_entry(|e| e.file_name() != ".git")
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let name = entry.file_name().to_string_lossy();
                if re.is_match(&name) {
                    total += 1;
                    if found.len() < MAX_RESULTS {
                        let rel = entry
                            .path()
                            .strip_prefix(&root)
                            .unwrap_or(entry.path())
                            .to_string_lossy()
                            .into_owned();
                        found.push(rel);
                    }
                }
            }
            (found, total)
        })
        .await?;

        let (mut found, total) = matches;
        if found.is_empty() {
            return Ok(format!("no files match '{}'", req.pattern));
        }
        found.sort();
        let mut out = found.join("\n");
        if total > MAX_RESULTS {
            out.push_str(&format!(
                "\n...[{} more matches omitted; use a more specific pattern]",
                total - MAX_RESULTS
            ));
        }
        Ok(out)
    }
}

/// Convert a simple shell glob pattern to a [`Regex`].
/// Only `*` (match anything) and `?` (match one char) are supported.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => {
                for esc in regex::escape(&c.to_string()).chars() {
                    re.push(esc);
                }
            }
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
