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
use crate::workspace::{has_binary_content, Workspace};

/// Leading matches kept when a query is too broad.  Later matches are less
/// relevant, so the tail is not preserved.
const MAX_MATCHES: usize = 200;

/// Files larger than this are skipped; grepping generated blobs wastes time
/// and the results drown the useful hits.
const MAX_FILE_BYTES: u64 = 1_000_000;

#[derive(Debug, Deserialize)]
pub struct SearchContentRequest {
    pub query: String,
    /// Subtree to search; defaults to the workspace root.
    pub path: Option<String>,
}

impl ToolRequest for SearchContentRequest {
    fn validate(&self) -> anyhow::Result<()> {
        if self.query.is_empty() {
            anyhow::bail!("'query' must not be empty");
        }
        Ok(())
    }
}

pub struct SearchContentTool;

#[async_trait]
impl TypedTool for SearchContentTool {
    type Req = SearchContentRequest;
    type Resp = String;

    fn name(&self) -> &'static str {
        "search_content"
    }

    fn description(&self) -> &'static str {
        "Search file contents with a regular expression. Returns matches as \
         path:line:text, capped at 200 leading matches. Binary files, files \
         over 1 MB, and .git are skipped. Use this to locate the relevant \
         region before reading a file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Subtree to search (default: workspace root)"
                }
            },
            "required": ["query"]
        })
    }

    async fn run(
        &self,
        _cancel: &CancellationToken,
        ws: &Workspace,
        req: Self::Req,
    ) -> anyhow::Result<Self::Resp> {
        let re = Regex::new(&req.query)
            .map_err(|e| anyhow::anyhow!("invalid regex '{}': {e}", req.query))?;
        let start = match &req.path {
            Some(p) => ws.resolve(p)?,
            None => ws.root().to_path_buf(),
        };
        let root = ws.root().to_path_buf();

        let (matches, total) = tokio::task::spawn_blocking(move || {
            let mut found: Vec<String> = Vec::new();
            let mut total = 0usize;
            for entry in WalkDir::new(&start)
                .into_iter()
                .filter_entry(|e| e.file_name() != ".git")
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
                    continue;
                }
                let bytes = match std::fs::read(entry.path()) {
                    Ok(b) => b,
                    Err(_) => continue,
                };
                if has_binary_content(&bytes) {
                    continue;
                }
                let text = String::from_utf8_lossy(&bytes);
                let rel = entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .into_owned();
                for (lineno, line) in text.lines().enumerate() {
                    if re.is_match(line) {
                        total += 1;
                        if found.len() < MAX_MATCHES {
                            found.push(format!("{rel}:{}:{}", lineno + 1, line.trim_end()));
                        }
                    }
                }
            }
            (found, total)
        })
        .await?;

        if matches.is_empty() {
            return Ok(format!("no matches for '{}'", req.query));
        }
        let mut out = matches.join("\n");
        if total > MAX_MATCHES {
            out.push_str(&format!(
                "\n...[{} more matches omitted; use a more specific pattern to see them]",
                total - MAX_MATCHES
            ));
        }
        Ok(out)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
