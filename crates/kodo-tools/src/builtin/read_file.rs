// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::adapter::{ToolRequest, TypedTool};
use crate::workspace::{has_binary_content, Workspace};

/// Default number of lines returned when the caller does not specify a
/// limit.  Kept small to avoid flooding the model context on the first
/// read; the agent can paginate with offset + limit.
const DEFAULT_LINE_LIMIT: usize = 200;

/// Hard byte ceiling applied in addition to the line limit.  Whichever
/// constraint is hit first determines where the output is cut.
const MAX_BYTES: usize = 20_000;

#[derive(Debug, Deserialize)]
pub struct ReadFileRequest {
    pub path: String,
    /// 1-indexed line number to start reading from.
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl ToolRequest for ReadFileRequest {
    fn validate(&self) -> anyhow::Result<()> {
        if self.path.is_empty() {
            anyhow::bail!("'path' must not be empty");
        }
        if self.offset == Some(0) {
            anyhow::bail!("'offset' is 1-indexed; 0 is not a valid line number");
        }
        Ok(())
    }
}

pub struct ReadFileTool;

#[async_trait]
impl TypedTool for ReadFileTool {
    type Req = ReadFileRequest;
    type Resp = String;

    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a text file from the workspace. Default: 200 lines / 20 KB, whichever \
         comes first. Lines are formatted as L{n}:content (1-indexed). When more \
         lines exist a pagination notice shows the next offset. Use search_content \
         to find the relevant region first, then read only those lines with \
         offset+limit instead of pulling whole large files."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the workspace root"
                },
                "offset": {
                    "type": "integer",
                    "description": "1-indexed line number to start reading from (default 1)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (default 200)"
                }
            },
            "required": ["path"]
        })
    }

    async fn run(
        &self,
        _cancel: &CancellationToken,
        ws: &Workspace,
        req: Self::Req,
    ) -> anyhow::Result<Self::Resp> {
        let path = ws.resolve(&req.path)?;
        let offset = req.offset.unwrap_or(1);
        let limit = req.limit.unwrap_or(DEFAULT_LINE_LIMIT);
        debug!(path = %path.display(), offset, limit, "read_file");

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| anyhow::anyhow!("read error: {e}"))?;

        if has_binary_content(&bytes) {
            anyhow::bail!(
                "'{}' looks binary ({} bytes); read_file only handles text",
                req.path,
                bytes.len()
            );
        }

        let text = String::from_utf8_lossy(&bytes);
        let all_lines: Vec<&str> = text.lines().collect();
        let total = all_lines.len();
        let start = offset.saturating_sub(1);

        // Collect lines up to both the line limit and the byte cap.
        let mut selected: Vec<String> = Vec::new();
        let mut byte_count = 0usize;
        let mut truncated_by_bytes = false;
        for (i, line) in all_lines.iter().enumerate().skip(start).take(limit) {
            let line_bytes = line.len() + 1;
            if byte_count + line_bytes > MAX_BYTES {
                truncated_by_bytes = true;
                break;
            }
            selected.push(format!("L{}:{}", i + 1, line));
            byte_count += line_bytes;
        }

        let last_shown = start + selected.len();
        let mut content = selected.join("\n");
        if last_shown < total {
            let reason = if truncated_by_bytes {
                format!("byte limit ({MAX_BYTES} B) reached")
            } else {
                format!("{} more lines", total - last_shown)
            };
            content.push_str(&format!(
                "\n...[{reason} — showing L{}-L{} of {total}; use offset={} to continue]",
                offset,
                offset + selected.len().saturating_sub(1),
                last_shown + 1
            ));
        }
        Ok(content)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
