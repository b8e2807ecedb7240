// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::adapter::{ToolRequest, TypedTool};
use crate::workspace::Workspace;

#[derive(Debug, Deserialize)]
pub struct WriteFileRequest {
    pub path: String,
    pub content: String,
}

impl ToolRequest for WriteFileRequest {
    fn validate(&self) -> anyhow::Result<()> {
        if self.path.is_empty() {
            anyhow::bail!("'path' must not be empty");
        }
        Ok(())
    }
}

pub struct WriteFileTool;

#[async_trait]
impl TypedTool for WriteFileTool {
    type Req = WriteFileRequest;
    type Resp = String;

    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Create or overwrite a file with the given content. Parent directories \
         are created as needed. For small changes to an existing file prefer \
         edit_file, which patches in place instead of rewriting everything."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn run(
        &self,
        _cancel: &CancellationToken,
        ws: &Workspace,
        req: Self::Req,
    ) -> anyhow::Result<Self::Resp> {
        let path = ws.resolve(&req.path)?;
        debug!(path = %path.display(), bytes = req.content.len(), "write_file");
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| anyhow::anyhow!("creating {}: {e}", parent.display()))?;
        }
        tokio::fs::write(&path, &req.content)
            .await
            .map_err(|e| anyhow::anyhow!("write error: {e}"))?;
        Ok(format!("Wrote {} bytes to {}", req.content.len(), req.path))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
