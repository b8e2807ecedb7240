// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::adapter::{ToolRequest, TypedTool};
use crate::workspace::Workspace;

#[derive(Debug, Deserialize)]
pub struct ListDirectoryRequest {
    pub path: String,
}

impl ToolRequest for ListDirectoryRequest {
    fn validate(&self) -> anyhow::Result<()> {
        if self.path.is_empty() {
            anyhow::bail!("'path' must not be empty");
        }
        Ok(())
    }
}

pub struct ListDirectoryTool;

#[async_trait]
impl TypedTool for ListDirectoryTool {
    type Req = ListDirectoryRequest;
    type Resp = String;

    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "List the entries of one directory, sorted by name. Directories carry a \
         trailing slash. Use '.' for the workspace root. Not recursive; use \
         find_file to locate files by pattern across the tree."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to the workspace root"
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
        let mut rd = tokio::fs::read_dir(&path)
            .await
            .map_err(|e| anyhow::anyhow!("list error: {e}"))?;

        let mut entries: Vec<String> = Vec::new();
        while let Some(entry) = rd
            .next_entry()
            .await
            .map_err(|e| anyhow::anyhow!("list error: {e}"))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(format!("{} is empty", req.path));
        }
        Ok(entries.join("\n"))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
