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

/// One exact-match replacement.  `old_str` must occur exactly once in the
/// current file content; ambiguity is an error rather than a guess.
#[derive(Debug, Clone, Deserialize)]
pub struct EditOperation {
    pub old_str: String,
    pub new_str: String,
}

#[derive(Debug, Deserialize)]
pub struct EditFileRequest {
    pub path: String,
    pub operations: Vec<EditOperation>,
}

impl ToolRequest for EditFileRequest {
    fn validate(&self) -> anyhow::Result<()> {
        if self.path.is_empty() {
            anyhow::bail!("'path' must not be empty");
        }
        if self.operations.is_empty() {
            anyhow::bail!("'operations' must contain at least one edit");
        }
        for (i, op) in self.operations.iter().enumerate() {
            if op.old_str.is_empty() {
                anyhow::bail!("operation {i}: 'old_str' must not be empty");
            }
            if op.old_str == op.new_str {
                anyhow::bail!("operation {i}: 'old_str' and 'new_str' are identical");
            }
        }
        Ok(())
    }
}

pub struct EditFileTool;

#[async_trait]
impl TypedTool for EditFileTool {
    type Req = EditFileRequest;
    type Resp = String;

    fn name(&self) -> &'static str {
        "edit_file"
    }

    fn description(&self) -> &'static str {
        "Apply exact string replacements to an existing file. Each operation's \
         old_str must match the current content exactly once; include enough \
         surrounding context to make it unique. Operations apply in order, each \
         seeing the previous one's result. Strip any L{n}: prefixes copied from \
         read_file output before using text as old_str."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path relative to the workspace root"
                },
                "operations": {
                    "type": "array",
                    "description": "Replacements applied in order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "old_str": {
                                "type": "string",
                                "description": "Exact text to replace; must occur exactly once"
                            },
                            "new_str": {
                                "type": "string",
                                "description": "Replacement text"
                            }
                        },
                        "required": ["old_str", "new_str"]
                    }
                }
            },
            "required": ["path", "operations"]
        })
    }

    async fn run(
        &self,
        _cancel: &CancellationToken,
        ws: &Workspace,
        req: Self::Req,
    ) -> anyhow::Result<Self::Resp> {
        let path = ws.resolve(&req.path)?;
        debug!(path = %path.display(), ops = req.operations.len(), "edit_file");

        let mut content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("read error: {e}"))?;

        for (i, op) in req.operations.iter().enumerate() {
            let matches = content.matches(&op.old_str).count();
            match matches {
                0 => anyhow::bail!(
                    "operation {i}: old_str not found in {}; re-read the file and \
                     check for exact whitespace",
                    req.path
                ),
                1 => content = content.replacen(&op.old_str, &op.new_str, 1),
                n => anyhow::bail!(
                    "operation {i}: old_str matches {n} times in {}; add surrounding \
                     context to make it unique",
                    req.path
                ),
            }
        }

        tokio::fs::write(&path, &content)
            .await
            .map_err(|e| anyhow::anyhow!("write error: {e}"))?;
        Ok(format!(
            "Applied {} edit(s) to {}",
            req.operations.len(),
            req.path
        ))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
