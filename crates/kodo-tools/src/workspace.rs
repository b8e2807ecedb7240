// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Gate consulted by the shell tool before any command is spawned.
///
/// The policy service implements this on the core side; keeping it a trait
/// here lets the tools crate stay independent of the orchestrator.
#[async_trait]
pub trait CommandGate: Send + Sync {
    /// Returns `Ok` when the command may run.  The error text is mirrored
    /// back to the model as the tool failure.
    async fn check(&self, cancel: &CancellationToken, argv: &[String]) -> anyhow::Result<()>;
}

/// Context shared by all workspace tools: the project root, path
/// resolution, binary sniffing, and the shell command gate.
pub struct Workspace {
    root: PathBuf,
    gate: Option<Arc<dyn CommandGate>>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            gate: None,
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn CommandGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn gate(&self) -> Option<&Arc<dyn CommandGate>> {
        self.gate.as_ref()
    }

    /// Resolve a model-supplied path against the workspace root.
    ///
    /// Relative paths are joined to the root; absolute paths are accepted
    /// as-is.  Either way the lexically normalized result must stay inside
    /// the root; tools never touch files above the workspace.
    pub fn resolve(&self, path: &str) -> anyhow::Result<PathBuf> {
        if path.is_empty() {
            anyhow::bail!("path is empty");
        }
        let joined = {
            let p = Path::new(path);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                self.root.join(p)
            }
        };
        let normalized = normalize(&joined);
        if !normalized.starts_with(&self.root) {
            anyhow::bail!(
                "path '{}' escapes the workspace root '{}'",
                path,
                self.root.display()
            );
        }
        Ok(normalized)
    }
}

/// Lexical normalization: resolves `.` and `..` components without touching
/// the filesystem, so nonexistent target paths (writes) still normalize.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

/// Samples up to 4096 bytes to decide whether content is binary.
///
/// Rules (same heuristic as git): any null byte, or more than 30%
/// non-printable bytes outside TAB/LF/CR.
pub fn has_binary_content(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let sample = &bytes[..bytes.len().min(4096)];
    if sample.contains(&0u8) {
        return true;
    }
    let non_printable = sample
        .iter()
        .filter(|&&b| b < 9 || (b > 13 && b < 32))
        .count();
    non_printable * 100 / sample.len() > 30
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ws() -> Workspace {
        Workspace::new("/work/project")
    }

    #[test]
    fn relative_path_joins_root() {
        let p = ws().resolve("src/main.rs").unwrap();
        assert_eq!(p, PathBuf::from("/work/project/src/main.rs"));
    }

    #[test]
    fn absolute_path_inside_root_is_accepted() {
        let p = ws().resolve("/work/project/a.txt").unwrap();
        assert_eq!(p, PathBuf::from("/work/project/a.txt"));
    }

    #[test]
    fn dot_components_normalize() {
        let p = ws().resolve("./src/../src/lib.rs").unwrap();
        assert_eq!(p, PathBuf::from("/work/project/src/lib.rs"));
    }

    #[test]
    fn escape_above_root_is_rejected() {
        assert!(ws().resolve("../outside.txt").is_err());
        assert!(ws().resolve("/etc/passwd").is_err());
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(ws().resolve("").is_err());
    }

    #[test]
    fn null_byte_is_binary() {
        assert!(has_binary_content(b"abc\x00def"));
    }

    #[test]
    fn plain_text_is_not_binary() {
        assert!(!has_binary_content(b"fn main() {}\n"));
    }

    #[test]
    fn empty_content_is_not_binary() {
        assert!(!has_binary_content(b""));
    }

    #[test]
    fn control_byte_heavy_content_is_binary() {
        let mut data = vec![0x01u8; 40];
        data.extend_from_slice(&[b'a'; 60]);
        assert!(has_binary_content(&data));
    }
}
