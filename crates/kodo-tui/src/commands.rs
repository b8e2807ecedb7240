// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use kodo_core::UiCommand;

/// Parse a slash command from an input line.
///
/// Returns `None` for anything that is not a recognized command; the
/// caller decides whether the line is chat input or noise.  Unknown slash
/// commands are dropped here before they reach the core.
pub fn parse_command(line: &str) -> Option<UiCommand> {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    match parts.next()? {
        "models" => Some(UiCommand::ListModels),
        "model" => {
            let model = parts.next()?.to_string();
            Some(UiCommand::SwitchModel { model })
        }
        _ => None,
    }
}

/// True when the line is shaped like a command attempt, recognized or not.
pub fn looks_like_command(line: &str) -> bool {
    line.trim_start().starts_with('/')
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
