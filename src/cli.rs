// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::Parser;

/// An interactive terminal AI coding agent.
///
/// Starts with no arguments: reads GEMINI_API_KEY from the environment,
/// loads configuration, and enters the interactive UI.
#[derive(Debug, Parser)]
#[command(name = "kodo", version, about)]
pub struct Cli {
    /// Explicit config file (merged over the discovered config layers)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Model name override, e.g. "gemini-2.0-pro"
    #[arg(long, value_name = "NAME")]
    pub model: Option<String>,

    /// Workspace root the tools operate in
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub workspace: PathBuf,

    /// Increase log verbosity; only effective with KODO_LOG_FILE set
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
