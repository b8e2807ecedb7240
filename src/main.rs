// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::Cli;
use kodo_core::{run_interactive, Deps};
use kodo_model::{GeminiProvider, Provider};
use kodo_tools::{builtin_registry, new_todo_store, Workspace};
use kodo_tui::TerminalUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    install_panic_hook();

    let mut config = kodo_config::load(cli.config.as_deref())?;
    if let Some(model) = &cli.model {
        config.model.name = model.clone();
    }
    let config = Arc::new(config);

    // Fail before the terminal is taken over: a missing API key is a fatal
    // initialization error with a non-zero exit, not a TUI message.
    if std::env::var(&config.model.api_key_env).is_err() {
        anyhow::bail!(
            "environment variable {} is not set (required for the Gemini API)",
            config.model.api_key_env
        );
    }

    let workspace_root = std::fs::canonicalize(&cli.workspace)
        .with_context(|| format!("resolving workspace root {}", cli.workspace.display()))?;

    let ui = Arc::new(TerminalUi::new());
    let model_cfg = config.model.clone();
    let shell_timeout = config.tools.shell_timeout_secs;
    let deps = Deps {
        config: config.clone(),
        ui,
        provider_factory: Box::new(move || {
            Ok(Arc::new(GeminiProvider::from_config(&model_cfg)?) as Arc<dyn Provider>)
        }),
        make_registry: Box::new(move |policy| {
            let ws = Arc::new(Workspace::new(workspace_root).with_gate(policy));
            builtin_registry(ws, new_todo_store(), shell_timeout)
        }),
    };

    let cancel = CancellationToken::new();
    run_interactive(&cancel, deps).await
}

/// Restore the terminal to a usable state before printing a panic message.
/// Without this, a panic while in raw-mode / alternate-screen leaves the
/// terminal permanently garbled.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        ratatui::restore();
        original_hook(info);
    }));
}

/// In TUI mode tracing output written to stderr corrupts the ratatui
/// display, so logging stays off unless the caller opts in by pointing
/// KODO_LOG_FILE at a file.
fn init_logging(verbosity: u8) {
    if let Ok(log_path) = std::env::var("KODO_LOG_FILE") {
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            let default_level = match verbosity {
                0 => "info",
                1 => "debug",
                _ => "trace",
            };
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level));
            let _ = tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .with(filter)
                .try_init();
            return;
        }
    }
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::filter::LevelFilter::OFF)
        .try_init();
}
