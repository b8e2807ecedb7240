// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use kodo_config::Config;
use kodo_model::Provider;
use kodo_tools::ToolRegistry;

use crate::orchestrator::Orchestrator;
use crate::policy::PolicyService;
use crate::ui::{StatusPhase, Ui, UiCommand};

/// Everything the supervisor needs injected.  The provider comes as a
/// factory so that its construction cost lands *after* the UI is live;
/// a slow backend must never delay first paint.
pub struct Deps {
    pub config: Arc<Config>,
    pub ui: Arc<dyn Ui>,
    pub provider_factory: Box<dyn FnOnce() -> anyhow::Result<Arc<dyn Provider>> + Send>,
    /// Builds the tool registry once the policy service exists (the shell
    /// tool's command gate routes through it).
    pub make_registry: Box<dyn FnOnce(Arc<PolicyService>) -> ToolRegistry + Send>,
}

/// Session entry point: owns the REPL task, the command-handler task, and
/// the UI lifetime.
///
/// The UI runs in this task and blocks until the user quits; its exit
/// cancels the internal token, after which both workers are joined.  The
/// caller's token composes as the parent, so external shutdown wins too.
pub async fn run_interactive(cancel: &CancellationToken, deps: Deps) -> anyhow::Result<()> {
    let shutdown = cancel.child_token();
    let (provider_tx, provider_rx) = watch::channel::<Option<Arc<dyn Provider>>>(None);

    let repl = tokio::spawn(repl_task(
        shutdown.clone(),
        deps.config,
        deps.ui.clone(),
        deps.provider_factory,
        deps.make_registry,
        provider_tx,
    ));
    let commands = deps.ui.take_commands();
    let handler = tokio::spawn(command_task(
        shutdown.clone(),
        deps.ui.clone(),
        provider_rx,
        commands,
    ));

    let ui_result = deps.ui.start().await;
    shutdown.cancel();
    let _ = repl.await;
    let _ = handler.await;
    ui_result
}

/// Await UI readiness, construct the provider, then loop goals through the
/// orchestrator until shutdown.
async fn repl_task(
    shutdown: CancellationToken,
    config: Arc<Config>,
    ui: Arc<dyn Ui>,
    provider_factory: Box<dyn FnOnce() -> anyhow::Result<Arc<dyn Provider>> + Send>,
    make_registry: Box<dyn FnOnce(Arc<PolicyService>) -> ToolRegistry + Send>,
    provider_tx: watch::Sender<Option<Arc<dyn Provider>>>,
) {
    // Ordering guarantee: the UI signals ready before any provider factory
    // work begins.
    tokio::select! {
        _ = shutdown.cancelled() => return,
        _ = ui.ready() => {}
    }

    let provider = match provider_factory() {
        Ok(p) => p,
        Err(e) => {
            ui.write_message(&format!("startup failed: {e:#}"));
            return;
        }
    };
    // One-shot multi-consumer broadcast: the command handler observes the
    // value flip from None to Some.
    let _ = provider_tx.send(Some(provider.clone()));

    let policy = Arc::new(PolicyService::new(&config.policy, ui.clone()));
    let registry = Arc::new(make_registry(policy.clone()));

    let definitions: Vec<kodo_model::ToolDefinition> = registry
        .schemas()
        .into_iter()
        .map(|s| kodo_model::ToolDefinition {
            name: s.name,
            description: s.description,
            parameters: s.parameters,
        })
        .collect();
    if let Err(e) = provider.define_tools(&definitions).await {
        warn!("define_tools failed: {e}");
    }

    let mut orchestrator = Orchestrator::new(
        provider,
        policy,
        ui.clone(),
        registry,
        config.agent.max_turns,
    );

    loop {
        ui.write_status(StatusPhase::Ready, "ready");
        let goal = tokio::select! {
            _ = shutdown.cancelled() => return,
            r = ui.read_input(&shutdown, "What would you like to do?") => match r {
                Ok(g) => g,
                Err(e) => {
                    debug!("input closed, repl exiting: {e:#}");
                    return;
                }
            }
        };
        if goal.trim().is_empty() {
            continue;
        }
        match orchestrator.run(&shutdown, &goal).await {
            Ok(()) => {}
            Err(_) if shutdown.is_cancelled() => return,
            Err(e) => ui.write_message(&format!("error: {e:#}")),
        }
    }
}

/// Dispatch UI commands once the provider is ready.  Unknown commands never
/// reach this channel; the UI drops them.
async fn command_task(
    shutdown: CancellationToken,
    ui: Arc<dyn Ui>,
    mut provider_rx: watch::Receiver<Option<Arc<dyn Provider>>>,
    commands: Option<mpsc::Receiver<UiCommand>>,
) {
    let mut commands = match commands {
        Some(rx) => rx,
        None => return,
    };

    let provider = loop {
        if let Some(p) = provider_rx.borrow().clone() {
            break p;
        }
        tokio::select! {
            _ = shutdown.cancelled() => return,
            changed = provider_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    };

    loop {
        let command = tokio::select! {
            _ = shutdown.cancelled() => return,
            c = commands.recv() => match c {
                Some(c) => c,
                None => return,
            }
        };
        match command {
            UiCommand::ListModels => match provider.list_models().await {
                Ok(names) => ui.write_model_list(&names),
                Err(e) => ui.write_message(&format!("list models failed: {e}")),
            },
            UiCommand::SwitchModel { model } => match provider.set_model(&model) {
                Ok(()) => ui.set_model(&model),
                Err(e) => ui.write_message(&format!("switch model failed: {e}")),
            },
        }
    }
}
