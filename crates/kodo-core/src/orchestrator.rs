// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use kodo_model::{
    GenerateRequest, Message, Provider, ProviderError, ResponseContent, ToolCall, ToolDefinition,
    ToolResult,
};
use kodo_tools::ToolRegistry;

use crate::history::History;
use crate::policy::PolicyService;
use crate::truncate::truncate_history;
use crate::ui::{StatusPhase, Ui};

/// Longest provider back-off hint honored inside the loop.  Anything larger
/// yields control to the user instead of silently stalling the session.
const RETRY_AFTER_CEILING: Duration = Duration::from_secs(30);

/// The per-goal control loop: generate → classify → dispatch tools or show
/// text → append → truncate → repeat, bounded by `max_turns`.
///
/// Owns the history of the current run; history is mutated only from the
/// task that calls [`run`], so no locking is involved.  Every suspension
/// point (truncation, generation, policy prompt, tool execution, user
/// input) honors the cancellation token.
pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    policy: Arc<PolicyService>,
    ui: Arc<dyn Ui>,
    tools: Arc<ToolRegistry>,
    max_turns: u32,
    history: History,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        policy: Arc<PolicyService>,
        ui: Arc<dyn Ui>,
        tools: Arc<ToolRegistry>,
        max_turns: u32,
    ) -> Self {
        Self {
            provider,
            policy,
            ui,
            tools,
            max_turns,
            history: History::new(""),
        }
    }

    /// History of the current (or most recent) run.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Drive one goal to completion.
    ///
    /// Returns `Err` only for: cancellation, a fatal provider error, a
    /// closed UI, an internal invariant breach, or the turn cap.  Tool
    /// failures of every stripe stay inside history as tool-result errors
    /// so the model can adapt.
    pub async fn run(&mut self, cancel: &CancellationToken, goal: &str) -> anyhow::Result<()> {
        self.history = History::new(goal);
        let definitions = tool_definitions(&self.tools);

        let mut turn = 0u32;
        loop {
            turn += 1;
            if turn > self.max_turns {
                anyhow::bail!("max turns ({}) reached", self.max_turns);
            }
            if cancel.is_cancelled() {
                anyhow::bail!("cancelled");
            }

            self.ui
                .write_status(StatusPhase::Thinking, "Generating response…");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => anyhow::bail!("cancelled"),
                r = truncate_history(self.provider.as_ref(), &mut self.history) => r?,
            }

            let request = GenerateRequest {
                history: self.history.messages().to_vec(),
                tools: definitions.clone(),
                temperature: None,
                max_output_tokens: None,
            };
            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => anyhow::bail!("cancelled"),
                r = self.provider.generate(request) => r,
            };

            let response = match response {
                Ok(r) => r,
                Err(e) if e.retryable() => {
                    self.handle_retryable(cancel, e).await?;
                    continue;
                }
                Err(e) => {
                    return Err(anyhow::Error::new(e).context("model generation failed"));
                }
            };

            debug!(turn, model = %response.model, "generate returned");
            match response.content {
                ResponseContent::Text(text) => {
                    self.history.push(Message::model_text(&text));
                    self.ui.write_message(&text);
                    self.await_user_input(cancel).await?;
                }
                ResponseContent::Refusal(reason) => {
                    self.history
                        .push(Message::system(format!("Model refused: {reason}")));
                    self.ui
                        .write_status(StatusPhase::Blocked, &format!("blocked: {reason}"));
                    self.await_user_input(cancel).await?;
                }
                ResponseContent::ToolCalls(calls) if calls.is_empty() => {
                    // Protocol error from the provider; recorded so the
                    // model sees its own misstep, then loop.
                    warn!("provider returned an empty tool call list");
                    self.history
                        .push(Message::system("Error: empty tool call list"));
                }
                ResponseContent::ToolCalls(calls) => {
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        results.push(self.dispatch(cancel, call).await?);
                    }
                    // One model message, one function message, appended
                    // back-to-back: no reader ever observes a half-written
                    // pair.
                    self.history.push_tool_turn(calls, results)?;
                }
            }
        }
    }

    /// Surface a retryable provider error, then either honor a short
    /// back-off hint or yield control to the user.
    async fn handle_retryable(
        &mut self,
        cancel: &CancellationToken,
        e: ProviderError,
    ) -> anyhow::Result<()> {
        warn!(kind = %e.kind, "retryable provider error: {}", e.message);
        self.ui
            .write_status(StatusPhase::Blocked, &format!("provider error: {e}"));
        self.history.push(Message::system(format!(
            "Provider error ({}): {}",
            e.kind, e.message
        )));

        if let Some(after) = e.retry_after {
            if after <= RETRY_AFTER_CEILING {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => anyhow::bail!("cancelled"),
                    _ = tokio::time::sleep(after) => {}
                }
                return Ok(());
            }
        }
        self.await_user_input(cancel).await
    }

    /// Suspend for the next user instruction and append it to history.
    async fn await_user_input(&mut self, cancel: &CancellationToken) -> anyhow::Result<()> {
        let input = tokio::select! {
            biased;
            _ = cancel.cancelled() => anyhow::bail!("cancelled"),
            r = self.ui.read_input(cancel, "What would you like to do?") => {
                r.context("reading user input")?
            }
        };
        self.history.push(Message::user(input));
        Ok(())
    }

    /// Resolve one tool call to its result.  Lookup misses, policy denials,
    /// execution failures, and panics all become result errors; only
    /// cancellation propagates as `Err`.
    async fn dispatch(
        &self,
        cancel: &CancellationToken,
        call: &ToolCall,
    ) -> anyhow::Result<ToolResult> {
        let tool = match self.tools.get(&call.name) {
            Some(t) => t,
            None => {
                return Ok(ToolResult::err(
                    call,
                    format!("unknown tool '{}'", call.name),
                ))
            }
        };

        match self.policy.check_tool(cancel, &call.name, &call.args).await {
            Ok(()) => {}
            Err(e) => {
                if cancel.is_cancelled() {
                    return Err(e.context("cancelled"));
                }
                return Ok(ToolResult::err(call, format!("policy denied: {e:#}")));
            }
        }

        self.ui.write_status(
            StatusPhase::Executing,
            &format!("Running tool: {}", call.name),
        );

        // Executed on its own task so a panicking tool surfaces as a
        // JoinError here instead of unwinding the loop.
        let mut tool_task = {
            let tool = tool.clone();
            let cancel = cancel.clone();
            let args = call.args.clone();
            tokio::spawn(async move { tool.execute(&cancel, &args).await })
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tool_task.abort();
                anyhow::bail!("cancelled");
            }
            res = &mut tool_task => res,
        };

        Ok(match outcome {
            Err(join_err) => ToolResult::err(call, format!("tool panicked: {join_err}")),
            Ok(Err(e)) => ToolResult::err(call, format!("{e:#}")),
            Ok(Ok(content)) => ToolResult::ok(call, content),
        })
    }
}

/// Map registry schemas into the provider's definition type.
fn tool_definitions(tools: &ToolRegistry) -> Vec<ToolDefinition> {
    tools
        .schemas()
        .into_iter()
        .map(|s| ToolDefinition {
            name: s.name,
            description: s.description,
            parameters: s.parameters,
        })
        .collect()
}
