// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
/// End-to-end tests for the orchestrator loop and session supervisor.
///
/// Uses ScriptedProvider and ScriptedUi so every scenario is deterministic
/// and requires neither network access nor a terminal.
#[cfg(test)]
mod orchestrator_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Map, Value};
    use tokio_util::sync::CancellationToken;

    use kodo_config::{PolicyConfig, PolicyList};
    use kodo_model::{
        Capabilities, ErrorKind, GenerateRequest, GenerateResponse, Message, Provider,
        ProviderError, Role, ScriptedProvider,
    };
    use kodo_tools::{Tool, ToolRegistry};

    use crate::scripted_ui::ScriptedUi;
    use crate::ui::{PermissionDecision, StatusPhase};
    use crate::{Orchestrator, PolicyService};

    // ── Helpers ───────────────────────────────────────────────────────────────

    /// Tool that returns a fixed string.
    struct StaticTool {
        name: &'static str,
        reply: &'static str,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "returns a canned reply"
        }
        fn definition(&self) -> Value {
            json!({
                "type": "object",
                "properties": { "path": { "type": "string" } }
            })
        }
        async fn execute(
            &self,
            _cancel: &CancellationToken,
            _args: &Map<String, Value>,
        ) -> anyhow::Result<String> {
            Ok(self.reply.to_string())
        }
    }

    /// Tool that violates the no-panic contract.
    struct PanicTool;

    #[async_trait]
    impl Tool for PanicTool {
        fn name(&self) -> &str {
            "explode"
        }
        fn description(&self) -> &str {
            "panics"
        }
        fn definition(&self) -> Value {
            json!({ "type": "object", "properties": {} })
        }
        async fn execute(
            &self,
            _cancel: &CancellationToken,
            _args: &Map<String, Value>,
        ) -> anyhow::Result<String> {
            panic!("boom");
        }
    }

    /// Provider whose generate never resolves; for cancellation tests.
    struct HangingProvider;

    #[async_trait]
    impl Provider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }
        async fn generate(
            &self,
            _req: GenerateRequest,
        ) -> Result<GenerateResponse, ProviderError> {
            std::future::pending().await
        }
        async fn count_tokens(&self, _history: &[Message]) -> Result<usize, ProviderError> {
            Ok(1)
        }
        fn context_window(&self) -> usize {
            128_000
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities {
                supports_streaming: false,
                supports_tool_calling: true,
                supports_json_mode: false,
                max_context_tokens: 128_000,
                max_output_tokens: 4_096,
            }
        }
        fn get_model(&self) -> String {
            "hanging".into()
        }
        fn set_model(&self, _name: &str) -> Result<(), ProviderError> {
            Ok(())
        }
        async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
            Ok(vec![])
        }
    }

    /// Policy that allows every tool name in `allow`.
    fn policy_allowing(ui: Arc<ScriptedUi>, allow: &[&str]) -> Arc<PolicyService> {
        let cfg = PolicyConfig {
            shell: PolicyList::default(),
            tool: PolicyList {
                allow: allow.iter().map(|s| s.to_string()).collect(),
                deny: vec![],
            },
        };
        Arc::new(PolicyService::new(&cfg, ui))
    }

    fn orchestrator(
        provider: Arc<ScriptedProvider>,
        registry: ToolRegistry,
        ui: Arc<ScriptedUi>,
        allow: &[&str],
    ) -> Orchestrator {
        Orchestrator::new(
            provider,
            policy_allowing(ui.clone(), allow),
            ui,
            Arc::new(registry),
            50,
        )
    }

    // ── Scenario 1: tool call + final text ────────────────────────────────────

    #[tokio::test]
    async fn tool_call_then_final_text() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_tool_call("c1", "list_directory", json!({"path": "."}))
                .then_text("Found files in current directory"),
        );
        let mut registry = ToolRegistry::new();
        registry.register(StaticTool {
            name: "list_directory",
            reply: "[a.txt,b.txt]",
        });
        let ui = Arc::new(ScriptedUi::new());
        let mut orch = orchestrator(provider.clone(), registry, ui.clone(), &["list_directory"]);

        // After the final text the UI has no further input queued, so the
        // run ends with the wrapped input error.
        let err = orch
            .run(&CancellationToken::new(), "List files")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("reading user input"));

        assert!(ui
            .messages()
            .iter()
            .any(|m| m == "Found files in current directory"));

        let history = orch.history();
        history.verify().unwrap();
        let msgs = history.messages();
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[0].content, "List files");
        assert_eq!(msgs[1].role, Role::Model);
        assert_eq!(msgs[1].tool_calls[0].name, "list_directory");
        assert_eq!(msgs[2].role, Role::Function);
        assert_eq!(msgs[2].tool_results[0].content, "[a.txt,b.txt]");
        assert_eq!(msgs[2].tool_results[0].id, "c1");
        assert_eq!(msgs[3].role, Role::Model);
        assert_eq!(msgs[3].content, "Found files in current directory");
    }

    // ── Scenario 2: refusal ───────────────────────────────────────────────────

    #[tokio::test]
    async fn refusal_is_recorded_then_run_continues() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_refusal("Safety violation")
                .then_text("Done"),
        );
        let ui = Arc::new(ScriptedUi::new().with_input("try again"));
        let mut orch = orchestrator(provider, ToolRegistry::new(), ui.clone(), &[]);

        let _ = orch.run(&CancellationToken::new(), "do something").await;

        let history = orch.history();
        assert!(history
            .messages()
            .iter()
            .any(|m| m.role == Role::System && m.content == "Model refused: Safety violation"));
        assert!(ui
            .statuses()
            .iter()
            .any(|(phase, _)| *phase == StatusPhase::Blocked));
        assert_eq!(ui.messages().last().map(String::as_str), Some("Done"));
    }

    // ── Scenario 3: unknown tool ──────────────────────────────────────────────

    #[tokio::test]
    async fn unknown_tool_becomes_result_error() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_tool_call("c1", "does_not_exist", json!({}))
                .then_text("Done"),
        );
        let ui = Arc::new(ScriptedUi::new());
        let mut orch = orchestrator(provider.clone(), ToolRegistry::new(), ui, &[]);

        let _ = orch.run(&CancellationToken::new(), "go").await;

        // The second generate must see the error in the function message.
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let second = &requests[1].history;
        let function = second
            .iter()
            .find(|m| m.role == Role::Function)
            .expect("function message in second request");
        assert_eq!(
            function.tool_results[0].error.as_deref(),
            Some("unknown tool 'does_not_exist'")
        );
    }

    // ── Scenario 4: policy denial ─────────────────────────────────────────────

    #[tokio::test]
    async fn policy_denial_becomes_result_error() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_tool_call("c1", "t", json!({}))
                .then_text("Done"),
        );
        let mut registry = ToolRegistry::new();
        registry.register(StaticTool {
            name: "t",
            reply: "never runs",
        });
        // Tool not in any list; the user denies at the prompt.
        let ui = Arc::new(ScriptedUi::new().with_permission(PermissionDecision::Deny));
        let mut orch = orchestrator(provider, registry, ui, &[]);

        let _ = orch.run(&CancellationToken::new(), "go").await;

        let history = orch.history();
        let function = history
            .messages()
            .iter()
            .find(|m| m.role == Role::Function)
            .expect("function message");
        let error = function.tool_results[0].error.as_deref().unwrap();
        assert!(error.starts_with("policy denied:"), "{error}");
        assert!(error.contains("user denied"), "{error}");
    }

    // ── Scenario 5: truncation preserves the goal across turns ────────────────

    #[tokio::test]
    async fn truncation_preserves_goal_under_small_window() {
        // Tiny window, long replies: by the last turn the filler must be
        // gone while index 0 still carries the original goal.
        let mut provider = ScriptedProvider::new()
            .with_context_window(200)
            .with_max_output_tokens(0);
        let filler = "x".repeat(400);
        for _ in 0..10 {
            provider = provider.then_text(&filler);
        }
        provider = provider.then_text("end");
        let provider = Arc::new(provider);

        let mut ui = ScriptedUi::new();
        for _ in 0..10 {
            ui = ui.with_input("more");
        }
        let ui = Arc::new(ui);
        let mut orch = orchestrator(provider.clone(), ToolRegistry::new(), ui, &[]);

        let _ = orch.run(&CancellationToken::new(), "GOAL: preserve me").await;

        let last = provider.last_history();
        assert_eq!(last[0].role, Role::User);
        assert_eq!(last[0].content, "GOAL: preserve me");
        let total = provider.count_tokens(&last).await.unwrap();
        assert!(total <= 200, "history estimate {total} exceeds the window");
    }

    // ── Empty tool-call list ──────────────────────────────────────────────────

    #[tokio::test]
    async fn empty_tool_call_list_appends_system_error_and_loops() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_tool_calls(vec![])
                .then_text("recovered"),
        );
        let ui = Arc::new(ScriptedUi::new());
        let mut orch = orchestrator(provider.clone(), ToolRegistry::new(), ui.clone(), &[]);

        let _ = orch.run(&CancellationToken::new(), "go").await;

        let history = orch.history();
        assert!(history
            .messages()
            .iter()
            .any(|m| m.role == Role::System && m.content == "Error: empty tool call list"));
        // Nothing was dispatched.
        assert!(!ui
            .statuses()
            .iter()
            .any(|(phase, _)| *phase == StatusPhase::Executing));
        // The model got a second chance without user input.
        assert_eq!(provider.generate_calls(), 2);
        assert_eq!(ui.messages().last().map(String::as_str), Some("recovered"));
    }

    // ── Panic containment ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn panicking_tool_becomes_result_error() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_tool_call("c1", "explode", json!({}))
                .then_text("Done"),
        );
        let mut registry = ToolRegistry::new();
        registry.register(PanicTool);
        let ui = Arc::new(ScriptedUi::new());
        let mut orch = orchestrator(provider, registry, ui, &["explode"]);

        let _ = orch.run(&CancellationToken::new(), "go").await;

        let history = orch.history();
        history.verify().unwrap();
        let function = history
            .messages()
            .iter()
            .find(|m| m.role == Role::Function)
            .expect("function message");
        let error = function.tool_results[0].error.as_deref().unwrap();
        assert!(error.contains("tool panicked"), "{error}");
    }

    // ── Multiple calls in one turn ────────────────────────────────────────────

    #[tokio::test]
    async fn multiple_calls_pair_positionally_in_one_function_message() {
        let calls = vec![
            kodo_model::ToolCall {
                id: "a".into(),
                name: "t".into(),
                args: Map::new(),
            },
            kodo_model::ToolCall {
                id: "b".into(),
                name: "missing".into(),
                args: Map::new(),
            },
        ];
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_tool_calls(calls)
                .then_text("Done"),
        );
        let mut registry = ToolRegistry::new();
        registry.register(StaticTool {
            name: "t",
            reply: "ok",
        });
        let ui = Arc::new(ScriptedUi::new());
        let mut orch = orchestrator(provider, registry, ui, &["t", "missing"]);

        let _ = orch.run(&CancellationToken::new(), "go").await;

        let history = orch.history();
        history.verify().unwrap();
        let function = history
            .messages()
            .iter()
            .find(|m| m.role == Role::Function)
            .expect("function message");
        assert_eq!(function.tool_results.len(), 2);
        assert_eq!(function.tool_results[0].id, "a");
        assert_eq!(function.tool_results[0].content, "ok");
        assert_eq!(function.tool_results[1].id, "b");
        assert_eq!(
            function.tool_results[1].error.as_deref(),
            Some("unknown tool 'missing'")
        );
    }

    // ── Cancellation boundaries ───────────────────────────────────────────────

    #[tokio::test]
    async fn cancel_at_generate_returns_cancellation_error() {
        let ui = Arc::new(ScriptedUi::new());
        let mut orch = Orchestrator::new(
            Arc::new(HangingProvider),
            policy_allowing(ui.clone(), &[]),
            ui,
            Arc::new(ToolRegistry::new()),
            50,
        );
        let cancel = CancellationToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };

        let err = orch.run(&cancel, "goal").await.unwrap_err();
        canceller.await.unwrap();
        assert!(err.to_string().contains("cancelled"));
        // History is at most one turn beyond the goal.
        assert!(orch.history().len() <= 2);
    }

    #[tokio::test]
    async fn closed_input_after_text_reply_keeps_text_in_history() {
        let provider = Arc::new(ScriptedProvider::new().then_text("reply"));
        let ui = Arc::new(ScriptedUi::new());
        let mut orch = orchestrator(provider, ToolRegistry::new(), ui, &[]);

        let err = orch.run(&CancellationToken::new(), "go").await.unwrap_err();
        assert!(err.to_string().contains("reading user input"));
        assert!(orch
            .history()
            .messages()
            .iter()
            .any(|m| m.role == Role::Model && m.content == "reply"));
    }

    // ── Provider error handling ───────────────────────────────────────────────

    #[tokio::test]
    async fn retryable_error_yields_to_user_and_recovers() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_error(ProviderError::new(ErrorKind::RateLimit, "slow down"))
                .then_text("ok"),
        );
        let ui = Arc::new(ScriptedUi::new().with_input("retry please"));
        let mut orch = orchestrator(provider.clone(), ToolRegistry::new(), ui.clone(), &[]);

        let _ = orch.run(&CancellationToken::new(), "go").await;

        let history = orch.history();
        assert!(history.messages().iter().any(|m| {
            m.role == Role::System && m.content.contains("Provider error (rate limit)")
        }));
        assert_eq!(ui.messages().last().map(String::as_str), Some("ok"));
        assert_eq!(provider.generate_calls(), 2);
    }

    #[tokio::test]
    async fn short_retry_after_hint_retries_without_user_input() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_error(
                    ProviderError::new(ErrorKind::ServiceUnavailable, "hiccup")
                        .with_retry_after(Duration::from_millis(5)),
                )
                .then_text("ok"),
        );
        // No inputs queued: an input request before "ok" would abort the run
        // early and leave generate_calls at 1.
        let ui = Arc::new(ScriptedUi::new());
        let mut orch = orchestrator(provider.clone(), ToolRegistry::new(), ui.clone(), &[]);

        let _ = orch.run(&CancellationToken::new(), "go").await;

        assert_eq!(provider.generate_calls(), 2);
        assert_eq!(ui.messages().last().map(String::as_str), Some("ok"));
    }

    #[tokio::test]
    async fn fatal_provider_error_terminates_the_run() {
        let provider = Arc::new(ScriptedProvider::new().then_error(ProviderError::new(
            ErrorKind::AuthenticationFailed,
            "bad key",
        )));
        let ui = Arc::new(ScriptedUi::new());
        let mut orch = orchestrator(provider, ToolRegistry::new(), ui, &[]);

        let err = orch.run(&CancellationToken::new(), "go").await.unwrap_err();
        assert!(err.to_string().contains("model generation failed"));
        assert!(format!("{err:#}").contains("authentication failed"));
    }

    // ── Max turns ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn max_turns_terminates_with_cap_error() {
        let mut provider = ScriptedProvider::new();
        for i in 0..5 {
            provider = provider.then_tool_call(&format!("c{i}"), "t", json!({}));
        }
        let provider = Arc::new(provider);
        let mut registry = ToolRegistry::new();
        registry.register(StaticTool {
            name: "t",
            reply: "ok",
        });
        let ui = Arc::new(ScriptedUi::new());
        let mut orch = Orchestrator::new(
            provider,
            policy_allowing(ui.clone(), &["t"]),
            ui,
            Arc::new(registry),
            2,
        );

        let err = orch.run(&CancellationToken::new(), "go").await.unwrap_err();
        assert!(err.to_string().contains("max turns (2) reached"));
    }

    // ── History invariants after every scenario ───────────────────────────────

    #[tokio::test]
    async fn invariants_hold_after_mixed_run() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_tool_call("c1", "t", json!({}))
                .then_refusal("nope")
                .then_tool_call("c2", "t", json!({}))
                .then_text("done"),
        );
        let mut registry = ToolRegistry::new();
        registry.register(StaticTool {
            name: "t",
            reply: "ok",
        });
        let ui = Arc::new(ScriptedUi::new().with_input("continue"));
        let mut orch = orchestrator(provider, registry, ui, &["t"]);

        let _ = orch.run(&CancellationToken::new(), "the goal").await;

        let history = orch.history();
        history.verify().unwrap();
        assert_eq!(history.messages()[0].content, "the goal");
    }
}

#[cfg(test)]
mod supervisor_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use kodo_config::Config;
    use kodo_model::{Provider, ScriptedProvider};
    use kodo_tools::ToolRegistry;
    use tokio_util::sync::CancellationToken;

    use crate::scripted_ui::ScriptedUi;
    use crate::ui::UiCommand;
    use crate::{run_interactive, Deps};

    fn deps_with(
        ui: Arc<ScriptedUi>,
        events: Arc<Mutex<Vec<String>>>,
        provider: ScriptedProvider,
    ) -> Deps {
        Deps {
            config: Arc::new(Config::default()),
            ui,
            provider_factory: Box::new(move || {
                events
                    .lock()
                    .expect("lock poisoned")
                    .push("PROVIDER_START".to_string());
                Ok(Arc::new(provider) as Arc<dyn Provider>)
            }),
            make_registry: Box::new(|_policy| ToolRegistry::new()),
        }
    }

    // ── Scenario 6: UI-before-provider ordering ───────────────────────────────

    #[tokio::test]
    async fn ui_ready_precedes_provider_construction() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let ui = Arc::new(ScriptedUi::new().with_events(events.clone()));
        let deps = deps_with(ui.clone(), events.clone(), ScriptedProvider::new());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(async move { run_interactive(&cancel, deps).await });

        // Wait for both events, then quit the UI.
        for _ in 0..100 {
            if events.lock().unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        ui.trigger_quit();
        handle.await.unwrap().unwrap();

        let seen = events.lock().unwrap().clone();
        assert_eq!(seen[..2], ["READY".to_string(), "PROVIDER_START".to_string()]);
    }

    // ── Scenario 7: shutdown cleanup ──────────────────────────────────────────

    #[tokio::test]
    async fn ui_exit_joins_all_tasks_within_bounded_time() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let ui = Arc::new(ScriptedUi::new().with_events(events.clone()));
        let deps = deps_with(ui.clone(), events, ScriptedProvider::new());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(async move { run_interactive(&cancel, deps).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        ui.trigger_quit();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("supervisor must shut down within the bound")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn external_cancellation_also_shuts_down() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let ui = Arc::new(ScriptedUi::new().with_events(events.clone()));
        let ui2 = ui.clone();
        let deps = deps_with(ui, events, ScriptedProvider::new());

        let cancel = CancellationToken::new();
        let cancel2 = cancel.clone();
        let handle = tokio::spawn(async move { run_interactive(&cancel2, deps).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        // The UI itself still decides when start() returns.
        ui2.trigger_quit();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("bounded shutdown")
            .unwrap()
            .unwrap();
    }

    // ── Command handling ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn list_and_switch_model_commands_are_dispatched() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let ui = Arc::new(ScriptedUi::new().with_events(events.clone()));
        let commands = ui.command_sender();
        let deps = deps_with(ui.clone(), events, ScriptedProvider::new());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(async move { run_interactive(&cancel, deps).await });

        commands.send(UiCommand::ListModels).await.unwrap();
        commands
            .send(UiCommand::SwitchModel {
                model: "scripted-model-pro".into(),
            })
            .await
            .unwrap();

        // Poll until both effects land.
        for _ in 0..100 {
            if !ui.model_lists().is_empty() && !ui.model_switches().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(
            ui.model_lists()[0],
            vec!["scripted-model".to_string(), "scripted-model-pro".to_string()]
        );
        assert_eq!(ui.model_switches(), vec!["scripted-model-pro".to_string()]);

        ui.trigger_quit();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn invalid_model_switch_reports_error_message() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let ui = Arc::new(ScriptedUi::new().with_events(events.clone()));
        let commands = ui.command_sender();
        let deps = deps_with(ui.clone(), events, ScriptedProvider::new());

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(async move { run_interactive(&cancel, deps).await });

        commands
            .send(UiCommand::SwitchModel {
                model: "nonsense".into(),
            })
            .await
            .unwrap();

        for _ in 0..100 {
            if !ui.messages().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(ui.messages()[0].contains("switch model failed"));
        assert!(ui.model_switches().is_empty());

        ui.trigger_quit();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
