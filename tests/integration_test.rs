// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
/// Integration tests wiring the real built-in tools into the orchestrator,
/// driven by the scripted provider and scripted UI.
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use kodo_config::{Config, PolicyConfig, PolicyList};
use kodo_core::scripted_ui::ScriptedUi;
use kodo_core::{run_interactive, Deps, Orchestrator, PermissionDecision, PolicyService};
use kodo_model::{Provider, Role, ScriptedProvider};
use kodo_tools::{builtin_registry, new_todo_store, Workspace};

fn open_policy(ui: Arc<ScriptedUi>) -> Arc<PolicyService> {
    let cfg = PolicyConfig {
        shell: PolicyList {
            allow: vec!["echo".into()],
            deny: vec![],
        },
        tool: PolicyList {
            allow: vec![
                "read_file".into(),
                "write_file".into(),
                "edit_file".into(),
                "list_directory".into(),
                "find_file".into(),
                "search_content".into(),
                "run_shell".into(),
                "read_todos".into(),
                "write_todos".into(),
            ],
            deny: vec![],
        },
    };
    Arc::new(PolicyService::new(&cfg, ui))
}

#[tokio::test]
async fn write_then_read_through_real_tools() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(ScriptedUi::new());
    let policy = open_policy(ui.clone());
    let ws = Arc::new(Workspace::new(dir.path()).with_gate(policy.clone()));
    let registry = Arc::new(builtin_registry(ws, new_todo_store(), 30));

    let provider = Arc::new(
        ScriptedProvider::new()
            .then_tool_call(
                "c1",
                "write_file",
                json!({"path": "notes.txt", "content": "alpha\nbeta\n"}),
            )
            .then_tool_call("c2", "read_file", json!({"path": "notes.txt"}))
            .then_text("The file holds alpha and beta"),
    );

    let mut orch = Orchestrator::new(provider.clone(), policy, ui.clone(), registry, 50);
    let _ = orch
        .run(&CancellationToken::new(), "write some notes")
        .await;

    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes.txt")).unwrap(),
        "alpha\nbeta\n"
    );

    let history = orch.history();
    history.verify().unwrap();
    let reads: Vec<&str> = history
        .messages()
        .iter()
        .filter(|m| m.role == Role::Function)
        .flat_map(|m| m.tool_results.iter())
        .map(|r| r.content.as_str())
        .collect();
    assert!(reads.iter().any(|c| c.contains("L1:alpha")));
    assert!(ui
        .messages()
        .iter()
        .any(|m| m == "The file holds alpha and beta"));
}

#[tokio::test]
async fn shell_tool_routes_through_the_policy_gate() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(ScriptedUi::new());
    let policy = open_policy(ui.clone());
    let ws = Arc::new(Workspace::new(dir.path()).with_gate(policy.clone()));
    let registry = Arc::new(builtin_registry(ws, new_todo_store(), 30));

    // "echo" is shell-allow-listed; no permission prompt may occur.
    let provider = Arc::new(
        ScriptedProvider::new()
            .then_tool_call("c1", "run_shell", json!({"command": ["echo", "hi"]}))
            .then_text("done"),
    );
    let mut orch = Orchestrator::new(provider, policy, ui.clone(), registry, 50);
    let _ = orch.run(&CancellationToken::new(), "say hi").await;

    assert_eq!(ui.permission_prompts(), 0);
    let history = orch.history();
    let output = history
        .messages()
        .iter()
        .find(|m| m.role == Role::Function)
        .and_then(|m| m.tool_results.first())
        .map(|r| r.content.clone())
        .unwrap_or_default();
    assert!(output.contains("hi"), "{output}");
}

#[tokio::test]
async fn unlisted_shell_command_asks_and_honors_always() {
    let dir = tempfile::tempdir().unwrap();
    let ui = Arc::new(
        ScriptedUi::new().with_permission(PermissionDecision::AllowAlways),
    );
    let policy = open_policy(ui.clone());
    let ws = Arc::new(Workspace::new(dir.path()).with_gate(policy.clone()));
    let registry = Arc::new(builtin_registry(ws, new_todo_store(), 30));

    let provider = Arc::new(
        ScriptedProvider::new()
            .then_tool_call("c1", "run_shell", json!({"command": ["true"]}))
            .then_tool_call("c2", "run_shell", json!({"command": ["true"]}))
            .then_text("done"),
    );
    let mut orch = Orchestrator::new(provider, policy, ui.clone(), registry, 50);
    let _ = orch.run(&CancellationToken::new(), "run true twice").await;

    // One prompt for the first call; the second hits session_allow.
    assert_eq!(ui.permission_prompts(), 1);
    let history = orch.history();
    history.verify().unwrap();
    for m in history.messages().iter().filter(|m| m.role == Role::Function) {
        for r in &m.tool_results {
            assert!(r.error.is_none(), "unexpected error: {:?}", r.error);
        }
    }
}

#[tokio::test]
async fn full_session_through_the_supervisor() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    std::fs::write(root.join("hello.txt"), "hello world\n").unwrap();

    let ui = Arc::new(ScriptedUi::new().with_input("what files exist?"));
    let provider = ScriptedProvider::new()
        .then_tool_call("c1", "list_directory", json!({"path": "."}))
        .then_text("There is one file: hello.txt");

    let deps = Deps {
        config: Arc::new(Config::default()),
        ui: ui.clone(),
        provider_factory: Box::new(move || Ok(Arc::new(provider) as Arc<dyn Provider>)),
        make_registry: Box::new(move |policy| {
            let ws = Arc::new(Workspace::new(root).with_gate(policy));
            builtin_registry(ws, new_todo_store(), 30)
        }),
    };

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(async move { run_interactive(&cancel, deps).await });

    // Wait for the final model message to reach the UI, then quit.
    for _ in 0..200 {
        if ui
            .messages()
            .iter()
            .any(|m| m == "There is one file: hello.txt")
        {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    ui.trigger_quit();
    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("bounded shutdown")
        .unwrap()
        .unwrap();

    assert!(ui
        .messages()
        .iter()
        .any(|m| m == "There is one file: hello.txt"));
}
