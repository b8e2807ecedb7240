// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

fn default_model_name() -> String {
    "gemini-2.0-flash".into()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".into()
}

fn default_temperature() -> Option<f32> {
    Some(0.2)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name forwarded to the provider API
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Environment variable that holds the API key (read at runtime)
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Base URL override.  Useful for local proxies or regional endpoints.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Context window in tokens.  Overrides the provider default when set.
    #[serde(default)]
    pub context_window: Option<u32>,
    /// Maximum tokens to request in a single completion
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature (0.0–2.0)
    #[serde(default = "default_temperature")]
    pub temperature: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-2.0-flash".into(),
            api_key_env: "GEMINI_API_KEY".into(),
            base_url: None,
            context_window: None,
            max_output_tokens: None,
            temperature: Some(0.2),
        }
    }
}

fn default_max_turns() -> u32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum orchestrator turns (model calls) per user goal before the run
    /// stops with an error
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
        }
    }
}

fn default_shell_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Default shell command timeout; individual calls may override it
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            shell_timeout_secs: default_shell_timeout_secs(),
        }
    }
}

/// Allow/deny lists for one permission domain.
///
/// Entries are exact matches: shell entries match the command root
/// (basename of argv[0]), tool entries match the registered tool name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyList {
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_shell_policy")]
    pub shell: PolicyList,
    #[serde(default = "default_tool_policy")]
    pub tool: PolicyList,
}

fn default_shell_policy() -> PolicyList {
    PolicyList {
        // Read-only commands that cannot modify the workspace.
        allow: ["ls", "cat", "head", "tail", "pwd", "echo", "wc", "which"]
            .into_iter()
            .map(String::from)
            .collect(),
        deny: ["sudo", "shutdown", "reboot"]
            .into_iter()
            .map(String::from)
            .collect(),
    }
}

fn default_tool_policy() -> PolicyList {
    PolicyList {
        allow: [
            "read_file",
            "list_directory",
            "find_file",
            "search_content",
            "read_todos",
            "write_todos",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
        deny: vec![],
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            shell: default_shell_policy(),
            tool: default_tool_policy(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_reads_gemini_key() {
        let cfg = Config::default();
        assert_eq!(cfg.model.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn default_max_turns_is_50() {
        assert_eq!(AgentConfig::default().max_turns, 50);
    }

    #[test]
    fn default_shell_policy_allows_ls_denies_sudo() {
        let p = PolicyConfig::default();
        assert!(p.shell.allow.iter().any(|s| s == "ls"));
        assert!(p.shell.deny.iter().any(|s| s == "sudo"));
    }

    #[test]
    fn default_tool_policy_allows_read_only_tools() {
        let p = PolicyConfig::default();
        assert!(p.tool.allow.iter().any(|s| s == "read_file"));
        assert!(!p.tool.allow.iter().any(|s| s == "run_shell"));
    }

    #[test]
    fn empty_yaml_deserializes_to_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.agent.max_turns, 50);
        assert_eq!(cfg.model.name, "gemini-2.0-flash");
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let cfg: Config = serde_yaml::from_str("agent:\n  max_turns: 7\n").unwrap();
        assert_eq!(cfg.agent.max_turns, 7);
        assert_eq!(cfg.model.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn policy_lists_round_trip() {
        let yaml = "policy:\n  shell:\n    allow: [git]\n    deny: [rm]\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.policy.shell.allow, vec!["git"]);
        assert_eq!(cfg.policy.shell.deny, vec!["rm"]);
    }
}
