use crate::session::Context;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Context applied to conversations that have none yet
    #[serde(default)]
    pub context: Option<Context>,

    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,

    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    #[serde(default = "default_true")]
    pub write_reports: bool,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct LimitsConfig {
    /// Upper bound on ideas kept per run; one lookup worker per idea
    #[serde(default = "default_max_ideas")]
    pub max_ideas: usize,

    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,

    /// Stagger between worker starts, multiplied by the worker index
    #[serde(default = "default_launch_delay_ms")]
    pub launch_delay_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ideas: default_max_ideas(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            launch_delay_ms: default_launch_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct TimeoutsConfig {
    #[serde(default = "default_ideas_timeout_sec")]
    pub ideas_sec: u64,

    #[serde(default = "default_lookup_timeout_sec")]
    pub lookup_sec: u64,

    #[serde(default = "default_search_timeout_sec")]
    pub search_sec: u64,

    #[serde(default = "default_report_timeout_sec")]
    pub report_sec: u64,

    #[serde(default = "default_chat_timeout_sec")]
    pub chat_sec: u64,

    /// How long cancelled workers get to wind down before being aborted
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            ideas_sec: default_ideas_timeout_sec(),
            lookup_sec: default_lookup_timeout_sec(),
            search_sec: default_search_timeout_sec(),
            report_sec: default_report_timeout_sec(),
            chat_sec: default_chat_timeout_sec(),
            cancel_grace_ms: default_cancel_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ProvidersConfig {
    /// Safety pre-check run before idea generation; skipped when absent
    #[serde(default)]
    pub guardrail: Option<CommandSpec>,

    #[serde(default = "default_ideas_command")]
    pub ideas: CommandSpec,

    /// Idea generator for uploaded documents; falls back to `ideas`
    #[serde(default)]
    pub material: Option<CommandSpec>,

    #[serde(default = "default_lookup_command")]
    pub lookup: CommandSpec,

    #[serde(default = "default_report_command")]
    pub report: CommandSpec,

    /// Relevance check on the drafted report; skipped when absent
    #[serde(default)]
    pub verifier: Option<CommandSpec>,

    #[serde(default)]
    pub chat: Option<CommandSpec>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            guardrail: None,
            ideas: default_ideas_command(),
            material: None,
            lookup: default_lookup_command(),
            report: default_report_command(),
            verifier: None,
            chat: None,
        }
    }
}

/// An external agent process speaking the JSON-lines protocol
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct CommandSpec {
    #[serde(default = "default_agent_binary")]
    pub binary: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    /// Instructions sent with every request; built-in prompt when absent
    #[serde(default)]
    pub prompt_file: Option<PathBuf>,

    #[serde(default)]
    pub env: HashMap<String, String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Hard bound on a single process, independent of phase timeouts
    #[serde(default)]
    pub timeout_sec: Option<u64>,
}

impl CommandSpec {
    pub fn agent(task: &str) -> Self {
        Self {
            binary: default_agent_binary(),
            args: vec![task.to_string()],
            prompt_file: None,
            env: HashMap::new(),
            working_dir: None,
            timeout_sec: None,
        }
    }
}
