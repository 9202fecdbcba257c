use std::path::PathBuf;

pub fn default_version() -> u32 {
    1
}

pub fn default_session_dir() -> PathBuf {
    PathBuf::from(".shinan/sessions")
}

pub fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

pub fn default_true() -> bool {
    true
}

pub fn default_max_ideas() -> usize {
    5
}

pub fn default_max_concurrent_lookups() -> usize {
    5
}

pub fn default_launch_delay_ms() -> u64 {
    0
}

pub fn default_ideas_timeout_sec() -> u64 {
    120
}

pub fn default_lookup_timeout_sec() -> u64 {
    180
}

pub fn default_search_timeout_sec() -> u64 {
    600 // ceiling across all lookups
}

pub fn default_report_timeout_sec() -> u64 {
    300
}

pub fn default_chat_timeout_sec() -> u64 {
    120
}

pub fn default_cancel_grace_ms() -> u64 {
    2000
}

pub fn default_max_attempts() -> u32 {
    2
}

pub fn default_backoff_base_ms() -> u64 {
    1000
}

pub fn default_agent_binary() -> PathBuf {
    PathBuf::from("shinan-agent")
}

pub fn default_ideas_command() -> super::CommandSpec {
    super::CommandSpec::agent("ideas")
}

pub fn default_lookup_command() -> super::CommandSpec {
    super::CommandSpec::agent("lookup")
}

pub fn default_report_command() -> super::CommandSpec {
    super::CommandSpec::agent("report")
}
