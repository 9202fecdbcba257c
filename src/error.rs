use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Invalid default context: {0}")]
    Context(#[from] SessionError),

    #[error("Failed to read prompt file '{path}': {source}")]
    PromptFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Provider '{0}' is not configured")]
    MissingProvider(&'static str),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    #[error("No context set for conversation '{0}'")]
    MissingContext(String),

    #[error("Failed to read session file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write session file: {0}")]
    Write(std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Process failed with exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Agent reported failure: {0}")]
    Failed(String),

    #[error("Agent returned an empty result")]
    EmptyResult,
}

impl ProviderError {
    /// Whether a fresh attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::Io(_)
            | ProviderError::NonZeroExit { .. }
            | ProviderError::Failed(_) => true,
            ProviderError::Protocol(_) | ProviderError::EmptyResult => false,
        }
    }
}

/// Run-level failure categories surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidContext,
    GuardrailTripped,
    IdeaGenerationFailed,
    AggregationFailed,
    ReportGenerationFailed,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidContext => write!(f, "invalid_context"),
            ErrorKind::GuardrailTripped => write!(f, "guardrail_tripped"),
            ErrorKind::IdeaGenerationFailed => write!(f, "idea_generation_failed"),
            ErrorKind::AggregationFailed => write!(f, "aggregation_failed"),
            ErrorKind::ReportGenerationFailed => write!(f, "report_generation_failed"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    #[error("Input rejected by guardrail: {reason}")]
    GuardrailTripped { reason: String },

    #[error("Idea generation failed: {0}")]
    IdeaGenerationFailed(String),

    #[error("Aggregation failed: {0}")]
    AggregationFailed(String),

    #[error("Report generation failed: {0}")]
    ReportGenerationFailed(String),

    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidContext(_) => ErrorKind::InvalidContext,
            PipelineError::GuardrailTripped { .. } => ErrorKind::GuardrailTripped,
            PipelineError::IdeaGenerationFailed(_) => ErrorKind::IdeaGenerationFailed,
            PipelineError::AggregationFailed(_) => ErrorKind::AggregationFailed,
            PipelineError::ReportGenerationFailed(_) => ErrorKind::ReportGenerationFailed,
            PipelineError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Human-readable reason without the kind prefix
    pub fn reason(&self) -> String {
        match self {
            PipelineError::InvalidContext(r)
            | PipelineError::IdeaGenerationFailed(r)
            | PipelineError::AggregationFailed(r)
            | PipelineError::ReportGenerationFailed(r) => r.clone(),
            PipelineError::GuardrailTripped { reason } => reason.clone(),
            PipelineError::Cancelled => "the run was cancelled before completion".to_string(),
        }
    }
}

impl From<SessionError> for PipelineError {
    fn from(e: SessionError) -> Self {
        PipelineError::InvalidContext(e.to_string())
    }
}

/// A plain conversational turn outside the research pipeline
#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Chat failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Chat message is empty")]
    EmptyMessage,
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create output directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Failed to write report: {0}")]
    WriteReport(std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
