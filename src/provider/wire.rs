//! JSON-lines protocol spoken with agent processes.
//!
//! The request is a single JSON object written to stdin. The agent answers on
//! stdout, one JSON object per line:
//!
//! ```text
//! {"type": "progress", "message": "Searching the web for chip exports..."}
//! {"type": "result", "data": "Exports fell 12% year over year."}
//! ```
//!
//! Lines that are not protocol messages are kept as raw text, so an agent that
//! just prints its answer still works.

use crate::session::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct AgentRequest<'a> {
    pub task: &'a str,
    pub instructions: &'a str,
    pub context: &'a Context,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentLine {
    Progress { message: String },
    Result { data: Value },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Message(AgentLine),
    Raw(String),
}

pub fn parse_line(line: &str) -> ParsedLine {
    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        if let Ok(message) = serde_json::from_str::<AgentLine>(trimmed) {
            return ParsedLine::Message(message);
        }
    }
    ParsedLine::Raw(line.to_string())
}

/// Terminal payload of one agent invocation
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    Structured(Value),
    Raw(String),
}

impl AgentOutput {
    /// Plain text view: a JSON string, a `text`/`result`/`report` field, or raw stdout
    pub fn into_text(self) -> Option<String> {
        let text = match self {
            AgentOutput::Raw(raw) => raw,
            AgentOutput::Structured(Value::String(s)) => s,
            AgentOutput::Structured(Value::Object(map)) => {
                match ["text", "result", "report"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))
                {
                    Some(s) => s.to_string(),
                    None => Value::Object(map).to_string(),
                }
            }
            AgentOutput::Structured(other) => other.to_string(),
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
