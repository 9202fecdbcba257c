use crate::error::{ErrorKind, PipelineError};
use crate::parser::Idea;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    Text,
    Document,
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::Text => write!(f, "text"),
            Flow::Document => write!(f, "document"),
        }
    }
}

/// One item of a run's output stream. Every run ends with exactly one
/// terminal event: `Report` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Started { run_id: Uuid, flow: Flow },
    Progress { message: String },
    Ideas { ideas: Vec<Idea> },
    Evidence { query: String, text: String },
    Message { message: String },
    Report { text: String },
    Error { kind: ErrorKind, reason: String },
}

impl RunEvent {
    pub fn progress(message: impl Into<String>) -> Self {
        RunEvent::Progress {
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        RunEvent::Message {
            message: message.into(),
        }
    }

    pub fn error(err: &PipelineError) -> Self {
        RunEvent::Error {
            kind: err.kind(),
            reason: err.reason(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunEvent::Report { .. } | RunEvent::Error { .. })
    }
}

impl std::fmt::Display for RunEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunEvent::Started { run_id, flow } => write!(f, "START {} ({})", run_id, flow),
            RunEvent::Progress { message } => write!(f, "UPDATE {}", message),
            RunEvent::Ideas { ideas } => {
                writeln!(f, "Proposed search ideas:")?;
                for idea in ideas {
                    writeln!(f)?;
                    writeln!(f, "Search: {}", idea.query)?;
                    write!(f, "Reason: {}", idea.reasoning)?;
                    writeln!(f)?;
                }
                Ok(())
            }
            RunEvent::Evidence { query, text } => write!(f, "RESULT [{}] {}", query, text),
            RunEvent::Message { message } => write!(f, "{}", message),
            RunEvent::Report { text } => write!(f, "{}", text),
            RunEvent::Error { kind, reason } => write!(f, "ERROR {}: {}", kind, reason),
        }
    }
}

/// Where a run's events go. When the consumer has gone away the run's
/// cancellation token is tripped, which is how a client disconnect reaches
/// in-flight workers.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<RunEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<RunEvent>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    /// Returns false once the consumer is gone
    pub fn emit(&self, event: RunEvent) -> bool {
        if self.tx.send(event).is_err() {
            if !self.cancel.is_cancelled() {
                debug!("Event consumer disconnected, cancelling run");
                self.cancel.cancel();
            }
            return false;
        }
        true
    }
}
