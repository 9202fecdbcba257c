//! Run lifecycle: Idle -> GeneratingIdeas -> Searching -> Synthesizing -> Done,
//! with Failed reachable from any non-terminal state.

use crate::error::{ErrorKind, PipelineError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    GeneratingIdeas,
    Searching,
    Synthesizing,
    Done,
    Failed(ErrorKind),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::GeneratingIdeas => write!(f, "generating_ideas"),
            PipelineState::Searching => write!(f, "searching"),
            PipelineState::Synthesizing => write!(f, "synthesizing"),
            PipelineState::Done => write!(f, "done"),
            PipelineState::Failed(kind) => write!(f, "failed({})", kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    IdeasReady,
    AggregationComplete,
    ReportReady,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot apply {transition:?} in state {from}")]
pub struct InvalidTransition {
    pub from: PipelineState,
    pub transition: Transition,
}

/// A refused transition is charged to the phase it belongs to: the idea phase
/// for `Start` and `IdeasReady`, then aggregation, then the report.
impl From<InvalidTransition> for PipelineError {
    fn from(err: InvalidTransition) -> Self {
        let reason = format!("run state machine refused transition: {}", err);
        match err.transition {
            Transition::Start | Transition::IdeasReady => PipelineError::IdeaGenerationFailed(reason),
            Transition::AggregationComplete => PipelineError::AggregationFailed(reason),
            Transition::ReportReady => PipelineError::ReportGenerationFailed(reason),
        }
    }
}

/// One state machine per run. Because every forward transition can only be
/// taken once, a run performs at most one aggregation and one synthesis.
#[derive(Debug)]
pub struct RunMachine {
    state: PipelineState,
}

impl Default for RunMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMachine {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn apply(&mut self, transition: Transition) -> Result<PipelineState, InvalidTransition> {
        let next = match (self.state, transition) {
            (PipelineState::Idle, Transition::Start) => PipelineState::GeneratingIdeas,
            (PipelineState::GeneratingIdeas, Transition::IdeasReady) => PipelineState::Searching,
            (PipelineState::Searching, Transition::AggregationComplete) => {
                PipelineState::Synthesizing
            }
            (PipelineState::Synthesizing, Transition::ReportReady) => PipelineState::Done,
            (from, transition) => return Err(InvalidTransition { from, transition }),
        };
        debug!("Run state {} -> {}", self.state, next);
        self.state = next;
        Ok(next)
    }

    /// Move to `Failed(kind)`. A terminal machine keeps its state.
    pub fn fail(&mut self, kind: ErrorKind) -> PipelineState {
        if !self.state.is_terminal() {
            debug!("Run state {} -> failed({})", self.state, kind);
            self.state = PipelineState::Failed(kind);
        }
        self.state
    }
}
