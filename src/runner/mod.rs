mod aggregator;
mod events;
mod executor;
mod ideas;
mod machine;
mod orchestrator;
mod relay;
mod report;
mod retry;

#[cfg(test)]
pub(crate) mod fakes;

pub use aggregator::Evidence;
pub use events::{Flow, RunEvent};
pub use orchestrator::{Pipeline, PipelineSettings, RunOutcome, RunSummary};
