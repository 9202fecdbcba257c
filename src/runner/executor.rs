use crate::config::RetryConfig;
use crate::error::ProviderError;
use crate::parser::Idea;
use crate::provider::{Lookup, ProgressSender};
use crate::session::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, Instrument};

use super::relay::relay;
use super::retry::retry_with_backoff;

/// What a lookup worker puts on the merge channel
#[derive(Debug)]
pub(super) enum WorkerMessage {
    Progress { worker: usize, text: String },
    Outcome { worker: usize, outcome: LookupOutcome },
    /// Exactly one per worker, always after its payload
    Done { worker: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum LookupOutcome {
    Result(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub(super) struct WorkerSettings {
    pub lookup_timeout: Duration,
    pub launch_delay: Duration,
    pub retry: RetryConfig,
}

/// Sends the completion sentinel when the worker future ends, whether it
/// returned, was cancelled, panicked, or was aborted.
struct DoneGuard {
    worker: usize,
    tx: UnboundedSender<WorkerMessage>,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerMessage::Done {
            worker: self.worker,
        });
    }
}

/// One concurrent worker bound to one idea
pub(super) struct LookupWorker {
    pub index: usize,
    pub idea: Idea,
    pub context: Arc<Context>,
    pub lookup: Arc<dyn Lookup>,
    pub settings: Arc<WorkerSettings>,
    pub semaphore: Arc<Semaphore>,
    pub tx: UnboundedSender<WorkerMessage>,
    pub cancel: CancellationToken,
}

impl LookupWorker {
    pub async fn run(self) {
        let span = info_span!("worker", worker = self.index, query = %self.idea.query);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) {
        let _done = DoneGuard {
            worker: self.index,
            tx: self.tx.clone(),
        };

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!("Lookup cancelled");
                return;
            }
            outcome = self.execute() => outcome,
        };

        let _ = self.tx.send(WorkerMessage::Outcome {
            worker: self.index,
            outcome,
        });
    }

    async fn execute(&self) -> LookupOutcome {
        // Staggered start to avoid bursts against the lookup backend
        if self.index > 0 && !self.settings.launch_delay.is_zero() {
            sleep(self.settings.launch_delay * self.index as u32).await;
        }

        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return LookupOutcome::Failed("lookup pool closed".to_string()),
        };

        debug!("Starting lookup via {}", self.lookup.name());
        let result = retry_with_backoff(
            &self.settings.retry,
            &self.cancel,
            ProviderError::is_retryable,
            |attempt| self.attempt(attempt),
        )
        .await;

        match result {
            Ok(text) => LookupOutcome::Result(text),
            Err(e) => LookupOutcome::Failed(e.to_string()),
        }
    }

    async fn attempt(&self, attempt: u32) -> Result<String, ProviderError> {
        if attempt > 1 {
            debug!("Lookup attempt {}", attempt);
        }

        let (progress, rx) = ProgressSender::channel();
        let limit = self.settings.lookup_timeout;
        let call = timeout(limit, self.lookup.lookup(&self.idea, &self.context, progress));

        let worker = self.index;
        let tx = &self.tx;
        let outcome = relay(call, rx, |text| {
            let _ = tx.send(WorkerMessage::Progress { worker, text });
        })
        .await;

        outcome.unwrap_or(Err(ProviderError::Timeout(limit)))
    }
}
