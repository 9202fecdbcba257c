//! Fan-out/fan-in over lookup workers.
//!
//! One worker is spawned per idea. Workers share a single unbounded merge
//! channel carrying progress, a terminal outcome, and a completion sentinel.
//! The aggregator loop forwards payloads as they arrive and counts sentinels;
//! it is done when it has seen one per worker. Workers never touch the
//! session: the collected results are folded in by the caller afterwards.

use crate::config::{Config, RetryConfig};
use crate::parser::Idea;
use crate::provider::Lookup;
use crate::session::{Context, SessionState, TranscriptItem};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{EventSink, RunEvent};
use super::executor::{LookupOutcome, LookupWorker, WorkerMessage, WorkerSettings};

#[derive(Debug, Clone)]
pub struct AggregatorSettings {
    pub max_concurrent: usize,
    pub launch_delay: Duration,
    pub lookup_timeout: Duration,
    /// Ceiling across all workers; exceeding it fails the aggregation
    pub search_timeout: Duration,
    /// How long cancelled workers get before they are aborted
    pub cancel_grace: Duration,
    pub retry: RetryConfig,
}

impl AggregatorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrent: config.limits.max_concurrent_lookups,
            launch_delay: Duration::from_millis(config.limits.launch_delay_ms),
            lookup_timeout: config.timeouts.lookup(),
            search_timeout: config.timeouts.search(),
            cancel_grace: config.timeouts.cancel_grace(),
            retry: config.retry.clone(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("search was cancelled")]
    Cancelled,

    #[error("search did not complete within {0:?}")]
    TimedOut(Duration),

    #[error("merge channel closed after {completed} of {expected} workers completed")]
    ChannelClosed { completed: usize, expected: usize },
}

/// One successful lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evidence {
    /// Position of the idea in the launched list
    pub index: usize,
    pub query: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregation {
    /// Successful results in completion order
    pub results: Vec<Evidence>,
    pub failed: usize,
    pub launched: usize,
}

impl Aggregation {
    /// Replace the session's results with this search's, and append each to
    /// the transcript as an assistant item.
    pub fn fold_into(&self, session: &mut SessionState) {
        session.clear_results();
        for evidence in &self.results {
            session.append_result(evidence.text.clone());
            session.append_transcript(TranscriptItem::assistant(evidence.text.clone()));
        }
    }
}

pub struct Aggregator {
    lookup: Arc<dyn Lookup>,
    settings: AggregatorSettings,
}

impl Aggregator {
    pub fn new(lookup: Arc<dyn Lookup>, settings: AggregatorSettings) -> Self {
        Self { lookup, settings }
    }

    /// Research every idea concurrently.
    ///
    /// Per-worker failures are logged and counted, never returned. On any
    /// error every still-running worker is cancelled and awaited (bounded by
    /// the cancel grace) before this returns.
    pub async fn run(
        &self,
        ideas: &[Idea],
        context: &Context,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<Aggregation, AggregationError> {
        let expected = ideas.len();
        let mut aggregation = Aggregation {
            launched: expected,
            ..Default::default()
        };

        if expected == 0 {
            info!("No search ideas, skipping lookups");
            return Ok(aggregation);
        }

        info!(
            "Launching {} lookup workers (max {} concurrent)",
            expected, self.settings.max_concurrent
        );

        let workers_cancel = cancel.child_token();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));
        let context = Arc::new(context.clone());
        let worker_settings = Arc::new(WorkerSettings {
            lookup_timeout: self.settings.lookup_timeout,
            launch_delay: self.settings.launch_delay,
            retry: self.settings.retry.clone(),
        });

        let mut handles: Vec<JoinHandle<()>> = ideas
            .iter()
            .enumerate()
            .map(|(index, idea)| {
                let worker = LookupWorker {
                    index,
                    idea: idea.clone(),
                    context: Arc::clone(&context),
                    lookup: Arc::clone(&self.lookup),
                    settings: Arc::clone(&worker_settings),
                    semaphore: Arc::clone(&semaphore),
                    tx: tx.clone(),
                    cancel: workers_cancel.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        // Only workers hold senders from here on
        drop(tx);

        let deadline = sleep(self.settings.search_timeout);
        tokio::pin!(deadline);

        let mut completed = 0usize;
        let mut reported = vec![false; expected];
        let outcome = loop {
            if completed == expected {
                break Ok(());
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(AggregationError::Cancelled),
                _ = &mut deadline => {
                    break Err(AggregationError::TimedOut(self.settings.search_timeout))
                }
                message = rx.recv() => match message {
                    Some(WorkerMessage::Progress { worker, text }) => {
                        debug!(worker, "Lookup progress: {}", text);
                        sink.emit(RunEvent::progress(text));
                    }
                    Some(WorkerMessage::Outcome { worker, outcome }) => {
                        reported[worker] = true;
                        let query = ideas[worker].query.clone();
                        match outcome {
                            LookupOutcome::Result(text) => {
                                debug!(worker, "Lookup succeeded for '{}'", query);
                                sink.emit(RunEvent::Evidence {
                                    query: query.clone(),
                                    text: text.clone(),
                                });
                                aggregation.results.push(Evidence {
                                    index: worker,
                                    query,
                                    text,
                                });
                            }
                            LookupOutcome::Failed(reason) => {
                                warn!(worker, "Lookup failed for '{}': {}", query, reason);
                                aggregation.failed += 1;
                            }
                        }
                    }
                    Some(WorkerMessage::Done { worker }) => {
                        completed += 1;
                        // A live worker only ends without an outcome by panicking
                        if !reported[worker] {
                            warn!(
                                worker,
                                "Lookup worker for '{}' ended without an outcome",
                                ideas[worker].query
                            );
                            aggregation.failed += 1;
                        }
                        debug!(worker, "Worker done ({}/{})", completed, expected);
                    }
                    None => break Err(AggregationError::ChannelClosed { completed, expected }),
                },
            }
        };

        workers_cancel.cancel();
        shutdown(&mut handles, self.settings.cancel_grace).await;

        match outcome {
            Ok(()) => {
                info!(
                    "Search complete: {} results, {} failed",
                    aggregation.results.len(),
                    aggregation.failed
                );
                Ok(aggregation)
            }
            Err(e) => {
                warn!("Search stopped: {}", e);
                Err(e)
            }
        }
    }
}

/// Wait for cancelled workers to wind down, aborting any that outlast `grace`
async fn shutdown(handles: &mut [JoinHandle<()>], grace: Duration) {
    let joined = match timeout(grace, join_all(handles.iter_mut())).await {
        Ok(joined) => joined,
        Err(_) => {
            let stragglers: Vec<&mut JoinHandle<()>> =
                handles.iter_mut().filter(|h| !h.is_finished()).collect();
            warn!(
                "Aborting {} lookup workers that ignored cancellation",
                stragglers.len()
            );
            for handle in &stragglers {
                handle.abort();
            }
            join_all(stragglers).await
        }
    };

    for result in joined {
        if let Err(e) = result {
            if e.is_panic() {
                warn!("Lookup worker panicked: {}", e);
            }
        }
    }
}
