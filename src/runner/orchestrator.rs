use crate::config::Config;
use crate::error::{ChatError, ConfigError, PipelineError, ProviderError};
use crate::parser::{Idea, Insight};
use crate::provider::{Collaborators, Report, ResearchInput};
use crate::session::{SessionState, TranscriptItem};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::aggregator::{AggregationError, Aggregator, AggregatorSettings, Evidence};
use super::events::{EventSink, Flow, RunEvent};
use super::ideas::generate_ideas;
use super::machine::{RunMachine, Transition};
use super::report::synthesize_report;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_ideas: usize,
    pub ideas_timeout: Duration,
    pub report_timeout: Duration,
    pub chat_timeout: Duration,
    pub search: AggregatorSettings,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_ideas: config.limits.max_ideas,
            ideas_timeout: config.timeouts.ideas(),
            report_timeout: config.timeouts.report(),
            chat_timeout: config.timeouts.chat(),
            search: AggregatorSettings::from_config(config),
        }
    }
}

/// What a completed run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub flow: Flow,
    pub ideas: Vec<Idea>,
    pub insights: Vec<Insight>,
    pub evidence: Vec<Evidence>,
    pub failed_lookups: usize,
    pub report: Report,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives one run at a time through ideas, search and report.
///
/// The pipeline holds no per-conversation state; every run borrows the
/// conversation's `SessionState` mutably for its whole duration, which makes
/// the controller its only writer.
pub struct Pipeline {
    collaborators: Collaborators,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    /// Execute one run. Every run ends with exactly one terminal event on
    /// `sink`: `Report` on success, `Error` otherwise.
    pub async fn run(
        &self,
        session: &mut SessionState,
        input: ResearchInput,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let flow = if input.is_document() {
            Flow::Document
        } else {
            Flow::Text
        };
        let span = info_span!("run", %run_id, %flow);

        async {
            let mut machine = RunMachine::new();
            match self
                .drive(&mut machine, session, &input, run_id, flow, sink, cancel)
                .await
            {
                Ok(summary) => {
                    info!(
                        "Run complete: {} ideas, {} results",
                        summary.ideas.len(),
                        summary.evidence.len()
                    );
                    sink.emit(RunEvent::Report {
                        text: summary.report.text.clone(),
                    });
                    Ok(summary)
                }
                Err(e) => {
                    let state = machine.fail(e.kind());
                    warn!("Run ended in {}: {}", state, e);
                    sink.emit(RunEvent::error(&e));
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive(
        &self,
        machine: &mut RunMachine,
        session: &mut SessionState,
        input: &ResearchInput,
        run_id: Uuid,
        flow: Flow,
        sink: &EventSink,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, PipelineError> {
        let started_at = Utc::now();
        sink.emit(RunEvent::Started { run_id, flow });

        let context = session.context()?.clone();
        context.validate()?;

        machine.apply(Transition::Start)?;
        let ideas = generate_ideas(
            &self.collaborators,
            self.settings.ideas_timeout,
            self.settings.max_ideas,
            session,
            input,
            sink,
            cancel,
        )
        .await?;
        ensure_live(cancel)?;

        machine.apply(Transition::IdeasReady)?;
        let aggregator = Aggregator::new(
            Arc::clone(&self.collaborators.lookup),
            self.settings.search.clone(),
        );
        let aggregation = aggregator
            .run(&ideas, &context, sink, cancel)
            .await
            .map_err(|e| match e {
                AggregationError::Cancelled => PipelineError::Cancelled,
                other => PipelineError::AggregationFailed(other.to_string()),
            })?;
        // A run cancelled after fan-in still must not merge
        ensure_live(cancel)?;
        aggregation.fold_into(session);

        machine.apply(Transition::AggregationComplete)?;
        sink.emit(RunEvent::message(format!(
            "Search complete ({} of {} lookups succeeded), preparing report",
            aggregation.results.len(),
            aggregation.launched
        )));

        let report = synthesize_report(
            &self.collaborators.synthesizer,
            self.settings.report_timeout,
            session,
            sink,
            cancel,
        )
        .await?;
        machine.apply(Transition::ReportReady)?;

        Ok(RunSummary {
            run_id,
            flow,
            ideas: session.ideas().to_vec(),
            insights: session.insights().to_vec(),
            evidence: aggregation.results,
            failed_lookups: aggregation.failed,
            report,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Run on a background task that owns the session until the run ends
    pub fn spawn(self: &Arc<Self>, session: SessionState, input: ResearchInput) -> RunStream {
        let (tx, events) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let sink = EventSink::new(tx, cancel.clone());

        let pipeline = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut session = session;
            let result = pipeline.run(&mut session, input, &sink, &token).await;
            RunOutcome { session, result }
        });

        RunStream {
            events,
            cancel: cancel.clone(),
            guard: Some(cancel.drop_guard()),
            handle,
        }
    }

    /// A conversational turn without research. The transcript only changes
    /// when the responder answers.
    pub async fn chat(&self, session: &mut SessionState, message: &str) -> Result<String, ChatError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let responder = self
            .collaborators
            .responder
            .as_ref()
            .ok_or(ConfigError::MissingProvider("chat"))?;
        let context = session.context()?.clone();

        let mut transcript = session.transcript().to_vec();
        transcript.push(TranscriptItem::user(message));

        let limit = self.settings.chat_timeout;
        let reply = timeout(limit, responder.respond(&transcript, &context))
            .await
            .unwrap_or(Err(ProviderError::Timeout(limit)))?;

        session.append_transcript(TranscriptItem::user(message));
        session.append_transcript(TranscriptItem::assistant(reply.clone()));
        Ok(reply)
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

/// The session handed back after a spawned run, with the run's result
#[derive(Debug)]
pub struct RunOutcome {
    pub session: SessionState,
    pub result: Result<RunSummary, PipelineError>,
}

/// Event stream of a spawned run. Dropping it cancels the run.
pub struct RunStream {
    events: mpsc::UnboundedReceiver<RunEvent>,
    cancel: CancellationToken,
    guard: Option<DropGuard>,
    handle: JoinHandle<RunOutcome>,
}

impl RunStream {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to end and take the session back. Events not yet
    /// read are discarded.
    pub async fn finish(mut self) -> Result<RunOutcome, JoinError> {
        if let Some(guard) = self.guard.take() {
            guard.disarm();
        }
        // Keep receiving so a run still in flight is not cancelled by a closed stream
        let RunStream {
            mut events, handle, ..
        } = self;
        let drain = async { while events.recv().await.is_some() {} };
        let (_, outcome) = tokio::join!(drain, handle);
        outcome
    }
}

impl Stream for RunStream {
    type Item = RunEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<RunEvent>> {
        self.events.poll_recv(cx)
    }
}
