//! Scripted in-memory collaborators for runner tests.

use crate::error::ProviderError;
use crate::parser::{Idea, IdeaBatch};
use crate::provider::{
    Guardrail, GuardrailVerdict, IdeaGenerator, Lookup, ProgressSender, RelevanceVerdict, Report,
    ResearchInput, Responder, SynthesisRequest, Synthesizer, Verifier,
};
use crate::session::{Context, TranscriptItem};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Ending {
    Result(String),
    Fail(String),
    Hang,
    Panic(String),
}

/// How a fake streaming call behaves
#[derive(Debug, Clone)]
pub struct Script {
    progress: Vec<String>,
    delay: Duration,
    failing_first: usize,
    ending: Ending,
}

impl Script {
    fn ending(ending: Ending) -> Self {
        Self {
            progress: Vec::new(),
            delay: Duration::ZERO,
            failing_first: 0,
            ending,
        }
    }

    pub fn result(text: impl Into<String>) -> Self {
        Self::ending(Ending::Result(text.into()))
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self::ending(Ending::Fail(reason.into()))
    }

    pub fn hang() -> Self {
        Self::ending(Ending::Hang)
    }

    pub fn panic(message: impl Into<String>) -> Self {
        Self::ending(Ending::Panic(message.into()))
    }

    /// Progress messages, sent as "<label>: <message>"
    pub fn progress(mut self, messages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.progress = messages.into_iter().map(Into::into).collect();
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the first `n` calls (counted across the fake) with a retryable error
    pub fn failing_first(mut self, n: usize) -> Self {
        self.failing_first = n;
        self
    }

    async fn play(
        &self,
        call: usize,
        label: &str,
        progress: &ProgressSender,
    ) -> Result<String, ProviderError> {
        for message in &self.progress {
            progress.send(format!("{}: {}", label, message));
            tokio::task::yield_now().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if call <= self.failing_first {
            return Err(ProviderError::Failed("transient".to_string()));
        }
        match &self.ending {
            Ending::Result(text) => Ok(text.clone()),
            Ending::Fail(reason) => Err(ProviderError::Failed(reason.clone())),
            Ending::Hang => std::future::pending().await,
            Ending::Panic(message) => panic!("{}", message),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    dropped: AtomicUsize,
}

impl Counters {
    fn enter(&self) -> (usize, InFlight<'_>) {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        (
            call,
            InFlight {
                counters: self,
                finished: false,
            },
        )
    }
}

/// Tracks one call; a call dropped before finishing counts as dropped
struct InFlight<'a> {
    counters: &'a Counters,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        if !self.finished {
            self.counters.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeLookup {
    default: Script,
    by_query: HashMap<String, Script>,
    counters: Counters,
}

impl FakeLookup {
    pub fn new(default: Script) -> Self {
        Self {
            default,
            by_query: HashMap::new(),
            counters: Counters::default(),
        }
    }

    pub fn with(mut self, query: impl Into<String>, script: Script) -> Self {
        self.by_query.insert(query.into(), script);
        self
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.counters.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.counters.dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Lookup for FakeLookup {
    fn name(&self) -> &'static str {
        "fake_lookup"
    }

    async fn lookup(
        &self,
        idea: &Idea,
        _context: &Context,
        progress: ProgressSender,
    ) -> Result<String, ProviderError> {
        let (call, guard) = self.counters.enter();
        let script = self.by_query.get(&idea.query).unwrap_or(&self.default);
        let outcome = script.play(call, &idea.query, &progress).await;
        guard.finish();
        outcome
    }
}

pub struct FakeIdeas {
    outcome: Result<IdeaBatch, String>,
    counters: Counters,
    seen: Mutex<Vec<ResearchInput>>,
}

impl FakeIdeas {
    pub fn returning(ideas: Vec<Idea>) -> Self {
        Self::batch(IdeaBatch {
            ideas,
            insights: Vec::new(),
        })
    }

    pub fn batch(batch: IdeaBatch) -> Self {
        Self {
            outcome: Ok(batch),
            counters: Counters::default(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(reason.into()),
            counters: Counters::default(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<ResearchInput> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdeaGenerator for FakeIdeas {
    fn name(&self) -> &'static str {
        "fake_ideas"
    }

    async fn generate(
        &self,
        input: &ResearchInput,
        _context: &Context,
    ) -> Result<IdeaBatch, ProviderError> {
        let (_, guard) = self.counters.enter();
        self.seen.lock().unwrap().push(input.clone());
        guard.finish();
        self.outcome.clone().map_err(ProviderError::Failed)
    }
}

pub struct FakeGuardrail {
    verdict: GuardrailVerdict,
    counters: Counters,
}

impl FakeGuardrail {
    pub fn pass() -> Self {
        Self {
            verdict: GuardrailVerdict {
                flagged: false,
                reason: String::new(),
            },
            counters: Counters::default(),
        }
    }

    pub fn flag(reason: impl Into<String>) -> Self {
        Self {
            verdict: GuardrailVerdict {
                flagged: true,
                reason: reason.into(),
            },
            counters: Counters::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Guardrail for FakeGuardrail {
    fn name(&self) -> &'static str {
        "fake_guardrail"
    }

    async fn check(&self, _input: &str, _context: &Context) -> Result<GuardrailVerdict, ProviderError> {
        let (_, guard) = self.counters.enter();
        guard.finish();
        Ok(self.verdict.clone())
    }
}

pub struct FakeSynthesizer {
    script: Script,
    counters: Counters,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl FakeSynthesizer {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            counters: Counters::default(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<SynthesisRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    fn name(&self) -> &'static str {
        "fake_synthesizer"
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        progress: ProgressSender,
    ) -> Result<Report, ProviderError> {
        let (call, guard) = self.counters.enter();
        self.requests.lock().unwrap().push(request.clone());
        let outcome = self.script.play(call, "report", &progress).await;
        guard.finish();
        outcome.map(|text| Report {
            text,
            sources: Vec::new(),
        })
    }
}

pub struct FakeVerifier {
    verdict: Result<RelevanceVerdict, String>,
    counters: Counters,
    reports: Mutex<Vec<String>>,
}

impl FakeVerifier {
    fn answering(verdict: Result<RelevanceVerdict, String>) -> Self {
        Self {
            verdict,
            counters: Counters::default(),
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn relevant() -> Self {
        Self::answering(Ok(RelevanceVerdict {
            is_relevant: true,
            improvement_suggestions: String::new(),
        }))
    }

    pub fn rejecting(suggestions: impl Into<String>) -> Self {
        Self::answering(Ok(RelevanceVerdict {
            is_relevant: false,
            improvement_suggestions: suggestions.into(),
        }))
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::answering(Err(reason.into()))
    }

    pub fn calls(&self) -> usize {
        self.counters.calls.load(Ordering::SeqCst)
    }

    pub fn last_report(&self) -> Option<String> {
        self.reports.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Verifier for FakeVerifier {
    fn name(&self) -> &'static str {
        "fake_verifier"
    }

    async fn verify(
        &self,
        report: &Report,
        _context: &Context,
    ) -> Result<RelevanceVerdict, ProviderError> {
        let (_, guard) = self.counters.enter();
        self.reports.lock().unwrap().push(report.text.clone());
        guard.finish();
        self.verdict.clone().map_err(ProviderError::Failed)
    }
}

pub struct FakeResponder {
    reply: Result<String, String>,
    seen: Mutex<Vec<Vec<TranscriptItem>>>,
}

impl FakeResponder {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            reply: Ok(reply.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            reply: Err(reason.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn last_transcript(&self) -> Option<Vec<TranscriptItem>> {
        self.seen.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Responder for FakeResponder {
    fn name(&self) -> &'static str {
        "fake_responder"
    }

    async fn respond(
        &self,
        transcript: &[TranscriptItem],
        _context: &Context,
    ) -> Result<String, ProviderError> {
        self.seen.lock().unwrap().push(transcript.to_vec());
        self.reply.clone().map_err(ProviderError::Failed)
    }
}
