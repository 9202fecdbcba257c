//! Capability interfaces for the external collaborators, plus the
//! command-backed adapters that implement them.

mod agents;
mod command;
mod verified;
mod wire;

pub use agents::{
    CommandGuardrail, CommandIdeas, CommandLookup, CommandResponder, CommandSynthesizer,
    CommandVerifier,
};
pub use command::CommandRunner;
pub use verified::VerifiedSynthesizer;

use crate::config::Config;
use crate::error::{ConfigError, ProviderError};
use crate::parser::{Idea, IdeaBatch, Insight};
use crate::session::{Context, TranscriptItem};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What a run researches: a typed query or an uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResearchInput {
    Text { query: String },
    Document(Document),
}

impl ResearchInput {
    pub fn text(query: impl Into<String>) -> Self {
        ResearchInput::Text {
            query: query.into(),
        }
    }

    /// Text the guardrail inspects
    pub fn screening_text(&self) -> &str {
        match self {
            ResearchInput::Text { query } => query,
            ResearchInput::Document(doc) => &doc.content,
        }
    }

    /// How the input is recorded as the user's transcript item
    pub fn transcript_text(&self) -> String {
        match self {
            ResearchInput::Text { query } => query.clone(),
            ResearchInput::Document(doc) => format!("Document: {}\n\n{}", doc.name, doc.content),
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, ResearchInput::Document(_))
    }
}

/// Already-extracted document content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailVerdict {
    #[serde(alias = "is_sensitive", alias = "tripwire_triggered")]
    pub flagged: bool,

    #[serde(default)]
    pub reason: String,
}

/// Everything the synthesizer sees
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisRequest {
    pub context: Context,
    pub transcript: Vec<TranscriptItem>,
    pub insights: Vec<Insight>,
    /// Number of lookup results in this run; zero means an evidence-free report
    pub evidence_count: usize,
    /// Suggestions from a rejected draft, set when rewriting it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(alias = "report")]
    pub text: String,

    #[serde(default)]
    pub sources: Vec<String>,
}

/// Whether a drafted report fits the user's context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceVerdict {
    #[serde(alias = "relevant")]
    pub is_relevant: bool,

    #[serde(default, alias = "suggestions")]
    pub improvement_suggestions: String,
}

/// Progress channel handed to streaming collaborators.
///
/// Sending never blocks; messages sent after the receiving side is gone are
/// dropped.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<String>,
}

impl ProgressSender {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, message: impl Into<String>) {
        let _ = self.tx.send(message.into());
    }
}

#[async_trait]
pub trait Guardrail: Send + Sync {
    fn name(&self) -> &'static str;

    async fn check(&self, input: &str, context: &Context) -> Result<GuardrailVerdict, ProviderError>;
}

#[async_trait]
pub trait IdeaGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        input: &ResearchInput,
        context: &Context,
    ) -> Result<IdeaBatch, ProviderError>;
}

#[async_trait]
pub trait Lookup: Send + Sync {
    fn name(&self) -> &'static str;

    /// Research one idea, reporting progress as it goes
    async fn lookup(
        &self,
        idea: &Idea,
        context: &Context,
        progress: ProgressSender,
    ) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        progress: ProgressSender,
    ) -> Result<Report, ProviderError>;
}

/// Checks a drafted report against the user's context
#[async_trait]
pub trait Verifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn verify(&self, report: &Report, context: &Context)
        -> Result<RelevanceVerdict, ProviderError>;
}

/// Plain conversational reply without research
#[async_trait]
pub trait Responder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn respond(
        &self,
        transcript: &[TranscriptItem],
        context: &Context,
    ) -> Result<String, ProviderError>;
}

/// The full set of collaborators a pipeline drives
#[derive(Clone)]
pub struct Collaborators {
    pub guardrail: Option<Arc<dyn Guardrail>>,
    pub ideas: Arc<dyn IdeaGenerator>,
    pub material: Arc<dyn IdeaGenerator>,
    pub lookup: Arc<dyn Lookup>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub responder: Option<Arc<dyn Responder>>,
}

impl Collaborators {
    pub fn idea_generator_for(&self, input: &ResearchInput) -> &Arc<dyn IdeaGenerator> {
        if input.is_document() {
            &self.material
        } else {
            &self.ideas
        }
    }
}

/// Create command-backed collaborators from the provider configuration
pub fn create_collaborators(config: &Config) -> Result<Collaborators, ConfigError> {
    let providers = &config.providers;

    let guardrail = match &providers.guardrail {
        Some(spec) => Some(Arc::new(CommandGuardrail::new(CommandRunner::from_spec(
            spec,
            agents::GUARDRAIL_PROMPT,
        )?)) as Arc<dyn Guardrail>),
        None => None,
    };

    let ideas: Arc<dyn IdeaGenerator> = Arc::new(CommandIdeas::text(CommandRunner::from_spec(
        &providers.ideas,
        agents::IDEAS_PROMPT,
    )?));

    let material: Arc<dyn IdeaGenerator> = Arc::new(CommandIdeas::material(
        CommandRunner::from_spec(
            providers.material.as_ref().unwrap_or(&providers.ideas),
            agents::MATERIAL_PROMPT,
        )?,
    ));

    let lookup: Arc<dyn Lookup> = Arc::new(CommandLookup::new(CommandRunner::from_spec(
        &providers.lookup,
        agents::LOOKUP_PROMPT,
    )?));

    let writer: Arc<dyn Synthesizer> = Arc::new(CommandSynthesizer::new(
        CommandRunner::from_spec(&providers.report, agents::REPORT_PROMPT)?,
    ));

    let synthesizer: Arc<dyn Synthesizer> = match &providers.verifier {
        Some(spec) => {
            let verifier: Arc<dyn Verifier> = Arc::new(CommandVerifier::new(
                CommandRunner::from_spec(spec, agents::VERIFIER_PROMPT)?,
            ));
            Arc::new(VerifiedSynthesizer::new(writer, verifier))
        }
        None => writer,
    };

    let responder = match &providers.chat {
        Some(spec) => Some(Arc::new(CommandResponder::new(CommandRunner::from_spec(
            spec,
            agents::CHAT_PROMPT,
        )?)) as Arc<dyn Responder>),
        None => None,
    };

    Ok(Collaborators {
        guardrail,
        ideas,
        material,
        lookup,
        synthesizer,
        responder,
    })
}
