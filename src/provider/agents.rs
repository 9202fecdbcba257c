use super::command::CommandRunner;
use super::wire::AgentOutput;
use super::{
    Guardrail, GuardrailVerdict, IdeaGenerator, Lookup, ProgressSender, RelevanceVerdict, Report,
    ResearchInput, Responder, SynthesisRequest, Synthesizer, Verifier,
};
use crate::error::ProviderError;
use crate::parser::{extract_json, parse_ideas, Idea, IdeaBatch};
use crate::session::{Context, TranscriptItem};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

// Embedded default prompts
pub const GUARDRAIL_PROMPT: &str = include_str!("../../prompts/guardrail.md");
pub const IDEAS_PROMPT: &str = include_str!("../../prompts/ideas.md");
pub const MATERIAL_PROMPT: &str = include_str!("../../prompts/material.md");
pub const LOOKUP_PROMPT: &str = include_str!("../../prompts/lookup.md");
pub const REPORT_PROMPT: &str = include_str!("../../prompts/report.md");
pub const VERIFIER_PROMPT: &str = include_str!("../../prompts/verifier.md");
pub const CHAT_PROMPT: &str = include_str!("../../prompts/chat.md");

pub struct CommandGuardrail {
    runner: CommandRunner,
}

impl CommandGuardrail {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

/// Guardrail agents may answer in prose instead of JSON
fn verdict_from_text(text: &str) -> Option<GuardrailVerdict> {
    if let Some(verdict) =
        extract_json(text).and_then(|json| serde_json::from_str::<GuardrailVerdict>(&json).ok())
    {
        return Some(verdict);
    }

    let clear = Regex::new(r"(?i)\bno clear nda violation\b").ok()?;
    let detected = Regex::new(r"(?i)violation detected\s*[:：]?\s*(.*)").ok()?;

    if clear.is_match(text) {
        Some(GuardrailVerdict {
            flagged: false,
            reason: String::new(),
        })
    } else {
        detected.captures(text).map(|caps| GuardrailVerdict {
            flagged: true,
            reason: caps
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default(),
        })
    }
}

#[async_trait]
impl Guardrail for CommandGuardrail {
    fn name(&self) -> &'static str {
        "command_guardrail"
    }

    async fn check(&self, input: &str, context: &Context) -> Result<GuardrailVerdict, ProviderError> {
        let output = self
            .runner
            .invoke("guardrail", context, json!({ "input": input }), None)
            .await?;

        let verdict = match output {
            AgentOutput::Structured(Value::String(text)) | AgentOutput::Raw(text) => {
                verdict_from_text(&text)
            }
            AgentOutput::Structured(value) => serde_json::from_value(value).ok(),
        };

        verdict.ok_or_else(|| ProviderError::Protocol("unrecognized guardrail verdict".to_string()))
    }
}

pub struct CommandIdeas {
    runner: CommandRunner,
    task: &'static str,
}

impl CommandIdeas {
    pub fn text(runner: CommandRunner) -> Self {
        Self {
            runner,
            task: "ideas",
        }
    }

    pub fn material(runner: CommandRunner) -> Self {
        Self {
            runner,
            task: "material",
        }
    }
}

#[async_trait]
impl IdeaGenerator for CommandIdeas {
    fn name(&self) -> &'static str {
        self.task
    }

    async fn generate(
        &self,
        input: &ResearchInput,
        context: &Context,
    ) -> Result<IdeaBatch, ProviderError> {
        let payload = match input {
            ResearchInput::Text { query } => json!({ "query": query }),
            ResearchInput::Document(doc) => json!({ "name": doc.name, "content": doc.content }),
        };

        let output = self.runner.invoke(self.task, context, payload, None).await?;

        let batch = match output {
            AgentOutput::Structured(Value::String(text)) | AgentOutput::Raw(text) => {
                parse_ideas(&text)
            }
            AgentOutput::Structured(value) => match serde_json::from_value::<IdeaBatch>(value.clone())
            {
                Ok(batch) => Some(batch),
                // Nested document-analysis shapes go through the parser
                Err(_) => parse_ideas(&value.to_string()),
            },
        };

        batch.ok_or_else(|| ProviderError::Protocol("could not parse search ideas".to_string()))
    }
}

pub struct CommandLookup {
    runner: CommandRunner,
}

impl CommandLookup {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Lookup for CommandLookup {
    fn name(&self) -> &'static str {
        "command_lookup"
    }

    async fn lookup(
        &self,
        idea: &Idea,
        context: &Context,
        progress: ProgressSender,
    ) -> Result<String, ProviderError> {
        let payload = json!({ "query": idea.query, "reasoning": idea.reasoning });
        self.runner
            .invoke("lookup", context, payload, Some(&progress))
            .await?
            .into_text()
            .ok_or(ProviderError::EmptyResult)
    }
}

pub struct CommandSynthesizer {
    runner: CommandRunner,
}

impl CommandSynthesizer {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    fn name(&self) -> &'static str {
        "command_report"
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        progress: ProgressSender,
    ) -> Result<Report, ProviderError> {
        let mut payload = json!({
            "transcript": request.transcript,
            "insights": request.insights,
            "evidence_count": request.evidence_count,
        });
        if let Some(revision) = &request.revision {
            payload["revision"] = json!(revision);
        }

        let output = self
            .runner
            .invoke("report", &request.context, payload, Some(&progress))
            .await?;

        if let AgentOutput::Structured(value @ Value::Object(_)) = &output {
            if let Ok(report) = serde_json::from_value::<Report>(value.clone()) {
                return Ok(report);
            }
        }

        let text = output.into_text().ok_or(ProviderError::EmptyResult)?;
        Ok(Report {
            text,
            sources: Vec::new(),
        })
    }
}

pub struct CommandVerifier {
    runner: CommandRunner,
}

impl CommandVerifier {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

fn relevance_from_output(output: AgentOutput) -> Option<RelevanceVerdict> {
    match output {
        AgentOutput::Structured(Value::String(text)) | AgentOutput::Raw(text) => {
            extract_json(&text).and_then(|json| serde_json::from_str(&json).ok())
        }
        AgentOutput::Structured(value) => serde_json::from_value(value).ok(),
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    fn name(&self) -> &'static str {
        "command_verifier"
    }

    async fn verify(
        &self,
        report: &Report,
        context: &Context,
    ) -> Result<RelevanceVerdict, ProviderError> {
        let output = self
            .runner
            .invoke("verify", context, json!({ "report": report.text }), None)
            .await?;

        relevance_from_output(output)
            .ok_or_else(|| ProviderError::Protocol("unrecognized relevance verdict".to_string()))
    }
}

pub struct CommandResponder {
    runner: CommandRunner,
}

impl CommandResponder {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Responder for CommandResponder {
    fn name(&self) -> &'static str {
        "command_chat"
    }

    async fn respond(
        &self,
        transcript: &[TranscriptItem],
        context: &Context,
    ) -> Result<String, ProviderError> {
        self.runner
            .invoke("chat", context, json!({ "transcript": transcript }), None)
            .await?
            .into_text()
            .ok_or(ProviderError::EmptyResult)
    }
}
