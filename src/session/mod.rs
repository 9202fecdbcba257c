//! Per-conversation state threaded through every phase of a run.
//!
//! A `SessionState` has exactly one logical writer at a time: the pipeline
//! controller and the phases it invokes sequentially. Lookup workers never
//! touch it; their outputs are folded in by the controller after fan-in.

mod store;

pub use store::SessionStore;

use crate::error::SessionError;
use crate::parser::{Idea, Insight};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Who the research is for. Read by every collaborator call, never mutated mid-run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Context {
    pub company: String,

    pub role: String,

    pub interests: Vec<String>,
}

impl Context {
    pub fn new(
        company: impl Into<String>,
        role: impl Into<String>,
        interests: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            company: company.into(),
            role: role.into(),
            interests: interests.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.company.trim().is_empty() {
            return Err(SessionError::InvalidContext("company is required".to_string()));
        }
        if self.role.trim().is_empty() {
            return Err(SessionError::InvalidContext("role is required".to_string()));
        }
        if self.interests.iter().all(|i| i.trim().is_empty()) {
            return Err(SessionError::InvalidContext(
                "at least one interest is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Interests as prose: "AI", "AI and Strategy", "AI, Strategy, and Energy"
    pub fn interests_phrase(&self) -> String {
        let interests: Vec<&str> = self
            .interests
            .iter()
            .map(|i| i.trim())
            .filter(|i| !i.is_empty())
            .collect();

        match interests.as_slice() {
            [] => String::new(),
            [only] => only.to_string(),
            [first, second] => format!("{} and {}", first, second),
            [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TranscriptItem {
    pub role: Role,
    pub content: String,
}

impl TranscriptItem {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    conversation_id: String,

    #[serde(default)]
    context: Option<Context>,

    #[serde(default)]
    transcript: Vec<TranscriptItem>,

    #[serde(default)]
    ideas: Vec<Idea>,

    #[serde(default)]
    insights: Vec<Insight>,

    #[serde(default)]
    results: Vec<String>,

    #[serde(default)]
    report: Option<String>,

    updated_at: DateTime<Utc>,
}

impl SessionState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            context: None,
            transcript: Vec::new(),
            ideas: Vec::new(),
            insights: Vec::new(),
            results: Vec::new(),
            report: None,
            updated_at: Utc::now(),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn context(&self) -> Result<&Context, SessionError> {
        self.context
            .as_ref()
            .ok_or_else(|| SessionError::MissingContext(self.conversation_id.clone()))
    }

    pub fn set_context(&mut self, context: Context) -> Result<(), SessionError> {
        context.validate()?;
        self.context = Some(context);
        self.touch();
        Ok(())
    }

    pub fn transcript(&self) -> &[TranscriptItem] {
        &self.transcript
    }

    pub fn append_transcript(&mut self, item: TranscriptItem) {
        self.transcript.push(item);
        self.touch();
    }

    pub fn ideas(&self) -> &[Idea] {
        &self.ideas
    }

    pub fn set_ideas(&mut self, ideas: Vec<Idea>) {
        self.ideas = ideas;
        self.touch();
    }

    pub fn insights(&self) -> &[Insight] {
        &self.insights
    }

    pub fn set_insights(&mut self, insights: Vec<Insight>) {
        self.insights = insights;
        self.touch();
    }

    /// Successful lookup results of the last completed search
    pub fn results(&self) -> &[String] {
        &self.results
    }

    pub fn clear_results(&mut self) {
        self.results.clear();
        self.touch();
    }

    pub fn append_result(&mut self, text: impl Into<String>) {
        self.results.push(text.into());
        self.touch();
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    pub fn set_report(&mut self, text: impl Into<String>) {
        self.report = Some(text.into());
        self.touch();
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Forget the conversation but keep who it is for
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.ideas.clear();
        self.insights.clear();
        self.results.clear();
        self.report = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> Context {
        Context::new("Acme", "Analyst", ["AI"])
    }

    #[test]
    fn test_context_validation() {
        assert!(acme().validate().is_ok());
        assert!(Context::new("", "Analyst", ["AI"]).validate().is_err());
        assert!(Context::new("Acme", "  ", ["AI"]).validate().is_err());
        assert!(Context::new("Acme", "Analyst", Vec::<String>::new())
            .validate()
            .is_err());
        assert!(Context::new("Acme", "Analyst", [""]).validate().is_err());
    }

    #[test]
    fn test_set_context_rejects_invalid() {
        let mut session = SessionState::new("c1");
        let err = session
            .set_context(Context::new("Acme", "", ["AI"]))
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidContext(_)));
        assert!(session.context().is_err());

        session.set_context(acme()).unwrap();
        assert_eq!(session.context().unwrap().company, "Acme");
    }

    #[test]
    fn test_interests_phrase() {
        assert_eq!(Context::new("A", "B", ["AI"]).interests_phrase(), "AI");
        assert_eq!(
            Context::new("A", "B", ["AI", "Strategy"]).interests_phrase(),
            "AI and Strategy"
        );
        assert_eq!(
            Context::new("A", "B", ["AI", "Strategy", "Energy"]).interests_phrase(),
            "AI, Strategy, and Energy"
        );
    }

    #[test]
    fn test_reset_keeps_context() {
        let mut session = SessionState::new("c1");
        session.set_context(acme()).unwrap();
        session.append_transcript(TranscriptItem::user("hello"));
        session.append_result("Funding rose 20%");
        session.set_report("report");

        session.reset();

        assert!(session.transcript().is_empty());
        assert!(session.results().is_empty());
        assert!(session.report().is_none());
        assert_eq!(session.context().unwrap(), &acme());
    }

    #[test]
    fn test_transcript_is_append_only_in_order() {
        let mut session = SessionState::new("c1");
        session.append_transcript(TranscriptItem::user("q"));
        session.append_transcript(TranscriptItem::assistant("r1"));
        session.append_transcript(TranscriptItem::assistant("report"));

        let roles: Vec<Role> = session.transcript().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Assistant]);
        assert_eq!(session.transcript()[2].content, "report");
    }
}
