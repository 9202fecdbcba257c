use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One sub-investigation proposed by the idea generator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Idea {
    #[serde(alias = "search", alias = "term")]
    pub query: String,

    #[serde(default, alias = "reason")]
    pub reasoning: String,
}

impl Idea {
    pub fn new(query: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            reasoning: reasoning.into(),
        }
    }

    /// Lowercased, whitespace-collapsed query
    fn normalize_query(&self) -> String {
        self.query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Deterministic fingerprint used to drop duplicate ideas
    pub fn fingerprint(&self) -> String {
        let hash = Sha256::digest(self.normalize_query().as_bytes());
        format!("{:x}", hash)[..12].to_string()
    }
}

/// A point of interest extracted from an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct Insight {
    #[serde(alias = "material_analysis")]
    pub analysis: String,

    #[serde(default)]
    pub point_of_interest: String,

    #[serde(default, alias = "reason")]
    pub reasoning: String,
}

/// What an idea generator hands back: ideas, plus insights for documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct IdeaBatch {
    #[serde(default)]
    pub ideas: Vec<Idea>,

    #[serde(default)]
    pub insights: Vec<Insight>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_ignores_case_and_spacing() {
        let a = Idea::new("AI  funding\ntrends 2025", "x");
        let b = Idea::new("ai funding trends 2025", "y");

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint().len(), 12);
    }

    #[test]
    fn test_fingerprint_differs_by_query() {
        let a = Idea::new("AI funding trends", "");
        let b = Idea::new("AI chip exports", "");

        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_deserialize_aliases() {
        let idea: Idea = serde_json::from_str(r#"{"query": "q", "reason": "r"}"#).unwrap();
        assert_eq!(idea.reasoning, "r");

        let insight: Insight = serde_json::from_str(
            r#"{"material_analysis": "Revenue doubled", "point_of_interest": "Slide 3"}"#,
        )
        .unwrap();
        assert_eq!(insight.analysis, "Revenue doubled");
        assert_eq!(insight.reasoning, "");
    }
}
