use super::{Idea, IdeaBatch, Insight};
use serde::Deserialize;

/// Try to parse an idea batch from JSON output
pub fn try_parse_json(raw: &str) -> Option<IdeaBatch> {
    // Agents that wrap their answer as {"result": "..."}
    #[derive(Deserialize)]
    struct WrappedOutput {
        result: String,
    }

    if let Ok(wrapped) = serde_json::from_str::<WrappedOutput>(raw) {
        if let Some(batch) = parse_batch_json(&wrapped.result) {
            return Some(batch);
        }
    }

    parse_batch_json(raw)
}

/// Accepts the flat `{ideas: [..], insights: [..]}` shape and the nested
/// document-analysis shape `{ideas: {ideas: [..]}, insights: {insights: [..]}}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdeaList {
    Flat(Vec<Idea>),
    Nested { ideas: Vec<Idea> },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InsightList {
    Flat(Vec<Insight>),
    Nested { insights: Vec<Insight> },
}

#[derive(Deserialize)]
struct BatchWrapper {
    ideas: IdeaList,
    #[serde(default)]
    insights: Option<InsightList>,
}

fn parse_batch_json(s: &str) -> Option<IdeaBatch> {
    let json_str = extract_json(s)?;

    match serde_json::from_str::<BatchWrapper>(&json_str) {
        Ok(wrapper) => {
            let ideas = match wrapper.ideas {
                IdeaList::Flat(ideas) | IdeaList::Nested { ideas } => ideas,
            };
            let insights = match wrapper.insights {
                Some(InsightList::Flat(insights)) | Some(InsightList::Nested { insights }) => {
                    insights
                }
                None => Vec::new(),
            };
            Some(IdeaBatch { ideas, insights })
        }
        Err(e) => {
            tracing::debug!("Failed to parse ideas JSON: {}", e);
            None
        }
    }
}

/// Extract a JSON object from a string that might contain markdown code blocks
pub fn extract_json(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }

    let re = regex::Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").ok()?;
    for cap in re.captures_iter(s) {
        let potential_json = cap.get(1)?.as_str().trim();
        if serde_json::from_str::<serde_json::Value>(potential_json).is_ok() {
            return Some(potential_json.to_string());
        }
    }

    // First balanced object, skipping braces inside string literals
    let brace_start = s.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut end = None;

    for (i, c) in s[brace_start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(brace_start + i + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    let potential_json = &s[brace_start..end?];
    serde_json::from_str::<serde_json::Value>(potential_json)
        .ok()
        .map(|_| potential_json.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_direct_json() {
        let json = r#"{"ideas": [{"query": "AI funding 2025", "reasoning": "baseline"}]}"#;
        let batch = try_parse_json(json).unwrap();
        assert_eq!(batch.ideas.len(), 1);
        assert_eq!(batch.ideas[0].query, "AI funding 2025");
        assert!(batch.insights.is_empty());
    }

    #[test]
    fn test_parse_wrapped_result() {
        let json = r#"{"result": "{\"ideas\": [{\"query\": \"q1\", \"reasoning\": \"r1\"}]}", "session_id": "abc"}"#;
        let batch = try_parse_json(json).unwrap();
        assert_eq!(batch.ideas, vec![Idea::new("q1", "r1")]);
    }

    #[test]
    fn test_parse_nested_document_analysis() {
        let json = r#"{
            "ideas": {"ideas": [{"query": "q1", "reasoning": "r1"}, {"query": "q2", "reasoning": "r2"}]},
            "insights": {"insights": [{"material_analysis": "Margins fell", "point_of_interest": "Slide 4", "reasoning": "trend"}]}
        }"#;
        let batch = try_parse_json(json).unwrap();
        assert_eq!(batch.ideas.len(), 2);
        assert_eq!(batch.insights.len(), 1);
        assert_eq!(batch.insights[0].point_of_interest, "Slide 4");
    }

    #[test]
    fn test_parse_markdown_fenced() {
        let md = r#"
Here are the ideas:

```json
{"ideas": [{"query": "q1", "reasoning": "r1"}]}
```
"#;
        let batch = try_parse_json(md).unwrap();
        assert_eq!(batch.ideas.len(), 1);
    }

    #[test]
    fn test_extract_json_ignores_braces_in_strings() {
        let s = r#"Sure! {"ideas": [{"query": "what is {x}?", "reasoning": "}"}]} trailing"#;
        let extracted = extract_json(s).unwrap();
        assert!(extracted.ends_with("]}"));
        assert_eq!(try_parse_json(s).unwrap().ideas[0].query, "what is {x}?");
    }

    #[test]
    fn test_not_json() {
        assert!(try_parse_json("no structured output here").is_none());
    }
}
