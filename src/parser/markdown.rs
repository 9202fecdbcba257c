use super::{Idea, IdeaBatch};
use regex::Regex;

/// Try to parse ideas from a "Query: ... / Reason: ..." list.
///
/// Accepts English and Japanese labels, with or without list markers and
/// bold markup, e.g.
///
/// ```text
/// - **Query:** AI chip export rules
///   **Reason:** Affects supply planning
/// 検索: 生成AIの市場規模
/// 理由: 投資判断の前提
/// ```
pub fn try_parse_idea_list(raw: &str) -> Option<IdeaBatch> {
    let re = Regex::new(
        r"(?mi)^[\s>*-]*(?:\*\*)?(?:query|search|検索)(?:\*\*)?\s*[:：]\s*(?:\*\*)?\s*(.+?)\s*$\s*^[\s>*-]*(?:\*\*)?(?:reason|reasoning|理由)(?:\*\*)?\s*[:：]\s*(?:\*\*)?\s*(.+?)\s*$",
    )
    .ok()?;

    let ideas: Vec<Idea> = re
        .captures_iter(raw)
        .filter_map(|caps| {
            let query = clean(caps.get(1)?.as_str());
            let reasoning = clean(caps.get(2)?.as_str());
            if query.is_empty() {
                None
            } else {
                Some(Idea::new(query, reasoning))
            }
        })
        .collect();

    if ideas.is_empty() {
        None
    } else {
        Some(IdeaBatch {
            ideas,
            insights: Vec::new(),
        })
    }
}

fn clean(s: &str) -> String {
    s.trim().trim_matches('*').trim().trim_matches('"').trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_english_list() {
        let md = r#"
Here are the search ideas:

- Query: AI venture funding Q2 2025
- Reason: Establishes the current funding baseline

- **Query:** Sovereign AI fund announcements
  **Reason:** Government money is reshaping the market
"#;
        let batch = try_parse_idea_list(md).unwrap();
        assert_eq!(batch.ideas.len(), 2);
        assert_eq!(batch.ideas[0].query, "AI venture funding Q2 2025");
        assert_eq!(
            batch.ideas[1].reasoning,
            "Government money is reshaping the market"
        );
    }

    #[test]
    fn test_parse_japanese_labels() {
        let md = "検索: 生成AIの市場規模\n理由: 投資判断の前提になるため\n";
        let batch = try_parse_idea_list(md).unwrap();
        assert_eq!(batch.ideas, vec![Idea::new("生成AIの市場規模", "投資判断の前提になるため")]);
    }

    #[test]
    fn test_query_without_reason_is_ignored() {
        assert!(try_parse_idea_list("Query: lonely query\n\nSomething else").is_none());
    }
}
