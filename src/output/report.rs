use crate::error::OutputError;
use crate::runner::RunSummary;
use crate::session::{Context, SessionState};
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Machine-readable companion to the markdown report
#[derive(Serialize)]
struct RunRecord<'a> {
    conversation_id: &'a str,
    context: Option<&'a Context>,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

/// Write `<report_dir>/<YYYY-MM-DD>/<run_id>.md` and `.json` for a completed run.
/// Returns the markdown path.
pub fn write_run_report(
    report_dir: &Path,
    session: &SessionState,
    summary: &RunSummary,
) -> Result<PathBuf, OutputError> {
    let date_str = summary
        .started_at
        .with_timezone(&Local)
        .format("%Y-%m-%d")
        .to_string();
    let dir = report_dir.join(date_str);
    fs::create_dir_all(&dir).map_err(OutputError::CreateDir)?;

    let context = session.context().ok();
    let content = render_markdown(context, summary);
    let report_path = dir.join(format!("{}.md", summary.run_id));
    fs::write(&report_path, content).map_err(OutputError::WriteReport)?;

    let record = RunRecord {
        conversation_id: session.conversation_id(),
        context,
        summary,
    };
    let json = serde_json::to_string_pretty(&record)?;
    fs::write(dir.join(format!("{}.json", summary.run_id)), json)
        .map_err(OutputError::WriteReport)?;

    Ok(report_path)
}

fn render_markdown(context: Option<&Context>, summary: &RunSummary) -> String {
    let mut content = String::new();

    content.push_str("# Research Report\n\n");

    // Metadata table
    content.push_str("| Field | Value |\n");
    content.push_str("|-------|-------|\n");
    content.push_str(&format!("| Run | `{}` |\n", summary.run_id));
    content.push_str(&format!("| Flow | {} |\n", summary.flow));
    if let Some(context) = context {
        content.push_str(&format!("| Company | {} |\n", context.company));
        content.push_str(&format!("| Role | {} |\n", context.role));
        content.push_str(&format!("| Interests | {} |\n", context.interests_phrase()));
    }
    let duration = summary.finished_at - summary.started_at;
    content.push_str(&format!(
        "| Duration | {:.1}s |\n",
        duration.num_milliseconds() as f64 / 1000.0
    ));
    content.push_str(&format!(
        "| Lookups | {} succeeded, {} failed |\n",
        summary.evidence.len(),
        summary.failed_lookups
    ));
    content.push_str("\n---\n\n");

    content.push_str("## Report\n\n");
    content.push_str(summary.report.text.trim());
    content.push_str("\n\n");

    if !summary.report.sources.is_empty() {
        content.push_str("**Sources:**\n");
        for source in &summary.report.sources {
            content.push_str(&format!("- {}\n", source));
        }
        content.push('\n');
    }

    if !summary.insights.is_empty() {
        content.push_str("## Document Insights\n\n");
        for insight in &summary.insights {
            content.push_str(&format!("- **{}**", insight.analysis));
            if !insight.point_of_interest.is_empty() {
                content.push_str(&format!(": {}", insight.point_of_interest));
            }
            content.push('\n');
        }
        content.push('\n');
    }

    content.push_str("## Search Ideas\n\n");
    if summary.ideas.is_empty() {
        content.push_str("*No search ideas*\n\n");
    }
    for idea in &summary.ideas {
        content.push_str(&format!("- **{}**: {}\n", idea.query, idea.reasoning));
    }
    if !summary.ideas.is_empty() {
        content.push('\n');
    }

    content.push_str("## Evidence\n\n");
    if summary.evidence.is_empty() {
        content.push_str("*No lookups succeeded*\n");
    }
    for evidence in &summary.evidence {
        content.push_str(&format!("### {}\n\n{}\n\n", evidence.query, evidence.text.trim()));
    }

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Idea;
    use crate::provider::Report;
    use crate::runner::{Evidence, Flow};
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn summary() -> RunSummary {
        RunSummary {
            run_id: Uuid::new_v4(),
            flow: Flow::Text,
            ideas: vec![Idea::new("AI funding 2025", "recent rounds")],
            insights: Vec::new(),
            evidence: vec![Evidence {
                index: 0,
                query: "AI funding 2025".to_string(),
                text: "Funding rose 20%".to_string(),
            }],
            failed_lookups: 1,
            report: Report {
                text: "AI funding is up.".to_string(),
                sources: vec!["https://example.com/funding".to_string()],
            },
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_writes_markdown_and_json() {
        let tmp = TempDir::new().unwrap();
        let mut session = SessionState::new("acme");
        session
            .set_context(Context::new("Acme", "Analyst", ["AI"]))
            .unwrap();
        let summary = summary();

        let path = write_run_report(tmp.path(), &session, &summary).unwrap();

        let markdown = fs::read_to_string(&path).unwrap();
        assert!(markdown.contains("| Company | Acme |"));
        assert!(markdown.contains("AI funding is up."));
        assert!(markdown.contains("### AI funding 2025"));
        assert!(markdown.contains("1 succeeded, 1 failed"));

        let json_path = path.with_extension("json");
        let record: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(record["conversation_id"], "acme");
        assert_eq!(record["context"]["company"], "Acme");
        assert_eq!(record["run_id"], summary.run_id.to_string());
        assert_eq!(record["evidence"][0]["text"], "Funding rose 20%");
        assert_eq!(record["flow"], "text");
    }

    #[test]
    fn test_report_dir_is_dated() {
        let tmp = TempDir::new().unwrap();
        let session = SessionState::new("no-context");
        let summary = summary();

        let path = write_run_report(tmp.path(), &session, &summary).unwrap();

        let date = path.parent().unwrap().file_name().unwrap().to_str().unwrap();
        assert_eq!(date.len(), "YYYY-MM-DD".len());
        assert_eq!(path.parent().unwrap().parent().unwrap(), tmp.path());
        assert!(!fs::read_to_string(&path).unwrap().contains("| Company |"));
    }
}
