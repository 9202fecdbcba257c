use crate::error::PipelineError;
use crate::parser::Idea;
use crate::provider::{Collaborators, ResearchInput};
use crate::session::{SessionState, TranscriptItem};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{EventSink, RunEvent};
use super::relay::bounded;

/// Screen the input, generate ideas, and commit them to the session.
///
/// Nothing is written to the session unless the whole phase succeeds.
pub(super) async fn generate_ideas(
    collaborators: &Collaborators,
    limit: Duration,
    max_ideas: usize,
    session: &mut SessionState,
    input: &ResearchInput,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> Result<Vec<Idea>, PipelineError> {
    let context = session.context()?.clone();

    sink.emit(RunEvent::progress(format!(
        "Researching for {} at {}, focusing on {}",
        context.role,
        context.company,
        context.interests_phrase()
    )));

    if let Some(guardrail) = &collaborators.guardrail {
        debug!("Screening input with {}", guardrail.name());
        let verdict = bounded(limit, cancel, guardrail.check(input.screening_text(), &context))
            .await
            .ok_or(PipelineError::Cancelled)?
            .map_err(|e| PipelineError::IdeaGenerationFailed(format!("guardrail check failed: {}", e)))?;

        if verdict.flagged {
            let reason = if verdict.reason.trim().is_empty() {
                "input appears to contain confidential information".to_string()
            } else {
                verdict.reason
            };
            return Err(PipelineError::GuardrailTripped { reason });
        }
    }

    let generator = collaborators.idea_generator_for(input);
    debug!("Generating ideas with {}", generator.name());
    let batch = bounded(limit, cancel, generator.generate(input, &context))
        .await
        .ok_or(PipelineError::Cancelled)?
        .map_err(|e| PipelineError::IdeaGenerationFailed(e.to_string()))?;

    let ideas = curate(batch.ideas, max_ideas);
    info!(
        "Generated {} ideas and {} insights",
        ideas.len(),
        batch.insights.len()
    );

    sink.emit(RunEvent::Ideas {
        ideas: ideas.clone(),
    });

    session.set_ideas(ideas.clone());
    session.set_insights(batch.insights);
    session.append_transcript(TranscriptItem::user(input.transcript_text()));

    Ok(ideas)
}

/// Drop blank and duplicate queries, then cap the list
fn curate(ideas: Vec<Idea>, max_ideas: usize) -> Vec<Idea> {
    let mut seen = HashSet::new();
    let mut kept: Vec<Idea> = ideas
        .into_iter()
        .filter(|idea| !idea.query.trim().is_empty())
        .filter(|idea| seen.insert(idea.fingerprint()))
        .collect();

    if kept.len() > max_ideas {
        warn!(
            "Generator proposed {} ideas, keeping the first {}",
            kept.len(),
            max_ideas
        );
        kept.truncate(max_ideas);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curate_drops_blank_and_duplicate_queries() {
        let ideas = vec![
            Idea::new("AI funding", "a"),
            Idea::new("  ", "blank"),
            Idea::new("ai  FUNDING", "dup"),
            Idea::new("AI chips", "b"),
        ];

        let kept = curate(ideas, 5);
        let queries: Vec<&str> = kept.iter().map(|i| i.query.as_str()).collect();
        assert_eq!(queries, vec!["AI funding", "AI chips"]);
        assert_eq!(kept[0].reasoning, "a");
    }

    #[test]
    fn test_curate_caps_list() {
        let ideas = (0..8).map(|i| Idea::new(format!("q{}", i), "")).collect();
        let kept = curate(ideas, 3);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[2].query, "q2");
    }
}
