mod idea;
mod json;
mod markdown;

pub use idea::{Idea, IdeaBatch, Insight};
pub use json::extract_json;

/// Parse an idea batch from free-form generator output.
/// Tries JSON first, then falls back to a "Query:/Reason:" list.
pub fn parse_ideas(raw: &str) -> Option<IdeaBatch> {
    if let Some(batch) = json::try_parse_json(raw) {
        return Some(batch);
    }

    if let Some(batch) = markdown::try_parse_idea_list(raw) {
        return Some(batch);
    }

    tracing::warn!("Could not parse search ideas from generator output");
    None
}
