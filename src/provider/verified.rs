use super::{ProgressSender, Report, SynthesisRequest, Synthesizer, Verifier};
use crate::error::ProviderError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_REVISION: &str =
    "Focus the report on the user's company, role and interests, backed by the gathered evidence";

/// A synthesizer whose draft is checked for relevance and rewritten at most
/// once. To the pipeline this is still a single synthesis call.
pub struct VerifiedSynthesizer {
    inner: Arc<dyn Synthesizer>,
    verifier: Arc<dyn Verifier>,
}

impl VerifiedSynthesizer {
    pub fn new(inner: Arc<dyn Synthesizer>, verifier: Arc<dyn Verifier>) -> Self {
        Self { inner, verifier }
    }
}

#[async_trait]
impl Synthesizer for VerifiedSynthesizer {
    fn name(&self) -> &'static str {
        "verified_report"
    }

    async fn synthesize(
        &self,
        request: &SynthesisRequest,
        progress: ProgressSender,
    ) -> Result<Report, ProviderError> {
        let draft = self.inner.synthesize(request, progress.clone()).await?;

        progress.send("Checking the report against your context");
        let verdict = match self.verifier.verify(&draft, &request.context).await {
            Ok(verdict) => verdict,
            Err(e) => {
                // An unavailable verifier never costs the user a report
                warn!("Report verification via {} failed: {}", self.verifier.name(), e);
                return Ok(draft);
            }
        };

        if verdict.is_relevant {
            debug!("Report judged relevant");
            return Ok(draft);
        }

        let suggestions = match verdict.improvement_suggestions.trim() {
            "" => DEFAULT_REVISION.to_string(),
            s => s.to_string(),
        };
        info!("Report judged off-context, revising once");
        progress.send(format!("Revising the report: {}", suggestions));

        let revised = SynthesisRequest {
            revision: Some(suggestions),
            ..request.clone()
        };
        self.inner.synthesize(&revised, progress).await
    }
}
