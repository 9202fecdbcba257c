use crate::error::PipelineError;
use crate::provider::{ProgressSender, Report, SynthesisRequest, Synthesizer};
use crate::session::{SessionState, TranscriptItem};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::events::{EventSink, RunEvent};
use super::relay::{bounded, relay};

/// Synthesize the final report from the session transcript.
///
/// Progress is streamed as it arrives and cannot be retracted, but the
/// session only records a report that completed.
pub(super) async fn synthesize_report(
    synthesizer: &Arc<dyn Synthesizer>,
    limit: Duration,
    session: &mut SessionState,
    sink: &EventSink,
    cancel: &CancellationToken,
) -> Result<Report, PipelineError> {
    let request = SynthesisRequest {
        context: session.context()?.clone(),
        transcript: session.transcript().to_vec(),
        insights: session.insights().to_vec(),
        evidence_count: session.results().len(),
        revision: None,
    };
    debug!(
        "Synthesizing report with {} from {} transcript items",
        synthesizer.name(),
        request.transcript.len()
    );

    let (progress, rx) = ProgressSender::channel();
    let call = relay(synthesizer.synthesize(&request, progress), rx, |message| {
        sink.emit(RunEvent::progress(message));
    });

    let report = bounded(limit, cancel, call)
        .await
        .ok_or(PipelineError::Cancelled)?
        .map_err(|e| PipelineError::ReportGenerationFailed(e.to_string()))?;

    if report.text.trim().is_empty() {
        return Err(PipelineError::ReportGenerationFailed(
            "synthesizer returned an empty report".to_string(),
        ));
    }

    info!("Report ready ({} chars)", report.text.len());
    session.set_report(report.text.clone());
    session.append_transcript(TranscriptItem::assistant(report.text.clone()));

    Ok(report)
}
