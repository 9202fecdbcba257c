use crate::cli::{load_config, open_session, print_event, ResearchArgs, RunArgs, SessionArgs};
use crate::output::write_run_report;
use crate::provider::{create_collaborators, ResearchInput};
use crate::runner::{Pipeline, PipelineSettings, RunOutcome};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn execute(args: RunArgs) -> anyhow::Result<()> {
    if args.query.trim().is_empty() {
        anyhow::bail!("--query must not be empty");
    }
    research(&args.session, &args.research, ResearchInput::text(args.query)).await
}

/// Shared by `run` and `upload`: one pipeline run with events on stdout
pub(crate) async fn research(
    session_args: &SessionArgs,
    research_args: &ResearchArgs,
    input: ResearchInput,
) -> anyhow::Result<()> {
    let mut config = load_config(&session_args.config, true)?;

    // Apply CLI overrides
    if let Some(max_ideas) = research_args.max_ideas {
        config.limits.max_ideas = max_ideas;
    }
    if let Some(concurrency) = research_args.concurrency {
        config.limits.max_concurrent_lookups = concurrency;
    }
    if let Some(report_dir) = &research_args.report_dir {
        config.report_dir = report_dir.clone();
    }
    config.validate()?;

    let (store, session) = open_session(&config, &session_args.conversation)?;
    let collaborators = create_collaborators(&config)?;
    let pipeline = Arc::new(Pipeline::new(
        collaborators,
        PipelineSettings::from_config(&config),
    ));

    let mut stream = pipeline.spawn(session, input);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut finished = false;

    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(event) => {
                    finished |= event.is_terminal();
                    print_event(&event, research_args.json)?;
                }
                None => break,
            },
            _ = &mut ctrl_c, if !interrupted => {
                warn!("Interrupted, cancelling run");
                stream.cancel();
                interrupted = true;
            }
        }
    }

    if !finished {
        warn!("Run stream ended without a report or error");
    }

    let RunOutcome { session, result } = stream.finish().await?;
    store.save(&session)?;

    let summary = result?;
    if config.write_reports {
        match write_run_report(&config.report_dir, &session, &summary) {
            Ok(path) => info!("Wrote report: {}", path.display()),
            Err(e) => warn!("Failed to write report for run {}: {}", summary.run_id, e),
        }
    }

    Ok(())
}
