pub mod chat;
pub mod context;
pub mod reset;
pub mod run;
pub mod schema;
pub mod show;
pub mod upload;

use crate::config::Config;
use crate::runner::RunEvent;
use crate::session::{SessionState, SessionStore};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "shinan")]
#[command(
    author,
    version,
    about = "Business research assistant: search ideas, parallel lookups, one report"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Research a question
    Run(RunArgs),

    /// Research an uploaded text document
    Upload(UploadArgs),

    /// Ask a follow-up question without running new research
    Chat(ChatArgs),

    /// Set who the research is for
    Context(ContextArgs),

    /// Print the stored conversation as JSON
    Show(SessionArgs),

    /// Forget the conversation
    Reset(ResetArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Args, Clone)]
pub struct SessionArgs {
    /// Path to config file
    #[arg(short, long, default_value = "shinan.yaml")]
    pub config: PathBuf,

    /// Conversation to read and update
    #[arg(long, env = "SHINAN_CONVERSATION", default_value = "default")]
    pub conversation: String,
}

#[derive(Args, Clone)]
pub struct ResearchArgs {
    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Override the maximum number of search ideas
    #[arg(long)]
    pub max_ideas: Option<usize>,

    /// Override max parallel lookups
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override output directory
    #[arg(long)]
    pub report_dir: Option<PathBuf>,
}

#[derive(Parser, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(flatten)]
    pub research: ResearchArgs,

    /// What to research
    #[arg(short, long)]
    pub query: String,
}

#[derive(Parser, Clone)]
pub struct UploadArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(flatten)]
    pub research: ResearchArgs,

    /// UTF-8 text document to analyze
    #[arg(short, long)]
    pub file: PathBuf,
}

#[derive(Parser, Clone)]
pub struct ChatArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[arg(short, long)]
    pub message: String,
}

#[derive(Parser, Clone)]
pub struct ContextArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[arg(long)]
    pub company: String,

    #[arg(long)]
    pub role: String,

    /// Areas of interest (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub interests: Vec<String>,
}

#[derive(Parser, Clone)]
pub struct ResetArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Clear history and results but keep the context
    #[arg(long)]
    pub keep_context: bool,
}

/// Load the config file. Commands that never call a collaborator fall back
/// to defaults when the file does not exist.
pub(crate) fn load_config(path: &Path, required: bool) -> anyhow::Result<Config> {
    let config = if !required && !path.exists() {
        info!("No config at {:?}, using defaults", path);
        Config::default()
    } else {
        info!("Loading config from {:?}", path);
        Config::load(path)?
    };
    config.validate()?;
    Ok(config)
}

pub(crate) fn open_session(
    config: &Config,
    conversation: &str,
) -> anyhow::Result<(SessionStore, SessionState)> {
    let store = SessionStore::new(&config.session_dir);
    let state = store.open(conversation, config.context.as_ref())?;
    debug!(
        "Conversation '{}' in {} last updated {}",
        conversation,
        store.dir().display(),
        state.updated_at()
    );
    Ok((store, state))
}

pub(crate) fn print_event(event: &RunEvent, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else {
        println!("{}", event);
    }
    Ok(())
}
