use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod config;
mod error;
mod output;
mod parser;
mod provider;
mod runner;
mod session;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise only show debug logs with --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("shinan=debug")
        } else {
            EnvFilter::new("shinan=warn")
        }
    });

    // Logs on stderr keep stdout for run events
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cli::run::execute(args).await,
        Commands::Upload(args) => cli::upload::execute(args).await,
        Commands::Chat(args) => cli::chat::execute(args).await,
        Commands::Context(args) => cli::context::execute(args),
        Commands::Show(args) => cli::show::execute(args),
        Commands::Reset(args) => cli::reset::execute(args),
        Commands::Schema => cli::schema::execute(),
    }
}
