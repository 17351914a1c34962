mod backend_executor;
mod cli;
mod config;
mod extract;
mod logging;
mod pipeline;
mod process;
mod profile;
mod store;
mod template;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "skillmine", version)]
#[command(about = "Mine git history into per-author skill profiles with an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Repository path or URL; runs the full pipeline
    source: Option<String>,

    /// Extra config file, applied after the user and project configs
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Fact store path (overrides store.path)
    #[arg(long, global = true)]
    db: Option<String>,

    /// Export path (overrides export.path)
    #[arg(long, global = true)]
    output: Option<String>,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress normal output
    #[arg(long, global = true)]
    quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest, analyze and export
    Run {
        /// Repository path or URL
        source: Option<String>,
    },

    /// Ingest commits into the fact store
    Ingest {
        /// Repository path or URL
        source: Option<String>,
    },

    /// Analyze authors already in the fact store
    Analyze,

    /// Write all stored profiles to the export file
    Export,

    /// List authors with commit counts and profile status
    Authors,

    /// Check configuration, git and backend availability
    Doctor {
        /// Send one short prompt to the model
        #[arg(long)]
        probe: bool,
    },
}

async fn run(cli: Cli) -> Result<i32> {
    let mut config = config::SkillmineConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }
    if let Some(output) = cli.output {
        config.export.path = output;
    }
    let config = Arc::new(config);

    let handler = cli::create_handler(cli::OutputMode::from_flags(cli.json, cli.quiet));
    let handler = handler.as_ref();

    match cli.command {
        None => cli::run_pipeline(config, cli.source.as_deref(), handler).await,
        Some(Commands::Run { source }) => {
            cli::run_pipeline(config, source.as_deref(), handler).await
        }
        Some(Commands::Ingest { source }) => cli::ingest(config, source.as_deref(), handler).await,
        Some(Commands::Analyze) => cli::analyze(config, handler).await,
        Some(Commands::Export) => cli::export(config, handler),
        Some(Commands::Authors) => cli::list_authors(config, handler),
        Some(Commands::Doctor { probe }) => Ok(cli::doctor(&config, probe, handler).await),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _log_guard = match logging::init_logging(cli.debug, cli.quiet, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            tracing::debug!(error = ?e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
