//! Coursemate CLI: the main entry point.
//!
//! Commands:
//! - `init`   : Write a default config file
//! - `serve`  : Start the HTTP API server
//! - `ask`    : Ask a single question or chat interactively
//! - `search` : Raw semantic search over course content
//! - `doctor` : Diagnose configuration and connectivity

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use coursemate_core::proficiency::ProficiencyLevel;

mod commands;

#[derive(Parser)]
#[command(
    name = "coursemate",
    about = "Coursemate — course-grounded study assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// Config file to use instead of ~/.coursemate/config.toml
    #[arg(short, long, global = true, env = "COURSEMATE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask the assistant a question
    Ask {
        /// Ask a single question instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Proficiency level: beginner, intermediate, or expert
        #[arg(short, long, default_value = "intermediate")]
        level: ProficiencyLevel,
    },

    /// Search course content without generating an answer
    Search {
        query: String,

        /// Maximum number of passages
        #[arg(short = 'n', long, default_value_t = 5)]
        num_results: usize,
    },

    /// Diagnose configuration and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init { force } => commands::init::run(config_path, force)?,
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask { message, level } => commands::ask::run(config_path, message, level).await?,
        Commands::Search { query, num_results } => {
            commands::search::run(config_path, &query, num_results).await?
        }
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
