//! WebPilot - an autonomous browser agent

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod confirm;
mod input;

use commands::{init_command, run_command, status_command, task_command};

/// WebPilot - give the browser a task, watch it work
#[derive(Parser)]
#[command(name = "webpilot")]
#[command(about = "◆ An autonomous browser agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (default)
    Run,
    /// Run a single task and exit
    Task {
        /// Task description
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Initialize config and browser profile
    Init,
    /// Show configuration status
    Status,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = if verbose {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // a missing .env is fine
    let _ = dotenvy::dotenv();
    init_tracing(cli.verbose);

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_command().await,
        Commands::Task { text } => task_command(text.join(" ")).await,
        Commands::Init => init_command().await,
        Commands::Status => status_command().await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
