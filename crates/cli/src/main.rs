//! larkbridge CLI — the main entry point.
//!
//! Commands:
//! - `serve`  — Start the webhook HTTP server
//! - `doctor` — Run the configuration self-check

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "larkbridge",
    about = "larkbridge — Feishu/Lark chat bot bridging to a text-completion API",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook HTTP server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the configuration self-check
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
