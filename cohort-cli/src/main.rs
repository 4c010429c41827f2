use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cohort_server::{CohortServer, ServerConfig};

mod config;

use config::CohortConfig;

#[derive(Parser)]
#[command(name = "cohort", about = "Learning session core for the cohort platform")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cohort server
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = CohortConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => serve(config).await,
    }
}

async fn serve(config: CohortConfig) -> Result<()> {
    let server_config = ServerConfig {
        host: config.server.host,
        port: config.server.port,
    };
    let server = CohortServer::new(server_config, config.core);
    server.run().await?;
    Ok(())
}
