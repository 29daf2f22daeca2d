use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use clearance_api::server;
use clearance_config::{AppConfig, ConfigManager};

#[derive(Parser)]
#[command(name = "clearance", version)]
#[command(about = "License clearance server for open-source packages")]
struct Cli {
    /// Configuration file (default: ./clearance.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve,
    /// Run a standalone scanner agent
    Agent,
    /// Write a configuration file with the default settings
    InitConfig {
        /// Where to write it
        #[arg(default_value = "clearance.toml")]
        path: PathBuf,
    },
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path } = &cli.command {
        ConfigManager::with_path(path).save(&AppConfig::default())?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let manager = ConfigManager::from_arg(cli.config.as_deref());
    let config = manager
        .load()
        .with_context(|| format!("cannot load {}", manager.config_path().display()))?;
    init_tracing(&config);
    if config.uses_dev_secrets() {
        warn!("Using development signing secret or scanner agent token; set them before deploying");
    }
    info!(version = env!("CARGO_PKG_VERSION"), "Starting clearance");

    match cli.command {
        Commands::Serve => server::serve(config).await,
        Commands::Agent => server::run_agent(config).await,
        Commands::InitConfig { .. } => Ok(()),
    }
}
