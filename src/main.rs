//! GHBot entry point: CLI parsing, configuration loading and handoff to
//! the session supervisor.

use clap::{Parser, Subcommand};
use ghbot::config::BotConfig;
use ghbot::error::{BotError, BotResult};
use ghbot::observability::init_default_logging;
use ghbot::session::Supervisor;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

/// IRC to MQTT bridge bot
#[derive(Parser)]
#[command(name = "ghbot")]
#[command(about = "Relays links posted in an IRC channel to an MQTT broker")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bridge
    Run,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("starting ghbot v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            process::exit(e.exit_code());
        }
    };

    let result = match cli.command {
        Commands::Run => Supervisor::new(config).run().await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    if let Err(e) = result {
        error!("fatal: {e}");
        process::exit(e.exit_code());
    }

    info!("shutdown complete");
}

fn load_configuration(path: &Option<PathBuf>) -> BotResult<BotConfig> {
    if let Some(path) = path {
        info!("loading configuration from {}", path.display());
        return Ok(BotConfig::load_from_file(path)?);
    }

    // Try default locations before falling back to compiled-in defaults.
    for candidate in ["ghbot.toml", "config/ghbot.toml"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            info!("loading configuration from {}", path.display());
            return Ok(BotConfig::load_from_file(&path)?);
        }
    }

    info!("no configuration file found, using built-in defaults");
    let config = BotConfig::default();
    config.validate()?;
    Ok(config)
}

fn handle_config_command(config: &BotConfig, show: bool) -> BotResult<()> {
    if show {
        let rendered = toml::to_string_pretty(config)
            .map_err(|e| BotError::Config(ghbot::config::ConfigError::TomlFormat(e)))?;
        println!("{rendered}");
    }

    info!("configuration is valid");
    Ok(())
}
