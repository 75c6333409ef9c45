//! devsync CLI
//!
//! Command-line interface for devsync - device session sync.

use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use devsync_core::Config;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "devsync")]
#[command(about = "devsync - Real-time device session sync")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a bearer token for this device
    Login {
        /// Bearer token issued by the backend
        #[arg(long)]
        token: String,
        /// Device id to register under (generated if omitted)
        #[arg(long)]
        device_id: Option<String>,
    },
    /// Remove stored credentials
    Logout,
    /// Show status (server, login, reconnect policy)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Manage device sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Follow real-time session updates
    Watch,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (server_url, api_url, data_dir, reconnect_base_delay_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List active sessions
    #[command(alias = "ls")]
    List,
    /// Sign a device out remotely
    #[command(alias = "rm")]
    Revoke {
        /// Device id of the session
        device_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands load (and save) the file themselves
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    match cli.command {
        Commands::Login { token, device_id } => {
            commands::auth::login(&config, token, device_id, &output)
        }
        Commands::Logout => commands::auth::logout(&config, &output),
        Commands::Status => commands::status::show(&config, &output),
        Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Sessions { command } => match command {
            SessionCommands::List => commands::sessions::list(&config, &output).await,
            SessionCommands::Revoke { device_id } => {
                commands::sessions::revoke(&config, device_id, &output).await
            }
        },
        Commands::Watch => commands::watch::run(config, &output).await,
    }
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// Only initializes if DEVSYNC_LOG environment variable is set.
/// Logs to config.log_file when set, stderr otherwise.
fn init_logging(config: &Config) {
    let Ok(log_level) = std::env::var("DEVSYNC_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!(
        "devsync_core={},devsync_cli={}",
        log_level, log_level
    ));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false);

    // Ignore error if already initialized
    match &config.log_file {
        Some(log_path) => {
            let log_file = match OpenOptions::new().create(true).append(true).open(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not open log file {:?}: {}", log_path, e);
                    return;
                }
            };
            let _ = builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(log_file))
                .try_init();
            info!("Logging to {:?}", log_path);
        }
        None => {
            let _ = builder.with_writer(std::io::stderr).try_init();
        }
    }
}
