//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use devsync_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "server_url, api_url, data_dir, token_key, device_id_key, \
                          reconnect_base_delay_ms, reconnect_max_attempts, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "server_url": config.server_url,
                    "api_url": config.api_url,
                    "data_dir": config.data_dir,
                    "token_key": config.token_key,
                    "device_id_key": config.device_id_key,
                    "reconnect_base_delay_ms": config.reconnect_base_delay_ms,
                    "reconnect_max_attempts": config.reconnect_max_attempts,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.server_url);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  server_url:              {}", config.server_url);
            println!("  api_url:                 {}", config.api_url);
            println!("  data_dir:                {}", config.data_dir.display());
            println!("  token_key:               {}", config.token_key);
            println!("  device_id_key:           {}", config.device_id_key);
            println!(
                "  reconnect_base_delay_ms: {}",
                config.reconnect_base_delay_ms
            );
            println!("  reconnect_max_attempts:  {}", config.reconnect_max_attempts);
            println!(
                "  log_file:                {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply_setting(&mut config, &key, &value)?;
    config
        .validate()
        .with_context(|| format!("Invalid value for {}", key))?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

/// Update one key of `config` from its string form
fn apply_setting(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "server_url" => config.server_url = value.to_string(),
        "api_url" => config.api_url = value.to_string(),
        "data_dir" => config.data_dir = value.into(),
        "token_key" => config.token_key = value.to_string(),
        "device_id_key" => config.device_id_key = value.to_string(),
        "reconnect_base_delay_ms" => {
            config.reconnect_base_delay_ms = value
                .parse()
                .context("Invalid value for reconnect_base_delay_ms. Use milliseconds.")?;
        }
        "reconnect_max_attempts" => {
            config.reconnect_max_attempts = value
                .parse()
                .context("Invalid value for reconnect_max_attempts. Use a whole number.")?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }

    Ok(())
}
