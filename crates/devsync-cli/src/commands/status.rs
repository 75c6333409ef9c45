//! Status command handler

use anyhow::Result;

use devsync_core::{Config, CredentialStore};

use super::open_credentials;
use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(config: &Config, output: &Output) -> Result<()> {
    let credentials = open_credentials(config);
    // An unreadable credential file shows as logged out
    let token = credentials
        .get(&config.token_key)
        .ok()
        .flatten()
        .filter(|t| !t.is_empty());
    let device_id = credentials.get(&config.device_id_key).ok().flatten();
    let policy = config.reconnect_policy();

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "server_url": config.server_url,
                    "api_url": config.api_url,
                    "logged_in": token.is_some(),
                    "device_id": device_id,
                    "credentials": credentials.path(),
                    "reconnect": {
                        "base_delay_ms": policy.base_delay().as_millis() as u64,
                        "max_attempts": policy.max_attempts()
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", if token.is_some() { "logged-in" } else { "logged-out" });
        }
        OutputFormat::Human => {
            println!("devsync Status");
            println!("==============");
            println!();
            println!("Server:");
            println!("  WebSocket: {}", config.server_url);
            println!("  API:       {}", config.api_url);
            println!();
            println!("Account:");
            println!(
                "  Status:    {}",
                if token.is_some() {
                    "logged in"
                } else {
                    "logged out"
                }
            );
            println!(
                "  Device ID: {}",
                device_id.as_deref().unwrap_or("(not set)")
            );
            println!("  Stored in: {}", credentials.path().display());
            println!();
            println!("Reconnect:");
            println!("  Base delay:   {}ms", policy.base_delay().as_millis());
            println!("  Max attempts: {}", policy.max_attempts());
        }
    }

    Ok(())
}
