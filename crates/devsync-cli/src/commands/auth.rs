//! Login and logout handlers

use anyhow::{bail, Context, Result};

use devsync_core::{Config, CredentialStore};

use super::open_credentials;
use crate::output::{Output, OutputFormat};

/// Store a bearer token and this device's id
///
/// Without `--device-id` an already stored id is kept; otherwise a new one
/// is generated.
pub fn login(
    config: &Config,
    token: String,
    device_id: Option<String>,
    output: &Output,
) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("Token must not be empty");
    }

    let credentials = open_credentials(config);

    let device_id = match device_id {
        Some(id) => id,
        None => credentials
            .get(&config.device_id_key)
            .context("Failed to read stored credentials")?
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
    };

    credentials
        .set(&config.token_key, token)
        .context("Failed to store token")?;
    credentials
        .set(&config.device_id_key, &device_id)
        .context("Failed to store device id")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({"status": "success", "device_id": device_id})
            );
        }
        OutputFormat::Quiet => println!("{}", device_id),
        OutputFormat::Human => {
            output.success("Logged in");
            println!("  Device ID: {}", device_id);
            println!();
            println!("Start real-time sync with: devsync watch");
        }
    }

    Ok(())
}

/// Remove stored credentials
pub fn logout(config: &Config, output: &Output) -> Result<()> {
    let credentials = open_credentials(config);
    let was_logged_in = credentials
        .get(&config.token_key)
        .ok()
        .flatten()
        .is_some();

    credentials
        .clear()
        .context("Failed to remove stored credentials")?;

    if was_logged_in {
        output.success("Logged out");
    } else {
        output.message("Not logged in.");
    }

    Ok(())
}
