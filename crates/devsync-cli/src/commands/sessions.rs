//! Session list command handlers

use anyhow::{bail, Context, Result};

use devsync_core::{ApiError, Config, CredentialStore, SessionApi};

use super::open_credentials;
use crate::output::Output;

/// List every active session of the logged-in user
pub async fn list(config: &Config, output: &Output) -> Result<()> {
    let api = session_api(config)?;
    let current = open_credentials(config)
        .get(&config.device_id_key)
        .ok()
        .flatten();

    let sessions = api.list_sessions().await.map_err(explain)?;
    output.print_sessions(&sessions, current.as_deref());

    Ok(())
}

/// Sign another device out
pub async fn revoke(config: &Config, device_id: String, output: &Output) -> Result<()> {
    let api = session_api(config)?;
    api.revoke_session(&device_id).await.map_err(explain)?;
    output.success(&format!("Revoked session {}", device_id));
    Ok(())
}

fn session_api(config: &Config) -> Result<SessionApi> {
    let token = open_credentials(config)
        .get(&config.token_key)
        .context("Failed to read stored credentials")?
        .filter(|t| !t.is_empty());

    let Some(token) = token else {
        bail!("Not logged in. Run `devsync login --token <token>` first.");
    };

    Ok(SessionApi::new(&config.api_url, &token))
}

fn explain(err: ApiError) -> anyhow::Error {
    if err.is_unauthorized() {
        anyhow::Error::new(err).context("Token rejected by server. Log in again.")
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_api_requires_login() {
        let temp = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp.path().to_path_buf(),
            ..Config::default()
        };

        let err = session_api(&config).err().unwrap();
        assert!(err.to_string().contains("Not logged in"));

        open_credentials(&config)
            .set("access_token", "tok")
            .unwrap();
        assert!(session_api(&config).is_ok());
    }

    #[test]
    fn test_explain_unauthorized() {
        let err = explain(ApiError::Status {
            status: 401,
            body: String::new(),
        });
        assert!(err.to_string().contains("Log in again"));

        let err = explain(ApiError::Status {
            status: 500,
            body: "boom".to_string(),
        });
        assert!(!err.to_string().contains("Log in again"));
    }
}
