//! Watch command handler
//!
//! Runs the sync client in the foreground and reports what it does until
//! Ctrl-C, a forced logout, or the client giving up.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{info, warn};

use devsync_core::sync::DisconnectReason;
use devsync_core::{
    AppStore, Config, ConnectionState, CredentialStore, SessionApi, SessionStore, StoreEvent,
    SyncSlot,
};

use super::open_credentials;
use crate::output::Output;

/// Why the watch loop ended
#[derive(Debug, PartialEq)]
enum WatchEnd {
    Interrupted,
    LoggedOut,
    Disconnected(DisconnectReason),
}

/// Follow real-time session updates
pub async fn run(config: Config, output: &Output) -> Result<()> {
    let credentials: Arc<dyn CredentialStore> = open_credentials(&config);
    let (store, mut events) = AppStore::new(credentials.clone(), &config);

    if !store.is_logged_in() {
        bail!("Not logged in. Run `devsync login --token <token>` first.");
    }

    let api_url = config.api_url.clone();
    let server_url = config.server_url.clone();
    let slot = SyncSlot::new(config, credentials, store.clone());
    let client = slot.get_instance();
    let mut status = client.subscribe();

    output.message("Watching for session updates (Ctrl-C to stop)...");
    output.print_state(&client.status());
    refresh_sessions(&store, &api_url).await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let end = loop {
        tokio::select! {
            _ = &mut ctrl_c => break WatchEnd::Interrupted,
            changed = status.changed() => {
                if changed.is_err() {
                    break WatchEnd::Disconnected(DisconnectReason::Shutdown);
                }
                let snapshot = *status.borrow_and_update();
                output.print_state(&snapshot);
                if let ConnectionState::Disconnected(reason) = snapshot.state {
                    break WatchEnd::Disconnected(reason);
                }
            }
            event = events.recv() => match event {
                Some(StoreEvent::SessionsStale) => refresh_sessions(&store, &api_url).await,
                Some(StoreEvent::SessionsReplaced { .. }) => {
                    let sessions = store.snapshot().sessions;
                    output.print_sessions(&sessions, store.current_device_id().as_deref());
                }
                Some(StoreEvent::UserUpdated(fields)) => output.print_user_update(&fields),
                Some(StoreEvent::LoggedOut) => break WatchEnd::LoggedOut,
                None => break WatchEnd::Disconnected(DisconnectReason::Shutdown),
            }
        }
    };

    slot.destroy_instance().await;
    info!("Watch ended: {:?}", end);

    match end {
        WatchEnd::Interrupted | WatchEnd::Disconnected(DisconnectReason::Shutdown) => {
            output.message("Stopped.");
            Ok(())
        }
        WatchEnd::LoggedOut => {
            output.message("Signed out by the server. Log in again to resume.");
            Ok(())
        }
        WatchEnd::Disconnected(DisconnectReason::NoCredentials) => {
            output.message("Stored token is gone. Log in again to resume.");
            Ok(())
        }
        WatchEnd::Disconnected(DisconnectReason::RetriesExhausted) => {
            bail!("Gave up reconnecting to {}", server_url)
        }
    }
}

/// Re-fetch the session list into the store
///
/// Failures are logged; the next `SESSION_UPDATE` retries.
async fn refresh_sessions(store: &AppStore, api_url: &str) {
    let Some(token) = store.token() else {
        return;
    };

    match SessionApi::new(api_url, &token).list_sessions().await {
        Ok(sessions) => store.replace_sessions(sessions),
        Err(e) => warn!("Failed to refresh sessions: {}", e),
    }
}
