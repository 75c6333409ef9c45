//! Process-lifetime holder for the sync client
//!
//! At most one [`DeviceSyncClient`] lives in a slot. Whoever owns process
//! lifetime (the CLI's `main`, an app shell) creates the slot and tears it
//! down; nothing here is a global.

use std::sync::{Arc, Mutex};

use super::client::DeviceSyncClient;
use super::connection::{ConnectionState, DisconnectReason};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::store::SessionStore;

/// Holder for at most one live sync client
pub struct SyncSlot {
    config: Config,
    credentials: Arc<dyn CredentialStore>,
    store: Arc<dyn SessionStore>,
    current: Mutex<Option<Arc<DeviceSyncClient>>>,
}

impl SyncSlot {
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialStore>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            config,
            credentials,
            store,
            current: Mutex::new(None),
        }
    }

    /// Return the live client, creating one if needed
    ///
    /// A client with nothing to authenticate with is replaced: one created
    /// while no token was stored, or one that stopped because its token
    /// disappeared. Calling this after a login therefore starts connecting.
    /// A client that gave up reconnecting is returned as is until
    /// [`destroy_instance`] is called.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// [`destroy_instance`]: SyncSlot::destroy_instance
    pub fn get_instance(&self) -> Arc<DeviceSyncClient> {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(client) = current.as_ref() {
            if !needs_credentials(client) {
                return client.clone();
            }
        }

        let client = Arc::new(DeviceSyncClient::start(
            &self.config,
            self.credentials.clone(),
            self.store.clone(),
        ));
        *current = Some(client.clone());
        client
    }

    /// Shut down and discard the live client, if any
    ///
    /// When this returns the socket is closed and no reconnect timer is
    /// pending. The next [`get_instance`] builds a fresh client with its
    /// attempt counter at zero.
    ///
    /// [`get_instance`]: SyncSlot::get_instance
    pub async fn destroy_instance(&self) {
        let client = self
            .current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(client) = client {
            client.shutdown().await;
        }
    }

    /// The live client without creating one
    pub fn current(&self) -> Option<Arc<DeviceSyncClient>> {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn needs_credentials(client: &DeviceSyncClient) -> bool {
    client.is_inert()
        || client.status().state == ConnectionState::Disconnected(DisconnectReason::NoCredentials)
}
