//! Shared application state
//!
//! The sync client never touches UI or local component state. It mutates
//! this store through the [`SessionStore`] operations, and anything that
//! observes the store (the CLI, a UI layer) reacts to the [`StoreEvent`]s
//! it publishes.
//!
//! ## Usage
//!
//! ```ignore
//! let credentials = Arc::new(FileCredentialStore::new(config.credentials_path()));
//! let (store, mut events) = AppStore::new(credentials, &config);
//!
//! while let Some(event) = events.recv().await {
//!     // re-fetch sessions, redraw, ...
//! }
//! ```

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::DeviceSession;
use crate::config::Config;
use crate::credentials::CredentialStore;

/// Shared-state operations driven by inbound sync messages
pub trait SessionStore: Send + Sync {
    /// Device id of this running client, read fresh on every call
    fn current_device_id(&self) -> Option<String>;

    /// Re-fetch the session list from the authoritative source
    fn refresh_sessions(&self);

    /// Clear credentials and shared state
    fn force_logout(&self);

    /// Merge the given fields into the current user
    fn merge_user_update(&self, fields: Map<String, Value>);
}

/// Change notifications published by [`AppStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Session list is out of date and should be re-fetched
    SessionsStale,
    /// Session list was replaced with fresh data
    SessionsReplaced { count: usize },
    /// User fields changed; carries the merged fields only
    UserUpdated(Map<String, Value>),
    /// Credentials and state were cleared
    LoggedOut,
}

/// Snapshot of the shared state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    /// Current user's fields
    pub user: Map<String, Value>,
    /// Last fetched session list
    pub sessions: Vec<DeviceSession>,
    /// Set by a refresh request, cleared when sessions are replaced
    pub sessions_stale: bool,
}

/// In-memory shared state backed by a credential store
pub struct AppStore {
    credentials: Arc<dyn CredentialStore>,
    token_key: String,
    device_id_key: String,
    state: Mutex<AppState>,
    events: mpsc::UnboundedSender<StoreEvent>,
}

impl AppStore {
    /// Create a store and the receiver for its events
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        config: &Config,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<StoreEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let store = Arc::new(Self {
            credentials,
            token_key: config.token_key.clone(),
            device_id_key: config.device_id_key.clone(),
            state: Mutex::new(AppState::default()),
            events,
        });
        (store, event_rx)
    }

    /// Current bearer token, if logged in
    pub fn token(&self) -> Option<String> {
        match self.credentials.get(&self.token_key) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("Failed to read token: {}", e);
                None
            }
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token().is_some()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> AppState {
        self.lock().clone()
    }

    /// Replace the session list with freshly fetched data
    pub fn replace_sessions(&self, sessions: Vec<DeviceSession>) {
        let count = sessions.len();
        {
            let mut state = self.lock();
            state.sessions = sessions;
            state.sessions_stale = false;
        }
        self.emit(StoreEvent::SessionsReplaced { count });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: StoreEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

impl SessionStore for AppStore {
    fn current_device_id(&self) -> Option<String> {
        match self.credentials.get(&self.device_id_key) {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to read device id: {}", e);
                None
            }
        }
    }

    fn refresh_sessions(&self) {
        self.lock().sessions_stale = true;
        debug!("Session list marked stale");
        self.emit(StoreEvent::SessionsStale);
    }

    fn force_logout(&self) {
        for key in [&self.token_key, &self.device_id_key] {
            if let Err(e) = self.credentials.remove(key) {
                warn!("Failed to clear credential '{}': {}", key, e);
            }
        }
        *self.lock() = AppState::default();
        info!("Local session cleared");
        self.emit(StoreEvent::LoggedOut);
    }

    fn merge_user_update(&self, fields: Map<String, Value>) {
        {
            let mut state = self.lock();
            for (key, value) in &fields {
                state.user.insert(key.clone(), value.clone());
            }
        }
        self.emit(StoreEvent::UserUpdated(fields));
    }
}
