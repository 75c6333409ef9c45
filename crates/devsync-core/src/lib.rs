//! devsync Core Library
//!
//! This crate provides the real-time device session sync client of the
//! storefront: one WebSocket to the backend's session fanout endpoint whose
//! control messages refresh the session list, force a logout or update the
//! current user.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let credentials = Arc::new(FileCredentialStore::new(config.credentials_path()));
//! let (store, events) = AppStore::new(credentials.clone(), &config);
//!
//! let slot = SyncSlot::new(config, credentials, store);
//! let client = slot.get_instance();
//! ```
//!
//! # Modules
//!
//! - `sync`: Sync client, connection state machine, frame decoding, dispatch
//! - `store`: Shared application state driven by the sync client
//! - `credentials`: Persisted credential lookup
//! - `api`: Session list REST client
//! - `config`: Application configuration

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod store;
pub mod sync;

pub use api::{DeviceSession, SessionApi};
pub use config::Config;
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ApiError, CredentialError, DecodeError};
pub use store::{AppState, AppStore, SessionStore, StoreEvent};
pub use sync::{ConnectionState, DeviceSyncClient, ReconnectPolicy, SyncSlot};
