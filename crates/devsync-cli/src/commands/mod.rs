//! Command handlers

pub mod auth;
pub mod config;
pub mod sessions;
pub mod status;
pub mod watch;

use std::sync::Arc;

use devsync_core::{Config, FileCredentialStore};

/// Credential store for the configured data directory
pub fn open_credentials(config: &Config) -> Arc<FileCredentialStore> {
    Arc::new(FileCredentialStore::new(config.credentials_path()))
}
