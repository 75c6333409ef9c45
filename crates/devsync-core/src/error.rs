//! Error types
//!
//! Typed errors for the library boundaries: inbound frame decoding, the
//! credential file, and the session REST API.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while decoding an inbound frame
///
/// A decode error never closes the connection; the frame is dropped.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Frame is not JSON or lacks a `type` field
    #[error("Invalid frame: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Message kind requires a payload but none was sent
    #[error("{kind} frame is missing its payload")]
    MissingPayload { kind: &'static str },

    /// Payload is present but has the wrong shape
    #[error("{kind} frame has an invalid payload: {source}")]
    InvalidPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// USER_UPDATE data must be a JSON object
    #[error("USER_UPDATE data must be an object, got {found}")]
    InvalidUserData { found: &'static str },
}

/// Errors that can occur while reading or writing stored credentials
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Permission denied accessing the credential file
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read the credential file
    #[error("Failed to read credentials from '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write the credential file
    #[error("Failed to write credentials to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Credential file exists but cannot be parsed
    #[error("Credential file '{path}' is corrupted: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl CredentialError {
    /// Create an error from an I/O error with path context
    ///
    /// `writing` selects between the read and write variants when the
    /// error kind carries no more specific meaning.
    pub fn from_io(error: io::Error, path: PathBuf, writing: bool) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => CredentialError::PermissionDenied {
                path,
                source: error,
            },
            _ if writing => CredentialError::Write {
                path,
                source: error,
            },
            _ => CredentialError::Read {
                path,
                source: error,
            },
        }
    }

    /// Check if the user can fix this error without losing data
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CredentialError::PermissionDenied { .. } | CredentialError::Corrupt { .. }
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            CredentialError::PermissionDenied { .. } => {
                Some("Check file and directory permissions on the data directory.")
            }
            CredentialError::Corrupt { .. } => {
                Some("Run `devsync logout` to discard the stored credentials, then log in again.")
            }
            _ => None,
        }
    }
}

/// Errors returned by the session REST API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Request could not be sent or the response body could not be read
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("Server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Check if the server rejected our credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }
}

/// Result type for credential operations
pub type CredentialResult<T> = Result<T, CredentialError>;
