//! Persisted credential store
//!
//! Credentials are string values looked up by key (bearer token, device id).
//! The file-backed store keeps them in `credentials.json` inside the data
//! directory and rewrites it atomically on every change.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{CredentialError, CredentialResult};

/// Key/value credential lookup
///
/// An absent key means "not logged in" for the token key; callers must not
/// treat it as an error.
pub trait CredentialStore: Send + Sync {
    /// Read a credential
    fn get(&self, key: &str) -> CredentialResult<Option<String>>;

    /// Store a credential, replacing any previous value
    fn set(&self, key: &str, value: &str) -> CredentialResult<()>;

    /// Remove a credential (no-op when absent)
    fn remove(&self, key: &str) -> CredentialResult<()>;

    /// Remove every credential
    fn clear(&self) -> CredentialResult<()>;
}

/// In-memory credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with the given entries
    pub fn with_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: Mutex::new(values),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CredentialResult<()> {
        self.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> CredentialResult<()> {
        self.lock().clear();
        Ok(())
    }
}

/// Credential store backed by a JSON file
///
/// Every read goes to disk so that a login or logout performed by another
/// process is picked up on the next lookup.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Open a store at the given path (the file is created on first write)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> CredentialResult<BTreeMap<String, String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(CredentialError::from_io(e, self.path.clone(), false)),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|source| CredentialError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> CredentialResult<()> {
        let json = serde_json::to_vec_pretty(values).map_err(|source| CredentialError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        atomic_write(&self.path, &json)
    }

    fn update<F>(&self, f: F) -> CredentialResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut values = self.read_all()?;
        f(&mut values);
        self.write_all(&values)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> CredentialResult<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> CredentialResult<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> CredentialResult<()> {
        self.update(|values| {
            values.remove(key);
        })
    }

    fn clear(&self) -> CredentialResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CredentialError::from_io(e, self.path.clone(), true)),
        }
    }
}

/// Write data to a file atomically
///
/// Writes to a temp file in the same directory, syncs it, then renames it
/// over the target, so the credential file is never half-written. On unix
/// the file is readable by its owner only.
fn atomic_write(path: &Path, data: &[u8]) -> CredentialResult<()> {
    let to_err = |e| CredentialError::from_io(e, path.to_path_buf(), true);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(to_err)?;
    }

    let temp_path = path.with_extension("tmp");
    // A leftover temp file would keep its old mode
    match fs::remove_file(&temp_path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(to_err(e)),
        _ => {}
    }
    let mut file = create_private(&temp_path).map_err(to_err)?;
    file.write_all(data).map_err(to_err)?;
    file.sync_all().map_err(to_err)?;
    fs::rename(&temp_path, path).map_err(to_err)?;

    Ok(())
}

fn create_private(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
