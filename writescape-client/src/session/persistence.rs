//! Durable key-value storage for the logged-in user.

use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Key under which the logged-in user is persisted.
pub const SESSION_KEY: &str = "writescapeLoggedInUser";

/// Durable string key/value storage for the session.
pub trait SessionStorage: Send + Sync + Debug {
    /// Value stored under `key`, if any.
    ///
    /// # Errors
    /// Returns an error when the backing store exists but cannot be read or parsed.
    fn get(&self, key: &str) -> ClientResult<Option<String>>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    /// Returns an error when the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> ClientResult<()>;

    /// Deletes `key`; deleting a missing key is not an error.
    ///
    /// # Errors
    /// Returns an error when the backing store cannot be written.
    fn remove(&self, key: &str) -> ClientResult<()>;
}

/// JSON file holding a flat string map, readable only by the owner on unix.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    /// Storage backed by `path`; the file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn storage_error(&self, source: io::Error) -> ClientError {
        ClientError::Storage {
            path: self.path.clone(),
            source,
        }
    }

    fn load(&self) -> ClientResult<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(self.storage_error(err)),
        }
    }

    fn store(&self, entries: &BTreeMap<String, String>) -> ClientResult<()> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(self.storage_error(err)),
            };
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| self.storage_error(err))?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, contents).map_err(|err| self.storage_error(err))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))
                .map_err(|err| self.storage_error(err))?;
        }
        debug!(path = %self.path.display(), "session storage written");
        Ok(())
    }
}

impl SessionStorage for FileSessionStorage {
    fn get(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        // A corrupt file is replaced rather than blocking the login.
        let mut entries = self.load().unwrap_or_default();
        entries.insert(key.to_owned(), value.to_owned());
        self.store(&entries)
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        let mut entries = self.load().unwrap_or_default();
        entries.remove(key);
        self.store(&entries)
    }
}

/// Process-local storage, used by tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionStorage {
    /// Storage pre-populated with `key = value`.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::default();
        storage
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        storage
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get(&self, key: &str) -> ClientResult<Option<String>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
