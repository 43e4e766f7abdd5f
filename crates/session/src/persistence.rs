use color_eyre::Result;
use color_eyre::eyre::eyre;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// Key holding the boolean-as-string lock flag.
pub const LOCK_FLAG_KEY: &str = "isLocked";
/// Key holding the name of the user the screen was locked for.
pub const LOCKED_USERNAME_KEY: &str = "lockedUsername";

/// Persisted screen lock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub locked: bool,
    pub locked_username: Option<String>,
}

impl LockState {
    #[must_use]
    pub fn locked_as(username: impl Into<String>) -> Self {
        Self {
            locked: true,
            locked_username: Some(username.into()),
        }
    }
}

/// String key/value storage that survives restarts.
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read or parsed.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<()>;

    /// Applies several writes together: `Some` sets the key, `None` removes it.
    ///
    /// Stores that can do so apply the batch atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn apply(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
        for (key, value) in changes {
            match value {
                Some(value) => self.set(key, value)?,
                None => self.remove(key)?,
            }
        }
        Ok(())
    }
}


impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn apply(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
        (**self).apply(changes)
    }
}

/// In-memory store. Clones share the same map, which is how tests simulate a reload.
#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }

    fn apply(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in changes {
            match value {
                Some(value) => entries.insert((*key).to_string(), (*value).to_string()),
                None => entries.remove(*key),
            };
        }
        Ok(())
    }
}

/// A JSON object on disk. Every read goes to the file, so a fresh store on the same
/// path sees exactly what was written before.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileKeyValueStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Opens the store at the default location under the user's data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no data directory can be determined for the current user.
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(default_store_path()?))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| eyre!("Corrupt session store {}: {e}", self.path.display()))
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load()?;
        apply(&mut entries);
        self.save(&entries)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    /// One rewrite of the file for the whole batch.
    fn apply(&self, changes: &[(&str, Option<&str>)]) -> Result<()> {
        self.update(|entries| {
            for (key, value) in changes {
                match value {
                    Some(value) => entries.insert((*key).to_string(), (*value).to_string()),
                    None => entries.remove(*key),
                };
            }
        })
    }
}

/// # Errors
///
/// Returns an error if no data directory can be determined for the current user.
pub fn default_store_path() -> Result<PathBuf> {
    let base = dirs::data_dir().ok_or_else(|| eyre!("Could not determine data directory"))?;
    Ok(base.join("reqdesk").join("session.json"))
}

/// Reads and writes the [`LockState`] flags on a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct LockPersistence<S> {
    store: S,
}

impl<S: KeyValueStore> LockPersistence<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Reads the persisted lock. Storage failures are logged and read as "not locked".
    pub fn read_lock_state(&self) -> LockState {
        match self.try_read() {
            Ok(state) => state,
            Err(e) => {
                warn!("Failed to read persisted lock state, treating session as unlocked: {e}");
                LockState::default()
            }
        }
    }

    fn try_read(&self) -> Result<LockState> {
        let locked = self
            .store
            .get(LOCK_FLAG_KEY)?
            .is_some_and(|flag| flag.trim().eq_ignore_ascii_case("true"));
        let locked_username = self
            .store
            .get(LOCKED_USERNAME_KEY)?
            .filter(|username| !username.is_empty());

        Ok(LockState {
            locked,
            locked_username,
        })
    }

    /// # Errors
    ///
    /// Returns an error if the flags cannot be written.
    pub fn write_lock_state(&self, state: &LockState) -> Result<()> {
        self.store.apply(&[
            (LOCK_FLAG_KEY, Some(if state.locked { "true" } else { "false" })),
            (LOCKED_USERNAME_KEY, state.locked_username.as_deref()),
        ])?;
        debug!(locked = state.locked, "Lock state persisted");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the flags cannot be removed.
    pub fn clear_lock_state(&self) -> Result<()> {
        self.store.apply(&[(LOCK_FLAG_KEY, None), (LOCKED_USERNAME_KEY, None)])?;
        debug!("Lock state cleared");
        Ok(())
    }
}
