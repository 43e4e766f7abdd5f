use color_eyre::Result;
use color_eyre::eyre::eyre;
use reqdesk_session::{FileKeyValueStore, TimeoutSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub username: String,

    /// Argon2 PHC string
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address the HTTP server binds to
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,

    /// Inactivity timeout and lock screen behaviour
    pub session: TimeoutSettings,

    /// Accounts allowed to sign in
    pub users: Vec<UserAccount>,

    /// Where the lock flags are persisted between restarts. Defaults to the user data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_state_path: Option<PathBuf>,
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns an error if no config directory can be determined for the current user.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| eyre!("Could not determine config directory"))?;
        Ok(base.join("reqdesk").join("config.json"))
    }

    /// Loads the config from `path`, falling back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or carries invalid
    /// session settings.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| eyre!("Invalid config file {}: {e}", path.display()))?;
        config.session.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Opens the store holding the persisted lock flags.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and no data directory can be determined.
    pub fn lock_store(&self) -> Result<FileKeyValueStore> {
        match &self.lock_state_path {
            Some(path) => Ok(FileKeyValueStore::new(path)),
            None => FileKeyValueStore::open_default(),
        }
    }

    #[must_use]
    pub fn find_user(&self, username: &str) -> Option<&UserAccount> {
        self.users.iter().find(|user| user.username == username)
    }

    /// Adds an account, replacing the hash of an existing one with the same name.
    pub fn upsert_user(&mut self, username: &str, password_hash: String) {
        match self.users.iter_mut().find(|user| user.username == username) {
            Some(user) => user.password_hash = password_hash,
            None => self.users.push(UserAccount {
                username: username.to_string(),
                password_hash,
            }),
        }
    }
}
