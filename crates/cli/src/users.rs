use color_eyre::Result;
use color_eyre::eyre::eyre;
use reqdesk_api::{AppConfig, hash_password};
use std::path::Path;

/// Adds or replaces an account in the config file at `config_path`.
///
/// Returns `true` when the account already existed and its password was replaced.
pub(crate) fn add_user(config_path: &Path, username: &str, password: &str) -> Result<bool> {
    let username = username.trim();
    if username.is_empty() {
        return Err(eyre!("Username cannot be empty"));
    }
    if password.is_empty() {
        return Err(eyre!("Password cannot be empty"));
    }

    let mut config = AppConfig::load(config_path)?;
    let existed = config.find_user(username).is_some();
    config.upsert_user(username, hash_password(password)?);
    config.save(config_path)?;

    Ok(existed)
}
