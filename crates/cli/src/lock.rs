use color_eyre::Result;
use reqdesk_api::AppConfig;
use reqdesk_session::{FileKeyValueStore, LockPersistence, LockState};

fn persistence(config: &AppConfig) -> Result<LockPersistence<FileKeyValueStore>> {
    Ok(LockPersistence::new(config.lock_store()?))
}

pub(crate) fn read_lock_state(config: &AppConfig) -> Result<LockState> {
    Ok(persistence(config)?.read_lock_state())
}

pub(crate) fn clear_lock_state(config: &AppConfig) -> Result<()> {
    persistence(config)?.clear_lock_state()
}

pub(crate) fn describe(state: &LockState) -> String {
    match (state.locked, state.locked_username.as_deref()) {
        (true, Some(username)) => format!("🔒 Screen is locked for '{username}'"),
        (true, None) => "🔒 Screen is locked".to_string(),
        (false, _) => "🔓 Screen is not locked".to_string(),
    }
}
