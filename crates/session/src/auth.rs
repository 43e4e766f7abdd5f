use crate::persistence::LockState;
use async_trait::async_trait;

/// The authentication store as seen by the lock screen.
///
/// The timeout core never stores tokens itself; it only asks the collaborator to log out,
/// lock or unlock.
#[async_trait]
pub trait AuthCollaborator: Send + Sync {
    fn is_authenticated(&self) -> bool;

    fn is_locked(&self) -> bool;

    fn locked_username(&self) -> Option<String>;

    fn failed_password_attempts(&self) -> u32;

    /// Ends the session and forgets any lock.
    fn logout(&self);

    /// Locks the screen for the current user and persists the lock.
    fn lock_screen(&self);

    /// Validates `password` for the locked user. Returns `true` once the screen is unlocked.
    ///
    /// A rejected password increments the failed-attempt counter and leaves the lock in place.
    async fn unlock_screen(&self, password: &str) -> bool;

    /// Restores the persisted lock into the store and returns it.
    fn load_lock_state(&self) -> LockState;
}
