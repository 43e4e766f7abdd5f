pub mod activity;
pub mod auth;
pub mod config;
pub mod controller;
pub mod persistence;
pub mod scheduler;

// Re-export commonly used types for easier access
pub use activity::{ACTIVITY_EVENTS, ActivityMonitor, ActivitySubscription, EventTarget, InputEvent, ListenerId};
pub use auth::AuthCollaborator;
pub use config::{Callback, CountdownCallback, SessionCallbacks, SessionTimeoutConfig, TimeoutMode, TimeoutSettings};
pub use controller::{SessionState, SessionTimeoutController};
pub use persistence::{
    FileKeyValueStore, KeyValueStore, LOCK_FLAG_KEY, LOCKED_USERNAME_KEY, LockPersistence, LockState,
    MemoryKeyValueStore, default_store_path,
};
pub use scheduler::{TimeoutScheduler, TimerPhase, TimerPlan};
