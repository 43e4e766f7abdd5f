pub mod auth;
pub mod health;
pub mod session;

pub use auth::{login, logout};
pub use health::health;
pub use session::{record_activity, session_lock, session_status, session_unlock};
