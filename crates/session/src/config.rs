use color_eyre::Result;
use color_eyre::eyre::eyre;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// What happens when the inactivity timeout fully elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutMode {
    /// End the authenticated session outright.
    Logout,
    /// Freeze the UI behind a password prompt.
    #[default]
    Lock,
}

impl TimeoutMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TimeoutMode::Logout => "logout",
            TimeoutMode::Lock => "lock",
        }
    }
}

impl fmt::Display for TimeoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeoutMode {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logout" | "log-out" | "signout" => Ok(TimeoutMode::Logout),
            "lock" | "lockscreen" | "lock-screen" => Ok(TimeoutMode::Lock),
            other => Err(eyre!("Unknown timeout mode '{other}', expected 'logout' or 'lock'")),
        }
    }
}

/// Serialized form of the inactivity settings, as stored in the application config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Terminal action taken on inactivity
    pub mode: TimeoutMode,

    /// Inactivity before logout, used in logout mode (milliseconds)
    pub timeout_ms: u64,

    /// Inactivity before the screen locks, used in lock mode (milliseconds)
    pub lock_timeout_ms: u64,

    /// Length of the countdown warning shown before the terminal action (seconds, 0 disables it)
    pub warning_seconds: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            mode: TimeoutMode::Lock,
            timeout_ms: 30 * 60 * 1000,      // 30 minutes
            lock_timeout_ms: 15 * 60 * 1000, // 15 minutes
            warning_seconds: 60,
        }
    }
}

impl TimeoutSettings {
    /// Checks that the timeout used by the configured mode is positive.
    ///
    /// # Errors
    ///
    /// Returns an error if the active timeout is zero.
    pub fn validate(&self) -> Result<()> {
        let (name, value) = match self.mode {
            TimeoutMode::Logout => ("timeout_ms", self.timeout_ms),
            TimeoutMode::Lock => ("lock_timeout_ms", self.lock_timeout_ms),
        };
        if value == 0 {
            return Err(eyre!("{name} must be greater than zero in {} mode", self.mode));
        }
        Ok(())
    }
}

/// Runtime configuration for one activation of the session timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimeoutConfig {
    pub mode: TimeoutMode,
    pub timeout: Duration,
    pub lock_timeout: Duration,
    pub warning_seconds: u64,
    pub is_authenticated: bool,
}

impl SessionTimeoutConfig {
    #[must_use]
    pub const fn lock(lock_timeout: Duration) -> Self {
        Self {
            mode: TimeoutMode::Lock,
            timeout: lock_timeout,
            lock_timeout,
            warning_seconds: 0,
            is_authenticated: true,
        }
    }

    #[must_use]
    pub const fn logout(timeout: Duration) -> Self {
        Self {
            mode: TimeoutMode::Logout,
            timeout,
            lock_timeout: timeout,
            warning_seconds: 0,
            is_authenticated: true,
        }
    }

    #[must_use]
    pub const fn with_warning_seconds(mut self, warning_seconds: u64) -> Self {
        self.warning_seconds = warning_seconds;
        self
    }

    #[must_use]
    pub const fn authenticated(mut self, is_authenticated: bool) -> Self {
        self.is_authenticated = is_authenticated;
        self
    }

    /// The inactivity duration that applies to the configured mode.
    #[must_use]
    pub const fn effective_timeout(&self) -> Duration {
        match self.mode {
            TimeoutMode::Logout => self.timeout,
            TimeoutMode::Lock => self.lock_timeout,
        }
    }
}

impl From<&TimeoutSettings> for SessionTimeoutConfig {
    fn from(settings: &TimeoutSettings) -> Self {
        Self {
            mode: settings.mode,
            timeout: Duration::from_millis(settings.timeout_ms),
            lock_timeout: Duration::from_millis(settings.lock_timeout_ms),
            warning_seconds: settings.warning_seconds,
            is_authenticated: false,
        }
    }
}

pub type Callback = Arc<dyn Fn() + Send + Sync>;
pub type CountdownCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Lifecycle hooks the host UI registers with the controller. Every slot is optional.
#[derive(Clone, Default)]
pub struct SessionCallbacks {
    pub on_countdown: Option<CountdownCallback>,
    pub on_cancel_countdown: Option<Callback>,
    pub on_lock: Option<Callback>,
    pub on_logout: Option<Callback>,
}

impl SessionCallbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_countdown(mut self, f: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_countdown = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_cancel_countdown(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_cancel_countdown = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_lock(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_lock = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_logout(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_logout = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_countdown", &self.on_countdown.is_some())
            .field("on_cancel_countdown", &self.on_cancel_countdown.is_some())
            .field("on_lock", &self.on_lock.is_some())
            .field("on_logout", &self.on_logout.is_some())
            .finish()
    }
}
