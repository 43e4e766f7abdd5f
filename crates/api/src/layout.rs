use reqdesk_session::{
    AuthCollaborator, EventTarget, InputEvent, SessionCallbacks, SessionState, SessionTimeoutConfig,
    SessionTimeoutController, TimeoutMode, TimeoutSettings,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

const INCORRECT_PASSWORD: &str = "Incorrect password";

/// What the lock screen shows besides the lock itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockScreenView {
    /// Seconds left on the inactivity warning, while it is visible
    pub countdown: Option<u64>,
    /// Message from the last rejected unlock attempt
    pub unlock_error: Option<String>,
}

/// Outcome of an unlock attempt from the lock screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked,
    Rejected { attempts: u32 },
}

/// Snapshot of everything the dashboard needs to render the session chrome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub mode: TimeoutMode,
    pub authenticated: bool,
    pub locked: bool,
    pub locked_username: Option<String>,
    pub countdown_seconds: Option<u64>,
    pub failed_password_attempts: u32,
    pub unlock_error: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Host for one signed-in dashboard session: owns the timeout controller, mirrors its
/// countdown, and drives the lock screen against the authentication store.
pub struct SessionLayout {
    auth: Arc<dyn AuthCollaborator>,
    target: Arc<EventTarget>,
    controller: Mutex<SessionTimeoutController>,
    view: Arc<Mutex<LockScreenView>>,
    settings: TimeoutSettings,
}

impl SessionLayout {
    /// Mounts the layout. The persisted lock is read exactly once, before the controller is
    /// armed, so a locked session never starts its timers.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn mount(auth: Arc<dyn AuthCollaborator>, settings: TimeoutSettings) -> Self {
        let restored = auth.load_lock_state();
        if restored.locked {
            info!(
                username = restored.locked_username.as_deref().unwrap_or_default(),
                "Restored lock screen from previous run"
            );
        }

        let view = Arc::new(Mutex::new(LockScreenView::default()));
        let target = Arc::new(EventTarget::new());
        let gate = auth.is_authenticated() && !auth.is_locked();
        let config = SessionTimeoutConfig::from(&settings).authenticated(gate);
        let callbacks = Self::callbacks(&auth, &view);

        Self {
            controller: Mutex::new(SessionTimeoutController::mount(Arc::clone(&target), config, callbacks)),
            auth,
            target,
            view,
            settings,
        }
    }

    fn callbacks(auth: &Arc<dyn AuthCollaborator>, view: &Arc<Mutex<LockScreenView>>) -> SessionCallbacks {
        let countdown_view = Arc::clone(view);
        let cancel_view = Arc::clone(view);
        let lock_view = Arc::clone(view);
        let logout_view = Arc::clone(view);
        let lock_auth = Arc::clone(auth);
        let logout_auth = Arc::clone(auth);

        SessionCallbacks::new()
            .on_countdown(move |remaining| {
                lock(&countdown_view).countdown = Some(remaining);
            })
            .on_cancel_countdown(move || {
                lock(&cancel_view).countdown = None;
            })
            .on_lock(move || {
                lock(&lock_view).countdown = None;
                lock_auth.lock_screen();
            })
            .on_logout(move || {
                lock(&logout_view).countdown = None;
                logout_auth.logout();
            })
    }

    fn controller(&self) -> MutexGuard<'_, SessionTimeoutController> {
        lock(&self.controller)
    }

    /// Brings the controller in line with the authentication store: armed while signed in
    /// and unlocked, idle otherwise.
    pub fn sync(&self) {
        let gate = self.auth.is_authenticated() && !self.auth.is_locked();
        let mut controller = self.controller();
        let was = controller.state();
        controller.set_authenticated(gate);
        if gate && was == SessionState::Terminal {
            controller.reset_timeout();
        }
        if !gate {
            lock(&self.view).countdown = None;
        }

        let now = controller.state();
        if was != now {
            debug!(from = %was, to = %now, "Session layout synchronised");
        }
    }

    /// Forwards an input event from the browser. Returns whether it counted as activity.
    pub fn record_input(&self, event: InputEvent) -> bool {
        self.sync();
        self.target.dispatch(event) > 0
    }

    /// Locks the screen on request, without waiting for the timeout.
    pub fn lock_now(&self) {
        lock(&self.view).countdown = None;
        self.auth.lock_screen();
        self.sync();
    }

    /// Submits the lock screen password. A rejection leaves every timer untouched.
    pub async fn unlock(&self, password: &str) -> UnlockOutcome {
        if self.auth.unlock_screen(password).await {
            lock(&self.view).unlock_error = None;
            self.sync();
            UnlockOutcome::Unlocked
        } else {
            lock(&self.view).unlock_error = Some(INCORRECT_PASSWORD.to_string());
            UnlockOutcome::Rejected {
                attempts: self.auth.failed_password_attempts(),
            }
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.sync();
        let (state, countdown) = {
            let controller = self.controller();
            (controller.state(), controller.countdown())
        };
        let unlock_error = self.view().unlock_error;

        SessionSnapshot {
            state,
            mode: self.settings.mode,
            authenticated: self.auth.is_authenticated(),
            locked: self.auth.is_locked(),
            locked_username: self.auth.locked_username(),
            countdown_seconds: countdown,
            failed_password_attempts: self.auth.failed_password_attempts(),
            unlock_error,
        }
    }

    #[must_use]
    pub fn view(&self) -> LockScreenView {
        lock(&self.view).clone()
    }

    #[must_use]
    pub const fn settings(&self) -> &TimeoutSettings {
        &self.settings
    }
}
