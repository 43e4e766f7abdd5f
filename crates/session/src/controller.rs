use crate::activity::{ActivityMonitor, ActivitySubscription, EventTarget};
use crate::config::{Callback, SessionCallbacks, SessionTimeoutConfig, TimeoutMode};
use crate::scheduler::{TimeoutScheduler, TimerPhase, TimerPlan};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Observable state of a session timeout controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Not authenticated or not mounted; nothing is scheduled.
    Idle,
    /// Timers are running and no warning is shown.
    Armed,
    /// The countdown is visible.
    Warning,
    /// The terminal action fired.
    Terminal,
}

impl SessionState {
    #[must_use]
    pub const fn from_phase(phase: TimerPhase) -> Self {
        match phase {
            TimerPhase::Disarmed => SessionState::Idle,
            TimerPhase::Armed => SessionState::Armed,
            TimerPhase::CountingDown { .. } => SessionState::Warning,
            TimerPhase::Elapsed => SessionState::Terminal,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Armed => "armed",
            SessionState::Warning => "warning",
            SessionState::Terminal => "terminal",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the timer plan for one activation, routing the final timer to the mode's action.
fn build_plan(config: &SessionTimeoutConfig, callbacks: &SessionCallbacks) -> TimerPlan {
    let mode = config.mode;
    let action = match mode {
        TimeoutMode::Lock => callbacks.on_lock.clone(),
        TimeoutMode::Logout => callbacks.on_logout.clone(),
    };

    let on_elapsed: Callback = Arc::new(move || match &action {
        Some(action) => {
            info!(mode = %mode, "Session inactivity timeout reached");
            action();
        }
        None => {
            debug!(mode = %mode, "Session inactivity timeout reached with no action registered");
        }
    });

    TimerPlan {
        timeout: config.effective_timeout(),
        warning_seconds: config.warning_seconds,
        on_countdown: callbacks.on_countdown.clone(),
        on_cancel_countdown: callbacks.on_cancel_countdown.clone(),
        on_elapsed: Some(on_elapsed),
    }
}

/// Inactivity state machine for one mounted view.
///
/// While the config is authenticated the controller listens for activity on its
/// [`EventTarget`] and keeps the timers armed. Dropping the controller disarms everything.
pub struct SessionTimeoutController {
    target: Arc<EventTarget>,
    scheduler: Arc<TimeoutScheduler>,
    config: SessionTimeoutConfig,
    callbacks: SessionCallbacks,
    plan: Arc<TimerPlan>,
    subscription: Option<ActivitySubscription>,
}

impl SessionTimeoutController {
    /// Creates the controller and arms it right away if `config.is_authenticated` is set.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn mount(target: Arc<EventTarget>, config: SessionTimeoutConfig, callbacks: SessionCallbacks) -> Self {
        let plan = Arc::new(build_plan(&config, &callbacks));
        let mut controller = Self {
            target,
            scheduler: Arc::new(TimeoutScheduler::new()),
            config,
            callbacks,
            plan,
            subscription: None,
        };
        if controller.config.is_authenticated {
            controller.activate();
        }
        controller
    }

    fn activate(&mut self) {
        self.deactivate();
        self.scheduler.reset(&self.plan);

        let scheduler = Arc::downgrade(&self.scheduler);
        let plan = Arc::clone(&self.plan);
        self.subscription = Some(ActivityMonitor::subscribe(&self.target, move || {
            let Some(scheduler) = scheduler.upgrade() else {
                return;
            };
            // Nothing runs after the terminal action until the host rearms
            if scheduler.phase() == TimerPhase::Elapsed {
                trace!("Ignoring activity after session timeout");
                return;
            }
            scheduler.cancel_countdown_and_reset(&plan);
        }));

        debug!(
            mode = %self.config.mode,
            timeout_ms = self.plan.timeout.as_millis(),
            "Session timeout activated"
        );
    }

    fn deactivate(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.teardown();
            debug!("Session timeout deactivated");
        }
        self.scheduler.clear();
    }

    /// Follows the authentication gate: arms on `true`, goes idle on `false`.
    pub fn set_authenticated(&mut self, is_authenticated: bool) {
        if self.config.is_authenticated == is_authenticated {
            return;
        }
        self.config.is_authenticated = is_authenticated;
        if is_authenticated {
            self.activate();
        } else {
            self.deactivate();
        }
    }

    /// Replaces the configuration and callbacks, discarding every listener and timer built
    /// from the old ones.
    pub fn reconfigure(&mut self, config: SessionTimeoutConfig, callbacks: SessionCallbacks) {
        self.deactivate();
        self.plan = Arc::new(build_plan(&config, &callbacks));
        self.config = config;
        self.callbacks = callbacks;
        if self.config.is_authenticated {
            self.activate();
        }
    }

    /// Rearms the full timeout. Does nothing while the controller is idle.
    pub fn reset_timeout(&self) {
        if self.is_active() {
            self.scheduler.reset(&self.plan);
        }
    }

    /// Cancels pending timers without removing the activity listeners.
    pub fn clear_timers(&self) {
        self.scheduler.clear();
    }

    /// Disarms everything. Equivalent to dropping the controller.
    pub fn unmount(mut self) {
        self.deactivate();
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        if !self.is_active() {
            return SessionState::Idle;
        }
        SessionState::from_phase(self.scheduler.phase())
    }

    /// Seconds left on the visible countdown, if any.
    #[must_use]
    pub fn countdown(&self) -> Option<u64> {
        match self.scheduler.phase() {
            TimerPhase::CountingDown { remaining } => Some(remaining),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    #[must_use]
    pub const fn config(&self) -> &SessionTimeoutConfig {
        &self.config
    }

    #[must_use]
    pub const fn callbacks(&self) -> &SessionCallbacks {
        &self.callbacks
    }

    #[must_use]
    pub fn subscribe_phase(&self) -> watch::Receiver<TimerPhase> {
        self.scheduler.subscribe()
    }
}

impl Drop for SessionTimeoutController {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl fmt::Debug for SessionTimeoutController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTimeoutController")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}
