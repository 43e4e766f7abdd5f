use crate::config::{Callback, CountdownCallback};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

const TICK: Duration = Duration::from_secs(1);

/// Where the timer set currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerPhase {
    /// Nothing is scheduled.
    #[default]
    Disarmed,
    /// The final timer (and possibly the warning timer) is pending.
    Armed,
    /// The warning fired and the countdown ticker is running.
    CountingDown { remaining: u64 },
    /// The final timer fired. Nothing is scheduled until the next reset.
    Elapsed,
}

impl TimerPhase {
    #[must_use]
    pub const fn is_counting_down(self) -> bool {
        matches!(self, TimerPhase::CountingDown { .. })
    }
}

/// Everything one arming of the timer set needs: durations and the callbacks it drives.
#[derive(Clone, Default)]
pub struct TimerPlan {
    pub timeout: Duration,
    pub warning_seconds: u64,
    pub on_countdown: Option<CountdownCallback>,
    pub on_cancel_countdown: Option<Callback>,
    pub on_elapsed: Option<Callback>,
}

impl TimerPlan {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }

    /// Delay from arming until the warning fires, or `None` when there is no warning phase.
    ///
    /// A warning longer than the timeout starts the countdown immediately.
    #[must_use]
    pub fn warning_delay(&self) -> Option<Duration> {
        if self.warning_seconds == 0 || self.on_countdown.is_none() {
            return None;
        }
        Some(self.timeout.saturating_sub(Duration::from_secs(self.warning_seconds)))
    }
}

impl fmt::Debug for TimerPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerPlan")
            .field("timeout", &self.timeout)
            .field("warning_seconds", &self.warning_seconds)
            .field("on_countdown", &self.on_countdown.is_some())
            .field("on_cancel_countdown", &self.on_cancel_countdown.is_some())
            .field("on_elapsed", &self.on_elapsed.is_some())
            .finish()
    }
}

/// The final timer, warning timer and countdown ticker as a single resource.
///
/// `generation` changes on every disarm; a timer task only acts while its generation is current.
struct TimerSet {
    generation: u64,
    phase: TimerPhase,
    tasks: Vec<JoinHandle<()>>,
    phase_tx: watch::Sender<TimerPhase>,
}

impl TimerSet {
    fn set_phase(&mut self, phase: TimerPhase) {
        self.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    fn disarm(&mut self, phase: TimerPhase) {
        self.generation = self.generation.wrapping_add(1);
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.set_phase(phase);
    }
}

fn lock(timers: &Mutex<TimerSet>) -> MutexGuard<'_, TimerSet> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Moves the set to `phase` if `generation` is still current. Returns `false` for a stale timer.
fn advance(timers: &Weak<Mutex<TimerSet>>, generation: u64, phase: TimerPhase) -> bool {
    let Some(timers) = timers.upgrade() else {
        return false;
    };
    let mut set = lock(&timers);
    if set.generation != generation {
        return false;
    }
    set.set_phase(phase);
    true
}

/// Owns the inactivity timers for one session.
///
/// Every method is synchronous; timers run as Tokio tasks, so arming requires a runtime context.
pub struct TimeoutScheduler {
    timers: Arc<Mutex<TimerSet>>,
}

impl Default for TimeoutScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeoutScheduler {
    #[must_use]
    pub fn new() -> Self {
        let (phase_tx, _) = watch::channel(TimerPhase::Disarmed);
        Self {
            timers: Arc::new(Mutex::new(TimerSet {
                generation: 0,
                phase: TimerPhase::Disarmed,
                tasks: Vec::new(),
                phase_tx,
            })),
        }
    }

    #[must_use]
    pub fn phase(&self) -> TimerPhase {
        lock(&self.timers).phase
    }

    #[must_use]
    pub fn is_counting_down(&self) -> bool {
        self.phase().is_counting_down()
    }

    /// Number of timer tasks currently owned by the set.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        lock(&self.timers).tasks.iter().filter(|task| !task.is_finished()).count()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TimerPhase> {
        lock(&self.timers).phase_tx.subscribe()
    }

    /// Disarms every timer, then arms the final timer and, if the plan has one, the warning timer.
    ///
    /// When the warning window covers the whole timeout, the countdown starts before this returns.
    pub fn reset(&self, plan: &TimerPlan) {
        let armed_at = Instant::now();
        let weak = Arc::downgrade(&self.timers);

        let immediate_countdown = {
            let mut set = lock(&self.timers);
            set.disarm(TimerPhase::Armed);
            let generation = set.generation;

            let final_task = tokio::spawn(final_timer(
                weak.clone(),
                generation,
                armed_at + plan.timeout,
                plan.on_countdown.clone(),
                plan.on_elapsed.clone(),
            ));
            set.tasks.push(final_task);

            match (plan.warning_delay(), plan.on_countdown.clone()) {
                (Some(delay), Some(on_countdown)) if delay.is_zero() => {
                    set.set_phase(TimerPhase::CountingDown {
                        remaining: plan.warning_seconds,
                    });
                    let ticker = tokio::spawn(countdown_ticker(
                        weak,
                        generation,
                        armed_at,
                        plan.warning_seconds,
                        Arc::clone(&on_countdown),
                    ));
                    set.tasks.push(ticker);
                    Some(on_countdown)
                }
                (Some(delay), Some(on_countdown)) => {
                    let warning = tokio::spawn(warning_timer(
                        weak,
                        generation,
                        armed_at + delay,
                        plan.warning_seconds,
                        on_countdown,
                    ));
                    set.tasks.push(warning);
                    None
                }
                _ => None,
            }
        };

        debug!(
            timeout_ms = plan.timeout.as_millis(),
            warning_seconds = plan.warning_seconds,
            "Inactivity timers armed"
        );

        if let Some(on_countdown) = immediate_countdown {
            on_countdown(plan.warning_seconds);
        }
    }

    /// Cancels all timers. Safe to call when nothing is armed.
    pub fn clear(&self) {
        let mut set = lock(&self.timers);
        if set.phase != TimerPhase::Disarmed || !set.tasks.is_empty() {
            trace!("Inactivity timers cleared");
        }
        set.disarm(TimerPhase::Disarmed);
    }

    /// The activity path: hides a visible countdown before rearming.
    pub fn cancel_countdown_and_reset(&self, plan: &TimerPlan) {
        if self.is_counting_down() {
            if let Some(on_cancel_countdown) = &plan.on_cancel_countdown {
                on_cancel_countdown();
            }
            self.clear();
        }
        self.reset(plan);
    }
}

impl Drop for TimeoutScheduler {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for TimeoutScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = lock(&self.timers);
        f.debug_struct("TimeoutScheduler")
            .field("generation", &set.generation)
            .field("phase", &set.phase)
            .field("tasks", &set.tasks.len())
            .finish()
    }
}

async fn final_timer(
    timers: Weak<Mutex<TimerSet>>,
    generation: u64,
    deadline: Instant,
    on_countdown: Option<CountdownCallback>,
    on_elapsed: Option<Callback>,
) {
    sleep_until(deadline).await;

    let Some(timers) = timers.upgrade() else {
        return;
    };
    let was_counting_down = {
        let mut set = lock(&timers);
        if set.generation != generation {
            return;
        }
        let was_counting_down = set.phase.is_counting_down();
        set.disarm(TimerPhase::Elapsed);
        was_counting_down
    };

    debug!("Inactivity timeout elapsed");
    // The zero tick always precedes the terminal action
    if was_counting_down {
        if let Some(on_countdown) = on_countdown {
            on_countdown(0);
        }
    }
    if let Some(on_elapsed) = on_elapsed {
        on_elapsed();
    }
}

async fn warning_timer(
    timers: Weak<Mutex<TimerSet>>,
    generation: u64,
    warning_at: Instant,
    seconds: u64,
    on_countdown: CountdownCallback,
) {
    sleep_until(warning_at).await;

    if !advance(&timers, generation, TimerPhase::CountingDown { remaining: seconds }) {
        return;
    }
    debug!(seconds, "Inactivity warning started");
    on_countdown(seconds);

    countdown_ticker(timers, generation, warning_at, seconds, on_countdown).await;
}

async fn countdown_ticker(
    timers: Weak<Mutex<TimerSet>>,
    generation: u64,
    started_at: Instant,
    seconds: u64,
    on_countdown: CountdownCallback,
) {
    let mut next_tick = started_at;
    let mut remaining = seconds;

    // The last tick lands on the final timer's deadline; the final timer delivers it
    while remaining > 1 {
        next_tick += TICK;
        sleep_until(next_tick).await;
        remaining -= 1;

        if !advance(&timers, generation, TimerPhase::CountingDown { remaining }) {
            return;
        }
        on_countdown(remaining);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_plan(timeout_ms: u64) -> (TimerPlan, Arc<AtomicUsize>) {
        let elapsed = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&elapsed);
        let plan = TimerPlan {
            on_elapsed: Some(Arc::new(move || {
                handle.fetch_add(1, Ordering::SeqCst);
            })),
            ..TimerPlan::new(Duration::from_millis(timeout_ms))
        };
        (plan, elapsed)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_warning_delay() {
        let mut plan = TimerPlan::new(Duration::from_secs(10));
        plan.warning_seconds = 4;
        // No countdown callback, no warning phase
        assert_eq!(plan.warning_delay(), None);

        plan.on_countdown = Some(Arc::new(|_| {}));
        assert_eq!(plan.warning_delay(), Some(Duration::from_secs(6)));

        plan.warning_seconds = 30;
        assert_eq!(plan.warning_delay(), Some(Duration::ZERO));

        plan.warning_seconds = 0;
        assert_eq!(plan.warning_delay(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_timer_fires_once() {
        let scheduler = TimeoutScheduler::new();
        let (plan, elapsed) = counting_plan(1_000);

        scheduler.reset(&plan);
        assert_eq!(scheduler.phase(), TimerPhase::Armed);

        tokio::time::sleep(Duration::from_millis(999)).await;
        settle().await;
        assert_eq!(elapsed.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(5_000)).await;
        settle().await;
        assert_eq!(elapsed.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.phase(), TimerPhase::Elapsed);
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_prevents_firing() {
        let scheduler = TimeoutScheduler::new();
        let (plan, elapsed) = counting_plan(1_000);

        scheduler.reset(&plan);
        scheduler.clear();
        scheduler.clear();
        assert_eq!(scheduler.phase(), TimerPhase::Disarmed);

        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(elapsed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_restarts_full_duration() {
        let scheduler = TimeoutScheduler::new();
        let (plan, elapsed) = counting_plan(1_000);

        scheduler.reset(&plan);
        tokio::time::sleep(Duration::from_millis(800)).await;
        scheduler.reset(&plan);
        tokio::time::sleep(Duration::from_millis(800)).await;
        settle().await;
        assert_eq!(elapsed.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        settle().await;
        assert_eq!(elapsed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticks_down() {
        let scheduler = TimeoutScheduler::new();
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let handle = Arc::clone(&ticks);
        let (mut plan, elapsed) = counting_plan(5_000);
        plan.warning_seconds = 3;
        plan.on_countdown = Some(Arc::new(move |remaining| {
            handle.lock().unwrap().push(remaining);
        }));

        scheduler.reset(&plan);
        tokio::time::sleep(Duration::from_millis(2_100)).await;
        settle().await;
        assert_eq!(*ticks.lock().unwrap(), vec![3]);
        assert!(scheduler.is_counting_down());

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        settle().await;
        assert_eq!(*ticks.lock().unwrap(), vec![3, 2, 1]);
        assert_eq!(scheduler.phase(), TimerPhase::CountingDown { remaining: 1 });

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        settle().await;
        assert_eq!(*ticks.lock().unwrap(), vec![3, 2, 1, 0]);
        assert_eq!(elapsed.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_counting_down());
        assert_eq!(scheduler.phase(), TimerPhase::Elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_tick_precedes_elapse() {
        let scheduler = TimeoutScheduler::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let ticks = Arc::clone(&order);
        let done = Arc::clone(&order);
        let plan = TimerPlan {
            warning_seconds: 2,
            on_countdown: Some(Arc::new(move |remaining| {
                ticks.lock().unwrap().push(format!("tick {remaining}"));
            })),
            on_elapsed: Some(Arc::new(move || {
                done.lock().unwrap().push("elapsed".to_string());
            })),
            ..TimerPlan::new(Duration::from_secs(2))
        };

        scheduler.reset(&plan);
        tokio::time::sleep(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(*order.lock().unwrap(), vec!["tick 2", "tick 1", "tick 0", "elapsed"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_countdown_when_warning_covers_timeout() {
        let scheduler = TimeoutScheduler::new();
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let handle = Arc::clone(&ticks);
        let (mut plan, _elapsed) = counting_plan(10_000);
        plan.warning_seconds = 10;
        plan.on_countdown = Some(Arc::new(move |remaining| {
            handle.lock().unwrap().push(remaining);
        }));

        scheduler.reset(&plan);
        assert_eq!(*ticks.lock().unwrap(), vec![10]);
        assert_eq!(scheduler.phase(), TimerPhase::CountingDown { remaining: 10 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_countdown_only_when_counting() {
        let scheduler = TimeoutScheduler::new();
        let cancelled = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&cancelled);
        let (mut plan, elapsed) = counting_plan(4_000);
        plan.warning_seconds = 2;
        plan.on_countdown = Some(Arc::new(|_| {}));
        plan.on_cancel_countdown = Some(Arc::new(move || {
            handle.fetch_add(1, Ordering::SeqCst);
        }));

        scheduler.reset(&plan);
        scheduler.cancel_countdown_and_reset(&plan);
        assert_eq!(cancelled.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        settle().await;
        assert!(scheduler.is_counting_down());

        scheduler.cancel_countdown_and_reset(&plan);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.phase(), TimerPhase::Armed);

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        settle().await;
        assert_eq!(elapsed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phase_updates_are_published() {
        let scheduler = TimeoutScheduler::new();
        let mut phases = scheduler.subscribe();
        let (plan, _elapsed) = counting_plan(1_000);

        scheduler.reset(&plan);
        assert_eq!(*phases.borrow_and_update(), TimerPhase::Armed);

        phases.changed().await.unwrap();
        assert_eq!(*phases.borrow_and_update(), TimerPhase::Elapsed);
    }
}
