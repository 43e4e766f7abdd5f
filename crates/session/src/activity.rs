use color_eyre::eyre::eyre;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::trace;

/// Input events the host UI forwards to the event target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum InputEvent {
    PointerDown,
    PointerMove,
    KeyDown,
    KeyUp,
    Scroll,
    TouchStart,
    Click,
    Resize,
    Focus,
    VisibilityChange,
}

/// The events that count as user activity.
pub const ACTIVITY_EVENTS: [InputEvent; 6] = [
    InputEvent::PointerDown,
    InputEvent::PointerMove,
    InputEvent::KeyDown,
    InputEvent::Scroll,
    InputEvent::TouchStart,
    InputEvent::Click,
];

impl InputEvent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            InputEvent::PointerDown => "pointerdown",
            InputEvent::PointerMove => "pointermove",
            InputEvent::KeyDown => "keydown",
            InputEvent::KeyUp => "keyup",
            InputEvent::Scroll => "scroll",
            InputEvent::TouchStart => "touchstart",
            InputEvent::Click => "click",
            InputEvent::Resize => "resize",
            InputEvent::Focus => "focus",
            InputEvent::VisibilityChange => "visibilitychange",
        }
    }

    #[must_use]
    pub fn is_activity(self) -> bool {
        ACTIVITY_EVENTS.contains(&self)
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for InputEvent {
    type Error = color_eyre::Report;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for InputEvent {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let event = match s.to_lowercase().as_str() {
            "pointerdown" | "mousedown" => InputEvent::PointerDown,
            "pointermove" | "mousemove" => InputEvent::PointerMove,
            "keydown" | "keypress" => InputEvent::KeyDown,
            "keyup" => InputEvent::KeyUp,
            "scroll" | "wheel" => InputEvent::Scroll,
            "touchstart" => InputEvent::TouchStart,
            "click" => InputEvent::Click,
            "resize" => InputEvent::Resize,
            "focus" => InputEvent::Focus,
            "visibilitychange" => InputEvent::VisibilityChange,
            other => return Err(eyre!("Unknown input event '{other}'")),
        };
        Ok(event)
    }
}

pub type Listener = Arc<dyn Fn(InputEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: BTreeMap<ListenerId, (InputEvent, Listener)>,
}

/// An owned event target: the place input events are dispatched to and listeners register on.
///
/// Each controller is given a target explicitly, so independent instances never share listeners.
#[derive(Default)]
pub struct EventTarget {
    registry: Mutex<Registry>,
}

impl EventTarget {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_listener(&self, event: InputEvent, listener: Listener) -> ListenerId {
        let mut registry = self.registry();
        registry.next_id += 1;
        let id = ListenerId(registry.next_id);
        registry.listeners.insert(id, (event, listener));
        id
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.registry().listeners.remove(&id).is_some()
    }

    /// Invokes every listener registered for `event` synchronously and returns how many ran.
    ///
    /// The registry lock is released before any listener runs, so listeners may add or remove
    /// listeners themselves.
    pub fn dispatch(&self, event: InputEvent) -> usize {
        let matching: Vec<Listener> = self
            .registry()
            .listeners
            .values()
            .filter(|(kind, _)| *kind == event)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        trace!(event = %event, listeners = matching.len(), "Dispatching input event");
        for listener in &matching {
            listener(event);
        }
        matching.len()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.registry().listeners.len()
    }
}

impl fmt::Debug for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventTarget")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Subscribes to the activity event set on an [`EventTarget`].
pub struct ActivityMonitor;

impl ActivityMonitor {
    /// Registers `on_activity` for every event in [`ACTIVITY_EVENTS`].
    ///
    /// The returned subscription owns the registrations; dropping it removes them.
    pub fn subscribe(target: &Arc<EventTarget>, on_activity: impl Fn() + Send + Sync + 'static) -> ActivitySubscription {
        let on_activity = Arc::new(on_activity);
        let ids = ACTIVITY_EVENTS
            .iter()
            .map(|&event| {
                let on_activity = Arc::clone(&on_activity);
                target.add_listener(event, Arc::new(move |_: InputEvent| on_activity()))
            })
            .collect();

        ActivitySubscription {
            target: Arc::downgrade(target),
            ids,
        }
    }
}

/// A live set of activity listeners. Removing them is idempotent.
#[derive(Debug)]
pub struct ActivitySubscription {
    target: Weak<EventTarget>,
    ids: Vec<ListenerId>,
}

impl ActivitySubscription {
    pub fn teardown(&mut self) {
        let ids = std::mem::take(&mut self.ids);
        if let Some(target) = self.target.upgrade() {
            for id in ids {
                target.remove_listener(id);
            }
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.ids.is_empty()
    }
}

impl Drop for ActivitySubscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let handle = Arc::clone(&count);
        (count, move || {
            handle.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_subscribe_registers_every_activity_event() {
        let target = Arc::new(EventTarget::new());
        let (count, on_activity) = counter();
        let subscription = ActivityMonitor::subscribe(&target, on_activity);

        assert!(subscription.is_active());
        assert_eq!(target.listener_count(), ACTIVITY_EVENTS.len());

        for event in ACTIVITY_EVENTS {
            assert_eq!(target.dispatch(event), 1);
        }
        assert_eq!(count.load(Ordering::SeqCst), ACTIVITY_EVENTS.len());
    }

    #[test]
    fn test_non_activity_events_are_ignored() {
        let target = Arc::new(EventTarget::new());
        let (count, on_activity) = counter();
        let _subscription = ActivityMonitor::subscribe(&target, on_activity);

        assert_eq!(target.dispatch(InputEvent::Resize), 0);
        assert_eq!(target.dispatch(InputEvent::VisibilityChange), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let target = Arc::new(EventTarget::new());
        let (count, on_activity) = counter();
        let mut subscription = ActivityMonitor::subscribe(&target, on_activity);

        subscription.teardown();
        subscription.teardown();
        assert!(!subscription.is_active());
        assert_eq!(target.listener_count(), 0);

        target.dispatch(InputEvent::KeyDown);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drop_removes_listeners() {
        let target = Arc::new(EventTarget::new());
        {
            let (_count, on_activity) = counter();
            let _subscription = ActivityMonitor::subscribe(&target, on_activity);
            assert_eq!(target.listener_count(), 6);
        }
        assert_eq!(target.listener_count(), 0);
    }

    #[test]
    fn test_subscriptions_are_independent() {
        let target = Arc::new(EventTarget::new());
        let (first_count, first) = counter();
        let (second_count, second) = counter();
        let mut first_sub = ActivityMonitor::subscribe(&target, first);
        let _second_sub = ActivityMonitor::subscribe(&target, second);

        first_sub.teardown();
        target.dispatch(InputEvent::Click);

        assert_eq!(first_count.load(Ordering::SeqCst), 0);
        assert_eq!(second_count.load(Ordering::SeqCst), 1);
        assert_eq!(target.listener_count(), ACTIVITY_EVENTS.len());
    }

    #[test]
    fn test_teardown_after_target_dropped() {
        let target = Arc::new(EventTarget::new());
        let (_count, on_activity) = counter();
        let mut subscription = ActivityMonitor::subscribe(&target, on_activity);
        drop(target);
        subscription.teardown();
        assert!(!subscription.is_active());
    }

    #[test]
    fn test_input_event_names() {
        assert_eq!("keydown".parse::<InputEvent>().unwrap(), InputEvent::KeyDown);
        assert_eq!("TouchStart".parse::<InputEvent>().unwrap(), InputEvent::TouchStart);
        assert!("hover".parse::<InputEvent>().is_err());

        let json = serde_json::to_string(&InputEvent::PointerMove).unwrap();
        assert_eq!(json, "\"pointermove\"");
        let parsed: InputEvent = serde_json::from_str("\"visibilitychange\"").unwrap();
        assert_eq!(parsed, InputEvent::VisibilityChange);
        assert!(!parsed.is_activity());
    }

    #[test]
    fn test_input_event_aliases_deserialize() {
        let parsed: InputEvent = serde_json::from_str("\"mousedown\"").unwrap();
        assert_eq!(parsed, InputEvent::PointerDown);
        let parsed: InputEvent = serde_json::from_str("\"wheel\"").unwrap();
        assert_eq!(parsed, InputEvent::Scroll);

        let parsed: InputEvent = serde_json::from_str("\"keyup\"").unwrap();
        assert_eq!(parsed, InputEvent::KeyUp);
        assert!(!parsed.is_activity());
        assert_eq!(serde_json::to_string(&InputEvent::KeyUp).unwrap(), "\"keyup\"");

        assert!(serde_json::from_str::<InputEvent>("\"hover\"").is_err());
    }
}
