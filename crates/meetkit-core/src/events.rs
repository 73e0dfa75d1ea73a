use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::protocol::{EventName, MeetingEvent};

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from the event loop task).
pub trait MeetingEventListener: Send + Sync {
    fn on_event(&self, event: MeetingEvent);
}

/// Handle returned by a subscription, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

struct Registration {
    id: SubscriptionId,
    /// `None` receives every event.
    name: Option<EventName>,
    listener: Arc<dyn MeetingEventListener>,
}

/// Listener registry that dispatches protocol events.
///
/// Events are delivered synchronously, in emit order, to every matching
/// listener in registration order.
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<RwLock<Vec<Registration>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for every event name.
    pub fn add_listener(&self, listener: Arc<dyn MeetingEventListener>) -> SubscriptionId {
        self.register(None, listener)
    }

    /// Register a listener for a single event name.
    pub fn subscribe(&self, name: EventName, listener: Arc<dyn MeetingEventListener>) -> SubscriptionId {
        self.register(Some(name), listener)
    }

    fn register(&self, name: Option<EventName>, listener: Arc<dyn MeetingEventListener>) -> SubscriptionId {
        let id = SubscriptionId(Uuid::new_v4());
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration { id, name, listener });
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|r| r.id != id);
        listeners.len() != before
    }

    pub fn remove_all_listeners(&self) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!("removing {} event listeners", listeners.len());
        listeners.clear();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn emit(&self, event: MeetingEvent) {
        let name = event.name();
        // Snapshot so listeners may (un)subscribe while handling the event.
        let targets: Vec<Arc<dyn MeetingEventListener>> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.name.is_none_or(|n| n == name))
            .map(|r| r.listener.clone())
            .collect();

        if targets.is_empty() {
            tracing::debug!("no listener for {name}");
        }
        for listener in targets {
            listener.on_event(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        count: Arc<AtomicUsize>,
    }

    impl MeetingEventListener for CountingListener {
        fn on_event(&self, _event: MeetingEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn emitter_dispatches_to_listener() {
        let emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let listener = Arc::new(CountingListener { count: count.clone() });

        emitter.add_listener(listener);
        emitter.emit(MeetingEvent::MeetingStart);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn named_subscription_only_sees_its_event() {
        let emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));

        emitter.subscribe(EventName::MeetingEnd, Arc::new(CountingListener { count: count.clone() }));
        emitter.emit(MeetingEvent::MeetingStart);
        emitter.emit(MeetingEvent::AttendeeMute("a1".into()));
        emitter.emit(MeetingEvent::MeetingEnd);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_subscription_stops_receiving() {
        let emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));

        let id = emitter.add_listener(Arc::new(CountingListener { count: count.clone() }));
        assert!(emitter.remove(id));
        assert!(!emitter.remove(id));
        emitter.emit(MeetingEvent::MeetingStart);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn remove_all_listeners_clears_registry() {
        let emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        for name in EventName::ALL {
            emitter.subscribe(name, Arc::new(CountingListener { count: count.clone() }));
        }
        assert_eq!(emitter.listener_count(), EventName::ALL.len());

        emitter.remove_all_listeners();
        emitter.emit(MeetingEvent::MeetingEnd);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    struct EventCapture {
        events: Arc<Mutex<Vec<MeetingEvent>>>,
    }

    impl MeetingEventListener for EventCapture {
        fn on_event(&self, event: MeetingEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn emitter_preserves_emit_order() {
        let emitter = EventEmitter::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        emitter.add_listener(Arc::new(EventCapture { events: events.clone() }));

        emitter.emit(MeetingEvent::AttendeeLeave("p1".to_string()));
        emitter.emit(MeetingEvent::AttendeeLeave("p2".to_string()));

        let captured = events.lock().unwrap();
        assert_eq!(
            *captured,
            vec![
                MeetingEvent::AttendeeLeave("p1".to_string()),
                MeetingEvent::AttendeeLeave("p2".to_string()),
            ]
        );
    }

    struct SelfRemoving {
        emitter: EventEmitter,
        id: Mutex<Option<SubscriptionId>>,
        count: Arc<AtomicUsize>,
    }

    impl MeetingEventListener for SelfRemoving {
        fn on_event(&self, _event: MeetingEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = self.id.lock().unwrap().take() {
                self.emitter.remove(id);
            }
        }
    }

    #[test]
    fn listener_can_unsubscribe_while_handling() {
        let emitter = EventEmitter::new();
        let count = Arc::new(AtomicUsize::new(0));
        let listener = Arc::new(SelfRemoving {
            emitter: emitter.clone(),
            id: Mutex::new(None),
            count: count.clone(),
        });
        let id = emitter.add_listener(listener.clone());
        *listener.id.lock().unwrap() = Some(id);

        emitter.emit(MeetingEvent::MeetingStart);
        emitter.emit(MeetingEvent::MeetingStart);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
