//! Lifecycle states, events, and the observable per-ability lifecycle holder.

use crate::want::Want;
use serde::{Deserialize, Serialize};

/// The lifecycle state machine positions.
///
/// `Uninitialized` is the pre-`init` position; it is never re-entered once
/// an ability has been bound. All other movement happens through the
/// `AbilityImpl` transition operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Uninitialized,
    Initial,
    Inactive,
    Active,
    Background,
}

/// The callback edge that was just dispatched to the ability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    OnStart,
    OnStop,
    OnActive,
    OnInactive,
    OnForeground,
    OnBackground,
}

/// Observer registered on an ability's lifecycle. All methods default to
/// no-ops so observers implement only what they watch.
pub trait LifecycleObserver: Send {
    fn on_state_changed(&mut self, _event: LifecycleEvent, _want: Option<&Want>) {}
}

/// Per-ability event fan-out. Owned by the `AbilityContext`; the framework
/// dispatches the matching event right after each user callback returns.
#[derive(Default)]
pub struct Lifecycle {
    current: Option<LifecycleEvent>,
    observers: Vec<Box<dyn LifecycleObserver>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_observer(&mut self, observer: Box<dyn LifecycleObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// The last event dispatched, if any.
    pub fn current_event(&self) -> Option<LifecycleEvent> {
        self.current
    }

    pub fn dispatch(&mut self, event: LifecycleEvent, want: Option<&Want>) {
        self.current = Some(event);
        for observer in &mut self.observers {
            observer.on_state_changed(event, want);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct CollectingObserver {
        seen: Arc<Mutex<Vec<LifecycleEvent>>>,
    }

    impl LifecycleObserver for CollectingObserver {
        fn on_state_changed(&mut self, event: LifecycleEvent, _want: Option<&Want>) {
            self.seen.lock().unwrap().push(event);
        }
    }

    #[test]
    fn dispatch_reaches_observers_in_registration_order() {
        let first = Arc::new(Mutex::new(Vec::new()));
        let second = Arc::new(Mutex::new(Vec::new()));
        let mut lifecycle = Lifecycle::new();
        lifecycle.add_observer(Box::new(CollectingObserver { seen: first.clone() }));
        lifecycle.add_observer(Box::new(CollectingObserver {
            seen: second.clone(),
        }));

        lifecycle.dispatch(LifecycleEvent::OnStart, None);
        lifecycle.dispatch(LifecycleEvent::OnActive, None);

        assert_eq!(
            *first.lock().unwrap(),
            vec![LifecycleEvent::OnStart, LifecycleEvent::OnActive]
        );
        assert_eq!(
            *second.lock().unwrap(),
            vec![LifecycleEvent::OnStart, LifecycleEvent::OnActive]
        );
        assert_eq!(lifecycle.current_event(), Some(LifecycleEvent::OnActive));
    }

    #[test]
    fn fresh_lifecycle_has_no_event() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.current_event(), None);
        assert_eq!(lifecycle.observer_count(), 0);
    }

    #[test]
    fn state_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&LifecycleState::Background).unwrap(),
            "\"background\""
        );
        let state: LifecycleState = serde_json::from_str("\"inactive\"").unwrap();
        assert_eq!(state, LifecycleState::Inactive);
    }
}
