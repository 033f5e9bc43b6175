//! Per-event listener bookkeeping.
//!
//! Shared by the emitter and node hosts, which both register callbacks under
//! an event name and remove them by callback identity.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::stream::Callback;
use crate::value::Value;

/// Callbacks keyed by event name, in registration order.
///
/// Removal matches on callback identity. Firing snapshots the matching
/// callbacks and releases the lock before invoking them, so a callback may
/// register or remove listeners on the same set.
#[derive(Debug, Default)]
pub struct ListenerSet {
    entries: Mutex<Vec<(String, Callback)>>,
}

impl ListenerSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(String, Callback)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `callback` for `event`. Duplicates are kept and fire twice.
    pub fn add(&self, event: &str, callback: Callback) {
        self.entries().push((event.to_string(), callback));
    }

    /// Remove the first registration of `callback` for `event`. Returns
    /// false when nothing matched.
    pub fn remove(&self, event: &str, callback: &Callback) -> bool {
        let mut entries = self.entries();
        match entries
            .iter()
            .position(|(name, cb)| name == event && cb == callback)
        {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Invoke every callback registered for `event`. Returns how many ran.
    pub fn fire(&self, event: &str, value: &Value) -> usize {
        let matching: Vec<Callback> = self
            .entries()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in &matching {
            cb.call(value.clone());
        }
        matching.len()
    }

    /// Number of callbacks registered for `event`.
    #[must_use]
    pub fn count(&self, event: &str) -> usize {
        self.entries().iter().filter(|(name, _)| name == event).count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn remove_matches_identity_and_event() {
        let set = ListenerSet::new();
        let cb = Callback::new(|_| {});
        set.add("click", cb.clone());
        set.add("hover", cb.clone());

        assert!(!set.remove("click", &Callback::new(|_| {})));
        assert!(set.remove("click", &cb));
        assert_eq!(set.count("click"), 0);
        assert_eq!(set.count("hover"), 1);
    }

    #[test]
    fn callbacks_may_remove_themselves_while_firing() {
        let set = Arc::new(ListenerSet::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<Mutex<Option<Callback>>> = Arc::new(Mutex::new(None));

        let cb = {
            let set = Arc::clone(&set);
            let hits = Arc::clone(&hits);
            let slot = Arc::clone(&slot);
            Callback::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = slot.lock().unwrap().as_ref() {
                    set.remove("tick", me);
                }
            })
        };
        *slot.lock().unwrap() = Some(cb.clone());
        set.add("tick", cb);

        assert_eq!(set.fire("tick", &Value::Null), 1);
        assert_eq!(set.fire("tick", &Value::Null), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
