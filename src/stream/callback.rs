//! Callables with identity: host callbacks, value listeners and transforms.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

use super::ids::{CallbackId, ListenerId};

/// A callback a host invokes with each new value.
///
/// Clones share the same identity; two callbacks compare equal only if one
/// was cloned from the other.
#[derive(Clone)]
pub struct Callback {
    id: CallbackId,
    func: Arc<dyn Fn(Value) + Send + Sync>,
}

impl Callback {
    pub fn new(func: impl Fn(Value) + Send + Sync + 'static) -> Self {
        Self {
            id: CallbackId::new(),
            func: Arc::new(func),
        }
    }

    #[must_use]
    pub const fn id(&self) -> CallbackId {
        self.id
    }

    /// Invoke the callback.
    pub fn call(&self, value: Value) {
        (self.func)(value);
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Callback {}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callback").field("id", &self.id).finish()
    }
}

/// A value listener attached to a stream node.
///
/// Keep the `Listener` around to remove it later with `Stream::off_value`.
#[derive(Clone)]
pub struct Listener {
    id: ListenerId,
    func: Arc<dyn Fn(&Value) + Send + Sync>,
}

impl Listener {
    pub fn new(func: impl Fn(&Value) + Send + Sync + 'static) -> Self {
        Self {
            id: ListenerId::new(),
            func: Arc::new(func),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn notify(&self, value: &Value) {
        (self.func)(value);
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

/// One pipeline stage: `(accumulator, raw dispatched value) -> next accumulator`.
#[derive(Clone)]
pub struct Transform(Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>);

impl Transform {
    pub fn new(func: impl Fn(&Value, &Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(func))
    }

    pub(crate) fn apply(&self, acc: &Value, raw: &Value) -> Value {
        (self.0)(acc, raw)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;

    #[test]
    fn callback_identity_survives_clone() {
        let a = Callback::new(|_| {});
        let b = a.clone();
        let c = Callback::new(|_| {});
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn callback_invokes_closure() {
        let seen = Arc::new(AtomicI64::new(0));
        let sink = Arc::clone(&seen);
        let cb = Callback::new(move |v| {
            sink.store(v.as_int().unwrap_or(-1), Ordering::SeqCst);
        });
        cb.call(Value::Int(9));
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn transform_receives_accumulator_and_raw() {
        let t = Transform::new(|acc, raw| {
            Value::Int(acc.as_int().unwrap_or(0) + raw.as_int().unwrap_or(0))
        });
        assert_eq!(t.apply(&Value::Int(2), &Value::Int(5)), Value::Int(7));
    }
}
