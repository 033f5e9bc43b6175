//! Named-event emitter host.
//!
//! Listeners subscribe per event name with `register-listener` or
//! `subscribe` and are removed with any of the three deregistering methods.

use std::sync::Arc;

use crate::error::HostResult;
use crate::value::Value;

use super::listeners::ListenerSet;
use super::{callback_arg, string_arg, unknown_method, value_arg, Arg, HostFn, HostObject, Member};

const METHODS: &[&str] = &[
    "register-listener",
    "deregister-listener",
    "subscribe",
    "unsubscribe",
    "remove-subscription",
    "emit",
    "listener-count",
    "bind-emit",
];

/// An in-process event emitter.
#[derive(Debug, Default)]
pub struct Emitter {
    name: String,
    listeners: Arc<ListenerSet>,
}

impl Emitter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            listeners: Arc::new(ListenerSet::new()),
        }
    }

    /// Emit `value` to every listener of `event`. Returns how many ran.
    pub fn emit(&self, event: &str, value: impl Into<Value>) -> usize {
        self.listeners.fire(event, &value.into())
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.count(event)
    }
}

impl HostObject for Emitter {
    fn shape(&self) -> &'static str {
        "emitter"
    }

    fn methods(&self) -> &'static [&'static str] {
        METHODS
    }

    fn property(&self, name: &str) -> Member {
        match name {
            "name" => Member::Value(Value::String(self.name.clone())),
            _ => Member::Absent,
        }
    }

    fn invoke(&self, method: &str, args: Vec<Arg>) -> HostResult<Member> {
        match method {
            "register-listener" | "subscribe" => {
                let event = string_arg(method, &args, 0)?;
                let callback = callback_arg(method, &args, 1)?;
                self.listeners.add(event, callback);
                Ok(Member::Value(Value::Null))
            }
            "deregister-listener" | "unsubscribe" | "remove-subscription" => {
                let event = string_arg(method, &args, 0)?;
                let callback = callback_arg(method, &args, 1)?;
                Ok(Member::Value(Value::Bool(self.listeners.remove(event, &callback))))
            }
            "emit" => {
                let event = string_arg(method, &args, 0)?;
                let delivered = self.listeners.fire(event, &value_arg(&args, 1));
                Ok(Member::Value(Value::Int(delivered as i64)))
            }
            "listener-count" => {
                let event = string_arg(method, &args, 0)?;
                Ok(Member::Value(Value::Int(self.listeners.count(event) as i64)))
            }
            "bind-emit" => {
                let event = string_arg(method, &args, 0)?.to_string();
                let listeners = Arc::clone(&self.listeners);
                Ok(Member::Function(HostFn::new(move |args| {
                    let delivered = listeners.fire(&event, &value_arg(&args, 0));
                    Ok(Member::Value(Value::Int(delivered as i64)))
                })))
            }
            other => Err(unknown_method(self.shape(), other)),
        }
    }
}
