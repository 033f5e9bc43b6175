//! Host object model.
//!
//! A host is the object being wrapped: anything that exposes methods taking
//! callbacks. Hosts describe themselves with a declarative method table
//! ([`HostObject::methods`]); the interception layer consults the capability
//! registry against that table instead of reflecting over arbitrary members.

use std::fmt;
use std::sync::Arc;

use crate::error::{HostError, HostResult};
use crate::stream::{Callback, Stream};
use crate::value::Value;

/// Event emitter host.
pub mod emitter;
/// Shared listener bookkeeping for reference hosts.
pub mod listeners;
/// Document-like node tree host.
pub mod node;
/// Timer hosts (virtual clock and worker thread).
pub mod timers;

pub use emitter::Emitter;
pub use listeners::ListenerSet;
pub use node::Node;
pub use timers::{ManualTimers, ThreadTimers, TimerConfig};

/// Shared handle to a host object.
pub type HostRef = Arc<dyn HostObject>;

/// An argument passed to a host method.
#[derive(Debug, Clone)]
pub enum Arg {
    /// A plain value.
    Value(Value),
    /// A callback the host may invoke later.
    Callback(Callback),
    /// A stream handle. Only meaningful to deregistering capabilities; the
    /// interception layer replaces it before the host sees the call.
    Stream(Stream),
}

impl Arg {
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_callback(&self) -> Option<&Callback> {
        match self {
            Self::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_stream(&self) -> Option<&Stream> {
        match self {
            Self::Stream(s) => Some(s),
            _ => None,
        }
    }
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Self::Value(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Self::Value(Value::from(v))
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Self::Value(Value::Int(v))
    }
}

impl From<Callback> for Arg {
    fn from(cb: Callback) -> Self {
        Self::Callback(cb)
    }
}

impl From<Stream> for Arg {
    fn from(s: Stream) -> Self {
        Self::Stream(s)
    }
}

impl From<&Stream> for Arg {
    fn from(s: &Stream) -> Self {
        Self::Stream(s.clone())
    }
}

/// A function value handed out by a host. The receiver is already bound.
#[derive(Clone)]
pub struct HostFn(Arc<dyn Fn(Vec<Arg>) -> HostResult<Member> + Send + Sync>);

impl HostFn {
    pub fn new(func: impl Fn(Vec<Arg>) -> HostResult<Member> + Send + Sync + 'static) -> Self {
        Self(Arc::new(func))
    }

    /// Invoke the function.
    ///
    /// # Errors
    /// Whatever the host function reports.
    pub fn call(&self, args: Vec<Arg>) -> HostResult<Member> {
        (self.0)(args)
    }
}

impl fmt::Debug for HostFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostFn")
    }
}

/// What reading a member of (or calling) a host yields.
#[derive(Clone)]
pub enum Member {
    /// A method listed in the host's method table.
    Method,
    /// A nested object.
    Object(HostRef),
    /// A homogeneous collection of like objects.
    Collection(Vec<HostRef>),
    /// A function value.
    Function(HostFn),
    /// A scalar value.
    Value(Value),
    /// Nothing under that name.
    Absent,
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method => f.write_str("Method"),
            Self::Object(host) => write!(f, "Object({})", host.shape()),
            Self::Collection(hosts) => write!(f, "Collection(len={})", hosts.len()),
            Self::Function(_) => f.write_str("Function"),
            Self::Value(v) => write!(f, "Value({v})"),
            Self::Absent => f.write_str("Absent"),
        }
    }
}

/// An object that can be wrapped.
pub trait HostObject: Send + Sync {
    /// Short name of the host type, used in diagnostics.
    fn shape(&self) -> &'static str;

    /// The methods this host exposes.
    fn methods(&self) -> &'static [&'static str];

    /// Read a non-method member.
    fn property(&self, _name: &str) -> Member {
        Member::Absent
    }

    /// Call a method from the method table.
    ///
    /// # Errors
    /// `HostError::UnknownMethod` for names outside the table, or argument
    /// errors reported by the host.
    fn invoke(&self, method: &str, args: Vec<Arg>) -> HostResult<Member>;

    fn has_method(&self, name: &str) -> bool {
        self.methods().iter().any(|m| *m == name)
    }

    /// Read any member, methods included.
    fn member(&self, name: &str) -> Member {
        if self.has_method(name) {
            Member::Method
        } else {
            self.property(name)
        }
    }
}

pub(crate) fn unknown_method(shape: &'static str, method: &str) -> HostError {
    HostError::UnknownMethod {
        shape,
        method: method.to_string(),
    }
}

pub(crate) fn string_arg<'a>(method: &str, args: &'a [Arg], index: usize) -> HostResult<&'a str> {
    match args.get(index) {
        Some(Arg::Value(Value::String(s))) => Ok(s),
        Some(_) => Err(HostError::InvalidArgument {
            method: method.to_string(),
            index,
            reason: "expected a string".to_string(),
        }),
        None => Err(HostError::MissingArgument {
            method: method.to_string(),
            index,
        }),
    }
}

pub(crate) fn callback_arg(method: &str, args: &[Arg], index: usize) -> HostResult<Callback> {
    match args.get(index) {
        Some(Arg::Callback(cb)) => Ok(cb.clone()),
        Some(_) => Err(HostError::InvalidArgument {
            method: method.to_string(),
            index,
            reason: "expected a callback".to_string(),
        }),
        None => Err(HostError::MissingArgument {
            method: method.to_string(),
            index,
        }),
    }
}

pub(crate) fn value_arg(args: &[Arg], index: usize) -> Value {
    args.get(index)
        .and_then(Arg::as_value)
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;

    impl HostObject for Probe {
        fn shape(&self) -> &'static str {
            "probe"
        }

        fn methods(&self) -> &'static [&'static str] {
            &["ping"]
        }

        fn property(&self, name: &str) -> Member {
            match name {
                "answer" => Member::Value(Value::Int(42)),
                _ => Member::Absent,
            }
        }

        fn invoke(&self, method: &str, _args: Vec<Arg>) -> HostResult<Member> {
            match method {
                "ping" => Ok(Member::Value(Value::from("pong"))),
                other => Err(unknown_method(self.shape(), other)),
            }
        }
    }

    #[test]
    fn member_prefers_method_table() {
        let probe = Probe;
        assert!(matches!(probe.member("ping"), Member::Method));
        assert!(matches!(probe.member("answer"), Member::Value(Value::Int(42))));
        assert!(matches!(probe.member("missing"), Member::Absent));
    }

    #[test]
    fn argument_helpers_report_position() {
        let args = vec![Arg::from(7), Arg::from("click")];
        assert_eq!(string_arg("m", &args, 1).unwrap(), "click");
        assert!(matches!(
            string_arg("m", &args, 0),
            Err(HostError::InvalidArgument { index: 0, .. })
        ));
        assert!(matches!(
            callback_arg("m", &args, 2),
            Err(HostError::MissingArgument { index: 2, .. })
        ));
        assert_eq!(value_arg(&args, 0), Value::Int(7));
        assert_eq!(value_arg(&args, 5), Value::Null);
    }
}
