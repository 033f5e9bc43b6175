//! The wrapping facade.
//!
//! A [`Wrapped`] stands in front of a host object (or a homogeneous collection
//! of them). Reading a member consults the engine's alias table and capability
//! registry first; everything else is passed through, with objects,
//! collections and functions wrapped again so access chains stay intercepted
//! at any depth.

use std::fmt;
use std::sync::Arc;

use crate::engine::Engine;
use crate::error::{HookResult, InterceptError};
use crate::host::{Arg, HostFn, HostRef, Member};
use crate::stream::Stream;
use crate::value::Value;

use super::adapter::CapabilityMethod;

#[derive(Clone)]
pub(crate) enum Target {
    One(HostRef),
    Many(Arc<[HostRef]>),
}

impl Target {
    /// The object whose method table decides what a member read means.
    fn representative(&self) -> Option<&HostRef> {
        match self {
            Self::One(host) => Some(host),
            Self::Many(hosts) => hosts.first(),
        }
    }
}

/// A host object (or collection of like objects) behind the interception layer.
#[derive(Clone)]
pub struct Wrapped {
    engine: Engine,
    target: Target,
}

impl Wrapped {
    pub(crate) fn object(engine: Engine, host: HostRef) -> Self {
        Self {
            engine,
            target: Target::One(host),
        }
    }

    pub(crate) fn collection(engine: Engine, hosts: Vec<HostRef>) -> Self {
        Self {
            engine,
            target: Target::Many(hosts.into()),
        }
    }

    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self.target, Target::Many(_))
    }

    /// Number of wrapped objects (1 for a single object).
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.target {
            Target::One(_) => 1,
            Target::Many(hosts) => hosts.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape of the wrapped object, or of the collection's first member.
    #[must_use]
    pub fn shape(&self) -> Option<&'static str> {
        self.target.representative().map(|host| host.shape())
    }

    /// The underlying object, when a single object is wrapped.
    #[must_use]
    pub fn host(&self) -> Option<&HostRef> {
        match &self.target {
            Target::One(host) => Some(host),
            Target::Many(_) => None,
        }
    }

    /// Read a member.
    ///
    /// Capability methods (after alias resolution) come back as
    /// [`Property::Capability`]; nested objects, collections and functions
    /// come back wrapped; scalar values are returned unchanged.
    #[must_use]
    pub fn get(&self, name: &str) -> Property {
        let canonical = self.engine.aliases().resolve(name);
        let callable = self
            .target
            .representative()
            .is_some_and(|host| host.has_method(&canonical));
        if callable && self.engine.registry().is_capability(&canonical) {
            return Property::Capability(CapabilityMethod::new(
                self.engine.clone(),
                self.target.clone(),
                canonical,
            ));
        }

        match &self.target {
            Target::One(host) => match host.member(name) {
                Member::Method => Property::Method(WrappedMethod {
                    engine: self.engine.clone(),
                    host: Arc::clone(host),
                    name: name.to_string(),
                }),
                other => match wrap_member(&self.engine, other) {
                    Returned::Object(wrapped) => Property::Object(wrapped),
                    Returned::Function(func) => Property::Function(func),
                    Returned::Value(value) => Property::Value(value),
                    Returned::Stream(_) | Returned::Nothing => Property::Absent,
                },
            },
            Target::Many(hosts) => {
                if name == "length" {
                    return Property::Value(Value::Int(hosts.len() as i64));
                }
                name.parse::<usize>()
                    .ok()
                    .and_then(|index| hosts.get(index))
                    .map_or(Property::Absent, |host| {
                        Property::Object(Self::object(self.engine.clone(), Arc::clone(host)))
                    })
            }
        }
    }

    /// Read `name` and invoke it.
    ///
    /// # Errors
    /// `InterceptError::NotCallable` when the member is not a method or
    /// function, plus anything the invoked member reports.
    pub fn call(&self, name: &str, args: Vec<Arg>) -> HookResult<Returned> {
        match self.get(name) {
            Property::Capability(method) => method.call(args),
            Property::Method(method) => method.call(args),
            Property::Function(func) => func.call(args),
            Property::Object(_) | Property::Value(_) | Property::Absent => {
                Err(InterceptError::NotCallable {
                    name: name.to_string(),
                }
                .into())
            }
        }
    }
}

impl fmt::Debug for Wrapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped")
            .field("shape", &self.shape())
            .field("len", &self.len())
            .finish()
    }
}

/// Result of reading a member through a [`Wrapped`].
#[derive(Debug, Clone)]
pub enum Property {
    /// A capability method; calling it produces or tears down a stream.
    Capability(CapabilityMethod),
    /// An ordinary method, bound to its receiver.
    Method(WrappedMethod),
    /// A function value.
    Function(WrappedFn),
    /// A nested object or collection, wrapped.
    Object(Wrapped),
    /// A scalar value.
    Value(Value),
    /// No member under that name.
    Absent,
}

/// Result of calling through a [`Wrapped`].
#[derive(Debug, Clone)]
pub enum Returned {
    /// A registration produced a stream.
    Stream(Stream),
    /// The host returned an object or collection, wrapped.
    Object(Wrapped),
    /// The host returned a function, wrapped.
    Function(WrappedFn),
    /// The host returned a scalar value.
    Value(Value),
    /// Nothing flows back (child teardown, collection forwarding).
    Nothing,
}

impl Returned {
    #[must_use]
    pub fn into_stream(self) -> Option<Stream> {
        match self {
            Self::Stream(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_object(self) -> Option<Wrapped> {
        match self {
            Self::Object(w) => Some(w),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_function(self) -> Option<WrappedFn> {
        match self {
            Self::Function(f) => Some(f),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Option<Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// A non-capability host method bound to its receiver.
#[derive(Clone)]
pub struct WrappedMethod {
    engine: Engine,
    host: HostRef,
    name: String,
}

impl WrappedMethod {
    /// Delegate to the host and wrap the result.
    ///
    /// # Errors
    /// Whatever the host reports.
    pub fn call(&self, args: Vec<Arg>) -> HookResult<Returned> {
        let result = self.host.invoke(&self.name, args)?;
        Ok(wrap_member(&self.engine, result))
    }
}

impl fmt::Debug for WrappedMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrappedMethod")
            .field("shape", &self.host.shape())
            .field("name", &self.name)
            .finish()
    }
}

/// A host function behind the interception layer.
#[derive(Debug, Clone)]
pub struct WrappedFn {
    engine: Engine,
    func: HostFn,
}

impl WrappedFn {
    /// Delegate to the function and wrap the result.
    ///
    /// # Errors
    /// Whatever the function reports.
    pub fn call(&self, args: Vec<Arg>) -> HookResult<Returned> {
        let result = self.func.call(args)?;
        Ok(wrap_member(&self.engine, result))
    }
}

pub(crate) fn wrap_member(engine: &Engine, member: Member) -> Returned {
    match member {
        Member::Object(host) => Returned::Object(Wrapped::object(engine.clone(), host)),
        Member::Collection(hosts) => Returned::Object(Wrapped::collection(engine.clone(), hosts)),
        Member::Function(func) => Returned::Function(WrappedFn {
            engine: engine.clone(),
            func,
        }),
        Member::Value(value) => Returned::Value(value),
        Member::Method | Member::Absent => Returned::Nothing,
    }
}
