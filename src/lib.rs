//! # hookstream - callback registrations as push streams
//!
//! hookstream wraps objects that accept callbacks (event emitters, timer
//! services, document-like node trees) so that their registration methods
//! return a [`Stream`] instead of taking a callback. Values the host delivers
//! flow into the root stream, through every derived pipeline, and out to value
//! listeners.
//!
//! ## Core Concepts
//!
//! - **Capability**: a host method that registers or removes a callback, with
//!   the callback's argument position
//! - **Alias**: a shorthand method name resolved to a canonical capability
//! - **Root stream**: receives raw host values through its dispatch adapter
//! - **Child stream**: a pipeline of fold transforms attached to a root
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hookstream::{Arg, Emitter, Engine, Listener};
//!
//! let engine = Engine::default();
//! let bus = Arc::new(Emitter::new("bus"));
//! let wrapped = engine.wrap(bus.clone());
//!
//! let data = wrapped.call("add", vec![Arg::from("data")])?.into_stream().unwrap();
//! let doubled = data.pipe(|_, raw| (raw.as_int().unwrap_or(0) * 2).into());
//! doubled.on_value(&Listener::new(|v| println!("{v}")));
//!
//! bus.emit("data", 21); // prints 42
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod value;

// Stream engine and capability tables
pub mod capability;
pub mod stream;

// Hosts and interception
pub mod engine;
pub mod host;
pub mod intercept;

pub use capability::{AliasTable, CapabilityDescriptor, CapabilityRegistry, Direction};
pub use engine::{Engine, EngineConfig};
pub use error::{
    HookError, HookResult, HostError, HostResult, InterceptError, RegistryError, StreamError,
};
pub use host::{
    Arg, Emitter, HostFn, HostObject, HostRef, ListenerSet, ManualTimers, Member, Node,
    ThreadTimers, TimerConfig,
};
pub use intercept::{CapabilityMethod, Property, Returned, Wrapped, WrappedFn, WrappedMethod};
pub use stream::{Callback, CallbackId, Listener, ListenerId, Stream, StreamId, Transform};
pub use value::Value;
