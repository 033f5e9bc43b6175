//! Interception layer.
//!
//! [`Wrapped`] is the facade over a host; [`CapabilityMethod`] is the
//! dispatch adapter factory that turns callback registrations into streams.

/// Capability method invocation.
pub mod adapter;
/// The wrapping facade.
pub mod wrapped;

pub use adapter::CapabilityMethod;
pub use wrapped::{Property, Returned, Wrapped, WrappedFn, WrappedMethod};
