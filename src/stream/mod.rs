//! Stream engine.
//!
//! Values delivered by a host flow into a root [`Stream`], are folded through
//! every child pipeline in attachment order, and are then handed to value
//! listeners in registration order. Dispatch is synchronous and runs to
//! completion before returning to the host.

/// Callables with identity.
pub mod callback;
/// Identity tokens.
pub mod ids;
/// Root and child stream nodes.
pub mod node;

pub use callback::{Callback, Listener, Transform};
pub use ids::{CallbackId, ListenerId, StreamId};
pub use node::Stream;
