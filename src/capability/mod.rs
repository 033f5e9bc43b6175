//! Capability tables.
//!
//! A capability is a host method that registers or removes a callback. The
//! registry says where the callback argument sits; the alias table maps
//! shorthand names onto canonical ones. Both only ever grow.

/// Alias table.
pub mod alias;
/// Capability registry.
pub mod registry;

pub use alias::{AliasTable, BASELINE_ALIASES};
pub use registry::{CapabilityDescriptor, CapabilityRegistry, Direction, BASELINE_CAPABILITIES};
