//! Capability registry.
//!
//! Maps a canonical method name to where its callback argument sits and
//! whether the method registers or deregisters that callback. Entries can be
//! added but never replaced.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Whether a capability installs or removes a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The method registers a callback.
    Register,
    /// The method removes a previously registered callback.
    Deregister,
}

/// How a capability method takes its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Zero-based position of the callback argument, if the method takes one.
    #[serde(default)]
    pub callback_index: Option<usize>,
    /// Register or deregister.
    pub direction: Direction,
}

impl CapabilityDescriptor {
    /// A registering method with its callback at `index`.
    #[must_use]
    pub const fn register(index: usize) -> Self {
        Self {
            callback_index: Some(index),
            direction: Direction::Register,
        }
    }

    /// A deregistering method with its callback at `index`.
    #[must_use]
    pub const fn deregister(index: usize) -> Self {
        Self {
            callback_index: Some(index),
            direction: Direction::Deregister,
        }
    }
}

/// Descriptors installed in every baseline registry.
pub const BASELINE_CAPABILITIES: &[(&str, CapabilityDescriptor)] = &[
    ("register-listener", CapabilityDescriptor::register(1)),
    ("deregister-listener", CapabilityDescriptor::deregister(1)),
    ("set-timer", CapabilityDescriptor::register(0)),
    ("clear-timer", CapabilityDescriptor::deregister(0)),
    ("set-interval", CapabilityDescriptor::register(0)),
    ("clear-interval", CapabilityDescriptor::deregister(0)),
    ("subscribe", CapabilityDescriptor::register(1)),
    ("unsubscribe", CapabilityDescriptor::deregister(1)),
    ("remove-subscription", CapabilityDescriptor::deregister(1)),
];

/// Append-only table of capability descriptors.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    entries: RwLock<HashMap<String, CapabilityDescriptor>>,
}

impl CapabilityRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with [`BASELINE_CAPABILITIES`].
    #[must_use]
    pub fn with_baseline() -> Self {
        let entries = BASELINE_CAPABILITIES
            .iter()
            .map(|(name, descriptor)| ((*name).to_string(), *descriptor))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn is_capability(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Look up a descriptor.
    ///
    /// # Errors
    /// `RegistryError::NotFound` when `name` has no descriptor.
    pub fn get(&self, name: &str) -> Result<CapabilityDescriptor, RegistryError> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_string(),
            })
    }

    /// Insert a descriptor for a new name.
    ///
    /// # Errors
    /// `RegistryError::Duplicate` when `name` is already registered; the
    /// existing descriptor is left untouched.
    pub fn try_add(
        &self,
        name: impl Into<String>,
        descriptor: CapabilityDescriptor,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&name) {
            return Err(RegistryError::Duplicate { name });
        }
        entries.insert(name, descriptor);
        Ok(())
    }

    /// Insert a descriptor for a new name. Returns false if the name exists.
    pub fn add(&self, name: impl Into<String>, descriptor: CapabilityDescriptor) -> bool {
        self.try_add(name, descriptor).is_ok()
    }

    /// Sorted snapshot of registered names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_descriptors_are_installed() {
        let registry = CapabilityRegistry::with_baseline();
        assert_eq!(registry.names().len(), BASELINE_CAPABILITIES.len());
        assert_eq!(
            registry.get("register-listener").unwrap(),
            CapabilityDescriptor::register(1)
        );
        assert_eq!(
            registry.get("clear-interval").unwrap(),
            CapabilityDescriptor::deregister(0)
        );
        assert_eq!(
            registry.get("remove-subscription").unwrap().direction,
            Direction::Deregister
        );
    }

    #[test]
    fn unknown_name_is_not_found() {
        let registry = CapabilityRegistry::with_baseline();
        assert!(!registry.is_capability("emit"));
        assert_eq!(
            registry.get("emit").unwrap_err(),
            RegistryError::NotFound {
                name: "emit".to_string()
            }
        );
    }

    #[test]
    fn existing_names_are_never_overwritten() {
        let registry = CapabilityRegistry::with_baseline();
        assert!(!registry.add("set-timer", CapabilityDescriptor::deregister(3)));
        assert_eq!(registry.get("set-timer").unwrap(), CapabilityDescriptor::register(0));
        assert!(matches!(
            registry.try_add("set-timer", CapabilityDescriptor::register(0)),
            Err(RegistryError::Duplicate { .. })
        ));
    }

    #[test]
    fn new_names_are_added() {
        let registry = CapabilityRegistry::new();
        assert!(registry.add("custom-immediate", CapabilityDescriptor::register(0)));
        assert!(registry.is_capability("custom-immediate"));
        assert_eq!(registry.names(), vec!["custom-immediate".to_string()]);
    }

    #[test]
    fn descriptor_deserializes_without_index() {
        let descriptor: CapabilityDescriptor =
            serde_json::from_str(r#"{"direction":"register"}"#).unwrap();
        assert_eq!(descriptor.callback_index, None);
        assert_eq!(descriptor.direction, Direction::Register);
    }
}
