//! Engine configuration and the `wrap` entry point.
//!
//! An [`Engine`] owns one capability registry and one alias table. Engines are
//! independent of each other: capabilities added to one are invisible to
//! another. Cloning an engine shares its tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::{AliasTable, CapabilityDescriptor, CapabilityRegistry};
use crate::error::{HookError, HookResult};
use crate::host::HostRef;
use crate::intercept::Wrapped;

/// Configuration for an [`Engine`].
///
/// Configured entries are added after the baseline; a name that is already
/// registered keeps its existing mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seed the registry and alias table with the baseline entries.
    pub include_baseline: bool,
    /// Additional capability descriptors by canonical name.
    pub capabilities: BTreeMap<String, CapabilityDescriptor>,
    /// Additional aliases (alias -> canonical name).
    pub aliases: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_baseline: true,
            capabilities: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
struct EngineInner {
    registry: CapabilityRegistry,
    aliases: AliasTable,
}

/// Capability tables plus the entry point for wrapping host objects.
#[derive(Debug, Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let (registry, aliases) = if config.include_baseline {
            (CapabilityRegistry::with_baseline(), AliasTable::with_baseline())
        } else {
            (CapabilityRegistry::new(), AliasTable::new())
        };

        for (name, descriptor) in config.capabilities {
            if let Err(err) = registry.try_add(name, descriptor) {
                warn!(%err, "configured capability ignored");
            }
        }
        for (alias, canonical) in config.aliases {
            if let Err(err) = aliases.try_add(alias, canonical) {
                warn!(%err, "configured alias ignored");
            }
        }

        Self {
            inner: Arc::new(EngineInner { registry, aliases }),
        }
    }

    /// Build an engine from a JSON-encoded [`EngineConfig`].
    ///
    /// # Errors
    /// `HookError::Config` when the JSON does not describe a valid config.
    pub fn from_json(json: &str) -> HookResult<Self> {
        let config: EngineConfig = serde_json::from_str(json).map_err(|e| HookError::Config {
            message: e.to_string(),
        })?;
        Ok(Self::new(config))
    }

    #[must_use]
    pub fn registry(&self) -> &CapabilityRegistry {
        &self.inner.registry
    }

    #[must_use]
    pub fn aliases(&self) -> &AliasTable {
        &self.inner.aliases
    }

    /// Register a new capability. Returns false if `name` already exists.
    pub fn add_capability(&self, name: impl Into<String>, descriptor: CapabilityDescriptor) -> bool {
        let name = name.into();
        let added = self.inner.registry.add(name.clone(), descriptor);
        debug!(%name, added, "add capability");
        added
    }

    /// Bind a new alias. Returns false if `alias` is already bound.
    pub fn add_alias(&self, alias: impl Into<String>, canonical: impl Into<String>) -> bool {
        let alias = alias.into();
        let added = self.inner.aliases.add(alias.clone(), canonical);
        debug!(%alias, added, "add alias");
        added
    }

    /// Wrap a single host object.
    #[must_use]
    pub fn wrap(&self, host: HostRef) -> Wrapped {
        Wrapped::object(self.clone(), host)
    }

    /// Wrap a homogeneous collection of host objects.
    #[must_use]
    pub fn wrap_all(&self, hosts: Vec<HostRef>) -> Wrapped {
        Wrapped::collection(self.clone(), hosts)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
