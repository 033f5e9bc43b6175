//! Shorthand names for capability methods.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::RegistryError;

/// Aliases installed in every baseline table.
pub const BASELINE_ALIASES: &[(&str, &str)] = &[
    ("add", "register-listener"),
    ("remove", "deregister-listener"),
];

/// Append-only map from alias to canonical method name.
#[derive(Debug, Default)]
pub struct AliasTable {
    entries: RwLock<HashMap<String, String>>,
}

impl AliasTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table seeded with [`BASELINE_ALIASES`].
    #[must_use]
    pub fn with_baseline() -> Self {
        let entries = BASELINE_ALIASES
            .iter()
            .map(|(alias, name)| ((*alias).to_string(), (*name).to_string()))
            .collect();
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// The canonical name for `name`, or `name` itself when it is not an alias.
    #[must_use]
    pub fn resolve(&self, name: &str) -> String {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Bind a new alias.
    ///
    /// # Errors
    /// `RegistryError::Duplicate` when `alias` is already bound.
    pub fn try_add(
        &self,
        alias: impl Into<String>,
        canonical: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let alias = alias.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&alias) {
            return Err(RegistryError::Duplicate { name: alias });
        }
        entries.insert(alias, canonical.into());
        Ok(())
    }

    /// Bind a new alias. Returns false if it is already bound.
    pub fn add(&self, alias: impl Into<String>, canonical: impl Into<String>) -> bool {
        self.try_add(alias, canonical).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_baseline_aliases() {
        let aliases = AliasTable::with_baseline();
        assert_eq!(aliases.resolve("add"), "register-listener");
        assert_eq!(aliases.resolve("remove"), "deregister-listener");
        assert_eq!(aliases.resolve("set-timer"), "set-timer");
    }

    #[test]
    fn bound_aliases_cannot_be_rebound() {
        let aliases = AliasTable::with_baseline();
        assert!(!aliases.add("add", "subscribe"));
        assert_eq!(aliases.resolve("add"), "register-listener");

        assert!(aliases.add("iOn", "set-interval"));
        assert_eq!(aliases.resolve("iOn"), "set-interval");
        assert!(!aliases.add("iOn", "set-timer"));
    }
}
