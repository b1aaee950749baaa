//! Prefixed views over a `SecretsManager`.
//!
//! A namespace maps a raw name such as `github` to the stored name
//! `apikey_github` and back.  It holds no state of its own.

use zeroize::Zeroizing;

use crate::errors::Result;
use crate::manager::SecretsManager;

/// Prefix used for API keys.
pub const API_KEY_PREFIX: &str = "apikey_";

/// A key-prefixing view of a manager.
#[derive(Clone, Copy)]
pub struct Namespace<'a> {
    manager: &'a SecretsManager,
    prefix: &'a str,
}

impl<'a> Namespace<'a> {
    pub fn new(manager: &'a SecretsManager, prefix: &'a str) -> Self {
        Self { manager, prefix }
    }

    /// The `apikey_` namespace.
    pub fn api_keys(manager: &'a SecretsManager) -> Self {
        Self::new(manager, API_KEY_PREFIX)
    }

    pub fn prefix(&self) -> &str {
        self.prefix
    }

    fn full_name(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    pub fn store(&self, name: &str, value: &[u8]) -> Result<()> {
        self.manager.store(&self.full_name(name), value)
    }

    pub fn retrieve(&self, name: &str) -> Result<Zeroizing<Vec<u8>>> {
        self.manager.retrieve(&self.full_name(name))
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.manager.delete(&self.full_name(name))
    }

    pub fn exists(&self, name: &str) -> Result<bool> {
        self.manager.exists(&self.full_name(name))
    }

    /// Raw names in this namespace, prefix stripped, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .manager
            .list()?
            .into_iter()
            .filter_map(|name| {
                name.strip_prefix(self.prefix)
                    .filter(|raw| !raw.is_empty())
                    .map(str::to_string)
            })
            .collect())
    }
}
