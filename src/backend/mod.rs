//! Protocol backends and their registry
//!
//! A backend implements one download protocol behind a uniform asynchronous
//! contract; the registry maps module tags to backend instances. The registry
//! is built once at startup by the manager, single-threaded, then frozen
//! behind an `Arc` — single-writer-at-init, many-readers thereafter.

mod fake;
mod http;
mod local;

pub use fake::FakeBackend;
pub use http::HttpBackend;
pub use local::LocalBackend;

use crate::completion::Completion;
use crate::error::{RegistryError, Result};
use crate::transfer::Transfer;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A pluggable implementation of one download protocol
///
/// `begin` is called once per transfer and must eventually resolve or reject
/// the returned completion exactly once. Failures are never surfaced
/// synchronously; a backend that cannot start rejects the completion instead.
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// URL schemes this backend advertises
    ///
    /// Informational only: the registry dispatches by module tag, not by
    /// scheme matching.
    fn schemes(&self) -> &[&str];

    /// Start a transfer and return its completion handle
    async fn begin(&self, transfer: Arc<Transfer>) -> Completion;
}

/// Module tag → backend instance mapping
///
/// Owned by the manager and populated once at startup; lookups after that are
/// read-only through a shared reference.
#[derive(Default)]
pub struct BackendRegistry {
    entries: HashMap<String, Arc<dyn Backend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under a module tag
    ///
    /// Fails with `DuplicateModule` when the tag is already taken, leaving the
    /// first registration intact.
    pub fn register(&mut self, tag: &str, backend: Arc<dyn Backend>) -> Result<()> {
        if self.entries.contains_key(tag) {
            return Err(RegistryError::DuplicateModule {
                tag: tag.to_string(),
            }
            .into());
        }
        self.entries.insert(tag.to_string(), backend);
        Ok(())
    }

    /// Look up a backend by module tag
    pub fn resolve(&self, tag: &str) -> Result<Arc<dyn Backend>> {
        self.entries
            .get(tag)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownModule {
                tag: tag.to_string(),
            }
            .into())
    }

    /// Registered module tags, for introspection
    pub fn tags(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Advertised schemes of a registered module, for introspection
    pub fn schemes(&self, tag: &str) -> Result<Vec<String>> {
        let backend = self.resolve(tag)?;
        Ok(backend.schemes().iter().map(|s| s.to_string()).collect())
    }
}
