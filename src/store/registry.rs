//! Scheme-based lookup of path stores

use crate::store::credentials::AnonymousCredentials;
use crate::store::local::LocalPathStore;
use crate::store::memory::MemoryObjectClient;
use crate::store::object::ObjectPathStore;
use crate::store::path::split_scheme;
use crate::store::{PathStore, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Scheme of the in-process object store
pub const MEMORY_SCHEME: &str = "mem://";

/// Routes paths to the store serving their scheme.
///
/// Stores are shared behind [`Arc`], so every caller resolving the same
/// scheme reuses one store and with it one lazily created backend client.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: Vec<Arc<dyn PathStore>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the local filesystem and the `mem://` object store
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LocalPathStore::new()));
        registry.register(Arc::new(ObjectPathStore::new(
            MEMORY_SCHEME,
            AnonymousCredentials,
            |_| Ok(MemoryObjectClient::new()),
        )));
        registry
    }

    /// Add a store; later registrations win for the same scheme
    pub fn register(&mut self, store: Arc<dyn PathStore>) {
        debug!(schemes = ?store.schemes(), "Registered path store");
        self.stores.insert(0, store);
    }

    /// Store serving the scheme of `path`
    pub fn for_path(&self, path: &str) -> Result<Arc<dyn PathStore>, StoreError> {
        let (scheme, _) = split_scheme(path);
        self.stores
            .iter()
            .find(|store| store.schemes().iter().any(|served| *served == scheme))
            .cloned()
            .ok_or_else(|| StoreError::UnsupportedScheme(path.to_string()))
    }

    pub fn schemes(&self) -> Vec<&'static str> {
        let mut schemes: Vec<&'static str> = self
            .stores
            .iter()
            .flat_map(|store| store.schemes().iter().copied())
            .collect();
        schemes.sort_unstable();
        schemes.dedup();
        schemes
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("schemes", &self.schemes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_by_scheme() {
        let registry = StoreRegistry::with_defaults();

        assert_eq!(registry.for_path("mem://bucket/a").unwrap().schemes(), [MEMORY_SCHEME]);
        assert!(registry.for_path("/tmp/a").unwrap().schemes().contains(&""));
        assert!(registry.for_path("file:///tmp/a").unwrap().schemes().contains(&"file://"));
        assert!(matches!(
            registry.for_path("s3://bucket/a"),
            Err(StoreError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_same_scheme_shares_store() {
        let registry = StoreRegistry::with_defaults();
        let first = registry.for_path("mem://bucket/a").unwrap();
        first.makedirs("mem://bucket/shared").unwrap();

        let second = registry.for_path("mem://bucket/b").unwrap();
        assert!(second.isdir("mem://bucket/shared").unwrap());
    }

    #[test]
    fn test_schemes_are_listed_once() {
        let registry = StoreRegistry::with_defaults();
        assert_eq!(registry.schemes(), ["", "file://", "mem://"]);
    }
}
