use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::product::ProductInfo;

/// Error type for store adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("HTTP request to store failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("could not extract product data: {0}")]
    Extract(String),
}

/// Per-store fetch-and-extract capability.
///
/// The dispatch core treats this as an opaque asynchronous operation; it
/// has no knowledge of how a store's pages are parsed.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Normalized store name this adapter serves.
    fn store(&self) -> &str;

    /// Whether the URL looks like one of this store's product pages.
    fn matches_url(&self, url: &str) -> bool;

    async fn fetch(&self, url: &str) -> Result<ProductInfo, AdapterError>;
}

/// Store name to adapter mapping. Built once at startup; lookups are the
/// only way the dispatcher reaches store-specific code.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn StoreAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn StoreAdapter>) {
        self.adapters
            .insert(adapter.store().to_lowercase(), adapter);
    }

    pub fn get(&self, store: &str) -> Option<Arc<dyn StoreAdapter>> {
        self.adapters.get(store).cloned()
    }

    pub fn supported_stores(&self) -> Vec<String> {
        let mut stores: Vec<String> = self.adapters.keys().cloned().collect();
        stores.sort();
        stores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeAdapter {
        name: &'static str,
    }

    #[async_trait]
    impl StoreAdapter for FakeAdapter {
        fn store(&self) -> &str {
            self.name
        }

        fn matches_url(&self, url: &str) -> bool {
            url.contains(self.name)
        }

        async fn fetch(&self, _url: &str) -> Result<ProductInfo, AdapterError> {
            Ok(ProductInfo {
                name: "test".to_string(),
                ..Default::default()
            })
        }
    }

    #[test]
    fn test_lookup_is_case_normalized() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(FakeAdapter { name: "walmart" }));

        assert!(registry.get("walmart").is_some());
        assert!(registry.get("costco").is_none());
    }

    #[test]
    fn test_supported_stores_sorted() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(FakeAdapter { name: "walmart" }));
        registry.register(Arc::new(FakeAdapter { name: "albertsons" }));
        registry.register(Arc::new(FakeAdapter { name: "costco" }));

        assert_eq!(
            registry.supported_stores(),
            vec!["albertsons", "costco", "walmart"]
        );
    }
}
