use std::fmt;

/// The unit of deduplication and caching: one store plus one product URL.
///
/// Store names are compared case-insensitively, so the constructor
/// normalizes them. Length bounds on URLs are enforced at the route layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreKey {
    store: String,
    url: String,
}

impl StoreKey {
    pub fn new(store: &str, url: &str) -> Self {
        Self {
            store: store.trim().to_lowercase(),
            url: url.trim().to_string(),
        }
    }

    pub fn store(&self) -> &str {
        &self.store
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.store, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_is_normalized() {
        let key = StoreKey::new("  Walmart ", "https://www.walmart.com/ip/123");
        assert_eq!(key.store(), "walmart");
        assert_eq!(key.url(), "https://www.walmart.com/ip/123");
    }

    #[test]
    fn test_normalized_keys_are_equal() {
        let a = StoreKey::new("COSTCO", " https://www.costco.com/p.html");
        let b = StoreKey::new("costco", "https://www.costco.com/p.html ");
        assert_eq!(a, b);
    }
}
