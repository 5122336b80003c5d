//! Generic storefront adapter.
//!
//! Retail product pages almost universally embed schema.org `Product`
//! markup, either as JSON-LD script blocks or as OpenGraph/product meta
//! tags. One adapter parameterized per store covers every supported
//! storefront without store-specific CSS scraping.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use std::time::Duration;

use crate::models::product::ProductInfo;
use crate::services::adapter::{AdapterError, StoreAdapter};

/// Known storefronts: store name and the domain its product URLs live on.
const BUILTIN_STOREFRONTS: &[(&str, &str)] = &[
    ("walmart", "walmart.com"),
    ("costco", "costco.com"),
    ("chefstore", "chefstore.com"),
    ("albertsons", "albertsons.com"),
];

pub struct StorefrontAdapter {
    store: String,
    domain: String,
    http: reqwest::Client,
}

impl StorefrontAdapter {
    pub fn new(
        store: &str,
        domain: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            store: store.to_lowercase(),
            domain: domain.to_string(),
            http,
        })
    }

    /// Adapters for every built-in storefront.
    pub fn builtin(
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Vec<StorefrontAdapter>, AdapterError> {
        BUILTIN_STOREFRONTS
            .iter()
            .map(|(store, domain)| StorefrontAdapter::new(store, domain, user_agent, timeout))
            .collect()
    }

    /// Pull product data out of a fetched page.
    ///
    /// JSON-LD is tried first since it carries the richest data; the
    /// OpenGraph product meta tags are the fallback.
    fn extract_product_info(&self, html: &str) -> Result<ProductInfo, AdapterError> {
        let document = Html::parse_document(html);

        if let Some(info) = self.extract_from_json_ld(&document) {
            return Ok(info);
        }
        if let Some(info) = self.extract_from_meta_tags(&document) {
            return Ok(info);
        }

        Err(AdapterError::Extract(
            "no schema.org product data or price metadata on page".to_string(),
        ))
    }

    fn extract_from_json_ld(&self, document: &Html) -> Option<ProductInfo> {
        let script_sel = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

        for script in document.select(&script_sel) {
            let raw: String = script.text().collect();
            let Ok(value) = serde_json::from_str::<Value>(&raw) else {
                continue;
            };
            if let Some(node) = find_product_node(&value) {
                if let Some(info) = product_info_from_node(node) {
                    return Some(info);
                }
            }
        }

        None
    }

    fn extract_from_meta_tags(&self, document: &Html) -> Option<ProductInfo> {
        let name = meta_content(document, r#"meta[property="og:title"]"#)?;
        let amount = meta_content(document, r#"meta[property="product:price:amount"]"#)?;
        let currency = meta_content(document, r#"meta[property="product:price:currency"]"#)
            .unwrap_or_else(|| "USD".to_string());

        let price: f64 = amount.trim().parse().ok()?;

        Some(ProductInfo {
            name,
            price: Some(price),
            price_string: Some(format_price(price, &currency)),
            ..Default::default()
        })
    }
}

#[async_trait]
impl StoreAdapter for StorefrontAdapter {
    fn store(&self) -> &str {
        &self.store
    }

    fn matches_url(&self, url: &str) -> bool {
        (url.starts_with("http://") || url.starts_with("https://")) && url.contains(&self.domain)
    }

    async fn fetch(&self, url: &str) -> Result<ProductInfo, AdapterError> {
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AdapterError::Status(response.status()));
        }

        let html = response.text().await?;
        self.extract_product_info(&html)
    }
}

/// Locate a schema.org Product object in a JSON-LD document. Pages wrap
/// the product in arrays or an `@graph` envelope, so this walks both.
fn find_product_node(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(map) => {
            let is_product = match map.get("@type") {
                Some(Value::String(t)) => t == "Product",
                Some(Value::Array(types)) => types.iter().any(|t| t == "Product"),
                _ => false,
            };
            if is_product {
                return Some(value);
            }
            if let Some(graph) = map.get("@graph") {
                return find_product_node(graph);
            }
            None
        }
        Value::Array(items) => items.iter().find_map(find_product_node),
        _ => None,
    }
}

fn product_info_from_node(node: &Value) -> Option<ProductInfo> {
    let name = node.get("name")?.as_str()?.trim().to_string();
    if name.is_empty() {
        return None;
    }

    // brand is either a plain string or a nested Brand object
    let brand = match node.get("brand") {
        Some(Value::String(b)) => Some(b.clone()),
        Some(Value::Object(b)) => b.get("name").and_then(Value::as_str).map(str::to_string),
        _ => None,
    };

    let sku = match node.get("sku") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let category = node.get("category").and_then(Value::as_str).map(str::to_string);

    let offers = match node.get("offers") {
        Some(Value::Array(items)) => items.first(),
        Some(offer @ Value::Object(_)) => Some(offer),
        _ => None,
    };

    let (price, price_string) = offers.map(extract_offer_price).unwrap_or((None, None));

    Some(ProductInfo {
        name,
        price,
        price_string,
        brand,
        sku,
        category,
        ..Default::default()
    })
}

fn extract_offer_price(offer: &Value) -> (Option<f64>, Option<String>) {
    let currency = offer
        .get("priceCurrency")
        .and_then(Value::as_str)
        .unwrap_or("USD");

    match offer.get("price") {
        Some(Value::Number(n)) => {
            let price = n.as_f64();
            (price, price.map(|p| format_price(p, currency)))
        }
        Some(Value::String(s)) => {
            let price = s.trim().trim_start_matches('$').parse::<f64>().ok();
            (price, Some(s.trim().to_string()))
        }
        _ => (None, None),
    }
}

fn format_price(price: f64, currency: &str) -> String {
    if currency == "USD" {
        format!("${:.2}", price)
    } else {
        format!("{:.2} {}", price, currency)
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    document
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> StorefrontAdapter {
        StorefrontAdapter::new(
            "walmart",
            "walmart.com",
            "test-agent",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_matches_url_requires_scheme_and_domain() {
        let adapter = adapter();
        assert!(adapter.matches_url("https://www.walmart.com/ip/milk/123"));
        assert!(adapter.matches_url("http://walmart.com/ip/123"));
        assert!(!adapter.matches_url("https://www.costco.com/milk.html"));
        assert!(!adapter.matches_url("walmart.com/ip/123"));
    }

    #[test]
    fn test_extract_json_ld_product() {
        let html = r#"
        <html><head>
        <script type="application/ld+json">
        {
            "@context": "https://schema.org",
            "@type": "Product",
            "name": "Whole Milk, 1 Gallon",
            "brand": {"@type": "Brand", "name": "Great Value"},
            "sku": "10450114",
            "category": "Dairy",
            "offers": {
                "@type": "Offer",
                "price": 3.98,
                "priceCurrency": "USD"
            }
        }
        </script>
        </head><body></body></html>
        "#;

        let info = adapter().extract_product_info(html).unwrap();
        assert_eq!(info.name, "Whole Milk, 1 Gallon");
        assert_eq!(info.price, Some(3.98));
        assert_eq!(info.price_string.as_deref(), Some("$3.98"));
        assert_eq!(info.brand.as_deref(), Some("Great Value"));
        assert_eq!(info.sku.as_deref(), Some("10450114"));
        assert_eq!(info.category.as_deref(), Some("Dairy"));
    }

    #[test]
    fn test_extract_json_ld_inside_graph() {
        let html = r#"
        <html><head>
        <script type="application/ld+json">
        {
            "@context": "https://schema.org",
            "@graph": [
                {"@type": "WebPage", "name": "Product page"},
                {
                    "@type": "Product",
                    "name": "Organic Eggs, 12 ct",
                    "brand": "Lucerne",
                    "offers": [{"price": "4.49", "priceCurrency": "USD"}]
                }
            ]
        }
        </script>
        </head><body></body></html>
        "#;

        let info = adapter().extract_product_info(html).unwrap();
        assert_eq!(info.name, "Organic Eggs, 12 ct");
        assert_eq!(info.price, Some(4.49));
        assert_eq!(info.price_string.as_deref(), Some("4.49"));
        assert_eq!(info.brand.as_deref(), Some("Lucerne"));
    }

    #[test]
    fn test_extract_price_string_with_dollar_sign() {
        let html = r#"
        <html><head>
        <script type="application/ld+json">
        {"@type": "Product", "name": "Butter", "offers": {"price": "$5.29"}}
        </script>
        </head></html>
        "#;

        let info = adapter().extract_product_info(html).unwrap();
        assert_eq!(info.price, Some(5.29));
        assert_eq!(info.price_string.as_deref(), Some("$5.29"));
    }

    #[test]
    fn test_extract_meta_tag_fallback() {
        let html = r#"
        <html><head>
        <meta property="og:title" content="Shredded Cheese, 32 oz" />
        <meta property="product:price:amount" content="8.99" />
        <meta property="product:price:currency" content="USD" />
        </head><body></body></html>
        "#;

        let info = adapter().extract_product_info(html).unwrap();
        assert_eq!(info.name, "Shredded Cheese, 32 oz");
        assert_eq!(info.price, Some(8.99));
        assert_eq!(info.price_string.as_deref(), Some("$8.99"));
    }

    #[test]
    fn test_extract_fails_without_product_data() {
        let err = adapter()
            .extract_product_info("<html><body><h1>404</h1></body></html>")
            .unwrap_err();
        assert!(matches!(err, AdapterError::Extract(_)));
    }

    #[test]
    fn test_malformed_json_ld_is_skipped() {
        let html = r#"
        <html><head>
        <script type="application/ld+json">{not valid json</script>
        <script type="application/ld+json">
        {"@type": "Product", "name": "Rice, 20 lb", "offers": {"price": 12.48, "priceCurrency": "USD"}}
        </script>
        </head></html>
        "#;

        let info = adapter().extract_product_info(html).unwrap();
        assert_eq!(info.name, "Rice, 20 lb");
        assert_eq!(info.price, Some(12.48));
    }

    #[test]
    fn test_builtin_storefronts_cover_supported_stores() {
        let adapters =
            StorefrontAdapter::builtin("test-agent", Duration::from_secs(5)).unwrap();
        let stores: Vec<&str> = adapters.iter().map(|a| a.store()).collect();
        assert_eq!(stores, vec!["walmart", "costco", "chefstore", "albertsons"]);
    }
}
