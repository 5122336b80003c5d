use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::key::StoreKey;

/// Product attributes extracted by a store adapter.
///
/// Everything except the name is optional; store pages vary widely in
/// what structured data they expose.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub price: Option<f64>,
    pub price_string: Option<String>,
    pub price_per_unit: Option<f64>,
    pub price_per_unit_string: Option<String>,
    pub store_id: Option<String>,
    pub store_address: Option<String>,
    pub store_zip: Option<String>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
}

/// The cached last-known-good result for a (store, url) key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub store: String,
    pub url: String,
    pub name: String,
    pub price: Option<f64>,
    pub price_string: Option<String>,
    pub price_per_unit: Option<f64>,
    pub price_per_unit_string: Option<String>,
    pub store_id: Option<String>,
    pub store_address: Option<String>,
    pub store_zip: Option<String>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub fetched_at: DateTime<Utc>,
}

impl Product {
    pub fn from_info(key: &StoreKey, info: ProductInfo, fetched_at: DateTime<Utc>) -> Self {
        Self {
            store: key.store().to_string(),
            url: key.url().to_string(),
            name: info.name,
            price: info.price,
            price_string: info.price_string,
            price_per_unit: info.price_per_unit,
            price_per_unit_string: info.price_per_unit_string,
            store_id: info.store_id,
            store_address: info.store_address,
            store_zip: info.store_zip,
            brand: info.brand,
            sku: info.sku,
            category: info.category,
            fetched_at,
        }
    }
}
