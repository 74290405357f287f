//! Request and response bodies for the backend JSON endpoints.
//!
//! Field names follow the backend's snake_case wire format. Response fields
//! that later steps depend on are `Option` so that their absence is reported
//! as a contract error by the caller instead of a decode error.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct UploadSlotRequest<'a> {
    pub file_name: &'a str,
    pub file_type: &'a str,
    pub user_id: u64,
    pub telegram_init_data: &'a str,
}

/// Response of `generate-upload-url`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadSlotResponse {
    /// Presigned or native-API upload endpoint.
    #[serde(default)]
    pub upload_url: Option<String>,
    /// Backend-assigned object key.
    #[serde(default)]
    pub object_key: Option<String>,
    /// Backend-assigned product identifier, sent as a string or a number.
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub product_id: Option<String>,
    /// Upload token for the native object-storage API.
    #[serde(default)]
    pub authorization_token: Option<String>,
    /// Content type the storage expects.
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PathSlotRequest<'a> {
    pub object_key: &'a str,
    pub content_type: &'a str,
    pub user_id: u64,
    pub telegram_init_data: &'a str,
}

/// Response of `get-upload-url-for-path`; never carries a product id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathSlotResponse {
    /// Upload endpoint for the requested path.
    #[serde(default)]
    pub upload_url: Option<String>,
    /// Echo of the requested object key.
    #[serde(default)]
    pub object_key: Option<String>,
    /// Upload token for the native object-storage API.
    #[serde(default)]
    pub authorization_token: Option<String>,
    /// Content type the storage expects.
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Product fields sent with `import-complete`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    /// Product title.
    pub title: String,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Price in the shop currency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Category, chosen from the backend's category list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Platform the product was imported from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_from: Option<String>,
    /// Listing URL on that platform.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_url: Option<String>,
    /// Cover image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CompletionRequest<'a> {
    pub object_key: &'a str,
    pub file_name: &'a str,
    pub file_size: u64,
    pub user_id: u64,
    pub telegram_init_data: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_metadata: Option<&'a ProductMetadata>,
}

/// Response of `upload-complete` / `import-complete`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    /// Backend status label.
    #[serde(default)]
    pub status: Option<String>,
    /// Public URL of the stored object, when the backend returns one.
    #[serde(default)]
    pub b2_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct VerifyPurchaseRequest<'a> {
    pub product_id: &'a str,
    pub user_id: u64,
    pub telegram_init_data: &'a str,
}

/// Verified purchase returned by `verify-purchase`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PurchaseRecord {
    /// Title shown to the buyer and used as the default file name.
    pub product_title: String,
    /// File size as reported by the backend, in MiB.
    #[serde(default)]
    pub file_size_mb: f64,
    /// Number of previous downloads.
    #[serde(default)]
    pub download_count: u64,
    /// Whether a file is attached to the product.
    pub has_file: bool,
    /// Order that proves the purchase.
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    /// The purchased product.
    #[serde(deserialize_with = "string_or_number")]
    pub product_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct DownloadRequest<'a> {
    pub product_id: &'a str,
    pub order_id: &'a str,
    pub user_id: u64,
    pub telegram_init_data: &'a str,
}

/// Response of `generate-download-url`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadUrlResponse {
    /// Presigned GET URL.
    #[serde(default)]
    pub download_url: Option<String>,
    /// Suggested file name.
    #[serde(default)]
    pub file_name: Option<String>,
    /// File size in MiB.
    #[serde(default)]
    pub file_size_mb: Option<f64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClientErrorReport<'a> {
    pub error_type: &'a str,
    pub details: &'a serde_json::Value,
    pub user_id: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CategoriesResponse {
    #[serde(default)]
    pub categories: Vec<String>,
}

/// Product listed by `import-products`, awaiting its file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ImportProduct {
    /// Product title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Price.
    #[serde(default)]
    pub price: Option<f64>,
    /// Category detected at import time.
    #[serde(default)]
    pub category: Option<String>,
    /// Listing URL on the source platform.
    #[serde(default, alias = "gumroad_url")]
    pub source_url: Option<String>,
    /// Cover image.
    #[serde(default)]
    pub cover_image_url: Option<String>,
    /// Fallback image.
    #[serde(default)]
    pub image_url: Option<String>,
}

impl ImportProduct {
    /// Builds the metadata sent with `import-complete`.
    #[must_use]
    pub fn to_metadata(&self, imported_from: &str) -> ProductMetadata {
        ProductMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            price: self.price,
            category: self.category.clone(),
            imported_from: Some(imported_from.to_string()),
            imported_url: self.source_url.clone(),
            cover_image_url: self.cover_image_url.clone().or_else(|| self.image_url.clone()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ImportProductsResponse {
    #[serde(default)]
    pub products: Vec<ImportProduct>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Identifier {
    Text(String),
    Number(serde_json::Number),
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        match id {
            Identifier::Text(text) => text,
            Identifier::Number(number) => number.to_string(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Identifier::deserialize(deserializer).map(String::from)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Identifier>::deserialize(deserializer)?.map(String::from))
}
