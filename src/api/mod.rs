//! Typed client for the shop backend's mini-app endpoints.
//!
//! Every call forwards the caller's [`AuthContext`]. Status codes are mapped
//! once, here: 401 becomes [`TransferError::Auth`], other non-success codes
//! become [`TransferError::Server`] with the backend's `detail` text when the
//! body carries one. Purchase verification additionally maps 404 to
//! [`TransferError::NotPurchased`].
//!
//! # Example
//!
//! ```no_run
//! use transfer_core::{ApiClient, AuthContext, HttpTimeouts};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiClient::new("https://shop.example.com/api/", HttpTimeouts::default())?;
//! let auth = AuthContext::new("query_id=...&hash=...", 42)?;
//! let record = api.verify_purchase("TBF-1", &auth).await?;
//! println!("{} ({} MB)", record.product_title, record.file_size_mb);
//! # Ok(())
//! # }
//! ```

mod types;

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

pub use types::{
    CompletionResponse, DownloadUrlResponse, ImportProduct, PathSlotResponse, ProductMetadata,
    PurchaseRecord, UploadSlotResponse,
};
use types::{
    CategoriesResponse, ClientErrorReport, CompletionRequest, DownloadRequest, ErrorBody,
    ImportProductsResponse, PathSlotRequest, UploadSlotRequest, VerifyPurchaseRequest,
};

use crate::auth::AuthContext;
use crate::transfer::TransferError;
use crate::user_agent;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes, per read, for large files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Category used when the backend's category list cannot be loaded.
pub const DEFAULT_CATEGORY: &str = "Other";

/// Header carrying the session blob on GET endpoints.
pub const INIT_DATA_HEADER: &str = "X-Telegram-Init-Data";

/// Client-side timeouts applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,
    /// Idle timeout between reads in seconds.
    pub read_secs: u64,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect_secs: CONNECT_TIMEOUT_SECS,
            read_secs: READ_TIMEOUT_SECS,
        }
    }
}

/// Errors building an [`ApiClient`].
#[derive(Debug, Error)]
pub enum ApiClientError {
    /// The base URL cannot be parsed or cannot carry paths.
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Which completion endpoint to notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionEndpoint {
    /// `upload-complete`.
    Upload,
    /// `import-complete`.
    Import,
}

impl CompletionEndpoint {
    fn path(self) -> &'static str {
        match self {
            Self::Upload => "upload-complete",
            Self::Import => "import-complete",
        }
    }
}

/// Fields of a completion notice.
#[derive(Debug, Clone, Copy)]
pub struct Completion<'a> {
    /// Object key assigned by the upload slot.
    pub object_key: &'a str,
    /// Original file name.
    pub file_name: &'a str,
    /// Payload size in bytes.
    pub file_size: u64,
    /// Preview reference, when a preview was uploaded.
    pub preview_url: Option<&'a str>,
    /// Product fields for the import flow.
    pub product_metadata: Option<&'a ProductMetadata>,
}

/// Backend API client. Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// A trailing slash is added when missing so endpoint names join below it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError`] for an unusable base URL or when the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, timeouts: HttpTimeouts) -> Result<Self, ApiClientError> {
        let client = build_client(timeouts)?;
        Self::with_client(base_url, client)
    }

    /// Creates a client around an existing reqwest client.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::InvalidBaseUrl`] for an unusable base URL.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self, ApiClientError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized)
            .map_err(|e| ApiClientError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiClientError::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { client, base_url })
    }

    /// The underlying reqwest client, shared with the object-storage transports.
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Absolute URL of an endpoint.
    #[must_use]
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        self.base_url
            .join(endpoint)
            .map_or_else(|_| format!("{}{endpoint}", self.base_url), String::from)
    }

    /// Requests an upload slot; the backend assigns the object key and product id.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Auth`], [`TransferError::Server`],
    /// [`TransferError::Network`] or [`TransferError::Decode`].
    #[instrument(skip(self, auth), fields(user_id = auth.user_id()))]
    pub async fn request_upload_slot(
        &self,
        file_name: &str,
        mime_type: &str,
        auth: &AuthContext,
    ) -> Result<UploadSlotResponse, TransferError> {
        let body = UploadSlotRequest {
            file_name,
            file_type: mime_type,
            user_id: auth.user_id(),
            telegram_init_data: auth.init_data(),
        };
        let response = self.post_json("generate-upload-url", &body).await?;
        let response = check_status("generate-upload-url", response).await?;
        decode_json("generate-upload-url", response).await
    }

    /// Requests an upload slot for a caller-composed object key.
    ///
    /// # Errors
    ///
    /// Same as [`request_upload_slot`](Self::request_upload_slot).
    #[instrument(skip(self, auth), fields(user_id = auth.user_id()))]
    pub async fn request_path_slot(
        &self,
        object_key: &str,
        content_type: &str,
        auth: &AuthContext,
    ) -> Result<PathSlotResponse, TransferError> {
        let body = PathSlotRequest {
            object_key,
            content_type,
            user_id: auth.user_id(),
            telegram_init_data: auth.init_data(),
        };
        let response = self.post_json("get-upload-url-for-path", &body).await?;
        let response = check_status("get-upload-url-for-path", response).await?;
        decode_json("get-upload-url-for-path", response).await
    }

    /// Tells the backend the payload is stored.
    ///
    /// A 2xx response with an empty or non-JSON body is still a success.
    ///
    /// # Errors
    ///
    /// Returns the mapped status or transport error.
    #[instrument(
        skip(self, completion, auth),
        fields(object_key = completion.object_key, endpoint = endpoint.path())
    )]
    pub async fn notify_complete(
        &self,
        endpoint: CompletionEndpoint,
        completion: Completion<'_>,
        auth: &AuthContext,
    ) -> Result<CompletionResponse, TransferError> {
        let body = CompletionRequest {
            object_key: completion.object_key,
            file_name: completion.file_name,
            file_size: completion.file_size,
            user_id: auth.user_id(),
            telegram_init_data: auth.init_data(),
            preview_url: completion.preview_url,
            product_metadata: completion.product_metadata,
        };
        let response = self.post_json(endpoint.path(), &body).await?;
        let response = check_status(endpoint.path(), response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransferError::network(endpoint.path(), e))?;
        Ok(serde_json::from_slice(&bytes).unwrap_or_default())
    }

    /// Verifies that the user bought `product_id`.
    ///
    /// # Errors
    ///
    /// 404 → [`TransferError::NotPurchased`], 401 → [`TransferError::Auth`],
    /// other non-success → [`TransferError::Server`].
    #[instrument(skip(self, auth), fields(user_id = auth.user_id()))]
    pub async fn verify_purchase(
        &self,
        product_id: &str,
        auth: &AuthContext,
    ) -> Result<PurchaseRecord, TransferError> {
        let body = VerifyPurchaseRequest {
            product_id,
            user_id: auth.user_id(),
            telegram_init_data: auth.init_data(),
        };
        let response = self.post_json("verify-purchase", &body).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(TransferError::NotPurchased {
                product_id: product_id.to_string(),
            });
        }
        let response = check_status("verify-purchase", response).await?;
        decode_json("verify-purchase", response).await
    }

    /// Requests a presigned GET URL for a verified purchase.
    ///
    /// # Errors
    ///
    /// Returns the mapped status or transport error.
    #[instrument(skip(self, record, auth), fields(product_id = %record.product_id))]
    pub async fn generate_download_url(
        &self,
        record: &PurchaseRecord,
        auth: &AuthContext,
    ) -> Result<DownloadUrlResponse, TransferError> {
        let body = download_request(record, auth);
        let response = self.post_json("generate-download-url", &body).await?;
        let response = check_status("generate-download-url", response).await?;
        decode_json("generate-download-url", response).await
    }

    /// Opens the backend proxy stream for a verified purchase.
    ///
    /// # Errors
    ///
    /// Returns the mapped status or transport error.
    #[instrument(skip(self, record, auth), fields(product_id = %record.product_id))]
    pub async fn stream_download(
        &self,
        record: &PurchaseRecord,
        auth: &AuthContext,
    ) -> Result<Response, TransferError> {
        let body = download_request(record, auth);
        let response = self.post_json("stream-download", &body).await?;
        check_status("stream-download", response).await
    }

    /// Loads the category list, falling back to [`DEFAULT_CATEGORY`].
    #[instrument(skip(self))]
    pub async fn categories(&self) -> Vec<String> {
        let url = self.endpoint_url("categories");
        let loaded = match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                decode_json::<CategoriesResponse>("categories", response)
                    .await
                    .map(|body| body.categories)
            }
            Ok(response) => Err(TransferError::server(
                "categories",
                response.status().as_u16(),
                None,
            )),
            Err(e) => Err(TransferError::network("categories", e)),
        };
        match loaded {
            Ok(categories) if !categories.is_empty() => categories,
            Ok(_) => vec![DEFAULT_CATEGORY.to_string()],
            Err(error) => {
                warn!(error = %error, "category list unavailable, using default");
                vec![DEFAULT_CATEGORY.to_string()]
            }
        }
    }

    /// Lists products awaiting a file in the import flow.
    ///
    /// # Errors
    ///
    /// Returns the mapped status or transport error.
    #[instrument(skip(self, auth), fields(user_id = auth.user_id()))]
    pub async fn import_products(
        &self,
        auth: &AuthContext,
    ) -> Result<Vec<ImportProduct>, TransferError> {
        let mut url = self
            .base_url
            .join("import-products")
            .map_err(|e| TransferError::decode("import-products", e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("user_id", &auth.user_id().to_string());
        let response = self
            .client
            .get(url)
            .header(INIT_DATA_HEADER, auth.init_data())
            .send()
            .await
            .map_err(|e| TransferError::network("import-products", e))?;
        let response = check_status("import-products", response).await?;
        let body: ImportProductsResponse = decode_json("import-products", response).await?;
        Ok(body.products)
    }

    /// Sends a diagnostic record to `log-client-error`.
    ///
    /// Best effort: every failure is logged at debug level and swallowed.
    #[instrument(skip(self, details))]
    pub async fn report_client_error(
        &self,
        error_type: &str,
        details: &serde_json::Value,
        user_id: u64,
    ) {
        let body = ClientErrorReport {
            error_type,
            details,
            user_id,
        };
        match self.post_json("log-client-error", &body).await {
            Ok(response) if !response.status().is_success() => {
                debug!(status = response.status().as_u16(), "diagnostic sink rejected report");
            }
            Ok(_) => {}
            Err(error) => debug!(error = %error, "diagnostic sink unreachable"),
        }
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Response, TransferError> {
        let url = self.endpoint_url(endpoint);
        debug!(%url, "POST");
        self.client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransferError::network(endpoint, e))
    }
}

fn download_request<'a>(record: &'a PurchaseRecord, auth: &'a AuthContext) -> DownloadRequest<'a> {
    DownloadRequest {
        product_id: &record.product_id,
        order_id: &record.order_id,
        user_id: auth.user_id(),
        telegram_init_data: auth.init_data(),
    }
}

/// Maps a non-success backend response to an error; passes success through.
pub(crate) async fn check_status(
    endpoint: &str,
    response: Response,
) -> Result<Response, TransferError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = read_detail(response).await;
    if status == StatusCode::UNAUTHORIZED {
        return Err(TransferError::auth(
            detail.unwrap_or_else(|| "Unauthorized".to_string()),
        ));
    }
    Err(TransferError::server(endpoint, status.as_u16(), detail))
}

/// Extracts the backend's `detail` field from an error body.
async fn read_detail(response: Response) -> Option<String> {
    let bytes = response.bytes().await.ok()?;
    let body: ErrorBody = serde_json::from_slice(&bytes).ok()?;
    match body.detail? {
        serde_json::Value::String(text) if !text.is_empty() => Some(text),
        serde_json::Value::String(_) | serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

async fn decode_json<T: DeserializeOwned>(
    endpoint: &str,
    response: Response,
) -> Result<T, TransferError> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| TransferError::network(endpoint, e))?;
    serde_json::from_slice(&bytes).map_err(|e| TransferError::decode(endpoint, e.to_string()))
}

fn build_client(timeouts: HttpTimeouts) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent::default_user_agent())
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .read_timeout(Duration::from_secs(timeouts.read_secs))
        .build()
}
