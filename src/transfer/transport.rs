//! Byte transports for object storage and the backend download endpoints.
//!
//! # Architecture
//!
//! - [`UploadTransport`] writes one object to storage in a single request.
//!   [`PresignedPutTransport`] sends `PUT` to a presigned URL;
//!   [`NativeApiTransport`] sends `POST` with the storage's native upload
//!   headers.
//! - [`DownloadTransport`] opens the byte stream of a verified purchase.
//!   [`ProxyStreamTransport`] reads through the backend's `stream-download`;
//!   [`PresignedUrlTransport`] asks `generate-download-url` for a link and
//!   fetches it.
//!
//! The mode enums select an implementation from configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{
    AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE, HeaderName,
};
use reqwest::{Body, Client, RequestBuilder, Response};
use serde::Deserialize;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};

use super::error::TransferError;
use super::session::UploadTarget;
use crate::api::{ApiClient, PurchaseRecord, check_status};
use crate::auth::AuthContext;

/// Endpoint label used in errors for object-storage requests.
///
/// Presigned URLs carry signatures, so the URL itself is never used as a label.
pub const STORAGE_ENDPOINT: &str = "object-storage";

/// Native-API header carrying the percent-encoded object key.
pub const FILE_NAME_HEADER: &str = "X-Bz-File-Name";

/// Native-API header carrying the payload SHA-1.
pub const CONTENT_SHA1_HEADER: &str = "X-Bz-Content-Sha1";

/// Checksum value that tells the storage to skip verification.
pub const SKIP_CHECKSUM: &str = "do_not_verify";

const PRESIGNED_DOWNLOAD_ENDPOINT: &str = "presigned-download";

/// Callback invoked with the cumulative byte count after each chunk is handed
/// to the transport.
pub type ProgressCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Rejected transport mode name.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown transport mode '{0}'")]
pub struct UnknownMode(pub String);

/// How payload bytes reach object storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// `PUT` to a presigned URL.
    #[default]
    PresignedPut,
    /// `POST` to the storage's native upload API with an upload token.
    NativeApi,
}

impl UploadMode {
    /// Stable configuration name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PresignedPut => "presigned_put",
            Self::NativeApi => "native_api",
        }
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "presigned_put" => Ok(Self::PresignedPut),
            "native_api" => Ok(Self::NativeApi),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// How purchased bytes are fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    /// The backend streams the file itself.
    #[default]
    ProxyStream,
    /// The backend issues a presigned link that is fetched directly.
    PresignedUrl,
}

impl DownloadMode {
    /// Stable configuration name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProxyStream => "proxy_stream",
            Self::PresignedUrl => "presigned_url",
        }
    }
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "proxy_stream" => Ok(Self::ProxyStream),
            "presigned_url" => Ok(Self::PresignedUrl),
            _ => Err(UnknownMode(s.to_string())),
        }
    }
}

/// Bytes to upload.
#[derive(Debug, Clone)]
pub enum Payload {
    /// A file on disk, streamed in chunks.
    File {
        /// File to read.
        path: PathBuf,
        /// Length sent as `Content-Length`.
        len: u64,
    },
    /// An in-memory buffer (e.g. a rendered preview).
    Bytes(Bytes),
}

impl Payload {
    /// Number of bytes this payload sends.
    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::File { len, .. } => *len,
            Self::Bytes(bytes) => bytes.len() as u64,
        }
    }

    /// True when nothing will be sent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn into_body(self, on_sent: Option<ProgressCallback>) -> Result<Body, TransferError> {
        match self {
            Self::File { len: 0, .. } => Ok(Body::from(Bytes::new())),
            Self::File { path, .. } => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| TransferError::io(path.clone(), e))?;
                let mut sent: u64 = 0;
                let stream = ReaderStream::new(file).map(move |chunk| {
                    if let Ok(bytes) = &chunk {
                        sent += bytes.len() as u64;
                        if let Some(callback) = &on_sent {
                            callback(sent);
                        }
                    }
                    chunk
                });
                Ok(Body::wrap_stream(stream))
            }
            Self::Bytes(bytes) => {
                if let Some(callback) = &on_sent {
                    callback(bytes.len() as u64);
                }
                Ok(Body::from(bytes))
            }
        }
    }
}

/// Writes one object to storage.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Mode this transport implements.
    fn mode(&self) -> UploadMode;

    /// Sends the whole payload to `target` in one request.
    async fn put_object(
        &self,
        target: &UploadTarget,
        payload: Payload,
        on_sent: Option<ProgressCallback>,
    ) -> Result<(), TransferError>;
}

/// `PUT` to a presigned URL.
#[derive(Debug, Clone)]
pub struct PresignedPutTransport {
    client: Client,
}

impl PresignedPutTransport {
    /// Creates a transport on a shared client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UploadTransport for PresignedPutTransport {
    fn mode(&self) -> UploadMode {
        UploadMode::PresignedPut
    }

    #[instrument(skip_all, fields(object_key = %target.object_key, bytes = payload.len()))]
    async fn put_object(
        &self,
        target: &UploadTarget,
        payload: Payload,
        on_sent: Option<ProgressCallback>,
    ) -> Result<(), TransferError> {
        let request = self
            .client
            .put(&target.upload_url)
            .header(CONTENT_TYPE, &target.content_type);
        send_payload(request, payload, on_sent).await
    }
}

/// `POST` to the storage's native upload API.
///
/// Checksum verification is skipped (`X-Bz-Content-Sha1: do_not_verify`).
#[derive(Debug, Clone)]
pub struct NativeApiTransport {
    client: Client,
}

impl NativeApiTransport {
    /// Creates a transport on a shared client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UploadTransport for NativeApiTransport {
    fn mode(&self) -> UploadMode {
        UploadMode::NativeApi
    }

    #[instrument(skip_all, fields(object_key = %target.object_key, bytes = payload.len()))]
    async fn put_object(
        &self,
        target: &UploadTarget,
        payload: Payload,
        on_sent: Option<ProgressCallback>,
    ) -> Result<(), TransferError> {
        let token = target
            .authorization_token
            .as_deref()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| TransferError::contract("generate-upload-url", "authorization token"))?;
        let request = self
            .client
            .post(&target.upload_url)
            .header(AUTHORIZATION, token)
            .header(FILE_NAME_HEADER, urlencoding::encode(&target.object_key).as_ref())
            .header(CONTENT_TYPE, &target.content_type)
            .header(CONTENT_SHA1_HEADER, SKIP_CHECKSUM);
        send_payload(request, payload, on_sent).await
    }
}

async fn send_payload(
    request: RequestBuilder,
    payload: Payload,
    on_sent: Option<ProgressCallback>,
) -> Result<(), TransferError> {
    let len = payload.len();
    let body = payload.into_body(on_sent).await?;
    let response = request
        .header(CONTENT_LENGTH, len)
        .body(body)
        .send()
        .await
        .map_err(|e| TransferError::network(STORAGE_ENDPOINT, e))?;

    let status = response.status();
    if status.is_success() {
        debug!(status = status.as_u16(), bytes = len, "object stored");
        return Ok(());
    }
    let detail = response
        .text()
        .await
        .ok()
        .map(|text| text.trim().chars().take(512).collect::<String>())
        .filter(|text| !text.is_empty());
    Err(TransferError::server(STORAGE_ENDPOINT, status.as_u16(), detail))
}

/// An open download body plus what is known about it up front.
#[derive(Debug)]
pub struct DownloadStream {
    /// Response whose body carries the file bytes.
    pub response: Response,
    /// Expected size from `Content-Length`, when sent.
    pub total_bytes: Option<u64>,
    /// File name suggested by the backend.
    pub suggested_name: Option<String>,
    /// Raw `Content-Disposition` header value.
    pub content_disposition: Option<String>,
    /// Raw `Content-Type` header value.
    pub content_type: Option<String>,
}

impl DownloadStream {
    fn from_response(response: Response, suggested_name: Option<String>) -> Self {
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let content_disposition = header(CONTENT_DISPOSITION);
        let content_type = header(CONTENT_TYPE);
        let total_bytes = response.content_length();
        Self {
            response,
            total_bytes,
            suggested_name,
            content_disposition,
            content_type,
        }
    }
}

/// Opens the byte stream of a verified purchase.
#[async_trait]
pub trait DownloadTransport: Send + Sync {
    /// Mode this transport implements.
    fn mode(&self) -> DownloadMode;

    /// Opens the stream; the body has not been read yet.
    async fn open(
        &self,
        record: &PurchaseRecord,
        auth: &AuthContext,
    ) -> Result<DownloadStream, TransferError>;
}

/// Reads the file through the backend's `stream-download` endpoint.
#[derive(Debug, Clone)]
pub struct ProxyStreamTransport {
    api: ApiClient,
}

impl ProxyStreamTransport {
    /// Creates a transport on the backend client.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DownloadTransport for ProxyStreamTransport {
    fn mode(&self) -> DownloadMode {
        DownloadMode::ProxyStream
    }

    async fn open(
        &self,
        record: &PurchaseRecord,
        auth: &AuthContext,
    ) -> Result<DownloadStream, TransferError> {
        let response = self.api.stream_download(record, auth).await?;
        Ok(DownloadStream::from_response(response, None))
    }
}

/// Asks `generate-download-url` for a presigned link, then fetches it.
#[derive(Debug, Clone)]
pub struct PresignedUrlTransport {
    api: ApiClient,
}

impl PresignedUrlTransport {
    /// Creates a transport on the backend client.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DownloadTransport for PresignedUrlTransport {
    fn mode(&self) -> DownloadMode {
        DownloadMode::PresignedUrl
    }

    async fn open(
        &self,
        record: &PurchaseRecord,
        auth: &AuthContext,
    ) -> Result<DownloadStream, TransferError> {
        let link = self.api.generate_download_url(record, auth).await?;
        let url = link
            .download_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| TransferError::contract("generate-download-url", "download URL"))?;
        let response = self
            .api
            .http()
            .get(&url)
            .send()
            .await
            .map_err(|e| TransferError::network(PRESIGNED_DOWNLOAD_ENDPOINT, e))?;
        let response = check_status(PRESIGNED_DOWNLOAD_ENDPOINT, response).await?;
        Ok(DownloadStream::from_response(response, link.file_name))
    }
}

/// Builds the upload transport for a mode.
#[must_use]
pub fn upload_transport(mode: UploadMode, client: Client) -> Arc<dyn UploadTransport> {
    match mode {
        UploadMode::PresignedPut => Arc::new(PresignedPutTransport::new(client)),
        UploadMode::NativeApi => Arc::new(NativeApiTransport::new(client)),
    }
}

/// Builds the download transport for a mode.
#[must_use]
pub fn download_transport(mode: DownloadMode, api: ApiClient) -> Arc<dyn DownloadTransport> {
    match mode {
        DownloadMode::ProxyStream => Arc::new(ProxyStreamTransport::new(api)),
        DownloadMode::PresignedUrl => Arc::new(PresignedUrlTransport::new(api)),
    }
}
