//! The transfer client and its builder.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::error::TransferError;
use super::events::{
    Operation, Phase, PhaseOutcome, TracingObserver, TransferEvent, TransferObserver,
    TransferState,
};
use super::preview::{DEFAULT_PREVIEW_PREFIX, PdftoppmRenderer, PreviewRenderer};
use super::transport::{
    DownloadMode, DownloadTransport, UploadMode, UploadTransport, download_transport,
    upload_transport,
};
use crate::api::{ApiClient, PurchaseRecord};
use crate::auth::AuthContext;

/// Drives one upload or one download per call.
///
/// A client holds no per-transfer state: identifiers live in the
/// [`TransferSession`](super::TransferSession) built inside each call. It does
/// not guard against concurrent calls; callers that need a single transfer at
/// a time gate on [`ViewState`](crate::ui::ViewState).
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use transfer_core::{ApiClient, AuthContext, HttpTimeouts, TransferClient, UploadRequest};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let api = ApiClient::new("https://shop.example.com/api/", HttpTimeouts::default())?;
/// let client = TransferClient::builder(api).build();
/// let auth = AuthContext::new("query_id=...&hash=...", 42)?;
///
/// let receipt = client.upload(&UploadRequest::new("guide.pdf"), &auth).await?;
/// println!("stored {} as product {}", receipt.object_key, receipt.product_id);
///
/// let saved = client.download("TBF-1", Path::new("."), &auth).await?;
/// println!("saved {}", saved.path.display());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TransferClient {
    pub(super) api: ApiClient,
    pub(super) uploader: Arc<dyn UploadTransport>,
    pub(super) downloader: Arc<dyn DownloadTransport>,
    pub(super) renderer: Arc<dyn PreviewRenderer>,
    pub(super) observer: Arc<dyn TransferObserver>,
    pub(super) preview_prefix: String,
    pub(super) preview_public_base_url: Option<String>,
}

impl fmt::Debug for TransferClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferClient")
            .field("api", &self.api)
            .field("upload_mode", &self.uploader.mode())
            .field("download_mode", &self.downloader.mode())
            .field("preview_prefix", &self.preview_prefix)
            .field("preview_public_base_url", &self.preview_public_base_url)
            .finish_non_exhaustive()
    }
}

impl TransferClient {
    /// Starts a builder around a backend client.
    #[must_use]
    pub fn builder(api: ApiClient) -> TransferClientBuilder {
        TransferClientBuilder::new(api)
    }

    /// The backend client.
    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Active upload mode.
    #[must_use]
    pub fn upload_mode(&self) -> UploadMode {
        self.uploader.mode()
    }

    /// Active download mode.
    #[must_use]
    pub fn download_mode(&self) -> DownloadMode {
        self.downloader.mode()
    }

    /// Verifies a purchase without downloading it.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::verify_purchase`].
    pub async fn verify_purchase(
        &self,
        product_id: &str,
        auth: &AuthContext,
    ) -> Result<PurchaseRecord, TransferError> {
        let started = Instant::now();
        let result = self.api.verify_purchase(product_id, auth).await;
        self.finish_phase(Operation::Download, Phase::Verify, started, result)
    }

    pub(super) fn set_state(&self, operation: Operation, state: TransferState) {
        self.observer.on_state(operation, state);
    }

    pub(super) fn emit(
        &self,
        operation: Operation,
        phase: Phase,
        outcome: PhaseOutcome,
        started: Instant,
    ) {
        self.observer.on_event(&TransferEvent {
            operation,
            phase,
            outcome,
            elapsed: started.elapsed(),
        });
    }

    /// Emits the phase event for `result` and passes it through.
    pub(super) fn finish_phase<T>(
        &self,
        operation: Operation,
        phase: Phase,
        started: Instant,
        result: Result<T, TransferError>,
    ) -> Result<T, TransferError> {
        let outcome = match &result {
            Ok(_) => PhaseOutcome::Ok,
            Err(error) => PhaseOutcome::Failed(error.kind()),
        };
        self.emit(operation, phase, outcome, started);
        result
    }

    /// Moves to the terminal state matching `result`.
    pub(super) fn finish<T>(
        &self,
        operation: Operation,
        result: Result<T, TransferError>,
    ) -> Result<T, TransferError> {
        let state = if result.is_ok() {
            TransferState::Succeeded
        } else {
            TransferState::Failed
        };
        self.set_state(operation, state);
        result
    }
}

/// Builder for [`TransferClient`].
pub struct TransferClientBuilder {
    api: ApiClient,
    upload_mode: UploadMode,
    download_mode: DownloadMode,
    uploader: Option<Arc<dyn UploadTransport>>,
    downloader: Option<Arc<dyn DownloadTransport>>,
    renderer: Option<Arc<dyn PreviewRenderer>>,
    observer: Option<Arc<dyn TransferObserver>>,
    preview_prefix: String,
    preview_public_base_url: Option<String>,
}

impl TransferClientBuilder {
    fn new(api: ApiClient) -> Self {
        Self {
            api,
            upload_mode: UploadMode::default(),
            download_mode: DownloadMode::default(),
            uploader: None,
            downloader: None,
            renderer: None,
            observer: None,
            preview_prefix: DEFAULT_PREVIEW_PREFIX.to_string(),
            preview_public_base_url: None,
        }
    }

    /// Selects the built-in upload transport.
    #[must_use]
    pub fn upload_mode(mut self, mode: UploadMode) -> Self {
        self.upload_mode = mode;
        self
    }

    /// Selects the built-in download transport.
    #[must_use]
    pub fn download_mode(mut self, mode: DownloadMode) -> Self {
        self.download_mode = mode;
        self
    }

    /// Uses a custom upload transport; overrides [`upload_mode`](Self::upload_mode).
    #[must_use]
    pub fn upload_transport(mut self, transport: Arc<dyn UploadTransport>) -> Self {
        self.uploader = Some(transport);
        self
    }

    /// Uses a custom download transport; overrides [`download_mode`](Self::download_mode).
    #[must_use]
    pub fn download_transport(mut self, transport: Arc<dyn DownloadTransport>) -> Self {
        self.downloader = Some(transport);
        self
    }

    /// Uses a custom preview renderer (default: `pdftoppm` on `PATH`).
    #[must_use]
    pub fn preview_renderer(mut self, renderer: Arc<dyn PreviewRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Sends observations to `observer` (default: [`TracingObserver`]).
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Directory prefix of preview objects.
    #[must_use]
    pub fn preview_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.preview_prefix = prefix.into();
        self
    }

    /// Public base URL used to build preview references.
    #[must_use]
    pub fn preview_public_base_url(mut self, base: Option<String>) -> Self {
        self.preview_public_base_url = base;
        self
    }

    /// Builds the client.
    #[must_use]
    pub fn build(self) -> TransferClient {
        let uploader = self
            .uploader
            .unwrap_or_else(|| upload_transport(self.upload_mode, self.api.http().clone()));
        let downloader = self
            .downloader
            .unwrap_or_else(|| download_transport(self.download_mode, self.api.clone()));
        TransferClient {
            api: self.api,
            uploader,
            downloader,
            renderer: self
                .renderer
                .unwrap_or_else(|| Arc::new(PdftoppmRenderer::default())),
            observer: self.observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            preview_prefix: self.preview_prefix,
            preview_public_base_url: self.preview_public_base_url,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::HttpTimeouts;

    #[test]
    fn test_builder_defaults() {
        let api = ApiClient::new("http://127.0.0.1:1/api", HttpTimeouts::default()).unwrap();
        let client = TransferClient::builder(api).build();
        assert_eq!(client.upload_mode(), UploadMode::PresignedPut);
        assert_eq!(client.download_mode(), DownloadMode::ProxyStream);
        assert_eq!(client.preview_prefix, DEFAULT_PREVIEW_PREFIX);
    }

    #[test]
    fn test_builder_selects_modes() {
        let api = ApiClient::new("http://127.0.0.1:1/api", HttpTimeouts::default()).unwrap();
        let client = TransferClient::builder(api)
            .upload_mode(UploadMode::NativeApi)
            .download_mode(DownloadMode::PresignedUrl)
            .preview_prefix("previews")
            .build();
        assert_eq!(client.upload_mode(), UploadMode::NativeApi);
        assert_eq!(client.download_mode(), DownloadMode::PresignedUrl);
        let debug = format!("{client:?}");
        assert!(debug.contains("NativeApi"), "{debug}");
    }
}
