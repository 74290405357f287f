//! Seller upload: validate, request a slot, preview, send, complete.
//!
//! One linear attempt per call. The order is fixed:
//!
//! 1. local validation (no network on failure)
//! 2. `generate-upload-url`, which assigns the object key and product id
//! 3. PDF only: first-page preview under the same product id (non-fatal)
//! 4. the payload, streamed from disk in one request
//! 5. `upload-complete` / `import-complete`
//!
//! A failure in step 5 is a [`TransferError::PartialFailure`]: the object is
//! already stored and nothing deletes it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::json;
use tracing::{info, instrument, warn};

use super::client::TransferClient;
use super::error::TransferError;
use super::events::{Operation, Phase, PhaseOutcome, TransferState};
use super::preview::{preview_object_key, preview_reference};
use super::session::{Artifact, OCTET_STREAM, TransferSession, UploadTarget};
use super::transport::{Payload, ProgressCallback};
use super::validation::{PDF_MIME_TYPE, is_pdf, validate_payload};
use crate::api::{Completion, CompletionEndpoint, ProductMetadata};
use crate::auth::AuthContext;
use crate::progress::ProgressTracker;

const PATH_SLOT_ENDPOINT: &str = "get-upload-url-for-path";

/// A file to upload, with the metadata of an imported product if any.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    /// File to send.
    pub path: PathBuf,
    /// Name reported to the backend.
    pub file_name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Product fields; present for the import flow.
    pub metadata: Option<ProductMetadata>,
}

impl UploadRequest {
    /// Uploads `path` under its own file name with a MIME type guessed from
    /// the extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = guess_mime_type(&file_name).to_string();
        Self {
            path,
            file_name,
            mime_type,
            metadata: None,
        }
    }

    /// Overrides the declared MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Attaches product fields, turning this into an import.
    #[must_use]
    pub fn with_metadata(mut self, metadata: ProductMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// `Import` when metadata is attached, else `Upload`.
    #[must_use]
    pub fn operation(&self) -> Operation {
        if self.metadata.is_some() {
            Operation::Import
        } else {
            Operation::Upload
        }
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Backend-assigned product id.
    pub product_id: String,
    /// Backend-assigned object key.
    pub object_key: String,
    /// Bytes sent.
    pub file_size: u64,
    /// Preview reference sent with the completion notice.
    pub preview_url: Option<String>,
    /// Public URL from the completion response, else the object key.
    pub remote_ref: String,
}

impl UploadReceipt {
    /// The stored object as a [`Artifact::Remote`].
    #[must_use]
    pub fn artifact(&self) -> Artifact {
        Artifact::Remote(self.remote_ref.clone())
    }
}

/// MIME type for common product file extensions; octet-stream otherwise.
#[must_use]
pub fn guess_mime_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => PDF_MIME_TYPE,
        "zip" => "application/zip",
        "epub" => "application/epub+zip",
        "txt" => "text/plain",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => OCTET_STREAM,
    }
}

impl TransferClient {
    /// Uploads a file and registers it with the backend.
    ///
    /// Reports `Preparing`, `Transferring` and a terminal state to the
    /// observer, one event per phase, and a progress snapshot per chunk.
    ///
    /// # Errors
    ///
    /// - [`TransferError::LocalValidation`]: nothing was sent
    /// - [`TransferError::Contract`]: the slot response lacked an identifier
    /// - [`TransferError::PartialFailure`]: bytes stored, completion failed
    /// - otherwise the status or transport error of the failing step
    #[instrument(
        skip(self, request, auth),
        fields(file = %request.file_name, operation = request.operation().as_str())
    )]
    pub async fn upload(
        &self,
        request: &UploadRequest,
        auth: &AuthContext,
    ) -> Result<UploadReceipt, TransferError> {
        let operation = request.operation();
        let result = self.run_upload(operation, request, auth).await;
        self.finish(operation, result)
    }

    async fn run_upload(
        &self,
        operation: Operation,
        request: &UploadRequest,
        auth: &AuthContext,
    ) -> Result<UploadReceipt, TransferError> {
        let started = Instant::now();
        let validated = validate_payload(&request.path, &request.file_name, &request.mime_type)
            .await
            .map_err(TransferError::from);
        let file_size = self.finish_phase(operation, Phase::Validate, started, validated)?;

        self.set_state(operation, TransferState::Preparing);
        let started = Instant::now();
        let session = match self
            .api
            .request_upload_slot(&request.file_name, &request.mime_type, auth)
            .await
        {
            Ok(slot) => {
                TransferSession::from_slot(slot, auth.user_id(), &request.mime_type, file_size)
            }
            Err(error) => Err(error),
        };
        let session = self.finish_phase(operation, Phase::RequestSlot, started, session)?;
        info!(
            product_id = session.product_id(),
            object_key = session.object_key(),
            "upload slot issued"
        );

        let preview_url = if is_pdf(&request.file_name, &request.mime_type) {
            self.upload_preview(operation, &session, &request.path, auth)
                .await
        } else {
            self.emit(operation, Phase::Preview, PhaseOutcome::Skipped, Instant::now());
            None
        };

        self.set_state(operation, TransferState::Transferring);
        let started = Instant::now();
        let payload = Payload::File {
            path: request.path.clone(),
            len: file_size,
        };
        let on_sent = self.progress_callback(operation, file_size);
        let sent = self
            .uploader
            .put_object(session.target(), payload, Some(on_sent))
            .await;
        if let Err(error) = &sent {
            self.report_storage_failure(error, &session, &request.file_name)
                .await;
        }
        self.finish_phase(operation, Phase::Payload, started, sent)?;

        let started = Instant::now();
        let endpoint = if request.metadata.is_some() {
            CompletionEndpoint::Import
        } else {
            CompletionEndpoint::Upload
        };
        let completion = Completion {
            object_key: session.object_key(),
            file_name: &request.file_name,
            file_size,
            preview_url: preview_url.as_deref(),
            product_metadata: request.metadata.as_ref(),
        };
        let completed = self
            .api
            .notify_complete(endpoint, completion, auth)
            .await
            .map_err(|error| TransferError::partial(session.object_key(), error));
        let response = self.finish_phase(operation, Phase::Complete, started, completed)?;

        let remote_ref = response
            .b2_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| session.object_key().to_string());
        info!(product_id = session.product_id(), remote = %remote_ref, "upload complete");

        Ok(UploadReceipt {
            product_id: session.product_id().to_string(),
            object_key: session.object_key().to_string(),
            file_size,
            preview_url,
            remote_ref,
        })
    }

    /// Renders, places and uploads the preview. Every failure degrades to `None`.
    async fn upload_preview(
        &self,
        operation: Operation,
        session: &TransferSession,
        pdf: &Path,
        auth: &AuthContext,
    ) -> Option<String> {
        let started = Instant::now();
        match self.try_upload_preview(session, pdf, auth).await {
            Ok(reference) => {
                self.emit(operation, Phase::Preview, PhaseOutcome::Ok, started);
                Some(reference)
            }
            Err(reason) => {
                warn!(reason = %reason, "continuing without preview");
                self.emit(operation, Phase::Preview, PhaseOutcome::Degraded(reason), started);
                None
            }
        }
    }

    async fn try_upload_preview(
        &self,
        session: &TransferSession,
        pdf: &Path,
        auth: &AuthContext,
    ) -> Result<String, String> {
        let preview = self
            .renderer
            .render_first_page(pdf)
            .await
            .map_err(|e| e.to_string())?;

        let object_key = preview_object_key(
            &self.preview_prefix,
            session.user_id(),
            session.product_id(),
            preview.extension,
        );
        let slot = self
            .api
            .request_path_slot(&object_key, preview.content_type, auth)
            .await
            .map_err(|e| e.to_string())?;
        let upload_url = slot
            .upload_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| TransferError::contract(PATH_SLOT_ENDPOINT, "upload URL").to_string())?;

        // The composed key is authoritative even if the slot echoes another.
        let target = UploadTarget {
            upload_url,
            object_key: object_key.clone(),
            content_type: slot
                .content_type
                .filter(|ct| !ct.trim().is_empty())
                .unwrap_or_else(|| preview.content_type.to_string()),
            authorization_token: slot.authorization_token,
        };
        self.uploader
            .put_object(&target, Payload::Bytes(preview.bytes), None)
            .await
            .map_err(|e| e.to_string())?;

        Ok(preview_reference(
            self.preview_public_base_url.as_deref(),
            &object_key,
        ))
    }

    fn progress_callback(&self, operation: Operation, total: u64) -> ProgressCallback {
        let tracker = Arc::new(Mutex::new(ProgressTracker::new(Some(total))));
        let observer = Arc::clone(&self.observer);
        if let Ok(mut guard) = tracker.lock() {
            observer.on_progress(operation, &guard.record(0));
        }
        Arc::new(move |sent| {
            if let Ok(mut guard) = tracker.lock() {
                let snapshot = guard.record(sent);
                observer.on_progress(operation, &snapshot);
            }
        })
    }

    /// Sends storage HTTP and network failures to the diagnostic sink.
    async fn report_storage_failure(
        &self,
        error: &TransferError,
        session: &TransferSession,
        file_name: &str,
    ) {
        let (error_type, details) = match error {
            TransferError::Server { status, detail, .. } => (
                "upload_http_error",
                json!({
                    "status": status,
                    "detail": detail,
                    "object_key": session.object_key(),
                    "product_id": session.product_id(),
                    "file_name": file_name,
                    "file_size": session.total_bytes(),
                }),
            ),
            TransferError::Network { .. } | TransferError::Timeout { .. } => (
                "upload_network_error",
                json!({
                    "message": error.to_string(),
                    "object_key": session.object_key(),
                    "product_id": session.product_id(),
                    "file_name": file_name,
                    "file_size": session.total_bytes(),
                }),
            ),
            _ => return,
        };
        self.api
            .report_client_error(error_type, &details, session.user_id())
            .await;
    }
}
