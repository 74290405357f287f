//! Presigned upload and verified download flows.
//!
//! # Architecture
//!
//! - [`TransferClient`] - Drives one upload ([`TransferClient::upload`]) or one
//!   download ([`TransferClient::download`]) per call
//! - [`TransferSession`] - Backend-assigned identifiers of one upload
//! - [`UploadTransport`] / [`DownloadTransport`] - Byte transports selected by
//!   [`UploadMode`] / [`DownloadMode`]
//! - [`PreviewRenderer`] - First-page rendering for PDF previews
//! - [`TransferObserver`] - State, phase and progress hooks
//! - [`TransferError`] - Failure taxonomy; [`TransferOutcome`] is its terminal summary
//!
//! Every call is a single attempt. Nothing is retried; the user re-initiates.

mod client;
mod download;
mod error;
mod events;
mod filename;
mod preview;
mod session;
mod transport;
mod upload;
mod validation;

pub use client::{TransferClient, TransferClientBuilder};
pub use download::DownloadReceipt;
pub use error::{FailureKind, TransferError, ValidationError};
pub use events::{
    NoopObserver, Operation, Phase, PhaseOutcome, TracingObserver, TransferEvent,
    TransferObserver, TransferState,
};
pub use preview::{
    DEFAULT_PDFTOPPM, DEFAULT_PREVIEW_PREFIX, DisabledRenderer, PREVIEW_DPI, PdftoppmRenderer,
    PreviewError, PreviewRenderer, RenderedPreview, preview_object_key, preview_reference,
};
pub use session::{Artifact, OCTET_STREAM, TransferOutcome, TransferSession, UploadTarget};
pub use transport::{
    DownloadMode, DownloadStream, DownloadTransport, NativeApiTransport, Payload,
    PresignedPutTransport, PresignedUrlTransport, ProgressCallback, ProxyStreamTransport,
    UnknownMode, UploadMode, UploadTransport, download_transport, upload_transport,
};
pub use upload::{UploadReceipt, UploadRequest, guess_mime_type};
pub use validation::{MAX_UPLOAD_BYTES, PDF_MIME_TYPE, PDF_SIGNATURE, is_pdf, validate_payload};
