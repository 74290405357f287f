//! Error types for the transfer module.
//!
//! Every failure is terminal for the current attempt. The variants follow the
//! order in which a transfer can fail: local validation first, then backend
//! status codes, then transport-level failures, then the partial failure that
//! can only happen after the payload bytes already reached object storage.

use std::path::PathBuf;

use thiserror::Error;

/// Reasons a file is rejected before any network call is made.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// File exceeds the maximum accepted size.
    #[error("file too large: {size} bytes (max {max} bytes)")]
    FileTooLarge {
        /// Actual file size.
        size: u64,
        /// Maximum accepted size.
        max: u64,
    },

    /// File is declared as PDF but does not start with the `%PDF` signature.
    #[error("invalid PDF: {path} does not start with the %PDF signature")]
    InvalidPdf {
        /// The rejected file.
        path: PathBuf,
    },

    /// File could not be inspected.
    #[error("could not read {path}: {source}")]
    Unreadable {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors that end an upload or download attempt.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The file failed local validation; nothing was sent.
    #[error(transparent)]
    LocalValidation(#[from] ValidationError),

    /// The backend rejected the session blob (HTTP 401).
    #[error("authentication failed: {detail}")]
    Auth {
        /// Server-supplied detail, verbatim.
        detail: String,
    },

    /// Purchase verification returned 404.
    #[error("you have not purchased product {product_id}")]
    NotPurchased {
        /// The product that was checked.
        product_id: String,
    },

    /// The purchase exists but no file is attached to the product.
    #[error("file not available for product {product_id}")]
    FileUnavailable {
        /// The product without a file.
        product_id: String,
    },

    /// Any other non-success status from the backend or object storage.
    #[error("server error calling {endpoint}: {}", detail_or_status(.detail, .status))]
    Server {
        /// Endpoint or URL that failed.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Server-supplied detail text, when present.
        detail: Option<String>,
    },

    /// Transport-level failure: no response was received.
    #[error("network error calling {endpoint}: {source}")]
    Network {
        /// Endpoint or URL that failed.
        endpoint: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Request exceeded the configured client-side timeout.
    #[error("timeout calling {endpoint}")]
    Timeout {
        /// Endpoint or URL that timed out.
        endpoint: String,
    },

    /// A backend response lacked a field every later step depends on.
    #[error("{endpoint} response is missing {field}")]
    Contract {
        /// Endpoint whose response was incomplete.
        endpoint: String,
        /// Human-readable name of the missing field.
        field: &'static str,
    },

    /// A response body could not be decoded.
    #[error("invalid response from {endpoint}: {message}")]
    Decode {
        /// Endpoint whose body was malformed.
        endpoint: String,
        /// Decoder message.
        message: String,
    },

    /// Payload bytes were stored but the completion notice failed.
    ///
    /// The remote object at `object_key` may exist without a product
    /// referencing it.
    #[error("upload stored as {object_key} but completion failed: {source}")]
    PartialFailure {
        /// Object key of the orphaned upload.
        object_key: String,
        /// The completion error.
        #[source]
        source: Box<TransferError>,
    },

    /// Local file system error while reading the payload or saving the artifact.
    #[error("IO error on {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Coarse failure classification carried by [`TransferOutcome`](super::TransferOutcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected before any network call.
    LocalValidation,
    /// HTTP 401.
    Auth,
    /// HTTP 404 on purchase verification.
    NotPurchased,
    /// Purchase has no downloadable file.
    FileUnavailable,
    /// Other non-success status, or an unusable response.
    Server,
    /// No response received (including timeouts).
    Network,
    /// Bytes stored remotely, completion notice failed.
    PartialFailure,
    /// Local file system failure.
    Io,
}

impl FailureKind {
    /// Stable label used in events and diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalValidation => "local_validation",
            Self::Auth => "auth",
            Self::NotPurchased => "not_purchased",
            Self::FileUnavailable => "file_unavailable",
            Self::Server => "server",
            Self::Network => "network",
            Self::PartialFailure => "partial_failure",
            Self::Io => "io",
        }
    }
}

impl TransferError {
    /// Creates a network error, promoting reqwest timeouts to [`TransferError::Timeout`].
    pub fn network(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if source.is_timeout() {
            Self::Timeout { endpoint }
        } else {
            Self::Network { endpoint, source }
        }
    }

    /// Creates a server error.
    pub fn server(endpoint: impl Into<String>, status: u16, detail: Option<String>) -> Self {
        Self::Server {
            endpoint: endpoint.into(),
            status,
            detail,
        }
    }

    /// Creates an authentication error.
    pub fn auth(detail: impl Into<String>) -> Self {
        Self::Auth {
            detail: detail.into(),
        }
    }

    /// Creates a missing-field contract error.
    pub fn contract(endpoint: impl Into<String>, field: &'static str) -> Self {
        Self::Contract {
            endpoint: endpoint.into(),
            field,
        }
    }

    /// Creates a decode error.
    pub fn decode(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps a completion failure that happened after the payload was stored.
    pub fn partial(object_key: impl Into<String>, source: TransferError) -> Self {
        Self::PartialFailure {
            object_key: object_key.into(),
            source: Box::new(source),
        }
    }

    /// Returns the coarse classification of this error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::LocalValidation(ValidationError::Unreadable { .. }) | Self::Io { .. } => {
                FailureKind::Io
            }
            Self::LocalValidation(_) => FailureKind::LocalValidation,
            Self::Auth { .. } => FailureKind::Auth,
            Self::NotPurchased { .. } => FailureKind::NotPurchased,
            Self::FileUnavailable { .. } => FailureKind::FileUnavailable,
            Self::Server { .. } | Self::Contract { .. } | Self::Decode { .. } => {
                FailureKind::Server
            }
            Self::Network { .. } | Self::Timeout { .. } => FailureKind::Network,
            Self::PartialFailure { .. } => FailureKind::PartialFailure,
        }
    }
}

fn detail_or_status(detail: &Option<String>, status: &u16) -> String {
    match detail {
        Some(detail) => detail.clone(),
        None => format!("HTTP {status}"),
    }
}

// No `From<reqwest::Error>` or `From<std::io::Error>`: every variant needs the
// endpoint or path the source error does not carry.
