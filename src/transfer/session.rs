//! Per-transfer records: the issued session and the terminal outcome.

use std::path::PathBuf;

use super::error::{FailureKind, TransferError};
use crate::api::UploadSlotResponse;

const SLOT_ENDPOINT: &str = "generate-upload-url";

/// Fallback content type when neither the slot nor the caller names one.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Where and how to write one object to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Presigned URL or native-API upload endpoint.
    pub upload_url: String,
    /// Object key the bytes are stored under.
    pub object_key: String,
    /// Content type sent with the bytes.
    pub content_type: String,
    /// Upload token for the native object-storage API.
    pub authorization_token: Option<String>,
}

/// Identifiers the backend issued for one upload.
///
/// Built once from the slot response and never modified; every later request
/// of the same transfer reads its identifiers from here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSession {
    product_id: String,
    user_id: u64,
    total_bytes: u64,
    target: UploadTarget,
}

impl TransferSession {
    /// Builds a session from a slot response.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Contract`] when the response lacks the upload
    /// URL, the product identifier or the object key. The upload URL is
    /// checked first.
    pub fn from_slot(
        slot: UploadSlotResponse,
        user_id: u64,
        declared_mime_type: &str,
        total_bytes: u64,
    ) -> Result<Self, TransferError> {
        let upload_url = slot
            .upload_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| TransferError::contract(SLOT_ENDPOINT, "upload URL"))?;
        let product_id = slot
            .product_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| TransferError::contract(SLOT_ENDPOINT, "product identifier"))?;
        let object_key = slot
            .object_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| TransferError::contract(SLOT_ENDPOINT, "object key"))?;
        let content_type = slot
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .or_else(|| {
                let declared = declared_mime_type.trim();
                (!declared.is_empty()).then(|| declared_mime_type.to_string())
            })
            .unwrap_or_else(|| OCTET_STREAM.to_string());

        Ok(Self {
            product_id,
            user_id,
            total_bytes,
            target: UploadTarget {
                upload_url,
                object_key,
                content_type,
                authorization_token: slot.authorization_token,
            },
        })
    }

    /// Backend-assigned product identifier.
    #[must_use]
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Owner of the transfer.
    #[must_use]
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Backend-assigned object key.
    #[must_use]
    pub fn object_key(&self) -> &str {
        &self.target.object_key
    }

    /// Content type of the payload.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.target.content_type
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Upload endpoint for the payload.
    #[must_use]
    pub fn upload_endpoint(&self) -> &str {
        &self.target.upload_url
    }

    /// Upload token, when the transport needs one.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.target.authorization_token.as_deref()
    }

    /// Storage target of the payload.
    #[must_use]
    pub fn target(&self) -> &UploadTarget {
        &self.target
    }
}

/// What a successful transfer produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    /// File saved on the local machine.
    Local(PathBuf),
    /// Object stored remotely (URL or object key).
    Remote(String),
}

/// Terminal result of one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Transfer finished.
    Success {
        /// What was produced.
        artifact: Artifact,
    },
    /// Transfer ended early.
    Failure {
        /// Coarse classification.
        kind: FailureKind,
        /// Message to show the user.
        message: String,
    },
}

impl TransferOutcome {
    /// Builds the outcome of a finished attempt.
    #[must_use]
    pub fn from_result(result: &Result<Artifact, TransferError>) -> Self {
        match result {
            Ok(artifact) => Self::Success {
                artifact: artifact.clone(),
            },
            Err(error) => Self::Failure {
                kind: error.kind(),
                message: error.to_string(),
            },
        }
    }

    /// True for [`TransferOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
