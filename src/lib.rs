//! Shop Transfer Core Library
//!
//! Client side of the shop mini-app's file transfers: a seller uploads a
//! product file to object storage through a backend-issued presigned slot,
//! and a buyer downloads a purchased file after the backend verifies the
//! purchase.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`api`] - Typed client for the backend endpoints
//! - [`auth`] - Session blob forwarded with every request
//! - [`transfer`] - Upload and download flows, transports and previews
//! - [`progress`] - Percent and throughput derivation
//! - [`ui`] - Projection of transfer state onto a single visible section
//! - [`config`] - TOML defaults for the command-line front end
//!
//! # Example
//!
//! ```no_run
//! use transfer_core::{ApiClient, AuthContext, HttpTimeouts, TransferClient, UploadRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = ApiClient::new("https://shop.example.com/api/", HttpTimeouts::default())?;
//! let auth = AuthContext::from_init_data("user=%7B%22id%22%3A42%7D&hash=...", None)?;
//! let client = TransferClient::builder(api).build();
//! let receipt = client.upload(&UploadRequest::new("guide.pdf"), &auth).await?;
//! println!("stored as {}", receipt.remote_ref);
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod auth;
pub mod config;
pub mod progress;
pub mod transfer;
pub mod ui;
mod user_agent;

// Re-export commonly used types
pub use api::{ApiClient, ApiClientError, HttpTimeouts, ProductMetadata, PurchaseRecord};
pub use auth::{AuthContext, AuthContextError};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use transfer::{
    Artifact, DownloadMode, DownloadReceipt, FailureKind, TransferClient, TransferError,
    TransferObserver, TransferOutcome, TransferState, UploadMode, UploadReceipt, UploadRequest,
};
