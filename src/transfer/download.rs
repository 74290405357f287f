//! Buyer download: verify, open a stream, save to disk.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::client::TransferClient;
use super::error::TransferError;
use super::events::{Operation, Phase, PhaseOutcome, TransferState};
use super::filename::{choose_filename, resolve_unique_path};
use super::session::Artifact;
use super::transport::DownloadStream;
use crate::api::PurchaseRecord;
use crate::auth::AuthContext;
use crate::progress::ProgressTracker;

const OPERATION: Operation = Operation::Download;

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadReceipt {
    /// Where the file was saved.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes_written: u64,
    /// Size announced by the transport, when it announced one.
    pub expected_bytes: Option<u64>,
    /// The verified purchase.
    pub record: PurchaseRecord,
}

impl DownloadReceipt {
    /// True when a known total disagrees with the bytes written.
    #[must_use]
    pub fn size_mismatch(&self) -> bool {
        self.expected_bytes
            .is_some_and(|expected| expected != self.bytes_written)
    }

    /// The saved file as a [`Artifact::Local`].
    #[must_use]
    pub fn artifact(&self) -> Artifact {
        Artifact::Local(self.path.clone())
    }
}

/// Deletes a partially written file unless disarmed, including when the
/// download future is dropped mid-stream.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            debug!(path = %self.path.display(), "removing partial download");
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

impl TransferClient {
    /// Verifies the purchase of `product_id` and saves its file under `output_dir`.
    ///
    /// A size mismatch against a known total, including a body the server
    /// closed early, is logged and reported as a degraded `receive` event;
    /// the download still succeeds with the bytes that arrived.
    ///
    /// # Errors
    ///
    /// - [`TransferError::NotPurchased`] on 404 from verification
    /// - [`TransferError::FileUnavailable`] when the product has no file;
    ///   no further request is made
    /// - [`TransferError::Io`] when the output cannot be written
    /// - otherwise the status or transport error of the failing step
    #[instrument(skip(self, auth), fields(output_dir = %output_dir.display()))]
    pub async fn download(
        &self,
        product_id: &str,
        output_dir: &Path,
        auth: &AuthContext,
    ) -> Result<DownloadReceipt, TransferError> {
        let result = self.run_download(product_id, output_dir, auth).await;
        self.finish(OPERATION, result)
    }

    async fn run_download(
        &self,
        product_id: &str,
        output_dir: &Path,
        auth: &AuthContext,
    ) -> Result<DownloadReceipt, TransferError> {
        self.set_state(OPERATION, TransferState::Preparing);
        let started = Instant::now();
        let verified = self
            .api
            .verify_purchase(product_id, auth)
            .await
            .and_then(require_file);
        let record = self.finish_phase(OPERATION, Phase::Verify, started, verified)?;

        let started = Instant::now();
        let opened = self.downloader.open(&record, auth).await;
        let stream = self.finish_phase(OPERATION, Phase::OpenStream, started, opened)?;

        self.set_state(OPERATION, TransferState::Transferring);
        let started = Instant::now();
        let saved = self.receive(stream, &record, output_dir).await;
        let (path, bytes_written, expected_bytes) = match saved {
            Ok(saved) => saved,
            Err(error) => {
                self.emit(OPERATION, Phase::Receive, PhaseOutcome::Failed(error.kind()), started);
                return Err(error);
            }
        };

        let outcome = match expected_bytes {
            Some(expected) if expected != bytes_written => {
                warn!(
                    expected,
                    received = bytes_written,
                    path = %path.display(),
                    "download size differs from announced total"
                );
                PhaseOutcome::Degraded(format!(
                    "received {bytes_written} of {expected} announced bytes"
                ))
            }
            _ => PhaseOutcome::Ok,
        };
        self.emit(OPERATION, Phase::Receive, outcome, started);
        info!(path = %path.display(), bytes = bytes_written, "download complete");

        Ok(DownloadReceipt {
            path,
            bytes_written,
            expected_bytes,
            record,
        })
    }

    async fn receive(
        &self,
        stream: DownloadStream,
        record: &PurchaseRecord,
        output_dir: &Path,
    ) -> Result<(PathBuf, u64, Option<u64>), TransferError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| TransferError::io(output_dir, e))?;

        let filename = choose_filename(
            stream.content_disposition.as_deref(),
            stream.suggested_name.as_deref(),
            &record.product_title,
            stream.content_type.as_deref(),
        );
        let path = resolve_unique_path(output_dir, &filename);
        debug!(path = %path.display(), "resolved output path");

        let file = File::create(&path)
            .await
            .map_err(|e| TransferError::io(path.clone(), e))?;
        let partial = PartialFile::new(path.clone());

        let total = stream.total_bytes;
        let mut tracker = ProgressTracker::new(total);
        self.observer.on_progress(OPERATION, &tracker.record(0));

        let mut writer = BufWriter::new(file);
        let mut body = stream.response.bytes_stream();
        let mut received: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) if ended_early(&error, received, total) => {
                    warn!(received, expected = ?total, %error, "download stream ended early");
                    break;
                }
                Err(error) => return Err(TransferError::network("download-stream", error)),
            };
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| TransferError::io(path.clone(), e))?;
            received += chunk.len() as u64;
            self.observer.on_progress(OPERATION, &tracker.record(received));
        }
        writer
            .flush()
            .await
            .map_err(|e| TransferError::io(path.clone(), e))?;

        Ok((partial.keep(), received, total))
    }
}

fn require_file(record: PurchaseRecord) -> Result<PurchaseRecord, TransferError> {
    if record.has_file {
        Ok(record)
    } else {
        Err(TransferError::FileUnavailable {
            product_id: record.product_id,
        })
    }
}

/// A body cut short after some bytes of a known total: the server closed
/// before sending everything it announced. What arrived is kept.
fn ended_early(error: &reqwest::Error, received: u64, total: Option<u64>) -> bool {
    let short = total.is_some_and(|total| received > 0 && received < total);
    short && !error.is_timeout() && (error.is_body() || error.is_decode())
}
