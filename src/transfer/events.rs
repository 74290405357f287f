//! Observation hooks for transfer state, phases and progress.
//!
//! The client never decides how a transfer is displayed or logged. It reports
//! state changes, per-phase events and progress snapshots to a
//! [`TransferObserver`], and the caller chooses the sink.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use super::error::FailureKind;
use crate::progress::ProgressSnapshot;

/// Which user action a transfer belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Seller upload of a new product file.
    Upload,
    /// Upload of a file for an imported product, with its metadata.
    Import,
    /// Buyer download of a purchased file.
    Download,
}

impl Operation {
    /// Stable label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Import => "import",
            Self::Download => "download",
        }
    }
}

/// Lifecycle shared by uploads and downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Nothing in flight.
    Idle,
    /// Slot negotiation, purchase verification or preview generation.
    Preparing,
    /// Main byte transfer.
    Transferring,
    /// Terminal success.
    Succeeded,
    /// Terminal failure.
    Failed,
}

impl TransferState {
    /// True for states in which a transfer is in flight.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Preparing | Self::Transferring)
    }

    /// True for `Succeeded` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One step of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Local size and signature checks.
    Validate,
    /// `generate-upload-url`.
    RequestSlot,
    /// Preview render, slot and upload.
    Preview,
    /// Main payload upload.
    Payload,
    /// `upload-complete` / `import-complete`.
    Complete,
    /// `verify-purchase`.
    Verify,
    /// Opening the download byte stream.
    OpenStream,
    /// Reading the download byte stream to disk.
    Receive,
}

impl Phase {
    /// Stable label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::RequestSlot => "request_slot",
            Self::Preview => "preview",
            Self::Payload => "payload",
            Self::Complete => "complete",
            Self::Verify => "verify",
            Self::OpenStream => "open_stream",
            Self::Receive => "receive",
        }
    }
}

/// How a phase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Phase completed.
    Ok,
    /// Phase was not applicable (e.g. preview for a non-PDF).
    Skipped,
    /// Phase had a non-fatal problem; the transfer continues.
    Degraded(String),
    /// Phase failed and ends the transfer.
    Failed(FailureKind),
}

/// Structured record of one completed phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    /// The user action.
    pub operation: Operation,
    /// The step that finished.
    pub phase: Phase,
    /// How it finished.
    pub outcome: PhaseOutcome,
    /// Time spent in the phase.
    pub elapsed: Duration,
}

/// Receiver of transfer observations.
///
/// All methods default to no-ops so sinks implement only what they need.
pub trait TransferObserver: Send + Sync {
    /// Called on every state transition.
    fn on_state(&self, _operation: Operation, _state: TransferState) {}

    /// Called when a phase finishes.
    fn on_event(&self, _event: &TransferEvent) {}

    /// Called for every progress tick of the main byte transfer.
    fn on_progress(&self, _operation: Operation, _snapshot: &ProgressSnapshot) {}
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {}

/// Observer that forwards observations to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_state(&self, operation: Operation, state: TransferState) {
        debug!(operation = operation.as_str(), ?state, "transfer state");
    }

    fn on_event(&self, event: &TransferEvent) {
        let operation = event.operation.as_str();
        let phase = event.phase.as_str();
        let elapsed_ms = u64::try_from(event.elapsed.as_millis()).unwrap_or(u64::MAX);
        match &event.outcome {
            PhaseOutcome::Ok => info!(operation, phase, elapsed_ms, "phase complete"),
            PhaseOutcome::Skipped => debug!(operation, phase, "phase skipped"),
            PhaseOutcome::Degraded(reason) => {
                warn!(operation, phase, elapsed_ms, reason = %reason, "phase degraded");
            }
            PhaseOutcome::Failed(kind) => {
                warn!(operation, phase, elapsed_ms, kind = kind.as_str(), "phase failed");
            }
        }
    }

    fn on_progress(&self, operation: Operation, snapshot: &ProgressSnapshot) {
        trace!(
            operation = operation.as_str(),
            bytes = snapshot.bytes_transferred,
            total = ?snapshot.total_bytes,
            percent = ?snapshot.percent,
            "progress"
        );
    }
}
