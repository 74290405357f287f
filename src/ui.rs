//! Projection of transfer state onto one visible section.
//!
//! Everything here is pure: [`project`] maps `{state, snapshot?, outcome?}` to
//! a [`View`], and the formatting helpers turn sizes into labels. The terminal
//! front end renders the view; it never decides which section to show.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::progress::ProgressSnapshot;
use crate::transfer::{Artifact, TransferOutcome, TransferState};

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// The mutually exclusive sections of the transfer page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    /// Spinner while identifiers are negotiated.
    Loading,
    /// File picker / product card, waiting for the user.
    Form,
    /// Progress bar.
    Transferring,
    /// Done.
    Success,
    /// Error message.
    Failure,
}

impl Section {
    /// Section shown for a lifecycle state.
    #[must_use]
    pub fn for_state(state: TransferState) -> Self {
        match state {
            TransferState::Idle => Self::Form,
            TransferState::Preparing => Self::Loading,
            TransferState::Transferring => Self::Transferring,
            TransferState::Succeeded => Self::Success,
            TransferState::Failed => Self::Failure,
        }
    }
}

/// Everything a renderer needs to draw the current section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    /// The one visible section.
    pub section: Section,
    /// `"42%"`, absent when the total is unknown.
    pub percent_label: Option<String>,
    /// `"1.25 MB/s"`.
    pub speed_label: Option<String>,
    /// Bytes so far, formatted.
    pub transferred_label: Option<String>,
    /// Total, formatted, when known.
    pub total_label: Option<String>,
    /// Success or failure text.
    pub message: Option<String>,
}

/// Maps state, the latest snapshot and the outcome to a [`View`].
///
/// Progress labels are only filled in the `Transferring` section; the message
/// only in `Success` and `Failure`.
#[must_use]
pub fn project(
    state: TransferState,
    snapshot: Option<&ProgressSnapshot>,
    outcome: Option<&TransferOutcome>,
) -> View {
    let section = Section::for_state(state);
    let progress = snapshot.filter(|_| section == Section::Transferring);
    let message = match (section, outcome) {
        (Section::Success | Section::Failure, Some(outcome)) => Some(outcome_message(outcome)),
        _ => None,
    };

    View {
        section,
        percent_label: progress.and_then(|s| s.percent).map(|p| format!("{p}%")),
        speed_label: progress.map(|s| format_speed(s.throughput_bytes_per_sec)),
        transferred_label: progress.map(|s| format_bytes(s.bytes_transferred)),
        total_label: progress.and_then(|s| s.total_bytes).map(format_bytes),
        message,
    }
}

fn outcome_message(outcome: &TransferOutcome) -> String {
    match outcome {
        TransferOutcome::Success {
            artifact: Artifact::Local(path),
        } => format!("Saved to {}", path.display()),
        TransferOutcome::Success {
            artifact: Artifact::Remote(reference),
        } => format!("Uploaded as {reference}"),
        TransferOutcome::Failure { message, .. } => message.clone(),
    }
}

/// `bytes` with 1024 steps: `"512 B"`, `"1.50 KB"`, `"2.00 GB"`.
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes} {}", SIZE_UNITS[0]);
    }
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", SIZE_UNITS[unit])
}

/// A size given in MB as KB below 1 MB, MB below 1024 MB, GB above.
#[must_use]
pub fn format_size_mb(mb: f64) -> String {
    let mb = mb.max(0.0);
    if mb < 1.0 {
        format!("{:.2} KB", mb * 1024.0)
    } else if mb < 1024.0 {
        format!("{mb:.2} MB")
    } else {
        format!("{:.2} GB", mb / 1024.0)
    }
}

/// Throughput as `"x.xx MB/s"`.
#[must_use]
pub fn format_speed(bytes_per_sec: f64) -> String {
    let mb = if bytes_per_sec.is_finite() {
        bytes_per_sec.max(0.0) / (1024.0 * 1024.0)
    } else {
        0.0
    };
    format!("{mb:.2} MB/s")
}

/// A transfer was requested while one is in flight.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("a transfer is already in progress")]
pub struct TransferBusy;

/// Mutable view model of one page.
///
/// [`ViewState::begin`] is the single gate against concurrent transfers.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    state: TransferState,
    snapshot: Option<ProgressSnapshot>,
    outcome: Option<TransferOutcome>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    /// Starts idle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: TransferState::Idle,
            snapshot: None,
            outcome: None,
        }
    }

    /// Claims the page for a new transfer.
    ///
    /// # Errors
    ///
    /// Returns [`TransferBusy`] while a transfer is `Preparing` or `Transferring`.
    pub fn begin(&mut self) -> Result<(), TransferBusy> {
        if self.state.is_active() {
            return Err(TransferBusy);
        }
        self.state = TransferState::Preparing;
        self.snapshot = None;
        self.outcome = None;
        Ok(())
    }

    /// Records a state transition.
    pub fn apply_state(&mut self, state: TransferState) {
        self.state = state;
    }

    /// Records the latest progress snapshot.
    pub fn apply_progress(&mut self, snapshot: ProgressSnapshot) {
        self.snapshot = Some(snapshot);
    }

    /// Records the terminal outcome and moves to the matching state.
    pub fn apply_outcome(&mut self, outcome: TransferOutcome) {
        self.state = if outcome.is_success() {
            TransferState::Succeeded
        } else {
            TransferState::Failed
        };
        self.outcome = Some(outcome);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Projection of the current state.
    #[must_use]
    pub fn view(&self) -> View {
        project(self.state, self.snapshot.as_ref(), self.outcome.as_ref())
    }
}

/// Warns against leaving while bytes are moving.
///
/// Armed exactly while the state is `Transferring`. Shared between the
/// observer that tracks state and the interrupt handler that consults it.
#[derive(Debug, Default)]
pub struct NavigationGuard {
    armed: AtomicBool,
}

impl NavigationGuard {
    /// A disarmed guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms or disarms to match `state`.
    pub fn sync(&self, state: TransferState) {
        self.armed
            .store(state == TransferState::Transferring, Ordering::SeqCst);
    }

    /// True while a transfer is moving bytes.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

/// Keeps `requested` if the backend lists it (case-insensitively), else the
/// first listed category, else `fallback`.
#[must_use]
pub fn select_category(categories: &[String], requested: Option<&str>, fallback: &str) -> String {
    requested
        .and_then(|wanted| {
            categories
                .iter()
                .find(|category| category.eq_ignore_ascii_case(wanted.trim()))
        })
        .or_else(|| categories.first())
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}
