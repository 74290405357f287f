//! Progress derivation shared by uploads and downloads.
//!
//! A [`ProgressSample`] is the raw `(bytes, total, time)` triple observed on a
//! progress tick. [`compute_snapshot`] turns the current sample plus the
//! immediately previous one into a [`ProgressSnapshot`]. No history beyond
//! that single previous sample is kept.

use std::time::{Duration, Instant};

/// Raw progress observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// Bytes transferred so far.
    pub bytes_transferred: u64,
    /// Expected total, when the transport exposes it.
    pub total_bytes: Option<u64>,
    /// Monotonic offset from the start of the transfer session.
    pub timestamp: Duration,
}

/// Derived, momentary view of a transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Rounded percentage in `0..=100`, `None` when the total is unknown or zero.
    pub percent: Option<u8>,
    /// Instantaneous throughput since the previous sample.
    pub throughput_bytes_per_sec: f64,
    /// Bytes transferred so far.
    pub bytes_transferred: u64,
    /// Expected total, when known.
    pub total_bytes: Option<u64>,
}

/// Computes a snapshot from the previous and current samples.
///
/// With no previous sample the delta is measured from zero bytes at the
/// session start. Throughput is `0` when no time has elapsed or when the byte
/// count went backwards.
#[must_use]
pub fn compute_snapshot(prev: Option<&ProgressSample>, curr: &ProgressSample) -> ProgressSnapshot {
    let (prev_bytes, prev_time) = prev.map_or((0, Duration::ZERO), |p| {
        (p.bytes_transferred, p.timestamp)
    });

    let throughput = match curr.timestamp.checked_sub(prev_time) {
        Some(elapsed) if !elapsed.is_zero() && curr.bytes_transferred >= prev_bytes => {
            #[allow(clippy::cast_precision_loss)]
            let delta = (curr.bytes_transferred - prev_bytes) as f64;
            delta / elapsed.as_secs_f64()
        }
        _ => 0.0,
    };

    ProgressSnapshot {
        percent: percent_of(curr.bytes_transferred, curr.total_bytes),
        throughput_bytes_per_sec: throughput,
        bytes_transferred: curr.bytes_transferred,
        total_bytes: curr.total_bytes,
    }
}

/// `round(100 * bytes / total)` clamped to `0..=100`; `None` for an unknown or zero total.
///
/// Halves round up, matching `f64::round` for non-negative inputs.
#[must_use]
pub fn percent_of(bytes: u64, total: Option<u64>) -> Option<u8> {
    let total = total.filter(|t| *t > 0)?;
    let scaled = (u128::from(bytes) * 200 + u128::from(total)) / (u128::from(total) * 2);
    Some(u8::try_from(scaled.min(100)).unwrap_or(100))
}

/// Holds the single previous sample a transfer needs for throughput.
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
    total_bytes: Option<u64>,
    previous: Option<ProgressSample>,
}

impl ProgressTracker {
    /// Starts tracking a transfer with an optional expected total.
    #[must_use]
    pub fn new(total_bytes: Option<u64>) -> Self {
        Self {
            started: Instant::now(),
            total_bytes,
            previous: None,
        }
    }

    /// Records the cumulative byte count at the current instant.
    pub fn record(&mut self, bytes_transferred: u64) -> ProgressSnapshot {
        self.record_at(bytes_transferred, self.started.elapsed())
    }

    /// Records the cumulative byte count at an explicit session offset.
    pub fn record_at(&mut self, bytes_transferred: u64, timestamp: Duration) -> ProgressSnapshot {
        let sample = ProgressSample {
            bytes_transferred,
            total_bytes: self.total_bytes,
            timestamp,
        };
        let snapshot = compute_snapshot(self.previous.as_ref(), &sample);
        self.previous = Some(sample);
        snapshot
    }

    /// Time since the tracker was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
