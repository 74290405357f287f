//! Terminal rendering of transfer observations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use transfer_core::progress::ProgressSnapshot;
use transfer_core::transfer::{
    Operation, TracingObserver, TransferEvent, TransferObserver, TransferOutcome, TransferState,
};
use transfer_core::ui::{NavigationGuard, Section, TransferBusy, View, ViewState};

/// Observer that drives a spinner from the projected [`View`].
///
/// Phase events still go to `tracing` so `-v` shows per-phase timings.
pub(crate) struct TerminalView {
    state: Mutex<ViewState>,
    guard: Arc<NavigationGuard>,
    bar: ProgressBar,
    log: TracingObserver,
}

impl TerminalView {
    pub(crate) fn new(quiet: bool) -> Self {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("{spinner} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner
        };
        Self {
            state: Mutex::new(ViewState::new()),
            guard: Arc::new(NavigationGuard::new()),
            bar,
            log: TracingObserver,
        }
    }

    pub(crate) fn guard(&self) -> Arc<NavigationGuard> {
        Arc::clone(&self.guard)
    }

    /// Claims the view for a transfer and starts the spinner.
    pub(crate) fn begin(&self) -> Result<(), TransferBusy> {
        let view = {
            let mut state = self.lock();
            state.begin()?;
            state.view()
        };
        self.bar.enable_steady_tick(Duration::from_millis(100));
        self.render(&view);
        Ok(())
    }

    /// Records the terminal outcome, stops the spinner and returns the final view.
    pub(crate) fn finish(&self, outcome: TransferOutcome) -> View {
        let view = {
            let mut state = self.lock();
            state.apply_outcome(outcome);
            self.guard.sync(state.state());
            state.view()
        };
        self.bar.finish_and_clear();
        view
    }

    /// Drops back to idle after the user abandoned the transfer.
    pub(crate) fn abandon(&self) {
        let mut state = self.lock();
        state.apply_state(TransferState::Idle);
        self.guard.sync(TransferState::Idle);
        self.bar.finish_and_clear();
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn render(&self, view: &View) {
        self.bar.set_message(render_message(view));
    }
}

impl TransferObserver for TerminalView {
    fn on_state(&self, operation: Operation, state: TransferState) {
        self.log.on_state(operation, state);
        let view = {
            let mut view_state = self.lock();
            view_state.apply_state(state);
            view_state.view()
        };
        self.guard.sync(state);
        self.render(&view);
    }

    fn on_event(&self, event: &TransferEvent) {
        self.log.on_event(event);
    }

    fn on_progress(&self, operation: Operation, snapshot: &ProgressSnapshot) {
        self.log.on_progress(operation, snapshot);
        let view = {
            let mut state = self.lock();
            state.apply_progress(*snapshot);
            state.view()
        };
        self.render(&view);
    }
}

/// One status line for the spinner.
pub(crate) fn render_message(view: &View) -> String {
    match view.section {
        Section::Form => String::new(),
        Section::Loading => "Preparing...".to_string(),
        Section::Transferring => {
            let mut line = String::from("Transferring");
            if let Some(percent) = &view.percent_label {
                line.push(' ');
                line.push_str(percent);
            }
            match (&view.transferred_label, &view.total_label) {
                (Some(done), Some(total)) => line.push_str(&format!(" ({done} / {total})")),
                (Some(done), None) => line.push_str(&format!(" ({done})")),
                _ => {}
            }
            if let Some(speed) = &view.speed_label {
                line.push_str(&format!(" at {speed}"));
            }
            line
        }
        Section::Success | Section::Failure => view.message.clone().unwrap_or_default(),
    }
}
