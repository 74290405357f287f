//! CLI command handlers.

mod catalog;
mod download;
mod upload;

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::warn;

use transfer_core::auth::AuthContext;
use transfer_core::transfer::{Artifact, TransferClient, TransferError, TransferOutcome};
use transfer_core::ui::NavigationGuard;

use crate::output::TerminalView;

pub use catalog::{run_categories_command, run_import_list_command};
pub use download::{run_download_command, run_verify_command};
pub use upload::{run_import_command, run_upload_command};

/// Exit code after the user abandoned a transfer with Ctrl-C.
const ABANDONED_EXIT_CODE: u8 = 130;

/// Everything a command needs, resolved from flags and config.
pub struct CommandContext {
    pub client: TransferClient,
    pub view: Arc<TerminalView>,
    pub init_data: Option<String>,
    pub user_id: Option<u64>,
    pub output_dir: PathBuf,
}

impl CommandContext {
    /// Session for endpoints that need one.
    pub fn auth(&self) -> Result<AuthContext> {
        let init_data = self.init_data.as_deref().context(
            "missing session data: pass --init-data or set SHOP_TRANSFER_INIT_DATA",
        )?;
        AuthContext::from_init_data(init_data, self.user_id)
            .context("unusable session data (pass --user-id if it has no user field)")
    }
}

/// Runs a transfer until it finishes or the user abandons it.
///
/// While the guard is armed the first Ctrl-C only warns; the next one drops
/// the transfer future. Returns `None` when abandoned.
pub(crate) async fn run_guarded<F, T>(guard: &NavigationGuard, transfer: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::pin!(transfer);
    let mut warned = false;
    loop {
        tokio::select! {
            result = &mut transfer => return Some(result),
            signal = tokio::signal::ctrl_c() => {
                if let Err(error) = signal {
                    warn!(error = %error, "cannot listen for Ctrl-C");
                    return Some(transfer.await);
                }
                if guard.is_armed() && !warned {
                    warned = true;
                    eprintln!("Transfer in progress. Press Ctrl-C again to abandon it.");
                    continue;
                }
                return None;
            }
        }
    }
}

/// Renders a finished transfer and hands back the receipt on success.
pub(crate) fn conclude<R>(
    view: &TerminalView,
    result: Result<R, TransferError>,
    artifact: impl FnOnce(&R) -> Artifact,
) -> Option<R> {
    let (outcome, receipt) = match result {
        Ok(receipt) => (TransferOutcome::from_result(&Ok(artifact(&receipt))), Some(receipt)),
        Err(error) => (TransferOutcome::from_result(&Err(error)), None),
    };
    let rendered = view.finish(outcome);
    if let Some(message) = rendered.message {
        if receipt.is_some() {
            println!("{message}");
        } else {
            eprintln!("Error: {message}");
        }
    }
    receipt
}

/// Exit code for a transfer that was abandoned.
pub(crate) fn abandoned(view: &TerminalView) -> ExitCode {
    view.abandon();
    eprintln!("Transfer abandoned.");
    ExitCode::from(ABANDONED_EXIT_CODE)
}
