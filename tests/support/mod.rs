//! Shared fixtures for the transfer integration tests: a recording observer,
//! a canned preview renderer and client builders pointed at a mock server.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use transfer_core::api::{ApiClient, HttpTimeouts};
use transfer_core::auth::AuthContext;
use transfer_core::progress::ProgressSnapshot;
use transfer_core::transfer::{
    Operation, Phase, PhaseOutcome, PreviewError, PreviewRenderer, RenderedPreview,
    TransferClient, TransferClientBuilder, TransferEvent, TransferObserver, TransferState,
};
use wiremock::MockServer;

pub const USER_ID: u64 = 7;
pub const INIT_DATA: &str = "query_id=AAE&user=%7B%22id%22%3A7%7D&hash=abc";

pub fn auth() -> AuthContext {
    AuthContext::new(INIT_DATA, USER_ID).expect("valid auth context")
}

pub fn api(server: &MockServer) -> ApiClient {
    ApiClient::new(&format!("{}/api/", server.uri()), HttpTimeouts::default())
        .expect("valid base URL")
}

/// Builder with a recording observer attached and previews rendered by `renderer`.
pub fn builder(
    server: &MockServer,
    recorder: &Arc<Recorder>,
    renderer: Arc<dyn PreviewRenderer>,
) -> TransferClientBuilder {
    let observer: Arc<dyn TransferObserver> = recorder.clone();
    TransferClient::builder(api(server))
        .observer(observer)
        .preview_renderer(renderer)
}

/// Writes `contents` to `name` inside `dir`.
pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture file");
    path
}

/// Observer that keeps everything it is told.
#[derive(Default)]
pub struct Recorder {
    states: Mutex<Vec<TransferState>>,
    events: Mutex<Vec<TransferEvent>>,
    progress: Mutex<Vec<ProgressSnapshot>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn states(&self) -> Vec<TransferState> {
        self.states.lock().expect("states lock").clone()
    }

    pub fn events(&self) -> Vec<TransferEvent> {
        self.events.lock().expect("events lock").clone()
    }

    pub fn progress(&self) -> Vec<ProgressSnapshot> {
        self.progress.lock().expect("progress lock").clone()
    }

    pub fn outcome_of(&self, phase: Phase) -> Option<PhaseOutcome> {
        self.events()
            .into_iter()
            .find(|event| event.phase == phase)
            .map(|event| event.outcome)
    }
}

impl TransferObserver for Recorder {
    fn on_state(&self, _operation: Operation, state: TransferState) {
        self.states.lock().expect("states lock").push(state);
    }

    fn on_event(&self, event: &TransferEvent) {
        self.events.lock().expect("events lock").push(event.clone());
    }

    fn on_progress(&self, _operation: Operation, snapshot: &ProgressSnapshot) {
        self.progress.lock().expect("progress lock").push(*snapshot);
    }
}

/// Renderer returning fixed PNG bytes, or failing when built with `failing()`.
pub struct FakeRenderer {
    fail: bool,
}

pub const PREVIEW_BYTES: &[u8] = b"\x89PNG fake preview";

impl FakeRenderer {
    pub fn working() -> Arc<dyn PreviewRenderer> {
        Arc::new(Self { fail: false })
    }

    pub fn failing() -> Arc<dyn PreviewRenderer> {
        Arc::new(Self { fail: true })
    }
}

#[async_trait]
impl PreviewRenderer for FakeRenderer {
    async fn render_first_page(&self, _pdf: &Path) -> Result<RenderedPreview, PreviewError> {
        if self.fail {
            return Err(PreviewError::Empty);
        }
        Ok(RenderedPreview::png(Bytes::from_static(PREVIEW_BYTES)))
    }
}
