//! First-page previews for PDF uploads.
//!
//! Rendering sits behind [`PreviewRenderer`] so the upload flow never depends
//! on a particular rasterizer. [`PdftoppmRenderer`] shells out to poppler's
//! `pdftoppm`; tests plug in their own renderer.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Default directory prefix of preview objects.
pub const DEFAULT_PREVIEW_PREFIX: &str = "products";

/// Render resolution; 144 DPI is twice the PDF's native 72 units per inch.
pub const PREVIEW_DPI: u32 = 144;

/// Default rasterizer program.
pub const DEFAULT_PDFTOPPM: &str = "pdftoppm";

/// Errors producing a preview image. Never fatal to the upload.
#[derive(Debug, Error)]
pub enum PreviewError {
    /// Previews are turned off.
    #[error("preview rendering disabled")]
    Disabled,

    /// The rasterizer could not be started.
    #[error("could not run {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The rasterizer exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        /// Program that failed.
        program: PathBuf,
        /// Exit status description.
        status: String,
        /// Trimmed standard error.
        stderr: String,
    },

    /// Scratch files could not be created or read.
    #[error("preview scratch IO failed: {0}")]
    Scratch(#[source] std::io::Error),

    /// The rasterizer produced an empty image.
    #[error("renderer produced an empty image")]
    Empty,
}

/// Encoded preview image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPreview {
    /// Encoded image bytes.
    pub bytes: Bytes,
    /// File extension without the dot.
    pub extension: &'static str,
    /// MIME type of `bytes`.
    pub content_type: &'static str,
}

impl RenderedPreview {
    /// Wraps PNG bytes.
    #[must_use]
    pub fn png(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            extension: "png",
            content_type: "image/png",
        }
    }
}

/// Renders page 1 of a PDF into an image.
#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    /// Renders the first page of `pdf`.
    async fn render_first_page(&self, pdf: &Path) -> Result<RenderedPreview, PreviewError>;
}

/// Renderer that always declines; uploads then carry no preview.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRenderer;

#[async_trait]
impl PreviewRenderer for DisabledRenderer {
    async fn render_first_page(&self, _pdf: &Path) -> Result<RenderedPreview, PreviewError> {
        Err(PreviewError::Disabled)
    }
}

/// Renders with poppler's `pdftoppm` into a scratch directory.
#[derive(Debug, Clone)]
pub struct PdftoppmRenderer {
    program: PathBuf,
    dpi: u32,
}

impl Default for PdftoppmRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_PDFTOPPM)
    }
}

impl PdftoppmRenderer {
    /// Uses `program` at [`PREVIEW_DPI`].
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            dpi: PREVIEW_DPI,
        }
    }

    /// Overrides the render resolution.
    #[must_use]
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }
}

#[async_trait]
impl PreviewRenderer for PdftoppmRenderer {
    #[instrument(skip(self), fields(program = %self.program.display()))]
    async fn render_first_page(&self, pdf: &Path) -> Result<RenderedPreview, PreviewError> {
        let scratch = tempfile::tempdir().map_err(PreviewError::Scratch)?;
        let out_base = scratch.path().join("preview");

        let output = Command::new(&self.program)
            .arg("-png")
            .args(["-f", "1", "-l", "1"])
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-singlefile")
            .arg(pdf)
            .arg(&out_base)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| PreviewError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(PreviewError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let bytes = tokio::fs::read(out_base.with_extension("png"))
            .await
            .map_err(PreviewError::Scratch)?;
        if bytes.is_empty() {
            return Err(PreviewError::Empty);
        }
        debug!(bytes = bytes.len(), "preview rendered");
        Ok(RenderedPreview::png(bytes))
    }
}

/// `{prefix}/{user_id}/{product_id}/preview.{extension}`.
#[must_use]
pub fn preview_object_key(prefix: &str, user_id: u64, product_id: &str, extension: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{user_id}/{product_id}/preview.{extension}")
    } else {
        format!("{prefix}/{user_id}/{product_id}/preview.{extension}")
    }
}

/// Reference sent with the completion notice: a public URL when a base is
/// configured, else the object key itself.
#[must_use]
pub fn preview_reference(public_base_url: Option<&str>, object_key: &str) -> String {
    match public_base_url.map(str::trim).filter(|base| !base.is_empty()) {
        Some(base) => format!("{}/{object_key}", base.trim_end_matches('/')),
        None => object_key.to_string(),
    }
}
