//! Local checks applied before any network call.

use std::path::Path;

use tokio::io::AsyncReadExt;

use super::error::ValidationError;

/// Largest accepted payload: 10 GiB.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024 * 1024;

/// Leading bytes of every PDF document.
pub const PDF_SIGNATURE: &[u8; 4] = b"%PDF";

/// MIME type that marks a payload as a PDF document.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Returns true when the declared MIME type or the file name marks a PDF.
///
/// The suffix check is case-insensitive.
#[must_use]
pub fn is_pdf(file_name: &str, mime_type: &str) -> bool {
    mime_type.trim().eq_ignore_ascii_case(PDF_MIME_TYPE)
        || file_name.to_ascii_lowercase().ends_with(".pdf")
}

/// Validates a payload file and returns its size in bytes.
///
/// Zero-byte files are accepted; there is no minimum size.
///
/// # Errors
///
/// Returns [`ValidationError::FileTooLarge`] above [`MAX_UPLOAD_BYTES`],
/// [`ValidationError::InvalidPdf`] when a declared PDF lacks the signature,
/// and [`ValidationError::Unreadable`] when the file cannot be inspected.
pub async fn validate_payload(
    path: &Path,
    file_name: &str,
    mime_type: &str,
) -> Result<u64, ValidationError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| ValidationError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    let size = metadata.len();
    check_size(size)?;

    if is_pdf(file_name, mime_type) {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|source| ValidationError::Unreadable {
                path: path.to_path_buf(),
                source,
            })?;
        let mut header = [0_u8; 4];
        let mut filled = 0;
        while filled < header.len() {
            let read = file.read(&mut header[filled..]).await.map_err(|source| {
                ValidationError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        if !has_pdf_signature(&header[..filled]) {
            return Err(ValidationError::InvalidPdf {
                path: path.to_path_buf(),
            });
        }
    }

    Ok(size)
}

/// Rejects sizes above [`MAX_UPLOAD_BYTES`].
///
/// # Errors
///
/// Returns [`ValidationError::FileTooLarge`] when `size` exceeds the limit.
pub fn check_size(size: u64) -> Result<(), ValidationError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge {
            size,
            max: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Returns true when `header` starts with `%PDF`.
#[must_use]
pub fn has_pdf_signature(header: &[u8]) -> bool {
    header.starts_with(PDF_SIGNATURE)
}
