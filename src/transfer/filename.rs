//! File naming for saved downloads.

use std::path::{Path, PathBuf};

/// Name used when no candidate survives sanitization.
pub(crate) const FALLBACK_FILENAME: &str = "download";

/// Picks the saved file name from the available candidates.
///
/// Order: the response's `Content-Disposition`, the name the backend
/// suggested, the product title, then [`FALLBACK_FILENAME`]. A candidate
/// without an extension borrows one from the response content type.
pub(crate) fn choose_filename(
    content_disposition: Option<&str>,
    suggested: Option<&str>,
    product_title: &str,
    content_type: Option<&str>,
) -> String {
    let candidate = content_disposition
        .and_then(parse_content_disposition)
        .into_iter()
        .chain(suggested.map(str::to_string))
        .chain(std::iter::once(product_title.to_string()))
        .map(|name| sanitize_filename(name.trim()))
        .find(|name| !name.trim_matches('_').is_empty())
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string());

    if Path::new(&candidate).extension().is_some() {
        return candidate;
    }
    match content_type.and_then(extension_from_content_type) {
        Some(ext) => format!("{candidate}{ext}"),
        None => candidate,
    }
}

/// Extension for the content types products are commonly sold as.
pub(crate) fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();

    match mime.as_str() {
        "application/pdf" => Some(".pdf"),
        "application/zip" | "application/x-zip-compressed" => Some(".zip"),
        "application/epub+zip" => Some(".epub"),
        "text/plain" => Some(".txt"),
        "image/jpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "video/mp4" => Some(".mp4"),
        "audio/mpeg" => Some(".mp3"),
        _ => None,
    }
}

/// File name carried by a `Content-Disposition` value.
///
/// Parameters are matched case-insensitively. An RFC 5987 `filename*`
/// (`UTF-8''Gu%C3%ADa.pdf`) wins over a plain or quoted `filename`.
pub(crate) fn parse_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for param in header.split(';').skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = value.split_once("''").map_or(value, |(_, rest)| rest);
                if let Ok(decoded) = urlencoding::decode(encoded) {
                    return Some(decoded.into_owned());
                }
            }
            "filename" => plain = Some(value.trim_matches('"').to_string()),
            _ => {}
        }
    }
    plain.filter(|name| !name.is_empty())
}

/// Turns a header value, suggested name or product title into one safe path
/// segment.
///
/// Separators and characters reserved on common file systems become `_`,
/// whitespace runs collapse to one space and leading or trailing dots and
/// spaces are dropped, so `..` and hidden names come out empty.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => ' ',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    replaced
        .split(' ')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c| c == '.' || c == ' ')
        .to_string()
}

/// Returns `dir/filename`, or `dir/{stem}_{n}.{ext}` with the first free `n >= 2`.
pub(crate) fn resolve_unique_path(dir: &Path, filename: &str) -> PathBuf {
    let base = dir.join(filename);
    if !base.exists() {
        return base;
    }

    let name = Path::new(filename);
    let stem = name
        .file_stem()
        .map_or_else(|| filename.into(), |stem| stem.to_string_lossy());
    let extension = name
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    (2..=u32::MAX)
        .map(|n| dir.join(format!("{stem}_{n}{extension}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(base)
}
