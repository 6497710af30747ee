//! Pure helpers: format inference (no HTTP, no status logic).
//!
//! Payload signatures win over names: an artifact stored as `tile.dds` that
//! holds PNG bytes is a PNG.

use std::path::Path;

const SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "png"),
    (b"\xff\xd8\xff", "jpeg"),
    (b"GIF87a", "gif"),
    (b"GIF89a", "gif"),
    (b"II*\0", "tiff"),
    (b"MM\0*", "tiff"),
    (b"DDS ", "dds"),
    (b"\xabKTX 20\xbb", "ktx2"),
    (b"\xabKTX 11\xbb", "ktx"),
];

/// Format tag from the leading bytes of a payload, if recognized.
///
/// ```
/// use asset_cache::loader::format_from_signature;
///
/// assert_eq!(format_from_signature(b"\x89PNG\r\n\x1a\n...."), Some("png"));
/// assert_eq!(format_from_signature(b"plain text"), None);
/// ```
pub fn format_from_signature(data: &[u8]) -> Option<&'static str> {
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return Some("webp");
    }
    SIGNATURES
        .iter()
        .find(|(magic, _)| data.starts_with(magic))
        .map(|(_, format)| *format)
}

/// Format tag from a file extension (lowercased, empty when absent).
pub(crate) fn format_from_path(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// Format tag from a URL, ignoring query string and fragment.
pub(crate) fn format_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rfind('.') {
        Some(dot) if dot + 1 < file_name.len() => file_name[dot + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Format tag from a `Content-Type` value.
///
/// `image/png` → `png`, `image/vnd-ms.dds` → `dds`, `image/jpeg; q=1` → `jpeg`.
/// Generic types such as `application/octet-stream` give `None`.
pub(crate) fn format_from_content_type(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let (top, sub) = essence.split_once('/')?;
    if top != "image" {
        return None;
    }
    let sub = sub.rsplit(['.', '-']).next().unwrap_or(sub);
    let sub = sub.strip_prefix("x-").unwrap_or(sub);
    if sub.is_empty() {
        None
    } else {
        Some(sub.to_string())
    }
}
