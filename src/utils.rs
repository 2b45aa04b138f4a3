//! Utility functions

/// Replace characters that are invalid in filenames on common filesystems.
///
/// Keeps the name non-empty: an input that sanitizes to nothing becomes
/// "download".
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    const INVALID: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| if INVALID.contains(&c) || c.is_control() { '_' } else { c })
        .collect();

    if sanitized.is_empty() {
        "download".to_string()
    } else {
        sanitized
    }
}

/// Derive a display/file name from a download link.
///
/// Takes the last path segment of the link, percent-decodes it and sanitizes
/// the result. Falls back to "download" when the link has no useful path.
#[must_use]
pub fn file_name_from_link(link: &str) -> String {
    let last_segment = link
        .rsplit('/')
        .next()
        .map(|s| s.split('?').next().unwrap_or(s))
        .unwrap_or("");

    let decoded = urlencoding::decode(last_segment)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| last_segment.to_string());

    sanitize_file_name(&decoded)
}

/// Format a progress fraction as a whole-percent display string, e.g. "42%".
///
/// The fraction is clamped to [0, 1] first.
#[must_use]
pub fn progress_percent_text(fraction: f32) -> String {
    let clamped = fraction.clamp(0.0, 1.0);
    format!("{}%", (clamped * 100.0).round() as u32)
}
