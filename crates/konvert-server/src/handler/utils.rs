//! Small helpers shared by the download and release handlers.

use std::sync::LazyLock;

use regex::Regex;

/// Fallback filename when the object key has no usable final segment.
const DEFAULT_FILENAME: &str = "download";

/// Version fallback when the filename carries no recognizable version.
const DEFAULT_VERSION: &str = "1.0.0";

/// Filename patterns carrying a version, in match-priority order:
/// `Setup-X.Y.Z`/`Mac-X.Y.Z`, then `vX.Y.Z`, then any bare `X.Y.Z`.
static VERSION_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)(?:Setup|Mac)-(\d+\.\d+\.\d+)").unwrap(),
        Regex::new(r"(?i)v(\d+\.\d+\.\d+)").unwrap(),
        Regex::new(r"(\d+\.\d+\.\d+)").unwrap(),
    ]
});

/// Returns the last non-empty path segment of an object key.
pub(crate) fn filename_from_key(key: &str) -> &str {
    key.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(DEFAULT_FILENAME)
}

/// Extracts a semantic version from an installer filename.
pub(crate) fn extract_version(filename: &str) -> String {
    VERSION_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(filename))
        .and_then(|captures| captures.get(1))
        .map(|version| version.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_VERSION.to_string())
}

/// Formats a byte count for the download page, e.g. `42.5 MB`.
pub(crate) fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{size:.1} {}", UNITS[unit])
}

/// Formats a release date in long form, e.g. `March 8, 2025`.
pub(crate) fn format_release_date(timestamp: jiff::Timestamp) -> String {
    let date = timestamp.to_zoned(jiff::tz::TimeZone::UTC).date();
    format!("{} {}, {}", date.strftime("%B"), date.day(), date.year())
}
