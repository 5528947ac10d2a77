//! RFC 7233 single-range parsing and resolution.

use std::fmt;

/// A single byte range parsed from an HTTP `Range` request header.
///
/// Only the single-range forms are supported; multi-range requests are
/// rejected by [`ByteRange::parse`] and callers fall back to serving the
/// full object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-end`, both offsets inclusive.
    Bounded {
        /// First byte offset.
        start: u64,
        /// Last byte offset (inclusive).
        end: u64,
    },
    /// `bytes=start-`, from an offset to the end of the object.
    From {
        /// First byte offset.
        start: u64,
    },
    /// `bytes=-len`, the final `len` bytes of the object.
    Suffix {
        /// Number of trailing bytes.
        len: u64,
    },
}

impl ByteRange {
    /// Parses a `Range` header value such as `bytes=0-99`, `bytes=100-`
    /// or `bytes=-500`.
    ///
    /// Returns `None` for anything that is not a well-formed single bytes
    /// range, including multi-range values and inverted bounds.
    pub fn parse(header: &str) -> Option<Self> {
        let spec = header.trim().strip_prefix("bytes=")?;

        // Multi-range requests are not supported.
        if spec.contains(',') {
            return None;
        }

        if let Some(suffix) = spec.strip_prefix('-') {
            let len: u64 = suffix.parse().ok()?;
            if len == 0 {
                return None;
            }
            return Some(Self::Suffix { len });
        }

        if let Some(start) = spec.strip_suffix('-') {
            let start: u64 = start.parse().ok()?;
            return Some(Self::From { start });
        }

        let (start, end) = spec.split_once('-')?;
        let start: u64 = start.parse().ok()?;
        let end: u64 = end.parse().ok()?;
        if start > end {
            return None;
        }
        Some(Self::Bounded { start, end })
    }

    /// Resolves the range against an object of `size` bytes into an
    /// inclusive `(start, end)` pair.
    ///
    /// Ends past the last byte are clamped, matching what S3-compatible
    /// stores do. Returns `None` when the range is unsatisfiable: a start
    /// at or beyond the object size, or any range against an empty object.
    pub fn resolve(self, size: u64) -> Option<(u64, u64)> {
        if size == 0 {
            return None;
        }

        match self {
            Self::Bounded { start, end } => {
                (start < size).then(|| (start, end.min(size - 1)))
            }
            Self::From { start } => (start < size).then(|| (start, size - 1)),
            Self::Suffix { len } => Some((size - len.min(size), size - 1)),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded { start, end } => write!(f, "bytes={start}-{end}"),
            Self::From { start } => write!(f, "bytes={start}-"),
            Self::Suffix { len } => write!(f, "bytes=-{len}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bounded_range() {
        assert_eq!(
            ByteRange::parse("bytes=0-99"),
            Some(ByteRange::Bounded { start: 0, end: 99 })
        );
        assert_eq!(
            ByteRange::parse(" bytes=100-199 "),
            Some(ByteRange::Bounded { start: 100, end: 199 })
        );
    }

    #[test]
    fn parses_open_and_suffix_ranges() {
        assert_eq!(ByteRange::parse("bytes=500-"), Some(ByteRange::From { start: 500 }));
        assert_eq!(ByteRange::parse("bytes=-128"), Some(ByteRange::Suffix { len: 128 }));
    }

    #[test]
    fn rejects_malformed_ranges() {
        assert_eq!(ByteRange::parse("bytes=99-0"), None);
        assert_eq!(ByteRange::parse("bytes=0-99,200-299"), None);
        assert_eq!(ByteRange::parse("bytes=-0"), None);
        assert_eq!(ByteRange::parse("items=0-99"), None);
        assert_eq!(ByteRange::parse("bytes=abc-def"), None);
        assert_eq!(ByteRange::parse("0-99"), None);
    }

    #[test]
    fn resolves_within_object() {
        let range = ByteRange::Bounded { start: 0, end: 99 };
        assert_eq!(range.resolve(1000), Some((0, 99)));
    }

    #[test]
    fn clamps_end_to_object_size() {
        let range = ByteRange::Bounded { start: 0, end: 9999 };
        assert_eq!(range.resolve(100), Some((0, 99)));

        let range = ByteRange::Suffix { len: 500 };
        assert_eq!(range.resolve(100), Some((0, 99)));
    }

    #[test]
    fn open_range_runs_to_end() {
        let range = ByteRange::From { start: 10 };
        assert_eq!(range.resolve(100), Some((10, 99)));
    }

    #[test]
    fn suffix_range_takes_trailing_bytes() {
        let range = ByteRange::Suffix { len: 10 };
        assert_eq!(range.resolve(100), Some((90, 99)));
    }

    #[test]
    fn start_beyond_size_is_unsatisfiable() {
        assert_eq!(ByteRange::Bounded { start: 100, end: 200 }.resolve(100), None);
        assert_eq!(ByteRange::From { start: 100 }.resolve(100), None);
    }

    #[test]
    fn empty_object_is_unsatisfiable() {
        assert_eq!(ByteRange::Bounded { start: 0, end: 0 }.resolve(0), None);
        assert_eq!(ByteRange::Suffix { len: 1 }.resolve(0), None);
    }
}
