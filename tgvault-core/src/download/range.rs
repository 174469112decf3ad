use crate::errors::{Result, TgVaultError};

/// Outcome of parsing a `Range` header against a known total size (spec.md
/// §4.7 "Range parsing", RFC 7233 §2.1/§3.1). `start`/`end` are meaningless
/// when `empty` is set — a zero-byte item with no `Range` header is the one
/// case with no byte to serve at all (spec.md §8: `{0,-1}`, `partial=false`),
/// which an inclusive `u64` pair can't represent directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Inclusive.
    pub end: u64,
    pub empty: bool,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        if self.empty {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

/// Parses a single `bytes=` range against `total_size`. Multi-range requests
/// (`bytes=0-10,20-30`) are deliberately rejected as `BadInput` — spec.md
/// §4.7 only promises single-range responses, matching what most Telegram
/// clients and browsers actually send for streaming.
///
/// - No `Range` header at all: returns the full-file range `[0, total-1]`,
///   or the empty range when `total_size == 0`.
/// - `bytes=A-B`: returns `[A, B]` clamped to `total-1`.
/// - `bytes=A-` (open-ended): returns `[A, total-1]`.
/// - `bytes=-N` (suffix): returns the last `N` bytes.
/// - `A` beyond `total_size`, or a range that resolves to zero bytes:
///   `RangeNotSatisfiable`.
pub fn parse_single_range(header: Option<&str>, total_size: u64) -> Result<ByteRange> {
    let header = match header {
        None => {
            return Ok(if total_size == 0 {
                ByteRange { start: 0, end: 0, empty: true }
            } else {
                ByteRange { start: 0, end: total_size - 1, empty: false }
            })
        }
        Some(h) => h,
    };

    if total_size == 0 {
        return Err(TgVaultError::RangeNotSatisfiable);
    }

    let spec = header
        .strip_prefix("bytes=")
        .ok_or_else(|| TgVaultError::BadInput(format!("unsupported range unit in {:?}", header)))?;

    if spec.contains(',') {
        return Err(TgVaultError::BadInput("multi-range requests are not supported".into()));
    }

    let (start_str, end_str) = spec
        .split_once('-')
        .ok_or_else(|| TgVaultError::BadInput(format!("malformed range {:?}", header)))?;

    if start_str.is_empty() {
        // Suffix range: last N bytes.
        let suffix_len: u64 = end_str
            .parse()
            .map_err(|_| TgVaultError::BadInput(format!("malformed suffix range {:?}", header)))?;
        if suffix_len == 0 {
            return Err(TgVaultError::RangeNotSatisfiable);
        }
        let start = total_size.saturating_sub(suffix_len);
        return Ok(ByteRange {
            start,
            end: total_size - 1,
            empty: false,
        });
    }

    let start: u64 = start_str
        .parse()
        .map_err(|_| TgVaultError::BadInput(format!("malformed range start in {:?}", header)))?;

    if start >= total_size {
        return Err(TgVaultError::RangeNotSatisfiable);
    }

    let end = if end_str.is_empty() {
        total_size - 1
    } else {
        let requested_end: u64 = end_str
            .parse()
            .map_err(|_| TgVaultError::BadInput(format!("malformed range end in {:?}", header)))?;
        if requested_end < start {
            return Err(TgVaultError::RangeNotSatisfiable);
        }
        requested_end.min(total_size - 1)
    };

    Ok(ByteRange { start, end, empty: false })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_header_returns_full_file() {
        let r = parse_single_range(None, 100).unwrap();
        assert_eq!(r, ByteRange { start: 0, end: 99, empty: false });
    }

    #[test]
    fn explicit_bounds_are_honored() {
        let r = parse_single_range(Some("bytes=10-20"), 100).unwrap();
        assert_eq!(r, ByteRange { start: 10, end: 20, empty: false });
    }

    #[test]
    fn open_ended_range_extends_to_eof() {
        let r = parse_single_range(Some("bytes=90-"), 100).unwrap();
        assert_eq!(r, ByteRange { start: 90, end: 99, empty: false });
    }

    #[test]
    fn suffix_range_returns_last_n_bytes() {
        let r = parse_single_range(Some("bytes=-10"), 100).unwrap();
        assert_eq!(r, ByteRange { start: 90, end: 99, empty: false });
    }

    #[test]
    fn end_beyond_total_size_is_clamped() {
        let r = parse_single_range(Some("bytes=0-1000"), 100).unwrap();
        assert_eq!(r, ByteRange { start: 0, end: 99, empty: false });
    }

    #[test]
    fn start_beyond_total_size_is_not_satisfiable() {
        let err = parse_single_range(Some("bytes=200-300"), 100).unwrap_err();
        assert!(matches!(err, TgVaultError::RangeNotSatisfiable));
    }

    #[test]
    fn multi_range_requests_are_rejected() {
        let err = parse_single_range(Some("bytes=0-10,20-30"), 100).unwrap_err();
        assert!(matches!(err, TgVaultError::BadInput(_)));
    }

    #[test]
    fn zero_length_file_is_not_satisfiable_with_a_range_header() {
        let err = parse_single_range(Some("bytes=0-10"), 0).unwrap_err();
        assert!(matches!(err, TgVaultError::RangeNotSatisfiable));
    }

    #[test]
    fn zero_length_file_without_header_returns_empty_range() {
        let r = parse_single_range(None, 0).unwrap();
        assert!(r.empty);
        assert_eq!(r.len(), 0);
    }
}
