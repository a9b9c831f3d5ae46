use std::fmt;

/// Half-open byte range `[start, end)`; `end == None` means "to the end of the resource".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Value for the HTTP `Range` header. HTTP ranges are inclusive, so the
    /// exclusive end is converted to `end - 1`.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end.saturating_sub(1)),
            None => format!("bytes={}-", self.start),
        }
    }

    /// Number of bytes this range asks for, if bounded.
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{}, {})", self.start, end),
            None => write!(f, "[{}, end)", self.start),
        }
    }
}

/// Compute the next range to request.
///
/// `total == 0` means the resource length is not known yet. Returns `None`
/// once everything has been downloaded.
pub fn next_range(downloaded: u64, total: u64, max_chunk_size: u64) -> Option<ByteRange> {
    let want = downloaded + max_chunk_size;

    if (downloaded == 0 && total == 0) || want < total {
        return Some(ByteRange {
            start: downloaded,
            end: Some(want),
        });
    }

    if downloaded >= total {
        return None;
    }

    Some(ByteRange {
        start: downloaded,
        end: None,
    })
}

/// Parsed `content-range` header: `<unit> <start>-<end>/<total>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub first: Option<u64>,
    pub last: Option<u64>,
    pub total: u64,
}

impl ContentRange {
    /// Parse a header value. Only the total is mandatory; an unknown total
    /// (`*`) is rejected because range planning cannot proceed without it.
    pub fn parse(value: &str) -> Option<Self> {
        let (range, total) = value.trim().rsplit_once('/')?;
        let total = total.trim().parse::<u64>().ok()?;

        let span = range.split_whitespace().last().unwrap_or("");
        let (first, last) = match span.split_once('-') {
            Some((a, b)) => (a.parse().ok(), b.parse().ok()),
            None => (None, None),
        };

        Some(Self { first, last, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_is_bounded() {
        let r = next_range(0, 0, 1_000_000).unwrap();
        assert_eq!(r.start, 0);
        assert_eq!(r.end, Some(1_000_000));
        assert_eq!(r.header_value(), "bytes=0-999999");
    }

    #[test]
    fn middle_request_stays_bounded_while_below_total() {
        let r = next_range(1_000_000, 3_000_000, 1_000_000).unwrap();
        assert_eq!(r.start, 1_000_000);
        assert_eq!(r.end, Some(2_000_000));
        assert_eq!(r.len(), Some(1_000_000));
    }

    #[test]
    fn last_request_is_open_ended() {
        let r = next_range(2_000_000, 3_000_000, 1_000_000).unwrap();
        assert_eq!(r.end, None);
        assert_eq!(r.header_value(), "bytes=2000000-");

        let r = next_range(2_500_000, 3_000_000, 1_000_000).unwrap();
        assert_eq!(r.start, 2_500_000);
        assert_eq!(r.end, None);
    }

    #[test]
    fn complete_download_yields_nothing() {
        assert_eq!(next_range(3_000_000, 3_000_000, 1_000_000), None);
        assert_eq!(next_range(3_000_001, 3_000_000, 1_000_000), None);
    }

    #[test]
    fn range_is_deterministic() {
        for (d, t, m) in [(0, 0, 10), (10, 100, 10), (95, 100, 10), (100, 100, 10)] {
            assert_eq!(next_range(d, t, m), next_range(d, t, m));
        }
    }

    #[test]
    fn parses_content_range() {
        let cr = ContentRange::parse("bytes 0-999999/3000000").unwrap();
        assert_eq!(cr.first, Some(0));
        assert_eq!(cr.last, Some(999_999));
        assert_eq!(cr.total, 3_000_000);
    }

    #[test]
    fn rejects_unknown_or_malformed_total() {
        assert_eq!(ContentRange::parse("bytes 0-99/*"), None);
        assert_eq!(ContentRange::parse("bytes 0-99"), None);
        assert_eq!(ContentRange::parse(""), None);
    }

    #[test]
    fn accepts_unsatisfied_range_form() {
        let cr = ContentRange::parse("bytes */4096").unwrap();
        assert_eq!(cr.total, 4096);
        assert_eq!(cr.first, None);
    }
}
