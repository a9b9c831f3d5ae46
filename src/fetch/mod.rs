//! Chunked range fetching.
//!
//! [`ChunkedFetcher`] holds the download bookkeeping for one remote resource:
//! how much has arrived, how large the resource is, and every byte downloaded
//! so far. It performs no I/O itself; the session sends the ranges it plans
//! through a [`RangeTransport`] and hands the responses back to [`ChunkedFetcher::accept`].

pub mod range;
pub mod transport;

use bytes::{Bytes, BytesMut};

use crate::error::{PlayerError, PlayerResult};

pub use range::{next_range, ByteRange, ContentRange};
pub use transport::{HttpTransport, ProgressSink, RangeResponse, RangeTransport};

/// Default bytes per range request.
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1_000_000;

/// Bookkeeping after a chunk has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkReceipt {
    /// Bytes appended by this chunk.
    pub chunk_len: u64,
    /// Bytes downloaded so far, this chunk included.
    pub downloaded: u64,
    /// Resource size.
    pub total: u64,
}

impl ChunkReceipt {
    pub fn is_complete(&self) -> bool {
        self.downloaded >= self.total
    }
}

pub struct ChunkedFetcher {
    url: String,
    max_chunk_size: u64,
    downloaded: u64,
    /// 0 until the first response reports it.
    total: u64,
    accumulator: BytesMut,
}

impl ChunkedFetcher {
    pub fn new(url: impl Into<String>, max_chunk_size: u64) -> Self {
        Self {
            url: url.into(),
            max_chunk_size: max_chunk_size.max(1),
            downloaded: 0,
            total: 0,
            accumulator: BytesMut::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.downloaded >= self.total
    }

    /// The range the next request should cover, or `None` when fully downloaded.
    pub fn next_request(&self) -> Option<ByteRange> {
        next_range(self.downloaded, self.total, self.max_chunk_size)
    }

    /// Validate a response and append its body.
    ///
    /// The status is checked first, then the presence of a parseable
    /// `content-range` header, on every response. The total is captured from
    /// the first response only.
    pub fn accept(&mut self, response: RangeResponse) -> PlayerResult<ChunkReceipt> {
        if !response.is_success() {
            return Err(PlayerError::Transport {
                status: response.status,
                url: self.url.clone(),
            });
        }

        let content_range = response
            .content_range
            .as_deref()
            .and_then(ContentRange::parse)
            .ok_or(PlayerError::MissingRangeMetadata)?;

        if self.total == 0 {
            self.total = content_range.total;
        }

        let mut body = response.body;
        let room = self.total.saturating_sub(self.downloaded);
        if body.len() as u64 > room {
            tracing::warn!(
                received = body.len(),
                room,
                "server sent bytes past the end of the resource, truncating"
            );
            body.truncate(room as usize);
        }

        self.downloaded += body.len() as u64;
        self.accumulator.extend_from_slice(&body);

        tracing::debug!(
            url = %self.url,
            chunk = body.len(),
            downloaded = self.downloaded,
            total = self.total,
            "chunk accepted"
        );

        Ok(ChunkReceipt {
            chunk_len: body.len() as u64,
            downloaded: self.downloaded,
            total: self.total,
        })
    }

    /// Everything downloaded so far, in arrival order.
    pub fn bytes(&self) -> &[u8] {
        &self.accumulator
    }

    /// An owned copy of the accumulator for handing to a decode task.
    pub fn snapshot(&self) -> Bytes {
        Bytes::copy_from_slice(&self.accumulator)
    }
}
