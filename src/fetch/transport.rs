//! HTTP range transport.
//!
//! The fetcher only needs "send one range request, get status + content-range +
//! body back". [`RangeTransport`] is that seam; [`HttpTransport`] implements it
//! with `reqwest`, reporting progress as body pieces arrive.

use std::future::Future;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use reqwest::header::{CONTENT_RANGE, RANGE};
use reqwest::Client;

use crate::error::{PlayerError, PlayerResult};
use crate::events::{EventSink, PlayerEvent};
use crate::fetch::range::{ByteRange, ContentRange};

/// Raw answer to a range request. Validation happens in the fetcher.
#[derive(Debug, Clone)]
pub struct RangeResponse {
    pub status: u16,
    /// Raw `content-range` header value, if present.
    pub content_range: Option<String>,
    pub body: Bytes,
}

impl RangeResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one range request against a URL.
pub trait RangeTransport: Send + Sync + 'static {
    fn fetch(
        &self,
        url: &str,
        range: ByteRange,
        progress: ProgressSink,
    ) -> impl Future<Output = PlayerResult<RangeResponse>> + Send;
}

/// Reports download progress of one request as resource-level numbers.
#[derive(Clone)]
pub struct ProgressSink {
    events: Option<EventSink>,
    offset: u64,
    known_total: u64,
}

impl ProgressSink {
    pub fn new(events: EventSink, offset: u64, known_total: u64) -> Self {
        Self {
            events: Some(events),
            offset,
            known_total,
        }
    }

    /// A sink that reports nowhere.
    pub fn detached() -> Self {
        Self {
            events: None,
            offset: 0,
            known_total: 0,
        }
    }

    /// `received` counts bytes of the current request; `total_hint` is the
    /// resource size as far as the transport can tell.
    pub fn report(&self, received: u64, total_hint: Option<u64>) {
        let Some(events) = &self.events else {
            return;
        };
        let total = if self.known_total > 0 {
            self.known_total
        } else {
            total_hint.unwrap_or(0)
        };
        events.emit(PlayerEvent::Progress {
            loaded: self.offset + received,
            total,
        });
    }
}

/// `reqwest`-backed transport. Timeouts are left to the client configuration.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client with a connect timeout; request duration is unbounded since
    /// chunks can be large.
    pub fn with_connect_timeout(timeout: Duration) -> PlayerResult<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| PlayerError::Request(e.to_string()))?;
        Ok(Self::new(client))
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl RangeTransport for HttpTransport {
    fn fetch(
        &self,
        url: &str,
        range: ByteRange,
        progress: ProgressSink,
    ) -> impl Future<Output = PlayerResult<RangeResponse>> + Send {
        let client = self.client.clone();
        let url = url.to_string();

        async move {
            tracing::debug!(%url, %range, "requesting range");
            let mut response = client
                .get(&url)
                .header(RANGE, range.header_value())
                .send()
                .await?;

            let status = response.status().as_u16();
            let content_range = response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let total_hint = content_range
                .as_deref()
                .and_then(ContentRange::parse)
                .map(|cr| cr.total)
                .or_else(|| response.content_length().map(|len| range.start + len));

            let mut body = BytesMut::new();
            while let Some(piece) = response.chunk().await? {
                body.extend_from_slice(&piece);
                progress.report(body.len() as u64, total_hint);
            }

            Ok(RangeResponse {
                status,
                content_range,
                body: body.freeze(),
            })
        }
    }
}
