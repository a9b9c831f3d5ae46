//! Error type shared by the fetcher, decoder and session.
//!
//! Every failure of the progressive pipeline is delivered through
//! [`crate::PlayerEvent::Error`]; control calls never return these.

/// Result type used by this crate.
pub type PlayerResult<T> = Result<T, PlayerError>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    /// None of the supplied candidates can be played.
    #[error("no playable source among {candidates:?}")]
    NoPlayableSource { candidates: Vec<String> },

    /// The server answered a range request with a non-2xx status.
    #[error("status code {status} requesting {url}")]
    Transport { status: u16, url: String },

    /// The response carried no usable `content-range` header.
    #[error("`content-range` not found in response headers")]
    MissingRangeMetadata,

    /// The decode backend rejected the downloaded bytes.
    #[error("error decoding audio data: {0}")]
    Decode(String),

    /// The request failed before a status was available.
    #[error("request failed: {0}")]
    Request(String),

    /// The audio output could not be opened or driven.
    #[error("audio backend: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for PlayerError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => PlayerError::Transport {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => PlayerError::Request(e.to_string()),
        }
    }
}
