//! Picking the first playable candidate.
//!
//! Only the decision is made here; the session reports an empty selection as
//! [`PlayerError::NoPlayableSource`](crate::PlayerError::NoPlayableSource) on
//! its driver task, never synchronously.

/// Containers the bundled decoder handles.
const PLAYABLE_EXTENSIONS: &[&str] = &["mp3", "mpga", "flac", "wav", "wave", "aac", "adts"];

const PLAYABLE_MIME_TYPES: &[&str] = &[
    "audio/mpeg",
    "audio/mp3",
    "audio/flac",
    "audio/x-flac",
    "audio/wav",
    "audio/wave",
    "audio/x-wav",
    "audio/vnd.wave",
    "audio/aac",
];

/// A URL, optionally with a declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    pub src: String,
    pub mime: Option<String>,
}

impl SourceCandidate {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// A declared MIME type wins over the URL extension.
    pub fn can_play(&self) -> bool {
        if self.src.is_empty() {
            return false;
        }
        match &self.mime {
            Some(mime) => {
                let essence = mime.split(';').next().unwrap_or("").trim();
                PLAYABLE_MIME_TYPES
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(essence))
            }
            None => extension_from_url(&self.src)
                .is_some_and(|ext| PLAYABLE_EXTENSIONS.contains(&ext.as_str())),
        }
    }
}

impl From<&str> for SourceCandidate {
    fn from(src: &str) -> Self {
        Self::new(src)
    }
}

impl From<String> for SourceCandidate {
    fn from(src: String) -> Self {
        Self::new(src)
    }
}

/// The first candidate that can be played.
pub fn select_playable(candidates: &[SourceCandidate]) -> Option<&SourceCandidate> {
    candidates.iter().find(|c| c.can_play())
}

/// Lowercase file extension of a URL path, ignoring query and fragment.
pub fn extension_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
