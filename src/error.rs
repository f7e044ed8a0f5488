use std::fmt;
use std::sync::Arc;

use serde_json::error::Category;

pub type Result<T> = std::result::Result<T, Error>;

type Cause = Arc<dyn std::error::Error + Send + Sync>;

/// Which part of a response body failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingKind {
    MissingKey,
    TypeMismatch,
    ValueNotFound,
    Corrupted,
}

impl fmt::Display for DecodingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecodingKind::MissingKey => "missing key",
            DecodingKind::TypeMismatch => "type mismatch",
            DecodingKind::ValueNotFound => "value not found",
            DecodingKind::Corrupted => "corrupted data",
        };
        f.write_str(name)
    }
}

/// Errors returned by the repositories, the image cache and the gallery.
///
/// `Clone` because a single download result is handed to every requester
/// waiting on the same URL.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("network error: {0}")]
    Transport(#[source] Cause),
    #[error("bad status code: {0}")]
    BadStatus(u16),
    #[error("decoding error ({kind}): {detail}")]
    Decoding { kind: DecodingKind, detail: String },
    #[error("request cancelled")]
    Cancelled,
    #[error("image unavailable at {url}: {reason}")]
    ImageUnavailable { url: String, reason: String },
    #[error("gallery permission denied")]
    PermissionDenied,
    #[error("failed to save to gallery: {0}")]
    SaveFailed(#[source] Cause),
}

impl Error {
    pub fn transport(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Transport(Arc::new(cause))
    }

    pub fn save_failed(cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::SaveFailed(Arc::new(cause))
    }

    /// Short description fit for a toast or an error banner.
    pub fn humanized(&self) -> String {
        match self {
            Error::Transport(cause) => match cause.downcast_ref::<reqwest::Error>() {
                Some(e) if e.is_timeout() => "The request timed out".to_string(),
                Some(e) if e.is_connect() => "Cannot connect to server".to_string(),
                _ => format!("Network error: {cause}"),
            },
            Error::BadStatus(code) => format!("Bad status code: {code}"),
            Error::Decoding { kind, detail } => match kind {
                DecodingKind::MissingKey => format!("Missing key: {detail}"),
                DecodingKind::TypeMismatch => format!("Type mismatch: {detail}"),
                DecodingKind::ValueNotFound => format!("Value not found: {detail}"),
                DecodingKind::Corrupted => format!("Decoding failed: {detail}"),
            },
            Error::Cancelled => "Operation was cancelled".to_string(),
            Error::ImageUnavailable { .. } => "Image unavailable".to_string(),
            Error::PermissionDenied => "Gallery permission denied".to_string(),
            Error::SaveFailed(cause) => format!("Could not save images: {cause}"),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::transport(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        let detail = e.to_string();
        let kind = match e.classify() {
            Category::Data if detail.starts_with("missing field") => DecodingKind::MissingKey,
            Category::Data if detail.starts_with("invalid type: null") => {
                DecodingKind::ValueNotFound
            }
            Category::Data if detail.starts_with("invalid type") => DecodingKind::TypeMismatch,
            _ => DecodingKind::Corrupted,
        };
        Error::Decoding { kind, detail }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            Error::Cancelled
        } else {
            Error::transport(e)
        }
    }
}
