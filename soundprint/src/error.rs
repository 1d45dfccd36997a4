use thiserror::Error;

use crate::corpus::TrackId;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by fingerprinting and index construction.
#[derive(Debug, Error)]
pub enum Error {
    #[error("audio source unavailable: {reason}")]
    SourceUnavailable {
        reason: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("insufficient audio: the source contains no samples")]
    InsufficientAudio,

    #[error("signature #{position} of track {track_id} has {actual} bits, expected {expected}")]
    InconsistentSignature {
        track_id: TrackId,
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("fingerprinting was cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn source_unavailable(reason: impl Into<String>) -> Self {
        Error::SourceUnavailable { reason: reason.into(), source: None }
    }

    pub(crate) fn source_unavailable_with<E>(reason: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::SourceUnavailable { reason: reason.into(), source: Some(Box::new(source)) }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Error::InvalidConfiguration(message.into())
    }
}
