/*!
    Error type shared by every crate of the engine.
*/

use thiserror::Error;

use crate::StreamKind;

/**
    Errors produced while opening, demuxing, decoding or converting media,
    and while driving a player context through its lifecycle.
*/
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // ── Media library ─────────────────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("hardware decoding unavailable: {0}")]
    HardwareUnavailable(String),

    // ── Lifecycle ─────────────────────────────────────────────────────
    #[error("player context is not prepared")]
    NotPrepared,
    #[error("player context is already prepared")]
    AlreadyPrepared,
    #[error("player context failed to prepare and is unusable")]
    PrepareFailed,
    #[error("player context has been released")]
    Released,

    // ── Pipelines ─────────────────────────────────────────────────────
    #[error("container has no {0} stream")]
    NoStream(StreamKind),
    #[error("no decoded frame is available")]
    NoFrame,
    #[error("no unread packet is available")]
    NoPacket,
    #[error("{0} packet slot is still occupied")]
    SlotOccupied(StreamKind),
}

impl Error {
    /**
        Create a codec error from any message.
    */
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    /**
        Create an invalid data error from any message.
    */
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /**
        Create an unsupported format error from any message.
    */
    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::UnsupportedFormat(message.into())
    }

    /**
        Returns true if this error comes from the context lifecycle rather
        than from the media itself.
    */
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::NotPrepared | Self::AlreadyPrepared | Self::PrepareFailed | Self::Released
        )
    }
}

/// Type alias for results that may return an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_keep_message() {
        assert_eq!(
            Error::codec("send failed").to_string(),
            "codec error: send failed"
        );
        assert_eq!(
            Error::NoStream(StreamKind::Audio).to_string(),
            "container has no audio stream"
        );
    }

    #[test]
    fn lifecycle_errors_are_classified() {
        assert!(Error::Released.is_lifecycle());
        assert!(Error::PrepareFailed.is_lifecycle());
        assert!(!Error::NoFrame.is_lifecycle());
        assert!(!Error::invalid_data("x").is_lifecycle());
    }
}
