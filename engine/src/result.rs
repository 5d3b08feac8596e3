/*!
    Result types of the engine's host-facing operations.

    Expected conditions (end of stream, need more input, stream
    classification) are encoded as variants here; only unexpected failures
    carry an [`Error`].
*/

use tmedia_types::{Error, StreamKind};

/**
    Outcome of coarse operations: prepare, pause, seek, release.
*/
pub type OptResult = Result<(), Error>;

/**
    Outcome of [`PlayerContext::read_packet`](crate::PlayerContext::read_packet).
*/
#[derive(Debug)]
pub enum ReadPacketResult {
    /// A packet of the main video stream is ready to move.
    Video,
    /// A packet of the main audio stream is ready to move.
    Audio,
    /// A subtitle packet; subtitles are never decoded.
    Subtitle,
    /// A packet of an attached picture such as cover art.
    VideoAttachment,
    /// The container is exhausted. Pipelines may still hold frames.
    Eof,
    /// Reading failed, e.g. on a corrupt container.
    Fail(Error),
    /// A packet of a stream the engine does not use.
    Unknown,
    /// Reading is paused; the cursor did not move and nothing was read.
    Paused,
    /// A seek posted through the control handle was applied instead of
    /// reading. The pipelines now hold the frame the seek landed on.
    Seeked,
}

impl ReadPacketResult {
    /**
        Returns true if a packet is now held and must be moved or discarded.
    */
    pub fn has_packet(&self) -> bool {
        matches!(
            self,
            Self::Video | Self::Audio | Self::Subtitle | Self::VideoAttachment | Self::Unknown
        )
    }
}

/**
    Outcome of [`PlayerContext::decode_video`](crate::PlayerContext::decode_video)
    and [`PlayerContext::decode_audio`](crate::PlayerContext::decode_audio).
*/
#[derive(Debug)]
pub enum DecodeResult {
    /// A frame is ready to move into a buffer.
    Success,
    /// A frame is ready, but the decoder did not take the pending packet.
    /// Decode again before reading another packet.
    SuccessAndSkipNextPkt,
    /// The decoder failed. Not retried automatically.
    Fail(Error),
    /// The packet was consumed but no frame came out yet; read another.
    FailAndNeedMorePkt,
    /// The decoder is fully drained.
    End,
}

impl DecodeResult {
    /**
        Returns true if a new frame is ready to move into a buffer.
    */
    pub fn has_frame(&self) -> bool {
        matches!(self, Self::Success | Self::SuccessAndSkipNextPkt)
    }
}

/**
    Which pipeline slot a packet is moved into.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketTarget {
    Video,
    Audio,
}

impl PacketTarget {
    pub fn kind(self) -> StreamKind {
        match self {
            Self::Video => StreamKind::Video,
            Self::Audio => StreamKind::Audio,
        }
    }
}

/**
    How the video stream is decoded. Decided once at prepare time.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum DecodePath {
    Software,
    Hardware,
}
