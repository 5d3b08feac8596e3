/*!
    FFmpeg demuxing for the tmedia decode engine.

    This crate handles the input side of the engine. It opens a container,
    inventories its streams and metadata, reads encoded packets in container
    order and repositions the read cursor on keyframes.
*/

mod codec_config;
pub mod convert;
mod probe;
mod source;

pub use codec_config::CodecConfig;
pub use probe::probe;
pub use source::{FfmpegDemuxer, FfmpegPacket};

/**
    Initialize FFmpeg once per process. Safe to call repeatedly.
*/
pub fn init() -> tmedia_types::Result<()> {
    ffmpeg_next::init().map_err(|e| tmedia_types::Error::codec(e.to_string()))
}
