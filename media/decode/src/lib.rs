/*!
    FFmpeg decoding for the tmedia decode engine.

    This crate turns encoded packets into raw frames through FFmpeg's
    send/receive API, one packet in and zero or more frames out. Video
    decoders can run on a hardware device context; decoded hardware frames
    are transferred to system memory before they are handed out.
*/

mod audio;
mod frame;
mod hw;
mod video;

pub use audio::FfmpegAudioDecoder;
pub use frame::{FfmpegAudioFrame, FfmpegVideoFrame};
pub use hw::{HwDeviceContext, HwDeviceType};
pub use video::FfmpegVideoDecoder;
