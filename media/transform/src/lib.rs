/*!
    FFmpeg frame conversion for the tmedia decode engine.

    For video: pixel format conversion to packed RGBA through swscale, for
    frames that cannot be copied natively. For audio: resampling, channel
    layout and sample format conversion through swresample into the fixed
    output format chosen at prepare time.
*/

mod audio;
mod video;

pub use audio::FfmpegResampler;
pub use video::FfmpegRgbaConverter;
