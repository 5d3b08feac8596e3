/*!
    Decoded frame handles.

    Thin wrappers around ffmpeg-next frames so the engine can read timing,
    geometry and plane data without seeing FFmpeg types.
*/

use ffmpeg_next::util::frame::{audio::Audio as AudioFrameFFmpeg, video::Video as VideoFrameFFmpeg};

use tmedia_source::convert::pixel_format_from_ffmpeg;
use tmedia_types::{AudioFrameRef, FrameTiming, PixelFormat, VideoFrameRef};

/**
    A decoded video frame in system memory.
*/
pub struct FfmpegVideoFrame(pub(crate) VideoFrameFFmpeg);

impl FfmpegVideoFrame {
    pub fn empty() -> Self {
        Self(VideoFrameFFmpeg::empty())
    }

    pub fn as_ffmpeg(&self) -> &VideoFrameFFmpeg {
        &self.0
    }
}

impl FrameTiming for FfmpegVideoFrame {
    fn pts(&self) -> Option<i64> {
        self.0.pts().or_else(|| self.0.timestamp())
    }

    fn duration(&self) -> Option<i64> {
        frame_duration(unsafe { (*self.0.as_ptr()).duration })
    }
}

impl VideoFrameRef for FfmpegVideoFrame {
    fn width(&self) -> u32 {
        self.0.width()
    }

    fn height(&self) -> u32 {
        self.0.height()
    }

    fn pixel_format(&self) -> Option<PixelFormat> {
        pixel_format_from_ffmpeg(self.0.format())
    }

    fn plane(&self, index: usize) -> &[u8] {
        if index >= self.0.planes() {
            return &[];
        }
        self.0.data(index)
    }

    fn stride(&self, index: usize) -> usize {
        if index >= self.0.planes() {
            return 0;
        }
        self.0.stride(index)
    }
}

/**
    A decoded audio frame in the codec's native sample format.
*/
pub struct FfmpegAudioFrame(pub(crate) AudioFrameFFmpeg);

impl FfmpegAudioFrame {
    pub fn empty() -> Self {
        Self(AudioFrameFFmpeg::empty())
    }

    pub fn as_ffmpeg(&self) -> &AudioFrameFFmpeg {
        &self.0
    }
}

impl FrameTiming for FfmpegAudioFrame {
    fn pts(&self) -> Option<i64> {
        self.0.pts().or_else(|| self.0.timestamp())
    }

    fn duration(&self) -> Option<i64> {
        frame_duration(unsafe { (*self.0.as_ptr()).duration })
    }
}

impl AudioFrameRef for FfmpegAudioFrame {
    fn samples(&self) -> usize {
        self.0.samples()
    }

    fn sample_rate(&self) -> u32 {
        self.0.rate()
    }

    fn channels(&self) -> u16 {
        self.0.channels()
    }
}

fn frame_duration(duration: i64) -> Option<i64> {
    (duration > 0).then_some(duration)
}
