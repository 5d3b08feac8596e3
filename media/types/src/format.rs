/*!
    Pixel, sample and codec format types.
*/

use serde::Serialize;

/**
    Video pixel formats.

    This is the subset of formats the engine can copy natively or hand to a
    converter. Anything else decodes fine but is reported as `None` by the
    backend and always goes through RGBA conversion.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 12bpp (most common video format)
    Yuv420p,
    /// Semi-planar YUV 4:2:0 with interleaved UV, 12bpp
    Nv12,
    /// Semi-planar YUV 4:2:0 with interleaved VU, 12bpp (Android camera output)
    Nv21,
    /// Packed BGRA, 32bpp
    Bgra,
    /// Packed RGBA, 32bpp
    Rgba,
    /// Packed RGB, 24bpp
    Rgb24,
    /// Planar YUV 4:2:2, 16bpp
    Yuv422p,
    /// Planar YUV 4:4:4, 24bpp
    Yuv444p,
    /// Planar YUV 4:2:0, 10-bit (HDR content)
    Yuv420p10,
    /// Semi-planar YUV 4:2:0, 10-bit little-endian (HDR hardware decoder output)
    P010le,
}

impl PixelFormat {
    /**
        Returns the number of bits per pixel for this format.

        For planar formats, this is the average bits per pixel.
    */
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Yuv420p | Self::Nv12 | Self::Nv21 => 12,
            Self::Yuv420p10 | Self::P010le => 15, // 10 bits * 1.5 planes average
            Self::Yuv422p => 16,
            Self::Rgb24 | Self::Yuv444p => 24,
            Self::Bgra | Self::Rgba => 32,
        }
    }

    /**
        Returns true if this is a planar (or semi-planar) format.
    */
    pub const fn is_planar(self) -> bool {
        match self {
            Self::Yuv420p | Self::Yuv422p | Self::Yuv444p | Self::Yuv420p10 => true,
            Self::Nv12 | Self::Nv21 | Self::P010le => true,
            Self::Bgra | Self::Rgba | Self::Rgb24 => false,
        }
    }
}

/**
    Audio sample formats.

    Always interleaved when they appear in an output buffer.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum SampleFormat {
    /// Unsigned 8-bit integer
    U8,
    /// Signed 16-bit integer
    S16,
    /// Signed 32-bit integer
    S32,
    /// 32-bit floating point, range [-1.0, 1.0]
    F32,
    /// 64-bit floating point
    F64,
}

impl SampleFormat {
    /**
        Returns the number of bytes per sample.
    */
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /**
        Returns true if this is a floating-point format.
    */
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /**
        Pick the integer output format for a requested bit depth.

        Only 8, 16 and 32 bits map to a format.
    */
    pub const fn from_bit_depth(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Self::U8),
            16 => Some(Self::S16),
            32 => Some(Self::S32),
            _ => None,
        }
    }
}

/**
    Audio channel layout.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum ChannelLayout {
    /// Single channel
    Mono,
    /// Left and right channels
    Stereo,
    /// 5.1 surround (FL, FR, FC, LFE, BL, BR)
    Surround5_1,
    /// 7.1 surround (FL, FR, FC, LFE, BL, BR, SL, SR)
    Surround7_1,
}

impl ChannelLayout {
    /**
        Returns the number of channels.
    */
    pub const fn channels(self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Surround5_1 => 6,
            Self::Surround7_1 => 8,
        }
    }

    /**
        Create a channel layout from a channel count.

        Falls back to the closest matching layout.
    */
    pub const fn from_count(count: u16) -> Self {
        match count {
            0 | 1 => Self::Mono,
            2 => Self::Stereo,
            3..=6 => Self::Surround5_1,
            _ => Self::Surround7_1,
        }
    }
}

/**
    The fixed PCM configuration every decoded audio frame is resampled to.

    Decided once at prepare time from the caller's requested targets.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct AudioOutputFormat {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel layout.
    pub channels: ChannelLayout,
    /// Output sample format (interleaved).
    pub sample_format: SampleFormat,
}

impl AudioOutputFormat {
    /// Sample rate used when the caller does not ask for one.
    pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

    pub fn new(sample_rate: u32, channels: ChannelLayout, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    /**
        Bytes occupied by one sample of every channel.
    */
    pub fn bytes_per_frame(&self) -> usize {
        self.channels.channels() as usize * self.sample_format.bytes_per_sample()
    }

    /**
        Duration in milliseconds of `samples` per-channel samples.
    */
    pub fn samples_to_millis(&self, samples: usize) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (samples as i64 * 1000 + self.sample_rate as i64 / 2) / self.sample_rate as i64
    }
}

impl Default for AudioOutputFormat {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_SAMPLE_RATE,
            ChannelLayout::Stereo,
            SampleFormat::S16,
        )
    }
}

/**
    Codec identifiers the engine knows by name.

    The backend reports the library's own codec name alongside this, so
    `Other` loses nothing.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum CodecId {
    // Video
    H264,
    H265,
    Vp8,
    Vp9,
    Av1,
    Mpeg4,
    Mpeg2Video,
    Mjpeg,
    Png,
    // Audio
    Aac,
    Opus,
    Mp3,
    Vorbis,
    Flac,
    Ac3,
    PcmS16Le,
    PcmS16Be,
    PcmF32Le,
    // Subtitle
    Subrip,
    Ass,
    MovText,
    WebVtt,
    /// Anything the engine has no dedicated identifier for.
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_format_bits_per_pixel() {
        assert_eq!(PixelFormat::Yuv420p.bits_per_pixel(), 12);
        assert_eq!(PixelFormat::Nv21.bits_per_pixel(), 12);
        assert_eq!(PixelFormat::Rgba.bits_per_pixel(), 32);
        assert_eq!(PixelFormat::Rgb24.bits_per_pixel(), 24);
    }

    #[test]
    fn pixel_format_is_planar() {
        assert!(PixelFormat::Yuv420p.is_planar());
        assert!(PixelFormat::Nv12.is_planar());
        assert!(PixelFormat::Nv21.is_planar());
        assert!(!PixelFormat::Bgra.is_planar());
        assert!(!PixelFormat::Rgb24.is_planar());
    }

    #[test]
    fn sample_format_from_bit_depth() {
        assert_eq!(SampleFormat::from_bit_depth(8), Some(SampleFormat::U8));
        assert_eq!(SampleFormat::from_bit_depth(16), Some(SampleFormat::S16));
        assert_eq!(SampleFormat::from_bit_depth(32), Some(SampleFormat::S32));
        assert_eq!(SampleFormat::from_bit_depth(24), None);
    }

    #[test]
    fn channel_layout_from_count() {
        assert_eq!(ChannelLayout::from_count(1), ChannelLayout::Mono);
        assert_eq!(ChannelLayout::from_count(2), ChannelLayout::Stereo);
        assert_eq!(ChannelLayout::from_count(6), ChannelLayout::Surround5_1);
        assert_eq!(ChannelLayout::from_count(12), ChannelLayout::Surround7_1);
    }

    #[test]
    fn audio_output_format_defaults() {
        let format = AudioOutputFormat::default();
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.bytes_per_frame(), 4);
        assert_eq!(format.samples_to_millis(1024), 23);
        assert_eq!(format.samples_to_millis(44100), 1000);
    }
}
