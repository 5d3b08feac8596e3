/*!
    Conversion utilities between ffmpeg-next types and tmedia-types.

    Shared with the decode and transform crates so every crate names FFmpeg
    formats the same way.
*/

use ffmpeg_next::{format::Pixel, format::Sample, media::Type};

use tmedia_types::{
    ChannelLayout, CodecId, Error, PixelFormat, Rational, Result, SampleFormat, StreamKind,
};

/**
    Convert ffmpeg_next::Rational to our Rational.
*/
pub fn rational_from_ffmpeg(r: ffmpeg_next::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

/**
    Convert our Rational to ffmpeg_next::Rational.
*/
pub fn rational_to_ffmpeg(r: Rational) -> ffmpeg_next::Rational {
    ffmpeg_next::Rational::new(r.num, r.den)
}

/**
    Convert ffmpeg_next pixel format to our PixelFormat.
*/
pub fn pixel_format_from_ffmpeg(format: Pixel) -> Option<PixelFormat> {
    match format {
        Pixel::YUV420P | Pixel::YUVJ420P => Some(PixelFormat::Yuv420p),
        Pixel::NV12 => Some(PixelFormat::Nv12),
        Pixel::NV21 => Some(PixelFormat::Nv21),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::YUV422P | Pixel::YUVJ422P => Some(PixelFormat::Yuv422p),
        Pixel::YUV444P | Pixel::YUVJ444P => Some(PixelFormat::Yuv444p),
        Pixel::YUV420P10LE | Pixel::YUV420P10BE => Some(PixelFormat::Yuv420p10),
        Pixel::P010LE => Some(PixelFormat::P010le),
        _ => None,
    }
}

/**
    Convert ffmpeg_next sample format to our SampleFormat.

    Planar and packed variants map to the same format; output buffers are
    always interleaved.
*/
pub fn sample_format_from_ffmpeg(format: Sample) -> Option<SampleFormat> {
    match format {
        Sample::F32(_) => Some(SampleFormat::F32),
        Sample::F64(_) => Some(SampleFormat::F64),
        Sample::I16(_) => Some(SampleFormat::S16),
        Sample::I32(_) => Some(SampleFormat::S32),
        Sample::U8(_) => Some(SampleFormat::U8),
        _ => None,
    }
}

/**
    Convert our SampleFormat to a packed ffmpeg_next sample format.
*/
pub fn sample_format_to_ffmpeg(format: SampleFormat) -> Result<Sample> {
    use ffmpeg_next::format::sample::Type as SampleType;

    match format {
        SampleFormat::U8 => Ok(Sample::U8(SampleType::Packed)),
        SampleFormat::S16 => Ok(Sample::I16(SampleType::Packed)),
        SampleFormat::S32 => Ok(Sample::I32(SampleType::Packed)),
        SampleFormat::F32 => Ok(Sample::F32(SampleType::Packed)),
        SampleFormat::F64 => Ok(Sample::F64(SampleType::Packed)),
        _ => Err(Error::unsupported_format(format!(
            "sample format {:?} not supported",
            format
        ))),
    }
}

/**
    Convert our ChannelLayout to ffmpeg_next::ChannelLayout.
*/
pub fn channel_layout_to_ffmpeg(layout: ChannelLayout) -> ffmpeg_next::ChannelLayout {
    match layout {
        ChannelLayout::Mono => ffmpeg_next::ChannelLayout::MONO,
        ChannelLayout::Stereo => ffmpeg_next::ChannelLayout::STEREO,
        ChannelLayout::Surround5_1 => ffmpeg_next::ChannelLayout::_5POINT1,
        ChannelLayout::Surround7_1 => ffmpeg_next::ChannelLayout::_7POINT1,
        _ => ffmpeg_next::ChannelLayout::STEREO,
    }
}

/**
    Classify an FFmpeg media type.
*/
pub fn stream_kind_from_ffmpeg(medium: Type) -> StreamKind {
    match medium {
        Type::Video => StreamKind::Video,
        Type::Audio => StreamKind::Audio,
        Type::Subtitle => StreamKind::Subtitle,
        Type::Attachment => StreamKind::Attachment,
        _ => StreamKind::Unknown,
    }
}

/**
    Convert ffmpeg_next codec ID to our CodecId.
*/
pub fn codec_id_from_ffmpeg(id: ffmpeg_next::codec::Id) -> CodecId {
    use ffmpeg_next::codec::Id;

    match id {
        // Video
        Id::H264 => CodecId::H264,
        Id::HEVC => CodecId::H265,
        Id::VP8 => CodecId::Vp8,
        Id::VP9 => CodecId::Vp9,
        Id::AV1 => CodecId::Av1,
        Id::MPEG4 => CodecId::Mpeg4,
        Id::MPEG2VIDEO => CodecId::Mpeg2Video,
        Id::MJPEG => CodecId::Mjpeg,
        Id::PNG => CodecId::Png,
        // Audio
        Id::AAC => CodecId::Aac,
        Id::OPUS => CodecId::Opus,
        Id::MP3 => CodecId::Mp3,
        Id::VORBIS => CodecId::Vorbis,
        Id::FLAC => CodecId::Flac,
        Id::PCM_S16LE => CodecId::PcmS16Le,
        Id::PCM_S16BE => CodecId::PcmS16Be,
        Id::PCM_F32LE => CodecId::PcmF32Le,
        Id::AC3 => CodecId::Ac3,
        // Subtitle
        Id::SUBRIP => CodecId::Subrip,
        Id::ASS | Id::SSA => CodecId::Ass,
        Id::MOV_TEXT => CodecId::MovText,
        Id::WEBVTT => CodecId::WebVtt,
        _ => CodecId::Other,
    }
}

/**
    Map an FFmpeg error to ours, turning missing files into I/O errors.
*/
pub fn error_from_ffmpeg(e: ffmpeg_next::Error) -> Error {
    let message = e.to_string();
    match e {
        _ if message.contains("No such file") => Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            message,
        )),
        ffmpeg_next::Error::InvalidData => Error::invalid_data(message),
        _ => Error::codec(message),
    }
}
