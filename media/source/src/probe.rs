/*!
    Stream inventory and metadata extraction.
*/

use std::path::Path;

use ffmpeg_next::{
    codec, ffi,
    format::{context::Input as InputContext, stream::Disposition},
    DictionaryRef, Stream,
};

use tmedia_types::{
    AudioParams, ContainerInfo, Metadata, Result, StreamDescriptor, StreamKind, StreamParams,
    VideoParams,
};

use crate::convert::{
    codec_id_from_ffmpeg, error_from_ffmpeg, pixel_format_from_ffmpeg, rational_from_ffmpeg,
    sample_format_from_ffmpeg, stream_kind_from_ffmpeg,
};

/**
    Open a container just long enough to inventory its streams.

    # Example

    ```ignore
    let info = tmedia_source::probe("video.mp4")?;
    for stream in &info.streams {
        println!("#{} {} {}", stream.index, stream.kind, stream.codec_name);
    }
    ```
*/
pub fn probe<P: AsRef<Path>>(path: P) -> Result<ContainerInfo> {
    crate::init()?;

    let input_ctx = ffmpeg_next::format::input(&path).map_err(error_from_ffmpeg)?;

    Ok(extract_container_info(&input_ctx))
}

/**
    Extract ContainerInfo from an already-opened input context.
*/
pub(crate) fn extract_container_info(input_ctx: &InputContext) -> ContainerInfo {
    let streams: Vec<StreamDescriptor> = input_ctx.streams().map(|s| describe_stream(&s)).collect();

    // Container duration is in AV_TIME_BASE (microseconds)
    let duration_ms = if input_ctx.duration() > 0 {
        Some(input_ctx.duration() / 1000)
    } else {
        // Fall back to the longest stream
        streams.iter().filter_map(|s| s.duration_ms()).max()
    };

    ContainerInfo {
        format_name: input_ctx.format().name().to_string(),
        duration_ms,
        streams,
        metadata: metadata_from_ffmpeg(&input_ctx.metadata()),
    }
}

fn metadata_from_ffmpeg(dict: &DictionaryRef<'_>) -> Metadata {
    dict.iter().collect()
}

/**
    Describe one stream from its codec parameters.
*/
fn describe_stream(stream: &Stream<'_>) -> StreamDescriptor {
    let parameters = stream.parameters();
    let codec_id = parameters.id();
    let kind = stream_kind_from_ffmpeg(parameters.medium());

    let params = match kind {
        StreamKind::Video => video_params(stream).map_or(StreamParams::None, StreamParams::Video),
        StreamKind::Audio => audio_params(stream).map_or(StreamParams::None, StreamParams::Audio),
        _ => StreamParams::None,
    };

    let duration = Some(stream.duration()).filter(|d| *d > 0);
    let start_time = Some(stream.start_time()).filter(|t| *t != ffi::AV_NOPTS_VALUE);

    StreamDescriptor {
        index: stream.index(),
        kind,
        codec_id: codec_id_from_ffmpeg(codec_id),
        codec_name: codec_id.name().to_string(),
        decoder_name: codec::decoder::find(codec_id).map(|c| c.name().to_string()),
        time_base: rational_from_ffmpeg(stream.time_base()),
        duration,
        start_time,
        params,
        metadata: metadata_from_ffmpeg(&stream.metadata()),
    }
}

/**
    Extract video fields. Creates a throwaway decoder context to read the
    dimensions and format, the same values the real decoder will see.
*/
fn video_params(stream: &Stream<'_>) -> Option<VideoParams> {
    let decoder_ctx = codec::context::Context::from_parameters(stream.parameters()).ok()?;
    let decoder = decoder_ctx.decoder().video().ok()?;

    let frame_rate = if stream.avg_frame_rate().numerator() != 0 {
        Some(rational_from_ffmpeg(stream.avg_frame_rate()))
    } else if stream.rate().numerator() != 0 {
        Some(rational_from_ffmpeg(stream.rate()))
    } else {
        None
    };

    // SAFETY: We're reading from a valid AVCodecParameters pointer that FFmpeg owns
    let (bits_per_raw_sample, bitrate) = unsafe {
        let ptr = stream.parameters().as_ptr();
        let bitrate = if (*ptr).bit_rate > 0 {
            Some((*ptr).bit_rate as u64)
        } else {
            None
        };
        ((*ptr).bits_per_raw_sample.max(0) as u32, bitrate)
    };

    Some(VideoParams {
        width: decoder.width(),
        height: decoder.height(),
        pixel_format: pixel_format_from_ffmpeg(decoder.format()),
        bits_per_raw_sample,
        frame_rate,
        bitrate,
        attached_picture: stream.disposition().contains(Disposition::ATTACHED_PIC),
    })
}

/**
    Extract audio fields.
*/
fn audio_params(stream: &Stream<'_>) -> Option<AudioParams> {
    let decoder_ctx = codec::context::Context::from_parameters(stream.parameters()).ok()?;
    let decoder = decoder_ctx.decoder().audio().ok()?;

    // SAFETY: We're reading from a valid AVCodecParameters pointer that FFmpeg owns
    let bitrate = unsafe {
        let ptr = stream.parameters().as_ptr();
        if (*ptr).bit_rate > 0 {
            Some((*ptr).bit_rate as u64)
        } else {
            None
        }
    };

    Some(AudioParams {
        channels: decoder.channels(),
        sample_format: sample_format_from_ffmpeg(decoder.format()),
        sample_rate: decoder.rate(),
        bitrate,
    })
}
