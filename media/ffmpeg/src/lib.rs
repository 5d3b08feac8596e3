/*!
    FFmpeg media backend for the tmedia decode engine.

    Binds the source, decode and transform crates into one
    [`MediaBackend`] the engine can be instantiated with:

    ```ignore
    use tmedia_engine::{PlayerContext, PrepareOptions};
    use tmedia_ffmpeg::FfmpegBackend;

    let mut player = PlayerContext::new(FfmpegBackend::new());
    player.prepare("video.mp4", PrepareOptions::default())?;
    ```
*/

use std::path::Path;

use tracing::trace;

use tmedia_decode::{FfmpegAudioDecoder, FfmpegAudioFrame, FfmpegVideoDecoder, FfmpegVideoFrame};
use tmedia_source::{FfmpegDemuxer, FfmpegPacket};
use tmedia_transform::{FfmpegResampler, FfmpegRgbaConverter};
use tmedia_types::{AudioOutputFormat, Error, MediaBackend, Result, StreamDescriptor};

pub use tmedia_source::probe;

/**
    The FFmpeg implementation of [`MediaBackend`].
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Self {
        Self
    }
}

impl MediaBackend for FfmpegBackend {
    type Packet = FfmpegPacket;
    type Demuxer = FfmpegDemuxer;
    type VideoFrame = FfmpegVideoFrame;
    type AudioFrame = FfmpegAudioFrame;
    type VideoDecoder = FfmpegVideoDecoder;
    type AudioDecoder = FfmpegAudioDecoder;
    type RgbaConverter = FfmpegRgbaConverter;
    type Resampler = FfmpegResampler;

    fn open(&self, path: &Path) -> Result<FfmpegDemuxer> {
        FfmpegDemuxer::open(path)
    }

    fn video_decoder(
        &self,
        demuxer: &FfmpegDemuxer,
        stream: &StreamDescriptor,
        hardware: bool,
    ) -> Result<FfmpegVideoDecoder> {
        trace!(index = stream.index, hardware, "creating video decoder");
        let config = demuxer
            .codec_config(stream.index)
            .ok_or_else(|| Error::invalid_data(format!("no stream #{}", stream.index)))?;
        FfmpegVideoDecoder::new(config, hardware)
    }

    fn audio_decoder(
        &self,
        demuxer: &FfmpegDemuxer,
        stream: &StreamDescriptor,
    ) -> Result<FfmpegAudioDecoder> {
        trace!(index = stream.index, "creating audio decoder");
        let config = demuxer
            .codec_config(stream.index)
            .ok_or_else(|| Error::invalid_data(format!("no stream #{}", stream.index)))?;
        FfmpegAudioDecoder::new(config)
    }

    fn rgba_converter(&self, _stream: &StreamDescriptor) -> Result<FfmpegRgbaConverter> {
        Ok(FfmpegRgbaConverter::new())
    }

    fn resampler(
        &self,
        _stream: &StreamDescriptor,
        output: AudioOutputFormat,
    ) -> Result<FfmpegResampler> {
        FfmpegResampler::new(output)
    }
}
