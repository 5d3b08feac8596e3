/*!
    Audio decoder implementation.
*/

use ffmpeg_next::{
    codec::{self, decoder::Audio as AudioDecoderFFmpeg},
    ffi,
};

use tmedia_source::{CodecConfig, FfmpegPacket, convert::error_from_ffmpeg};
use tmedia_types::{Decoder, Error, Rational, ReceiveStatus, Result, SendStatus};

use crate::frame::FfmpegAudioFrame;

/**
    Audio decoder.

    Frames come out in the codec's native sample format; conversion to the
    engine's output format is the resampler's job.
*/
pub struct FfmpegAudioDecoder {
    decoder: AudioDecoderFFmpeg,
    time_base: Rational,
}

impl FfmpegAudioDecoder {
    /**
        Create a new audio decoder from codec configuration.
    */
    pub fn new(codec_config: CodecConfig) -> Result<Self> {
        tmedia_source::init()?;

        let time_base = codec_config.time_base();

        let decoder_ctx = codec::context::Context::from_parameters(codec_config.into_parameters())
            .map_err(|e| Error::codec(e.to_string()))?;

        let decoder = decoder_ctx
            .decoder()
            .audio()
            .map_err(|e| Error::codec(e.to_string()))?;

        Ok(Self { decoder, time_base })
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    /**
        Get the sample rate of the decoded audio.
    */
    pub fn sample_rate(&self) -> u32 {
        self.decoder.rate()
    }

    /**
        Get the number of channels.
    */
    pub fn channels(&self) -> u16 {
        self.decoder.channels()
    }
}

impl Decoder for FfmpegAudioDecoder {
    type Frame = FfmpegAudioFrame;
    type Packet = FfmpegPacket;

    fn new_frame(&self) -> FfmpegAudioFrame {
        FfmpegAudioFrame::empty()
    }

    fn send_packet(&mut self, packet: &FfmpegPacket) -> Result<SendStatus> {
        match self.decoder.send_packet(packet.as_ffmpeg()) {
            Ok(()) => Ok(SendStatus::Accepted),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
                Ok(SendStatus::Full)
            }
            Err(e) => Err(error_from_ffmpeg(e)),
        }
    }

    fn send_eof(&mut self) -> Result<SendStatus> {
        match self.decoder.send_eof() {
            Ok(()) | Err(ffmpeg_next::Error::Eof) => Ok(SendStatus::Accepted),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
                Ok(SendStatus::Full)
            }
            Err(e) => Err(error_from_ffmpeg(e)),
        }
    }

    fn receive_frame(&mut self, frame: &mut FfmpegAudioFrame) -> Result<ReceiveStatus> {
        match self.decoder.receive_frame(&mut frame.0) {
            Ok(()) => Ok(ReceiveStatus::Frame),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
                Ok(ReceiveStatus::NoFrameYet)
            }
            Err(ffmpeg_next::Error::Eof) => Ok(ReceiveStatus::End),
            Err(e) => Err(error_from_ffmpeg(e)),
        }
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }
}

impl std::fmt::Debug for FfmpegAudioDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegAudioDecoder")
            .field("time_base", &self.time_base)
            .field("sample_rate", &self.decoder.rate())
            .finish_non_exhaustive()
    }
}
