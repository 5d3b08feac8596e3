/*!
    Video decoder implementation.
*/

use ffmpeg_next::{
    codec::{self, decoder::Video as VideoDecoderFFmpeg},
    ffi,
    util::frame::video::Video as VideoFrameFFmpeg,
};
use tracing::debug;

use tmedia_source::{CodecConfig, FfmpegPacket, convert::error_from_ffmpeg};
use tmedia_types::{Decoder, Error, Rational, ReceiveStatus, Result, SendStatus};

use crate::frame::FfmpegVideoFrame;
use crate::hw::{HwDeviceContext, is_hw_frame, transfer_hw_frame};

/**
    Video decoder.

    Decodes video packets into frames, on a hardware device when one was
    requested and could be created.
*/
pub struct FfmpegVideoDecoder {
    decoder: VideoDecoderFFmpeg,
    time_base: Rational,
    /**
        Kept alive so the device outlives the decoder's own reference.
        Not accessed after initialization.
    */
    hw_context: Option<HwDeviceContext>,
    /// Scratch frame hardware frames are downloaded into.
    transfer: VideoFrameFFmpeg,
}

impl FfmpegVideoDecoder {
    /**
        Create a new video decoder from codec configuration.

        With `hardware` set, a device context is attached before the codec
        is opened; if none can be created this fails with
        [`Error::HardwareUnavailable`] instead of falling back silently.
    */
    pub fn new(codec_config: CodecConfig, hardware: bool) -> Result<Self> {
        tmedia_source::init()?;

        let time_base = codec_config.time_base();
        let codec_id = codec_config.codec_id();

        let mut decoder_ctx = codec::context::Context::from_parameters(
            codec_config.into_parameters(),
        )
        .map_err(|e| Error::codec(e.to_string()))?;

        let hw_context = if hardware {
            let codec = codec::decoder::find(codec_id).ok_or_else(|| {
                Error::unsupported_format(format!("no decoder for {:?}", codec_id))
            })?;
            let hw_ctx = HwDeviceContext::for_codec(&codec)?;
            // SAFETY: the codec is not open yet; the context takes ownership of the new ref
            unsafe {
                (*decoder_ctx.as_mut_ptr()).hw_device_ctx = hw_ctx.create_ref();
            }
            debug!(device = ?hw_ctx.device_type(), "attached hardware device");
            Some(hw_ctx)
        } else {
            None
        };

        let decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| Error::codec(e.to_string()))?;

        Ok(Self {
            decoder,
            time_base,
            hw_context,
            transfer: VideoFrameFFmpeg::empty(),
        })
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }
}

impl Decoder for FfmpegVideoDecoder {
    type Frame = FfmpegVideoFrame;
    type Packet = FfmpegPacket;

    fn new_frame(&self) -> FfmpegVideoFrame {
        FfmpegVideoFrame::empty()
    }

    fn send_packet(&mut self, packet: &FfmpegPacket) -> Result<SendStatus> {
        // EAGAIN means the decoder has frames to hand out before it takes more
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
            Ok(()) => Ok(SendStatus::Accepted),
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
                Ok(SendStatus::Full)
            }
            // Already draining
            Err(ffmpeg_next::Error::Eof) => Ok(SendStatus::Accepted),
            Err(e) => Err(error_from_ffmpeg(e)),
        }
    }

    fn receive_frame(&mut self, frame: &mut FfmpegVideoFrame) -> Result<ReceiveStatus> {
        match self.decoder.receive_frame(&mut frame.0) {
            Ok(()) => {}
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
                return Ok(ReceiveStatus::NoFrameYet);
            }
            Err(ffmpeg_next::Error::Eof) => return Ok(ReceiveStatus::End),
            Err(e) => return Err(error_from_ffmpeg(e)),
        }

        if is_hw_frame(&frame.0) {
            transfer_hw_frame(&frame.0, &mut self.transfer)?;
            std::mem::swap(&mut frame.0, &mut self.transfer);
        }

        Ok(ReceiveStatus::Frame)
    }

    fn flush(&mut self) {
        self.decoder.flush();
    }

    fn is_hardware(&self) -> bool {
        self.hw_context.is_some()
    }
}

impl std::fmt::Debug for FfmpegVideoDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegVideoDecoder")
            .field("time_base", &self.time_base)
            .field("hw_context", &self.hw_context)
            .finish_non_exhaustive()
    }
}
