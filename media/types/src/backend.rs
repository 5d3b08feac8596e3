/*!
    Capabilities the engine consumes from a media library.

    The engine never talks to a demuxer or codec directly. It is generic
    over a [`MediaBackend`], which hands out the demuxer, decoders and
    converters for one opened container.
*/

use std::path::Path;

use crate::{
    AudioOutputFormat, ContainerInfo, GrowableRegion, PacketRef, PixelFormat, Result,
    StreamDescriptor,
};

/**
    Outcome of handing input to a decoder.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendStatus {
    /// The decoder took the input.
    Accepted,
    /// The decoder has output pending and must be drained before it
    /// accepts more input. The input was not consumed.
    Full,
}

/**
    Outcome of asking a decoder for output.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveStatus {
    /// A frame was written into the destination.
    Frame,
    /// The decoder needs more input first.
    NoFrameYet,
    /// The decoder was drained after end of stream.
    End,
}

/**
    An opened container.
*/
pub trait Demuxer {
    type Packet: PacketRef;

    /**
        Streams, duration and container metadata, inventoried at open time.
    */
    fn info(&self) -> &ContainerInfo;

    /**
        Read the next packet in container order. Returns `None` at the end
        of the container.
    */
    fn read_packet(&mut self) -> Result<Option<Self::Packet>>;

    /**
        Reposition the read cursor at the keyframe at or before `target_ts`
        of stream `stream_index`. The timestamp is in that stream's time base.
    */
    fn seek(&mut self, stream_index: usize, target_ts: i64) -> Result<()>;
}

/**
    Timing carried by every decoded frame, in the stream's time base.
*/
pub trait FrameTiming {
    fn pts(&self) -> Option<i64>;
    fn duration(&self) -> Option<i64>;
}

/**
    A decoded video frame resident in system memory.
*/
pub trait VideoFrameRef: FrameTiming {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /**
        Pixel format, `None` when the engine has no name for it.
    */
    fn pixel_format(&self) -> Option<PixelFormat>;

    /**
        Raw bytes of plane `index`, including row padding.
    */
    fn plane(&self, index: usize) -> &[u8];

    /**
        Bytes between the starts of consecutive rows of plane `index`.
    */
    fn stride(&self, index: usize) -> usize;
}

/**
    A decoded audio frame, in the codec's native sample format.
*/
pub trait AudioFrameRef: FrameTiming {
    /// Samples per channel.
    fn samples(&self) -> usize;
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u16;
}

/**
    A send/receive decoder for one stream.
*/
pub trait Decoder {
    type Frame;
    type Packet;

    /**
        Allocate an empty frame for [`Decoder::receive_frame`] to fill.
    */
    fn new_frame(&self) -> Self::Frame;

    fn send_packet(&mut self, packet: &Self::Packet) -> Result<SendStatus>;

    /**
        Signal end of stream so the decoder starts releasing frames it holds
        back for reordering.
    */
    fn send_eof(&mut self) -> Result<SendStatus>;

    fn receive_frame(&mut self, frame: &mut Self::Frame) -> Result<ReceiveStatus>;

    /**
        Drop all buffered input and reference frames, keeping the decoder
        open. Also clears the end-of-stream state.
    */
    fn flush(&mut self);

    fn is_hardware(&self) -> bool {
        false
    }
}

/**
    Converts decoded video frames into tightly packed RGBA.
*/
pub trait RgbaConverter {
    type Frame;

    /**
        Write `width * height * 4` bytes of RGBA into `dst`.
    */
    fn convert(&mut self, frame: &Self::Frame, dst: &mut GrowableRegion) -> Result<()>;
}

/**
    Converts decoded audio frames to one fixed output format.

    Resampling is stateful: a call may hold samples back and release them
    on a later call or on [`Resampler::drain`].
*/
pub trait Resampler {
    type Frame;

    fn output_format(&self) -> AudioOutputFormat;

    /**
        Resample `frame` into `dst` as interleaved PCM. Returns the number
        of samples per channel written.
    */
    fn resample(&mut self, frame: &Self::Frame, dst: &mut GrowableRegion) -> Result<usize>;

    /**
        Write out every held-back sample. Returns the number of samples per
        channel written, zero when nothing was pending.
    */
    fn drain(&mut self, dst: &mut GrowableRegion) -> Result<usize>;

    /**
        Discard held-back samples without writing them.
    */
    fn reset(&mut self);
}

/**
    A media library able to open containers and build decoders for them.
*/
pub trait MediaBackend {
    type Packet: PacketRef;
    type Demuxer: Demuxer<Packet = Self::Packet>;
    type VideoFrame: VideoFrameRef;
    type AudioFrame: AudioFrameRef;
    type VideoDecoder: Decoder<Frame = Self::VideoFrame, Packet = Self::Packet>;
    type AudioDecoder: Decoder<Frame = Self::AudioFrame, Packet = Self::Packet>;
    type RgbaConverter: RgbaConverter<Frame = Self::VideoFrame>;
    type Resampler: Resampler<Frame = Self::AudioFrame>;

    fn open(&self, path: &Path) -> Result<Self::Demuxer>;

    /**
        Create a decoder for a video stream. With `hardware` set, this fails
        rather than silently returning a software decoder.
    */
    fn video_decoder(
        &self,
        demuxer: &Self::Demuxer,
        stream: &StreamDescriptor,
        hardware: bool,
    ) -> Result<Self::VideoDecoder>;

    fn audio_decoder(
        &self,
        demuxer: &Self::Demuxer,
        stream: &StreamDescriptor,
    ) -> Result<Self::AudioDecoder>;

    fn rgba_converter(&self, stream: &StreamDescriptor) -> Result<Self::RgbaConverter>;

    fn resampler(
        &self,
        stream: &StreamDescriptor,
        output: AudioOutputFormat,
    ) -> Result<Self::Resampler>;
}
