/*!
    Shared types for the tmedia decode engine.

    This crate defines the vocabulary of the engine: the types that cross crate
    boundaries, and the capability traits a media library must provide for the
    engine to drive it. It has no dependency on FFmpeg, so the engine and its
    tests can be built without pulling in FFmpeg bindings.
*/

mod backend;
mod buffer;
mod error;
mod format;
mod packet;
mod stream;
mod time;

pub use backend::{
    AudioFrameRef, Decoder, Demuxer, FrameTiming, MediaBackend, ReceiveStatus, Resampler,
    RgbaConverter, SendStatus, VideoFrameRef,
};
pub use buffer::{
    DecodedAudioBuffer, DecodedVideoBuffer, GrowableRegion, LayoutPreference, Plane, VideoLayout,
};
pub use error::{Error, Result};
pub use format::{AudioOutputFormat, ChannelLayout, CodecId, PixelFormat, SampleFormat};
pub use packet::{Packet, PacketRef};
pub use stream::{
    AudioParams, ContainerInfo, Metadata, StreamDescriptor, StreamKind, StreamParams, VideoParams,
};
pub use time::Rational;
