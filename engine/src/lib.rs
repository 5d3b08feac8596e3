/*!
    Pull-based media decode engine.

    A [`PlayerContext`] opens one container through a [`MediaBackend`],
    picks the main video and audio streams, and hands decoded frames to the
    caller in reusable buffers. The caller drives everything: it reads a
    packet, moves it into the matching pipeline, decodes, and copies the
    frame out. [`Driver`] runs that loop for callers that just want frames.

    ```ignore
    use tmedia_engine::{Delivered, Driver, PlayerContext, PrepareOptions};
    use tmedia_types::{DecodedAudioBuffer, DecodedVideoBuffer};

    let mut player = PlayerContext::new(backend);
    player.prepare("video.mp4", PrepareOptions::default())?;

    let mut video = DecodedVideoBuffer::default();
    let mut audio = DecodedAudioBuffer::new();
    let mut driver = Driver::new(&mut player);
    while driver.next(&mut video, &mut audio)? != Delivered::End {
        // present the buffer that was filled
    }
    ```

    Seeks and pauses can also be posted from another thread through the
    [`ControlHandle`]; they take effect on the decode thread's next call.
*/

mod audio;
mod config;
mod context;
mod control;
mod driver;
mod inventory;
mod pipeline;
mod reader;
mod result;
mod seek;
mod video;

#[cfg(any(test, feature = "synthetic"))]
pub mod synthetic;

pub use config::{PrepareOptions, SeekOptions};
pub use context::{PlayerContext, PlayerState};
pub use control::{ControlHandle, SeekRequest};
pub use driver::{Delivered, Driver};
pub use inventory::MediaInfo;
pub use result::{DecodePath, DecodeResult, OptResult, PacketTarget, ReadPacketResult};

pub use tmedia_types::MediaBackend;
