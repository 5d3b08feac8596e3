/*!
    Demuxer implementation.
*/

use std::path::Path;

use ffmpeg_next::{ffi, format::context::Input as InputContext};
use tracing::debug;

use tmedia_types::{ContainerInfo, Demuxer, Error, PacketRef, Result};

use crate::codec_config::CodecConfig;
use crate::convert::{error_from_ffmpeg, rational_from_ffmpeg};
use crate::probe::extract_container_info;

/**
    A packet as read by FFmpeg. The payload stays in FFmpeg's reference
    counted buffer until a decoder consumes it.
*/
pub struct FfmpegPacket(ffmpeg_next::Packet);

impl FfmpegPacket {
    pub fn as_ffmpeg(&self) -> &ffmpeg_next::Packet {
        &self.0
    }
}

impl PacketRef for FfmpegPacket {
    fn stream_index(&self) -> usize {
        self.0.stream()
    }

    fn pts(&self) -> Option<i64> {
        self.0.pts()
    }

    fn is_keyframe(&self) -> bool {
        self.0.is_key()
    }

    fn size(&self) -> usize {
        self.0.size()
    }
}

impl std::fmt::Debug for FfmpegPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegPacket")
            .field("stream", &self.0.stream())
            .field("pts", &self.0.pts())
            .field("size", &self.0.size())
            .finish()
    }
}

/**
    An opened container that produces encoded packets.

    Packets of every stream are returned in file order; classifying them
    is up to the caller.
*/
pub struct FfmpegDemuxer {
    input: InputContext,
    info: ContainerInfo,
}

impl FfmpegDemuxer {
    /**
        Open a media file and inventory its streams.

        # Example

        ```ignore
        let demuxer = FfmpegDemuxer::open("video.mp4")?;
        println!("Duration: {:?} ms", demuxer.info().duration_ms);
        ```
    */
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        crate::init()?;

        let input = ffmpeg_next::format::input(&path).map_err(error_from_ffmpeg)?;
        let info = extract_container_info(&input);

        debug!(
            format = %info.format_name,
            streams = info.streams.len(),
            duration_ms = ?info.duration_ms,
            "opened container"
        );

        Ok(Self { input, info })
    }

    /**
        Codec configuration of stream `index`, used to build its decoder.
    */
    pub fn codec_config(&self, index: usize) -> Option<CodecConfig> {
        let stream = self.input.stream(index)?;
        Some(CodecConfig::new(
            stream.parameters().clone(),
            rational_from_ffmpeg(stream.time_base()),
        ))
    }
}

impl Demuxer for FfmpegDemuxer {
    type Packet = FfmpegPacket;

    fn info(&self) -> &ContainerInfo {
        &self.info
    }

    fn read_packet(&mut self) -> Result<Option<FfmpegPacket>> {
        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(&mut self.input) {
            Ok(()) => Ok(Some(FfmpegPacket(packet))),
            Err(ffmpeg_next::Error::Eof) => Ok(None),
            Err(e) => Err(error_from_ffmpeg(e)),
        }
    }

    /**
        Seeks to the nearest keyframe at or before `target_ts`.

        The timestamp is in the time base of `stream_index`, so the seek
        is exact for that stream rather than rounded through AV_TIME_BASE.
    */
    fn seek(&mut self, stream_index: usize, target_ts: i64) -> Result<()> {
        let stream_index = i32::try_from(stream_index)
            .map_err(|_| Error::invalid_data(format!("stream index {stream_index} out of range")))?;

        // SAFETY: The input context pointer is valid for the lifetime of self
        let ret = unsafe {
            ffi::av_seek_frame(
                self.input.as_mut_ptr(),
                stream_index,
                target_ts,
                ffi::AVSEEK_FLAG_BACKWARD as i32,
            )
        };

        if ret < 0 {
            return Err(Error::codec(format!(
                "seek failed: {}",
                ffmpeg_next::Error::from(ret)
            )));
        }

        Ok(())
    }
}

impl std::fmt::Debug for FfmpegDemuxer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegDemuxer")
            .field("format", &self.info.format_name)
            .field("streams", &self.info.streams.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use ffmpeg_next::packet::Flags;

    use super::*;

    #[test]
    fn packet_reports_fields_of_the_wrapped_buffer() {
        let mut inner = ffmpeg_next::Packet::copy(&[1, 2, 3, 4]);
        inner.set_stream(2);
        inner.set_pts(Some(9000));
        inner.set_flags(Flags::KEY);
        let packet = FfmpegPacket(inner);

        assert_eq!(packet.stream_index(), 2);
        assert_eq!(packet.pts(), Some(9000));
        assert!(packet.is_keyframe());
        assert_eq!(packet.size(), 4);
        // The decoder is handed this same buffer
        assert_eq!(packet.as_ffmpeg().data(), Some(&[1u8, 2, 3, 4][..]));
    }
}
