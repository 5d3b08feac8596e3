/*!
    Packet reader.

    Pulls packets from the demuxer one at a time and classifies them by
    owning stream. The packet read last stays held here until the caller
    moves it into a pipeline slot or discards it; the next read drops it
    if the caller did neither.
*/

use std::collections::HashSet;

use tracing::trace;

use tmedia_types::{Demuxer, PacketRef, Result, StreamKind};

use crate::inventory::MediaInfo;
use crate::result::ReadPacketResult;

pub(crate) struct PacketReader<D: Demuxer> {
    demuxer: D,
    current: Option<D::Packet>,
    eof: bool,
    video_index: Option<usize>,
    audio_index: Option<usize>,
    subtitle_indices: HashSet<usize>,
    attachment_indices: HashSet<usize>,
    packets_read: u64,
}

impl<D: Demuxer> PacketReader<D> {
    pub fn new(demuxer: D, info: &MediaInfo) -> Self {
        Self {
            demuxer,
            current: None,
            eof: false,
            video_index: info.video_index(),
            audio_index: info.audio_index(),
            subtitle_indices: info.subtitle_streams().map(|s| s.index).collect(),
            attachment_indices: info
                .streams()
                .iter()
                .filter(|s| s.kind == StreamKind::Video && s.is_attached_picture())
                .map(|s| s.index)
                .collect(),
            packets_read: 0,
        }
    }

    /**
        Read and classify the next packet. Pausing is the caller's concern:
        this always advances the cursor.
    */
    pub fn read(&mut self) -> ReadPacketResult {
        self.current = None;
        if self.eof {
            return ReadPacketResult::Eof;
        }

        let packet = match self.demuxer.read_packet() {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                trace!(packets = self.packets_read, "reached end of container");
                self.eof = true;
                return ReadPacketResult::Eof;
            }
            Err(e) => return ReadPacketResult::Fail(e),
        };

        self.packets_read += 1;
        trace!(
            stream = packet.stream_index(),
            pts = ?packet.pts(),
            keyframe = packet.is_keyframe(),
            size = packet.size(),
            "read packet"
        );
        let result = self.classify(&packet);
        self.current = Some(packet);
        result
    }

    fn classify(&self, packet: &D::Packet) -> ReadPacketResult {
        let stream_index = packet.stream_index();
        let index = Some(stream_index);
        if index == self.video_index {
            ReadPacketResult::Video
        } else if index == self.audio_index {
            ReadPacketResult::Audio
        } else if self.subtitle_indices.contains(&stream_index) {
            ReadPacketResult::Subtitle
        } else if self.attachment_indices.contains(&stream_index) {
            ReadPacketResult::VideoAttachment
        } else {
            ReadPacketResult::Unknown
        }
    }

    pub fn current(&self) -> Option<&D::Packet> {
        self.current.as_ref()
    }

    /**
        Hand the held packet over, leaving the reader empty.
    */
    pub fn take(&mut self) -> Option<D::Packet> {
        self.current.take()
    }

    pub fn discard(&mut self) {
        self.current = None;
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /**
        Reposition the demuxer. Clears the held packet and end of stream.
    */
    pub fn seek(&mut self, stream_index: usize, target_ts: i64) -> Result<()> {
        self.demuxer.seek(stream_index, target_ts)?;
        self.current = None;
        self.eof = false;
        Ok(())
    }

    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }
}
