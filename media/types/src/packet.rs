/*!
    Encoded packet types.
*/

/**
    What the engine needs to know about a coded packet to route it.

    The payload stays inside the media library's own packet type, so
    moving a packet from the demuxer to a decoder never copies it.
*/
pub trait PacketRef {
    /// Index of the stream this packet belongs to.
    fn stream_index(&self) -> usize;
    /// Presentation timestamp in the stream's time base.
    fn pts(&self) -> Option<i64>;
    fn is_keyframe(&self) -> bool;
    /// Payload size in bytes.
    fn size(&self) -> usize;
}

/**
    An owned packet for backends that keep payloads in plain memory.

    Timestamps are in the time base of the owning stream.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    /// Index of the stream this packet belongs to.
    pub stream_index: usize,
    /// Coded payload.
    pub data: Vec<u8>,
    /// Presentation timestamp.
    pub pts: Option<i64>,
    /// Decode timestamp.
    pub dts: Option<i64>,
    /// Duration in time base units (0 if unknown).
    pub duration: i64,
    /// Whether this packet starts a keyframe.
    pub is_keyframe: bool,
}

impl Packet {
    pub fn new(stream_index: usize, data: Vec<u8>) -> Self {
        Self {
            stream_index,
            data,
            ..Self::default()
        }
    }

    pub fn with_timing(mut self, pts: Option<i64>, dts: Option<i64>, duration: i64) -> Self {
        self.pts = pts;
        self.dts = dts;
        self.duration = duration;
        self
    }

    pub fn with_keyframe(mut self, is_keyframe: bool) -> Self {
        self.is_keyframe = is_keyframe;
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl PacketRef for Packet {
    fn stream_index(&self) -> usize {
        self.stream_index
    }

    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn is_keyframe(&self) -> bool {
        self.is_keyframe
    }

    fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe(packet: &impl PacketRef) -> (usize, Option<i64>, bool, usize) {
        (packet.stream_index(), packet.pts(), packet.is_keyframe(), packet.size())
    }

    #[test]
    fn owned_packet_through_the_trait() {
        let packet = Packet::new(1, vec![0; 10])
            .with_timing(Some(3000), Some(0), 3000)
            .with_keyframe(true);
        assert_eq!(describe(&packet), (1, Some(3000), true, 10));
        assert_eq!(describe(&Packet::new(0, Vec::new())), (0, None, false, 0));
    }
}
