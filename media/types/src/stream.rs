/*!
    Stream inventory and metadata types.
*/

use std::fmt;

use serde::Serialize;

use crate::{CodecId, PixelFormat, Rational, SampleFormat};

/**
    What a container stream carries.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Attachment,
    Unknown,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitle => "subtitle",
            Self::Attachment => "attachment",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/**
    Ordered key/value metadata owned by a container or a single stream.

    Keys keep the order and spelling the container stored them with.
*/
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /**
        Look up the first value stored under `key`, ignoring ASCII case
        the same way container tags are matched.
    */
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/**
    Video-specific stream fields.
*/
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VideoParams {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Decoded pixel format, if the engine knows it.
    pub pixel_format: Option<PixelFormat>,
    /// Bits per raw sample as coded (8 for most content, 10 for HDR).
    pub bits_per_raw_sample: u32,
    /// Average frame rate (may be unavailable).
    pub frame_rate: Option<Rational>,
    /// Bitrate in bits per second (if known).
    pub bitrate: Option<u64>,
    /// True for a single attached picture such as embedded cover art.
    pub attached_picture: bool,
}

impl VideoParams {
    /**
        Returns the frame rate as fps, if available.
    */
    pub fn fps(&self) -> Option<f64> {
        self.frame_rate
            .filter(|r| !r.is_invalid())
            .map(|r| r.to_f64())
    }
}

/**
    Audio-specific stream fields.
*/
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AudioParams {
    /// Number of channels.
    pub channels: u16,
    /// Decoded sample format, if the engine knows it.
    pub sample_format: Option<SampleFormat>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bitrate in bits per second (if known).
    pub bitrate: Option<u64>,
}

impl AudioParams {
    /**
        Returns the number of bytes per sample per channel.
    */
    pub fn bytes_per_sample(&self) -> usize {
        self.sample_format.map_or(0, |f| f.bytes_per_sample())
    }
}

/**
    Kind-specific stream fields.
*/
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum StreamParams {
    Video(VideoParams),
    Audio(AudioParams),
    None,
}

/**
    One container stream, as inventoried at open time.

    Immutable once the container is opened.
*/
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StreamDescriptor {
    /// Index of the stream inside the container.
    pub index: usize,
    pub kind: StreamKind,
    pub codec_id: CodecId,
    /// Codec name as reported by the media library.
    pub codec_name: String,
    /// Name of the decoder that will be used, if one exists.
    pub decoder_name: Option<String>,
    /// Time base for timestamps.
    pub time_base: Rational,
    /// Duration in time base units (may be unavailable).
    pub duration: Option<i64>,
    /// Timestamp of the first frame in time base units. Positions handed
    /// to clients are relative to it.
    pub start_time: Option<i64>,
    pub params: StreamParams,
    pub metadata: Metadata,
}

impl StreamDescriptor {
    pub fn video(&self) -> Option<&VideoParams> {
        match &self.params {
            StreamParams::Video(params) => Some(params),
            _ => None,
        }
    }

    pub fn audio(&self) -> Option<&AudioParams> {
        match &self.params {
            StreamParams::Audio(params) => Some(params),
            _ => None,
        }
    }

    /**
        Returns true if this is a video stream holding one attached picture.
    */
    pub fn is_attached_picture(&self) -> bool {
        self.video().is_some_and(|v| v.attached_picture)
    }

    /**
        First timestamp of the stream, zero when the container has none.
    */
    pub fn start_ts(&self) -> i64 {
        self.start_time.unwrap_or(0)
    }

    /**
        Stream duration in milliseconds, if the container reports one.
    */
    pub fn duration_ms(&self) -> Option<i64> {
        self.duration
            .filter(|d| *d > 0)
            .map(|d| self.time_base.ts_to_millis(d))
    }
}

/**
    Everything known about a container right after it is opened.
*/
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ContainerInfo {
    /// Short container format name, e.g. "mov,mp4,m4a,3gp,3g2,mj2".
    pub format_name: String,
    /// Container duration in milliseconds (may be unavailable).
    pub duration_ms: Option<i64>,
    /// All streams, in container order.
    pub streams: Vec<StreamDescriptor>,
    pub metadata: Metadata,
}

impl ContainerInfo {
    pub fn stream(&self, index: usize) -> Option<&StreamDescriptor> {
        self.streams.iter().find(|s| s.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_stream(attached_picture: bool) -> StreamDescriptor {
        StreamDescriptor {
            index: 0,
            kind: StreamKind::Video,
            codec_id: CodecId::H264,
            codec_name: "h264".into(),
            decoder_name: Some("h264".into()),
            time_base: Rational::new(1, 90000),
            duration: Some(900_000),
            start_time: None,
            params: StreamParams::Video(VideoParams {
                width: 1920,
                height: 1080,
                pixel_format: Some(PixelFormat::Yuv420p),
                bits_per_raw_sample: 8,
                frame_rate: Some(Rational::new(30, 1)),
                bitrate: None,
                attached_picture,
            }),
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn metadata_keeps_order_and_matches_case_insensitively() {
        let metadata: Metadata = [("title", "Intro"), ("ENCODER", "Lavf60"), ("title", "dup")]
            .into_iter()
            .collect();
        assert_eq!(metadata.len(), 3);
        assert_eq!(metadata.get("Title"), Some("Intro"));
        assert_eq!(metadata.get("encoder"), Some("Lavf60"));
        assert_eq!(metadata.get("missing"), None);
        let keys: Vec<_> = metadata.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["title", "ENCODER", "title"]);
    }

    #[test]
    fn stream_descriptor_accessors() {
        let stream = video_stream(false);
        assert_eq!(stream.duration_ms(), Some(10_000));
        assert_eq!(stream.video().and_then(|v| v.fps()), Some(30.0));
        assert!(stream.audio().is_none());
        assert!(!stream.is_attached_picture());
        assert!(video_stream(true).is_attached_picture());
    }

    #[test]
    fn start_ts_defaults_to_zero() {
        let mut stream = video_stream(false);
        assert_eq!(stream.start_ts(), 0);
        stream.start_time = Some(126_000);
        assert_eq!(stream.start_ts(), 126_000);
        // Duration is independent of the start offset
        assert_eq!(stream.duration_ms(), Some(10_000));
    }

    #[test]
    fn audio_params_bytes_per_sample() {
        let params = AudioParams {
            channels: 2,
            sample_format: Some(SampleFormat::F32),
            sample_rate: 48000,
            bitrate: Some(128_000),
        };
        assert_eq!(params.bytes_per_sample(), 4);
    }

    #[test]
    fn stream_kind_display() {
        assert_eq!(StreamKind::Subtitle.to_string(), "subtitle");
        assert_eq!(StreamKind::Attachment.to_string(), "attachment");
    }
}
