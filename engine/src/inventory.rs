/*!
    Stream selection over an opened container.
*/

use serde::Serialize;

use tmedia_types::{ContainerInfo, Metadata, StreamDescriptor, StreamKind};

/**
    The container inventory plus the streams the context decodes.

    The main video stream is the first video stream that is not a single
    attached picture; the main audio stream is the first audio stream.
    Everything else is classified but never decoded.
*/
#[derive(Clone, Debug, Serialize)]
pub struct MediaInfo {
    #[serde(flatten)]
    container: ContainerInfo,
    video_index: Option<usize>,
    audio_index: Option<usize>,
}

impl MediaInfo {
    pub fn new(container: ContainerInfo) -> Self {
        let video_index = container
            .streams
            .iter()
            .find(|s| s.kind == StreamKind::Video && !s.is_attached_picture())
            .map(|s| s.index);
        let audio_index = container
            .streams
            .iter()
            .find(|s| s.kind == StreamKind::Audio)
            .map(|s| s.index);

        Self {
            container,
            video_index,
            audio_index,
        }
    }

    pub fn container(&self) -> &ContainerInfo {
        &self.container
    }

    pub fn format_name(&self) -> &str {
        &self.container.format_name
    }

    /**
        Container duration in milliseconds, falling back to the longest
        selected stream.
    */
    pub fn duration_ms(&self) -> Option<i64> {
        self.container.duration_ms.or_else(|| {
            [self.video_stream(), self.audio_stream()]
                .into_iter()
                .flatten()
                .filter_map(|s| s.duration_ms())
                .max()
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.container.metadata
    }

    pub fn streams(&self) -> &[StreamDescriptor] {
        &self.container.streams
    }

    pub fn video_stream(&self) -> Option<&StreamDescriptor> {
        self.video_index.and_then(|i| self.container.stream(i))
    }

    pub fn audio_stream(&self) -> Option<&StreamDescriptor> {
        self.audio_index.and_then(|i| self.container.stream(i))
    }

    pub fn subtitle_streams(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.streams_of(StreamKind::Subtitle)
    }

    /**
        Attached pictures and attachment streams (fonts and the like).
    */
    pub fn attachment_streams(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.container
            .streams
            .iter()
            .filter(|s| s.kind == StreamKind::Attachment || s.is_attached_picture())
    }

    fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &StreamDescriptor> {
        self.container.streams.iter().filter(move |s| s.kind == kind)
    }

    pub(crate) fn video_index(&self) -> Option<usize> {
        self.video_index
    }

    pub(crate) fn audio_index(&self) -> Option<usize> {
        self.audio_index
    }
}

#[cfg(test)]
mod tests {
    use tmedia_types::{CodecId, Metadata, Rational, StreamParams, VideoParams};

    use super::*;

    fn stream(index: usize, kind: StreamKind, attached_picture: bool) -> StreamDescriptor {
        let params = match kind {
            StreamKind::Video => StreamParams::Video(VideoParams {
                width: 320,
                height: 240,
                pixel_format: None,
                bits_per_raw_sample: 8,
                frame_rate: None,
                bitrate: None,
                attached_picture,
            }),
            _ => StreamParams::None,
        };
        StreamDescriptor {
            index,
            kind,
            codec_id: CodecId::Other,
            codec_name: "test".into(),
            decoder_name: None,
            time_base: Rational::new(1, 1000),
            duration: Some(4000 + index as i64),
            start_time: None,
            params,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn cover_art_is_never_the_main_video_stream() {
        let info = MediaInfo::new(ContainerInfo {
            format_name: "test".into(),
            duration_ms: None,
            streams: vec![
                stream(0, StreamKind::Video, true),
                stream(1, StreamKind::Subtitle, false),
                stream(2, StreamKind::Audio, false),
                stream(3, StreamKind::Video, false),
                stream(4, StreamKind::Attachment, false),
            ],
            metadata: Metadata::new(),
        });

        assert_eq!(info.video_stream().map(|s| s.index), Some(3));
        assert_eq!(info.audio_stream().map(|s| s.index), Some(2));
        assert_eq!(info.subtitle_streams().count(), 1);
        let attachments: Vec<_> = info.attachment_streams().map(|s| s.index).collect();
        assert_eq!(attachments, [0, 4]);
        // Longest selected stream
        assert_eq!(info.duration_ms(), Some(4003));
    }
}
