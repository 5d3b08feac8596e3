/*!
    Video decode pipeline.
*/

use tracing::debug;

use tmedia_types::{
    DecodedVideoBuffer, Decoder, Error, FrameTiming, GrowableRegion, LayoutPreference, MediaBackend,
    Plane, Rational, Result, RgbaConverter, StreamDescriptor, StreamKind, VideoFrameRef,
    VideoLayout,
};

use crate::pipeline::{DecodeCore, DecodeStep};
use crate::result::DecodePath;

pub(crate) struct VideoPipeline<B: MediaBackend> {
    core: DecodeCore<B::VideoDecoder>,
    converter: B::RgbaConverter,
    stream_index: usize,
    time_base: Rational,
    /// Stream timestamp delivered as 0 ms.
    start_ts: i64,
    /// Frame duration in stream ticks derived from the frame rate, 0 if unknown.
    default_duration: i64,
    path: DecodePath,
}

impl<B: MediaBackend> VideoPipeline<B> {
    /**
        Open the decoder and converter for `stream`. Decoder construction
        errors are returned as-is; fallback policy is the caller's.
    */
    pub fn open(
        backend: &B,
        demuxer: &B::Demuxer,
        stream: &StreamDescriptor,
        hardware: bool,
    ) -> Result<Self> {
        let decoder = backend.video_decoder(demuxer, stream, hardware)?;
        let converter = backend.rgba_converter(stream)?;
        let path = if decoder.is_hardware() {
            DecodePath::Hardware
        } else {
            DecodePath::Software
        };

        let default_duration = stream
            .video()
            .and_then(|v| v.frame_rate)
            .filter(|r| !r.is_invalid())
            .map_or(0, |fps| fps.invert().rescale(1, stream.time_base));

        debug!(
            stream = stream.index,
            codec = %stream.codec_name,
            ?path,
            default_duration,
            "opened video pipeline"
        );

        Ok(Self {
            core: DecodeCore::new(decoder, StreamKind::Video),
            converter,
            stream_index: stream.index,
            time_base: stream.time_base,
            start_ts: stream.start_ts(),
            default_duration,
            path,
        })
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn start_ts(&self) -> i64 {
        self.start_ts
    }

    pub fn path(&self) -> DecodePath {
        self.path
    }

    pub fn put_packet(&mut self, packet: B::Packet) -> Result<()> {
        self.core.put_packet(packet)
    }

    pub fn slot_occupied(&self) -> bool {
        self.core.slot_occupied()
    }

    pub fn decode(&mut self, input_ended: bool) -> Result<DecodeStep> {
        self.core.decode(input_ended)
    }

    /**
        Presentation timestamp of the current frame, in stream ticks.
    */
    pub fn frame_pts(&self) -> Option<i64> {
        self.core.frame().and_then(|f| f.pts())
    }

    /**
        Duration of the current frame in stream ticks, from the frame
        itself or the stream frame rate.
    */
    pub fn frame_duration(&self) -> i64 {
        self.core
            .frame()
            .and_then(|f| f.duration())
            .unwrap_or(self.default_duration)
    }

    pub fn hold_for_delivery(&mut self) {
        self.core.hold_for_delivery();
    }

    /**
        Copy the current frame into `buffer`.

        Uses the frame's own planes when the buffer accepts native layouts
        and the pixel format has one, RGBA conversion otherwise.
    */
    pub fn move_to_buffer(&mut self, buffer: &mut DecodedVideoBuffer) -> Result<()> {
        let frame = self.core.frame().ok_or(Error::NoFrame)?;
        let (width, height) = (frame.width(), frame.height());

        let native = match buffer.preference() {
            LayoutPreference::Native => frame.pixel_format().and_then(VideoLayout::native_for),
            LayoutPreference::Rgba => None,
        };

        match native {
            Some(layout) => {
                buffer.begin_frame(layout, width, height);
                for (index, &plane) in layout.planes().iter().enumerate() {
                    copy_plane(
                        frame.plane(index),
                        frame.stride(index),
                        plane.dimensions(width, height),
                        buffer.plane_mut(plane),
                    )?;
                }
            }
            None => {
                buffer.begin_frame(VideoLayout::Rgba, width, height);
                self.converter
                    .convert(frame, buffer.plane_mut(Plane::Rgba))?;
            }
        }

        let pts_ms = frame
            .pts()
            .map_or(0, |pts| self.time_base.ts_to_millis(pts - self.start_ts));
        let duration = frame.duration().unwrap_or(self.default_duration);
        buffer.set_timing(pts_ms, self.time_base.ts_to_millis(duration));
        Ok(())
    }

    /**
        Drop queued packets and frames, e.g. after repositioning the reader.
    */
    pub fn flush(&mut self) {
        self.core.flush();
    }
}

/**
    Copy `rows` rows of `row_bytes` each out of a strided plane.
*/
fn copy_plane(
    src: &[u8],
    stride: usize,
    (row_bytes, rows): (usize, usize),
    dst: &mut GrowableRegion,
) -> Result<()> {
    if rows == 0 || row_bytes == 0 {
        dst.clear();
        return Ok(());
    }
    let needed = stride * (rows - 1) + row_bytes;
    if stride < row_bytes || src.len() < needed {
        return Err(Error::invalid_data(format!(
            "plane of {} bytes with stride {stride} cannot hold {rows} rows of {row_bytes} bytes",
            src.len()
        )));
    }

    let out = dst.fill_in_place(row_bytes * rows);
    for (row, chunk) in out.chunks_exact_mut(row_bytes).enumerate() {
        let start = row * stride;
        chunk.copy_from_slice(&src[start..start + row_bytes]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_plane_strips_row_padding() {
        let src: Vec<u8> = (0..12).collect();
        let mut dst = GrowableRegion::new();
        copy_plane(&src, 4, (3, 3), &mut dst).unwrap();
        assert_eq!(dst.as_slice(), [0, 1, 2, 4, 5, 6, 8, 9, 10]);
    }

    #[test]
    fn copy_plane_rejects_short_sources() {
        let src = [0u8; 10];
        let mut dst = GrowableRegion::new();
        assert!(matches!(
            copy_plane(&src, 4, (3, 3), &mut dst),
            Err(Error::InvalidData(_))
        ));
        assert!(copy_plane(&src, 2, (3, 3), &mut dst).is_err());
    }
}
