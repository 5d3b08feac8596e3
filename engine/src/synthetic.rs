/*!
    Deterministic in-memory media backend.

    Generates a container with a video stream, an audio stream and
    optional subtitle, cover art and attachment streams, entirely from a
    [`SyntheticConfig`]. The decoders model what matters to the engine:
    keyframe dependency, reorder delay, packets carrying several frames,
    a decoder refusing input while it has output pending, and hardware
    availability. Every handle it gives out is counted so tests can check
    that nothing outlives its context.
*/

use std::collections::VecDeque;
use std::mem;
use std::path::Path;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use parking_lot::Mutex;

use tmedia_types::{
    AudioFrameRef, AudioOutputFormat, AudioParams, CodecId, ContainerInfo, Decoder, Demuxer,
    Error, FrameTiming, GrowableRegion, MediaBackend, Metadata, Packet, PixelFormat, Rational,
    ReceiveStatus, Resampler, Result, RgbaConverter, SampleFormat, SendStatus, StreamDescriptor,
    StreamKind, StreamParams, VideoFrameRef, VideoParams,
};

/// Output samples per channel the resampler keeps back until more input
/// arrives or it is drained.
const RESAMPLER_HOLDBACK: usize = 32;

/// Row padding added to every generated plane.
const ROW_PADDING: usize = 16;

/**
    Shape of the generated container.
*/
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub duration_ms: i64,
    /// Presentation time of the first frame of every stream.
    pub start_ms: i64,

    pub video: bool,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub frame_rate: Rational,
    pub video_time_base: Rational,
    /// Frames between keyframes.
    pub gop: u32,
    /// Frames the decoder holds before releasing the first one.
    pub reorder_delay: usize,
    pub frames_per_packet: u32,
    /// Frame index whose packet arrives corrupt.
    pub corrupt_frame: Option<u32>,

    pub audio: bool,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples_per_packet: usize,

    pub subtitles: bool,
    pub attached_picture: bool,
    pub attachment: bool,

    pub hardware_available: bool,
    pub fail_open: bool,
    pub fail_decoder: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            duration_ms: 10_000,
            start_ms: 0,
            video: true,
            width: 64,
            height: 36,
            pixel_format: PixelFormat::Yuv420p,
            frame_rate: Rational::new(30, 1),
            video_time_base: Rational::new(1, 90_000),
            gop: 30,
            reorder_delay: 2,
            frames_per_packet: 1,
            corrupt_frame: None,
            audio: true,
            sample_rate: 44_100,
            channels: 2,
            samples_per_packet: 1024,
            subtitles: false,
            attached_picture: false,
            attachment: false,
            hardware_available: false,
            fail_open: false,
            fail_decoder: false,
        }
    }
}

impl SyntheticConfig {
    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_start_ms(mut self, start_ms: i64) -> Self {
        self.start_ms = start_ms.max(0);
        self
    }

    pub fn with_video(mut self, video: bool) -> Self {
        self.video = video;
        self
    }

    pub fn with_audio(mut self, audio: bool) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_pixel_format(mut self, pixel_format: PixelFormat) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    pub fn with_gop(mut self, gop: u32) -> Self {
        self.gop = gop.max(1);
        self
    }

    pub fn with_reorder_delay(mut self, reorder_delay: usize) -> Self {
        self.reorder_delay = reorder_delay;
        self
    }

    pub fn with_frames_per_packet(mut self, frames: u32) -> Self {
        self.frames_per_packet = frames.max(1);
        self
    }

    pub fn with_corrupt_frame(mut self, frame: u32) -> Self {
        self.corrupt_frame = Some(frame);
        self
    }

    pub fn with_audio_format(mut self, sample_rate: u32, channels: u16) -> Self {
        self.sample_rate = sample_rate;
        self.channels = channels.max(1);
        self
    }

    pub fn with_subtitles(mut self, subtitles: bool) -> Self {
        self.subtitles = subtitles;
        self
    }

    pub fn with_attached_picture(mut self, attached_picture: bool) -> Self {
        self.attached_picture = attached_picture;
        self
    }

    pub fn with_attachment(mut self, attachment: bool) -> Self {
        self.attachment = attachment;
        self
    }

    pub fn with_hardware_available(mut self, available: bool) -> Self {
        self.hardware_available = available;
        self
    }

    pub fn with_fail_open(mut self, fail: bool) -> Self {
        self.fail_open = fail;
        self
    }

    pub fn with_fail_decoder(mut self, fail: bool) -> Self {
        self.fail_decoder = fail;
        self
    }

    /// Frame duration in video ticks.
    fn frame_ticks(&self) -> i64 {
        self.frame_rate.invert().rescale(1, self.video_time_base)
    }

    fn video_start_ticks(&self) -> i64 {
        self.video_time_base.millis_to_ts(self.start_ms)
    }

    fn audio_time_base(&self) -> Rational {
        Rational::new(1, self.sample_rate as i32)
    }

    fn total_frames(&self) -> u32 {
        let frames = self.duration_ms * self.frame_rate.num as i64
            / (1000 * self.frame_rate.den.max(1) as i64);
        u32::try_from(frames.max(0)).unwrap_or(u32::MAX)
    }

    fn total_samples(&self) -> usize {
        usize::try_from(self.duration_ms.max(0) * self.sample_rate as i64 / 1000).unwrap_or(0)
    }
}

// ── Resource accounting ───────────────────────────────────────────────

/**
    Handles currently alive, per kind.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveResources {
    pub demuxers: usize,
    pub decoders: usize,
    pub hw_devices: usize,
    pub converters: usize,
    pub resamplers: usize,
}

impl LiveResources {
    pub fn total(&self) -> usize {
        self.demuxers + self.decoders + self.hw_devices + self.converters + self.resamplers
    }

    fn slot(&mut self, kind: Resource) -> &mut usize {
        match kind {
            Resource::Demuxer => &mut self.demuxers,
            Resource::Decoder => &mut self.decoders,
            Resource::HwDevice => &mut self.hw_devices,
            Resource::Converter => &mut self.converters,
            Resource::Resampler => &mut self.resamplers,
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum Resource {
    Demuxer,
    Decoder,
    HwDevice,
    Converter,
    Resampler,
}

/// Counts one live handle until dropped.
#[derive(Debug)]
struct Tracked {
    live: Arc<Mutex<LiveResources>>,
    kind: Resource,
}

impl Tracked {
    fn new(live: &Arc<Mutex<LiveResources>>, kind: Resource) -> Self {
        *live.lock().slot(kind) += 1;
        Self {
            live: Arc::clone(live),
            kind,
        }
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        let mut live = self.live.lock();
        let count = live.slot(self.kind);
        *count = count.saturating_sub(1);
    }
}

// ── Backend ───────────────────────────────────────────────────────────

/**
    A [`MediaBackend`] generating media from a [`SyntheticConfig`].

    Clones share their resource counters.
*/
#[derive(Clone, Debug, Default)]
pub struct SyntheticBackend {
    config: SyntheticConfig,
    live: Arc<Mutex<LiveResources>>,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            live: Arc::default(),
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    pub fn live_resources(&self) -> LiveResources {
        *self.live.lock()
    }
}

impl MediaBackend for SyntheticBackend {
    type Packet = Packet;
    type Demuxer = SyntheticDemuxer;
    type VideoFrame = SyntheticVideoFrame;
    type AudioFrame = SyntheticAudioFrame;
    type VideoDecoder = SyntheticVideoDecoder;
    type AudioDecoder = SyntheticAudioDecoder;
    type RgbaConverter = SyntheticRgbaConverter;
    type Resampler = SyntheticResampler;

    fn open(&self, path: &Path) -> Result<SyntheticDemuxer> {
        if self.config.fail_open {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{}: No such file or directory", path.display()),
            )));
        }
        let (info, packets) = generate(&self.config);
        Ok(SyntheticDemuxer {
            info,
            packets: packets.into(),
            position: 0,
            _tracked: Tracked::new(&self.live, Resource::Demuxer),
        })
    }

    fn video_decoder(
        &self,
        _demuxer: &SyntheticDemuxer,
        stream: &StreamDescriptor,
        hardware: bool,
    ) -> Result<SyntheticVideoDecoder> {
        if self.config.fail_decoder {
            return Err(Error::codec("synthetic decoder failed to open"));
        }
        let params = stream
            .video()
            .ok_or_else(|| Error::unsupported_format(format!("stream {} is not video", stream.index)))?;
        let hw_device = match (hardware, self.config.hardware_available) {
            (false, _) => None,
            (true, true) => Some(Tracked::new(&self.live, Resource::HwDevice)),
            (true, false) => {
                return Err(Error::HardwareUnavailable(
                    "no synthetic hardware device".into(),
                ));
            }
        };

        Ok(SyntheticVideoDecoder {
            width: params.width,
            height: params.height,
            pixel_format: params.pixel_format.unwrap_or(PixelFormat::Yuv420p),
            frame_ticks: self.config.frame_ticks(),
            start_ticks: self.config.video_start_ticks(),
            delay: self.config.reorder_delay,
            queue: VecDeque::new(),
            eof: false,
            need_keyframe: true,
            hw_device,
            _tracked: Tracked::new(&self.live, Resource::Decoder),
        })
    }

    fn audio_decoder(
        &self,
        _demuxer: &SyntheticDemuxer,
        stream: &StreamDescriptor,
    ) -> Result<SyntheticAudioDecoder> {
        let params = stream
            .audio()
            .ok_or_else(|| Error::unsupported_format(format!("stream {} is not audio", stream.index)))?;
        Ok(SyntheticAudioDecoder {
            channels: params.channels,
            sample_rate: params.sample_rate,
            pending: None,
            eof: false,
            _tracked: Tracked::new(&self.live, Resource::Decoder),
        })
    }

    fn rgba_converter(&self, _stream: &StreamDescriptor) -> Result<SyntheticRgbaConverter> {
        Ok(SyntheticRgbaConverter {
            _tracked: Tracked::new(&self.live, Resource::Converter),
        })
    }

    fn resampler(
        &self,
        _stream: &StreamDescriptor,
        output: AudioOutputFormat,
    ) -> Result<SyntheticResampler> {
        sample_writer(output.sample_format)?;
        Ok(SyntheticResampler {
            output,
            pending: Vec::new(),
            produced: 0,
            consumed: 0,
            _tracked: Tracked::new(&self.live, Resource::Resampler),
        })
    }
}

// ── Container ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct VideoPacketHeader {
    first_frame: u32,
    frames: u32,
}

fn generate(config: &SyntheticConfig) -> (ContainerInfo, Vec<Packet>) {
    let mut streams = Vec::new();
    let mut packets = Vec::new();

    if config.video {
        let index = streams.len();
        let tb = config.video_time_base;
        let ticks = config.frame_ticks();
        let start = config.video_start_ticks();
        let total = config.total_frames();
        streams.push(StreamDescriptor {
            index,
            kind: StreamKind::Video,
            codec_id: CodecId::H264,
            codec_name: "h264".into(),
            decoder_name: Some("synthetic_h264".into()),
            time_base: tb,
            duration: Some(total as i64 * ticks),
            start_time: Some(start),
            params: StreamParams::Video(VideoParams {
                width: config.width,
                height: config.height,
                pixel_format: Some(config.pixel_format),
                bits_per_raw_sample: 8,
                frame_rate: Some(config.frame_rate),
                bitrate: None,
                attached_picture: false,
            }),
            metadata: Metadata::from_iter([("handler_name", "VideoHandler")]),
        });

        let per_packet = config.frames_per_packet.max(1);
        for first_frame in (0..total).step_by(per_packet as usize) {
            let frames = per_packet.min(total - first_frame);
            let data = if config
                .corrupt_frame
                .is_some_and(|f| (first_frame..first_frame + frames).contains(&f))
            {
                Vec::new()
            } else {
                bytemuck::bytes_of(&VideoPacketHeader {
                    first_frame,
                    frames,
                })
                .to_vec()
            };
            let pts = start + first_frame as i64 * ticks;
            packets.push(
                Packet::new(index, data)
                    .with_timing(Some(pts), Some(pts), frames as i64 * ticks)
                    .with_keyframe(first_frame % config.gop.max(1) == 0),
            );
        }
    }

    if config.audio {
        let index = streams.len();
        let tb = config.audio_time_base();
        let first = tb.millis_to_ts(config.start_ms);
        let total = config.total_samples();
        let channels = config.channels.max(1);
        streams.push(StreamDescriptor {
            index,
            kind: StreamKind::Audio,
            codec_id: CodecId::PcmF32Le,
            codec_name: "pcm_f32le".into(),
            decoder_name: Some("synthetic_pcm".into()),
            time_base: tb,
            duration: Some(total as i64),
            start_time: Some(first),
            params: StreamParams::Audio(AudioParams {
                channels,
                sample_format: Some(SampleFormat::F32),
                sample_rate: config.sample_rate,
                bitrate: Some(config.sample_rate as u64 * channels as u64 * 32),
            }),
            metadata: Metadata::from_iter([("language", "und")]),
        });

        let per_packet = config.samples_per_packet.max(1);
        for start in (0..total).step_by(per_packet) {
            let count = per_packet.min(total - start);
            let samples: Vec<f32> = (start..start + count)
                .flat_map(|s| {
                    let value = (s % 100) as f32 / 100.0 - 0.5;
                    (0..channels).map(move |c| if c % 2 == 0 { value } else { -value })
                })
                .collect();
            let pts = first + start as i64;
            packets.push(
                Packet::new(index, bytemuck::cast_slice(&samples).to_vec())
                    .with_timing(Some(pts), Some(pts), count as i64)
                    .with_keyframe(true),
            );
        }
    }

    if config.subtitles {
        let index = streams.len();
        streams.push(side_stream(index, StreamKind::Subtitle, CodecId::Subrip, "subrip"));
        for second in 0..config.duration_ms / 1000 {
            let pts = config.start_ms + second * 1000;
            packets.push(
                Packet::new(index, format!("line {second}").into_bytes())
                    .with_timing(Some(pts), Some(pts), 900)
                    .with_keyframe(true),
            );
        }
    }

    if config.attached_picture {
        let index = streams.len();
        let mut stream = side_stream(index, StreamKind::Video, CodecId::Mjpeg, "mjpeg");
        stream.time_base = Rational::new(1, 90_000);
        stream.params = StreamParams::Video(VideoParams {
            width: 32,
            height: 32,
            pixel_format: Some(PixelFormat::Yuv420p),
            bits_per_raw_sample: 8,
            frame_rate: None,
            bitrate: None,
            attached_picture: true,
        });
        streams.push(stream);
        packets.push(
            Packet::new(index, vec![0xff, 0xd8, 0xff, 0xd9])
                .with_timing(Some(0), Some(0), 0)
                .with_keyframe(true),
        );
    }

    if config.attachment {
        let index = streams.len();
        let mut stream = side_stream(index, StreamKind::Attachment, CodecId::Other, "ttf");
        stream.metadata.push("filename", "font.ttf");
        streams.push(stream);
    }

    // Container order: by presentation time, lower stream index first
    let micros = Rational::new(1, 1_000_000);
    packets.sort_by_key(|p| {
        let tb = streams[p.stream_index].time_base;
        (tb.rescale(p.pts.unwrap_or(0), micros), p.stream_index)
    });

    let info = ContainerInfo {
        format_name: "synthetic".into(),
        duration_ms: Some(config.duration_ms),
        streams,
        metadata: Metadata::from_iter([("title", "synthetic"), ("encoder", "tmedia")]),
    };
    (info, packets)
}

fn side_stream(index: usize, kind: StreamKind, codec_id: CodecId, name: &str) -> StreamDescriptor {
    StreamDescriptor {
        index,
        kind,
        codec_id,
        codec_name: name.into(),
        decoder_name: None,
        time_base: Rational::MILLIS,
        duration: None,
        start_time: None,
        params: StreamParams::None,
        metadata: Metadata::new(),
    }
}

#[derive(Debug)]
pub struct SyntheticDemuxer {
    info: ContainerInfo,
    packets: Arc<[Packet]>,
    position: usize,
    _tracked: Tracked,
}

impl Demuxer for SyntheticDemuxer {
    type Packet = Packet;

    fn info(&self) -> &ContainerInfo {
        &self.info
    }

    fn read_packet(&mut self) -> Result<Option<Packet>> {
        let packet = self.packets.get(self.position).cloned();
        if packet.is_some() {
            self.position += 1;
        }
        Ok(packet)
    }

    fn seek(&mut self, stream_index: usize, target_ts: i64) -> Result<()> {
        if self.info.stream(stream_index).is_none() {
            return Err(Error::invalid_data(format!("no stream {stream_index}")));
        }
        let keyframes = || {
            self.packets
                .iter()
                .enumerate()
                .filter(|(_, p)| p.stream_index == stream_index && p.is_keyframe)
        };
        let (mut position, keyframe) = keyframes()
            .filter(|(_, p)| p.pts.is_some_and(|pts| pts <= target_ts))
            .last()
            .or_else(|| keyframes().next())
            .ok_or_else(|| Error::invalid_data(format!("stream {stream_index} has no keyframe")))?;

        // Other streams restart at the packet covering the keyframe time
        let keyframe_us = self.micros(keyframe, keyframe.pts.unwrap_or(0));
        while let Some(previous) = position.checked_sub(1).map(|i| &self.packets[i]) {
            let end_us = self.micros(previous, previous.pts.unwrap_or(0) + previous.duration);
            if previous.stream_index == stream_index || end_us <= keyframe_us {
                break;
            }
            position -= 1;
        }
        self.position = position;
        Ok(())
    }
}

impl SyntheticDemuxer {
    fn micros(&self, packet: &Packet, ts: i64) -> i64 {
        self.info
            .stream(packet.stream_index)
            .map_or(ts, |s| s.time_base.rescale(ts, Rational::new(1, 1_000_000)))
    }
}

// ── Video ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SyntheticVideoFrame {
    index: Option<u32>,
    pts: Option<i64>,
    duration: Option<i64>,
    width: u32,
    height: u32,
    format: Option<PixelFormat>,
    planes: [Vec<u8>; 3],
    strides: [usize; 3],
    plane_count: usize,
}

impl SyntheticVideoFrame {
    /// Frame number within the stream.
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    fn paint(&mut self, index: u32, pts: i64, duration: i64, format: PixelFormat) {
        let (w, h) = (self.width as usize, self.height as usize);
        let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
        let luma = index as u8;
        // (row bytes, rows, repeating fill pattern) per plane
        let layout: Vec<(usize, usize, [u8; 4])> = match format {
            PixelFormat::Nv12 | PixelFormat::Nv21 => {
                vec![(w, h, [luma; 4]), (cw * 2, ch, [128, 96, 128, 96])]
            }
            PixelFormat::Rgba | PixelFormat::Bgra => vec![(w * 4, h, [luma, 0, 0, 255])],
            _ => vec![(w, h, [luma; 4]), (cw, ch, [128; 4]), (cw, ch, [96; 4])],
        };

        for (i, &(row_bytes, rows, pattern)) in layout.iter().enumerate() {
            let stride = row_bytes + ROW_PADDING;
            let plane = &mut self.planes[i];
            plane.clear();
            plane.resize(stride * rows, 0);
            for row in plane.chunks_exact_mut(stride) {
                for (dst, src) in row[..row_bytes].iter_mut().zip(pattern.iter().cycle()) {
                    *dst = *src;
                }
            }
            self.strides[i] = stride;
        }
        self.plane_count = layout.len();
        self.index = Some(index);
        self.pts = Some(pts);
        self.duration = Some(duration);
        self.format = Some(format);
    }
}

impl FrameTiming for SyntheticVideoFrame {
    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn duration(&self) -> Option<i64> {
        self.duration
    }
}

impl VideoFrameRef for SyntheticVideoFrame {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel_format(&self) -> Option<PixelFormat> {
        self.format
    }

    fn plane(&self, index: usize) -> &[u8] {
        if index < self.plane_count {
            &self.planes[index]
        } else {
            &[]
        }
    }

    fn stride(&self, index: usize) -> usize {
        if index < self.plane_count {
            self.strides[index]
        } else {
            0
        }
    }
}

#[derive(Debug)]
pub struct SyntheticVideoDecoder {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    frame_ticks: i64,
    /// Timestamp of frame 0.
    start_ticks: i64,
    delay: usize,
    /// Decoded frame indices not handed out yet, in presentation order.
    queue: VecDeque<u32>,
    eof: bool,
    need_keyframe: bool,
    hw_device: Option<Tracked>,
    _tracked: Tracked,
}

impl Decoder for SyntheticVideoDecoder {
    type Frame = SyntheticVideoFrame;
    type Packet = Packet;

    fn new_frame(&self) -> SyntheticVideoFrame {
        SyntheticVideoFrame {
            width: self.width,
            height: self.height,
            ..SyntheticVideoFrame::default()
        }
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<SendStatus> {
        if self.eof {
            return Err(Error::codec("packet sent after end of stream"));
        }
        if self.queue.len() > self.delay {
            return Ok(SendStatus::Full);
        }
        let header: VideoPacketHeader = packet
            .data
            .get(..mem::size_of::<VideoPacketHeader>())
            .and_then(|bytes| bytemuck::try_pod_read_unaligned(bytes).ok())
            .ok_or_else(|| {
                Error::invalid_data(format!("corrupt video packet at pts {:?}", packet.pts))
            })?;

        if self.need_keyframe && !packet.is_keyframe {
            // Nothing to reference yet
            return Ok(SendStatus::Accepted);
        }
        self.need_keyframe = false;
        self.queue
            .extend(header.first_frame..header.first_frame + header.frames);
        Ok(SendStatus::Accepted)
    }

    fn send_eof(&mut self) -> Result<SendStatus> {
        self.eof = true;
        Ok(SendStatus::Accepted)
    }

    fn receive_frame(&mut self, frame: &mut SyntheticVideoFrame) -> Result<ReceiveStatus> {
        let ready = self.queue.len() > self.delay || (self.eof && !self.queue.is_empty());
        match self.queue.pop_front() {
            Some(index) if ready => {
                frame.width = self.width;
                frame.height = self.height;
                frame.paint(
                    index,
                    self.start_ticks + index as i64 * self.frame_ticks,
                    self.frame_ticks,
                    self.pixel_format,
                );
                Ok(ReceiveStatus::Frame)
            }
            Some(index) => {
                self.queue.push_front(index);
                Ok(ReceiveStatus::NoFrameYet)
            }
            None if self.eof => Ok(ReceiveStatus::End),
            None => Ok(ReceiveStatus::NoFrameYet),
        }
    }

    fn flush(&mut self) {
        self.queue.clear();
        self.eof = false;
        self.need_keyframe = true;
    }

    fn is_hardware(&self) -> bool {
        self.hw_device.is_some()
    }
}

#[derive(Debug)]
pub struct SyntheticRgbaConverter {
    _tracked: Tracked,
}

impl RgbaConverter for SyntheticRgbaConverter {
    type Frame = SyntheticVideoFrame;

    /// Packed sources are copied (BGRA swizzled); YUV becomes gray.
    fn convert(&mut self, frame: &SyntheticVideoFrame, dst: &mut GrowableRegion) -> Result<()> {
        let (w, h) = (frame.width as usize, frame.height as usize);
        let src = frame.plane(0);
        let stride = frame.stride(0);
        let bytes_per_pixel = match frame.format {
            Some(PixelFormat::Rgba | PixelFormat::Bgra) => 4,
            _ => 1,
        };
        if src.len() < stride * h || stride < w * bytes_per_pixel {
            return Err(Error::invalid_data("frame has no pixel data"));
        }

        let out = dst.fill_in_place(w * h * 4);
        for (y, row) in out.chunks_exact_mut(w * 4).enumerate() {
            let src_row = &src[y * stride..y * stride + w * bytes_per_pixel];
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                match frame.format {
                    Some(PixelFormat::Rgba) => px.copy_from_slice(&src_row[x * 4..x * 4 + 4]),
                    Some(PixelFormat::Bgra) => {
                        let s = &src_row[x * 4..x * 4 + 4];
                        px.copy_from_slice(&[s[2], s[1], s[0], s[3]]);
                    }
                    _ => {
                        let luma = src_row[x];
                        px.copy_from_slice(&[luma, luma, luma, 255]);
                    }
                }
            }
        }
        Ok(())
    }
}

// ── Audio ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SyntheticAudioFrame {
    pts: Option<i64>,
    duration: Option<i64>,
    /// Interleaved samples.
    data: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl FrameTiming for SyntheticAudioFrame {
    fn pts(&self) -> Option<i64> {
        self.pts
    }

    fn duration(&self) -> Option<i64> {
        self.duration
    }
}

impl AudioFrameRef for SyntheticAudioFrame {
    fn samples(&self) -> usize {
        self.data.len() / self.channels.max(1) as usize
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}

#[derive(Debug)]
pub struct SyntheticAudioDecoder {
    channels: u16,
    sample_rate: u32,
    /// One decoded packet waiting to be received.
    pending: Option<(Option<i64>, Vec<f32>)>,
    eof: bool,
    _tracked: Tracked,
}

impl Decoder for SyntheticAudioDecoder {
    type Frame = SyntheticAudioFrame;
    type Packet = Packet;

    fn new_frame(&self) -> SyntheticAudioFrame {
        SyntheticAudioFrame::default()
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<SendStatus> {
        if self.eof {
            return Err(Error::codec("packet sent after end of stream"));
        }
        if self.pending.is_some() {
            return Ok(SendStatus::Full);
        }
        let bytes_per_frame = 4 * self.channels as usize;
        if packet.data.len() % bytes_per_frame != 0 {
            return Err(Error::invalid_data("truncated audio packet"));
        }
        let samples: Vec<f32> = bytemuck::pod_collect_to_vec(&packet.data);
        self.pending = Some((packet.pts, samples));
        Ok(SendStatus::Accepted)
    }

    fn send_eof(&mut self) -> Result<SendStatus> {
        self.eof = true;
        Ok(SendStatus::Accepted)
    }

    fn receive_frame(&mut self, frame: &mut SyntheticAudioFrame) -> Result<ReceiveStatus> {
        match self.pending.take() {
            Some((pts, samples)) => {
                frame.pts = pts;
                frame.duration = Some((samples.len() / self.channels.max(1) as usize) as i64);
                frame.data = samples;
                frame.channels = self.channels;
                frame.sample_rate = self.sample_rate;
                Ok(ReceiveStatus::Frame)
            }
            None if self.eof => Ok(ReceiveStatus::End),
            None => Ok(ReceiveStatus::NoFrameYet),
        }
    }

    fn flush(&mut self) {
        self.pending = None;
        self.eof = false;
    }
}

/**
    Nearest-neighbour resampler with channel mapping. Keeps the last
    [`RESAMPLER_HOLDBACK`] output samples back like a filter would.
*/
#[derive(Debug)]
pub struct SyntheticResampler {
    output: AudioOutputFormat,
    /// Resampled, not yet written, interleaved in the output layout.
    pending: Vec<f32>,
    /// Output samples per channel generated since the last reset.
    produced: u64,
    /// Input samples per channel consumed since the last reset.
    consumed: u64,
    _tracked: Tracked,
}

impl SyntheticResampler {
    fn write(&mut self, samples: usize, dst: &mut GrowableRegion) -> Result<usize> {
        let channels = self.output.channels.channels() as usize;
        let write = sample_writer(self.output.sample_format)?;
        let bytes = self.output.sample_format.bytes_per_sample();
        let out = dst.fill_in_place(samples * channels * bytes);
        for (chunk, &sample) in out.chunks_exact_mut(bytes).zip(&self.pending) {
            write(sample, chunk);
        }
        self.pending.drain(..samples * channels);
        Ok(samples)
    }
}

impl Resampler for SyntheticResampler {
    type Frame = SyntheticAudioFrame;

    fn output_format(&self) -> AudioOutputFormat {
        self.output
    }

    fn resample(&mut self, frame: &SyntheticAudioFrame, dst: &mut GrowableRegion) -> Result<usize> {
        let in_channels = frame.channels.max(1) as usize;
        let out_channels = self.output.channels.channels() as usize;
        let in_rate = frame.sample_rate.max(1) as u64;
        let out_rate = self.output.sample_rate.max(1) as u64;
        let available = frame.samples() as u64;

        loop {
            let source = self.produced * in_rate / out_rate;
            if source >= self.consumed + available {
                break;
            }
            let offset = (source - self.consumed) as usize * in_channels;
            let input = &frame.data[offset..offset + in_channels];
            for c in 0..out_channels {
                let sample = if out_channels == 1 {
                    input.iter().sum::<f32>() / in_channels as f32
                } else {
                    input[c.min(in_channels - 1)]
                };
                self.pending.push(sample);
            }
            self.produced += 1;
        }
        self.consumed += available;

        let ready = (self.pending.len() / out_channels).saturating_sub(RESAMPLER_HOLDBACK);
        self.write(ready, dst)
    }

    fn drain(&mut self, dst: &mut GrowableRegion) -> Result<usize> {
        let samples = self.pending.len() / self.output.channels.channels() as usize;
        self.write(samples, dst)
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.produced = 0;
        self.consumed = 0;
    }
}

type SampleWriter = fn(f32, &mut [u8]);

fn sample_writer(format: SampleFormat) -> Result<SampleWriter> {
    let writer: SampleWriter = match format {
        SampleFormat::U8 => |s, out| out[0] = (s.clamp(-1.0, 1.0) * 127.0 + 128.0) as u8,
        SampleFormat::S16 => |s, out| {
            out.copy_from_slice(&((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_ne_bytes())
        },
        SampleFormat::S32 => |s, out| {
            out.copy_from_slice(
                &((s.clamp(-1.0, 1.0) as f64 * i32::MAX as f64) as i32).to_ne_bytes(),
            )
        },
        SampleFormat::F32 => |s, out| out.copy_from_slice(&s.to_ne_bytes()),
        SampleFormat::F64 => |s, out| out.copy_from_slice(&(s as f64).to_ne_bytes()),
        other => {
            return Err(Error::unsupported_format(format!(
                "no synthetic output for {other:?}"
            )));
        }
    };
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use tmedia_types::ChannelLayout;

    use super::*;

    fn open(config: SyntheticConfig) -> (SyntheticBackend, SyntheticDemuxer) {
        let backend = SyntheticBackend::new(config);
        let demuxer = backend.open(Path::new("test")).unwrap();
        (backend, demuxer)
    }

    #[test]
    fn container_layout() {
        let (_, mut demuxer) = open(
            SyntheticConfig::default()
                .with_subtitles(true)
                .with_attached_picture(true)
                .with_attachment(true),
        );
        let kinds: Vec<_> = demuxer.info().streams.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            [
                StreamKind::Video,
                StreamKind::Audio,
                StreamKind::Subtitle,
                StreamKind::Video,
                StreamKind::Attachment
            ]
        );

        let mut counts = [0usize; 5];
        let mut last_ms = 0;
        while let Some(packet) = demuxer.read_packet().unwrap() {
            counts[packet.stream_index] += 1;
            let tb = demuxer.info().streams[packet.stream_index].time_base;
            let ms = tb.ts_to_millis(packet.pts.unwrap());
            assert!(ms >= last_ms - 1);
            last_ms = ms;
        }
        assert_eq!(counts, [300, 431, 10, 1, 0]);
    }

    #[test]
    fn seek_lands_on_keyframe_at_or_before() {
        let (_, mut demuxer) = open(SyntheticConfig::default());
        demuxer.seek(0, 5500 * 90).unwrap();
        // The audio packet playing at 5000 ms comes first
        let audio = demuxer.read_packet().unwrap().unwrap();
        assert_eq!((audio.stream_index, audio.pts), (1, Some(215 * 1024)));
        let packet = demuxer.read_packet().unwrap().unwrap();
        assert_eq!(packet.stream_index, 0);
        assert!(packet.is_keyframe);
        assert_eq!(packet.pts, Some(450_000));

        // Before the first keyframe clamps to it
        demuxer.seek(0, -100).unwrap();
        assert_eq!(demuxer.read_packet().unwrap().unwrap().pts, Some(0));
    }

    #[test]
    fn start_offset_shifts_every_stream() {
        let (_, mut demuxer) = open(SyntheticConfig::default().with_start_ms(1400));
        let starts: Vec<_> = demuxer.info().streams.iter().map(|s| s.start_time).collect();
        assert_eq!(starts, [Some(126_000), Some(61_740)]);

        let first = demuxer.read_packet().unwrap().unwrap();
        assert_eq!((first.stream_index, first.pts), (0, Some(126_000)));
        let second = demuxer.read_packet().unwrap().unwrap();
        assert_eq!((second.stream_index, second.pts), (1, Some(61_740)));
    }

    #[test]
    fn video_decoder_holds_back_reordered_frames() {
        let (backend, mut demuxer) = open(SyntheticConfig::default().with_audio(false));
        let stream = demuxer.info().streams[0].clone();
        let mut decoder = backend.video_decoder(&demuxer, &stream, false).unwrap();
        let mut frame = decoder.new_frame();

        for _ in 0..2 {
            let packet = demuxer.read_packet().unwrap().unwrap();
            assert_eq!(decoder.send_packet(&packet).unwrap(), SendStatus::Accepted);
            assert_eq!(decoder.receive_frame(&mut frame).unwrap(), ReceiveStatus::NoFrameYet);
        }
        let packet = demuxer.read_packet().unwrap().unwrap();
        decoder.send_packet(&packet).unwrap();
        assert_eq!(decoder.receive_frame(&mut frame).unwrap(), ReceiveStatus::Frame);
        assert_eq!(frame.index(), Some(0));

        decoder.send_eof().unwrap();
        let mut drained = 0;
        while decoder.receive_frame(&mut frame).unwrap() == ReceiveStatus::Frame {
            drained += 1;
        }
        assert_eq!(drained, 2);
        assert_eq!(frame.index(), Some(2));
    }

    #[test]
    fn video_decoder_waits_for_a_keyframe_after_flush() {
        let (backend, mut demuxer) = open(SyntheticConfig::default().with_audio(false));
        let stream = demuxer.info().streams[0].clone();
        let mut decoder = backend.video_decoder(&demuxer, &stream, false).unwrap();
        demuxer.read_packet().unwrap();
        decoder.flush();
        // Frames 1..29 reference the skipped keyframe
        for _ in 1..30 {
            let packet = demuxer.read_packet().unwrap().unwrap();
            decoder.send_packet(&packet).unwrap();
        }
        decoder.send_eof().unwrap();
        let mut frame = decoder.new_frame();
        assert_eq!(decoder.receive_frame(&mut frame).unwrap(), ReceiveStatus::End);
    }

    #[test]
    fn hardware_requires_an_available_device() {
        let (backend, demuxer) = open(SyntheticConfig::default());
        let stream = demuxer.info().streams[0].clone();
        assert!(matches!(
            backend.video_decoder(&demuxer, &stream, true),
            Err(Error::HardwareUnavailable(_))
        ));

        let (backend, demuxer) = open(SyntheticConfig::default().with_hardware_available(true));
        let decoder = backend.video_decoder(&demuxer, &stream, true).unwrap();
        assert!(decoder.is_hardware());
        assert_eq!(backend.live_resources().hw_devices, 1);
        drop(decoder);
        assert_eq!(backend.live_resources().hw_devices, 0);
    }

    #[test]
    fn resampler_holds_back_until_drained() {
        let (backend, mut demuxer) = open(SyntheticConfig::default().with_video(false));
        let stream = demuxer.info().streams[0].clone();
        let mut decoder = backend.audio_decoder(&demuxer, &stream).unwrap();
        let output = AudioOutputFormat::new(22_050, ChannelLayout::Mono, SampleFormat::S16);
        let mut resampler = backend.resampler(&stream, output).unwrap();
        let mut frame = decoder.new_frame();
        let mut pcm = GrowableRegion::new();

        let mut written = 0;
        for _ in 0..4 {
            let packet = demuxer.read_packet().unwrap().unwrap();
            decoder.send_packet(&packet).unwrap();
            assert_eq!(decoder.receive_frame(&mut frame).unwrap(), ReceiveStatus::Frame);
            let samples = resampler.resample(&frame, &mut pcm).unwrap();
            assert_eq!(pcm.len(), samples * 2);
            written += samples;
        }
        written += resampler.drain(&mut pcm).unwrap();
        // 4096 input samples at half the rate
        assert_eq!(written, 2048);
        assert_eq!(resampler.drain(&mut pcm).unwrap(), 0);
    }
}
