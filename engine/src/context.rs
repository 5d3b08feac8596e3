/*!
    Player context: the root object a playback client drives.

    One thread drives a context through read, move and decode calls. A
    [`ControlHandle`] obtained from [`PlayerContext::control`] lets a
    second thread pause reading or request a seek; the driving thread
    applies both at the start of its next read or decode call.
*/

use std::path::Path;

use tracing::{debug, error, info, warn};

use tmedia_types::{
    AudioOutputFormat, DecodedAudioBuffer, DecodedVideoBuffer, Demuxer, Error, MediaBackend,
    Metadata, PacketRef, Result, StreamDescriptor, StreamKind,
};

use crate::audio::AudioPipeline;
use crate::config::{PrepareOptions, SeekOptions};
use crate::control::ControlHandle;
use crate::inventory::MediaInfo;
use crate::pipeline::to_decode_result;
use crate::reader::PacketReader;
use crate::result::{DecodePath, DecodeResult, OptResult, PacketTarget, ReadPacketResult};
use crate::video::VideoPipeline;

/**
    Lifecycle of a [`PlayerContext`].
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerState {
    /// Constructed, nothing opened yet.
    Idle,
    /// Prepared and usable.
    Ready,
    /// `prepare` failed; the context stays unusable.
    Failed,
    /// Released; every resource is freed.
    Released,
}

/**
    Everything one prepared container owns. Pipelines are declared before
    the reader so they are dropped first.
*/
pub(crate) struct Session<B: MediaBackend> {
    pub(crate) video: Option<VideoPipeline<B>>,
    pub(crate) audio: Option<AudioPipeline<B>>,
    pub(crate) reader: PacketReader<B::Demuxer>,
    pub(crate) info: MediaInfo,
    pub(crate) audio_output: Option<AudioOutputFormat>,
    pub(crate) seek_generation: u64,
}

/**
    Pull-based decode session over one container.

    ```ignore
    let mut ctx = PlayerContext::new(backend);
    ctx.prepare("movie.mp4", PrepareOptions::new())?;
    loop {
        match ctx.read_packet() {
            ReadPacketResult::Video => {
                ctx.move_packet_ref(PacketTarget::Video)?;
                if ctx.decode_video().has_frame() {
                    ctx.move_decoded_video_frame_to_buffer(&mut frame)?;
                }
            }
            ReadPacketResult::Eof => break,
            _ => ctx.discard_packet(),
        }
    }
    ```

    [`Driver`](crate::Driver) runs the full loop, including end of stream
    draining and backpressure.
*/
pub struct PlayerContext<B: MediaBackend> {
    backend: B,
    state: PlayerState,
    session: Option<Session<B>>,
    control: ControlHandle,
}

impl<B: MediaBackend> PlayerContext<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: PlayerState::Idle,
            session: None,
            control: ControlHandle::new(),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /**
        Handle for pausing and seeking from another thread.
    */
    pub fn control(&self) -> &ControlHandle {
        &self.control
    }

    /**
        Open `path`, select streams and open their pipelines.

        A hardware video decoder is tried first when requested; if it
        cannot be created the software decoder is used instead. Any other
        failure leaves the context permanently in [`PlayerState::Failed`].
    */
    pub fn prepare(&mut self, path: impl AsRef<Path>, options: PrepareOptions) -> OptResult {
        match self.state {
            PlayerState::Idle => {}
            PlayerState::Ready => return Err(Error::AlreadyPrepared),
            PlayerState::Failed => return Err(Error::PrepareFailed),
            PlayerState::Released => return Err(Error::Released),
        }

        let path = path.as_ref();
        match self.open_session(path, &options) {
            Ok(session) => {
                let info = &session.info;
                info!(
                    path = %path.display(),
                    format = info.format_name(),
                    duration_ms = ?info.duration_ms(),
                    video = ?info.video_stream().map(|s| s.codec_name.as_str()),
                    audio = ?info.audio_stream().map(|s| s.codec_name.as_str()),
                    decode_path = ?session.video.as_ref().map(|v| v.path()),
                    "prepared player context"
                );
                self.session = Some(session);
                self.state = PlayerState::Ready;
                Ok(())
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to prepare player context");
                self.state = PlayerState::Failed;
                Err(e)
            }
        }
    }

    fn open_session(&self, path: &Path, options: &PrepareOptions) -> Result<Session<B>> {
        let demuxer = self.backend.open(path)?;
        let info = MediaInfo::new(demuxer.info().clone());
        if info.video_stream().is_none() && info.audio_stream().is_none() {
            return Err(Error::unsupported_format(
                "container has neither a video nor an audio stream",
            ));
        }

        let video = info
            .video_stream()
            .map(|stream| self.open_video(&demuxer, stream, options.request_hardware))
            .transpose()?;

        let audio_output = info
            .audio_stream()
            .and_then(|stream| stream.audio())
            .map(|params| options.audio_output_for(params));
        let audio = match (info.audio_stream(), audio_output) {
            (Some(stream), Some(output)) => Some(AudioPipeline::open(
                &self.backend,
                &demuxer,
                stream,
                output,
            )?),
            _ => None,
        };

        let reader = PacketReader::new(demuxer, &info);
        Ok(Session {
            video,
            audio,
            reader,
            info,
            audio_output,
            seek_generation: 0,
        })
    }

    fn open_video(
        &self,
        demuxer: &B::Demuxer,
        stream: &StreamDescriptor,
        request_hardware: bool,
    ) -> Result<VideoPipeline<B>> {
        if request_hardware {
            match VideoPipeline::open(&self.backend, demuxer, stream, true) {
                Ok(pipeline) => return Ok(pipeline),
                Err(e) => warn!(
                    stream = stream.index,
                    error = %e,
                    "hardware decoder unavailable, falling back to software"
                ),
            }
        }
        VideoPipeline::open(&self.backend, demuxer, stream, false)
    }

    // ── Session access ────────────────────────────────────────────────

    fn session(&self) -> Result<&Session<B>> {
        match self.state {
            PlayerState::Ready => self.session.as_ref().ok_or(Error::NotPrepared),
            PlayerState::Idle => Err(Error::NotPrepared),
            PlayerState::Failed => Err(Error::PrepareFailed),
            PlayerState::Released => Err(Error::Released),
        }
    }

    fn session_mut(&mut self) -> Result<&mut Session<B>> {
        match self.state {
            PlayerState::Ready => self.session.as_mut().ok_or(Error::NotPrepared),
            PlayerState::Idle => Err(Error::NotPrepared),
            PlayerState::Failed => Err(Error::PrepareFailed),
            PlayerState::Released => Err(Error::Released),
        }
    }

    /**
        The session for a read or decode call, with any seek posted through
        the control handle applied first.
    */
    fn driving_session(&mut self) -> Result<&mut Session<B>> {
        let control = self.control.clone();
        let session = self.session_mut()?;
        if let Some(request) = control.take_seek_request() {
            session.seek(request.target_ms, request.options, &control)?;
        }
        Ok(session)
    }

    // ── Accessors ─────────────────────────────────────────────────────

    pub fn media_info(&self) -> Option<&MediaInfo> {
        self.session().ok().map(|s| &s.info)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.media_info().and_then(|info| info.duration_ms())
    }

    pub fn video_stream(&self) -> Option<&StreamDescriptor> {
        self.media_info().and_then(|info| info.video_stream())
    }

    pub fn audio_stream(&self) -> Option<&StreamDescriptor> {
        self.media_info().and_then(|info| info.audio_stream())
    }

    pub fn subtitle_streams(&self) -> impl Iterator<Item = &StreamDescriptor> {
        self.media_info()
            .into_iter()
            .flat_map(|info| info.subtitle_streams())
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.media_info().map(|info| info.metadata())
    }

    /**
        Whether the video stream decodes in hardware. Decided at prepare.
    */
    pub fn video_decode_path(&self) -> Option<DecodePath> {
        self.session().ok()?.video.as_ref().map(|v| v.path())
    }

    pub fn audio_output_format(&self) -> Option<AudioOutputFormat> {
        self.session().ok()?.audio_output
    }

    /**
        Packets pulled from the container so far, including discarded ones.
    */
    pub fn packets_read(&self) -> u64 {
        self.session().map_or(0, |s| s.reader.packets_read())
    }

    /**
        Bumped by every seek and reset. Lets a loop notice that the
        position moved under it.
    */
    pub fn seek_generation(&self) -> u64 {
        self.session().map_or(0, |s| s.seek_generation)
    }

    // ── Packets ───────────────────────────────────────────────────────

    /**
        Read the next packet and classify it.

        While paused this returns [`ReadPacketResult::Paused`] without
        touching the cursor or the packet still held. A pending seek from
        the control handle is applied instead of reading and reported as
        [`ReadPacketResult::Seeked`].
    */
    pub fn read_packet(&mut self) -> ReadPacketResult {
        let control = self.control.clone();
        let session = match self.session_mut() {
            Ok(session) => session,
            Err(e) => return ReadPacketResult::Fail(e),
        };
        if let Some(request) = control.take_seek_request() {
            return match session.seek(request.target_ms, request.options, &control) {
                Ok(_) => ReadPacketResult::Seeked,
                Err(e) => ReadPacketResult::Fail(e),
            };
        }
        if control.is_paused() {
            return ReadPacketResult::Paused;
        }
        session.reader.read()
    }

    /**
        Move the packet read last into the slot of `target` without copying
        its payload.
    */
    pub fn move_packet_ref(&mut self, target: PacketTarget) -> OptResult {
        let session = self.session_mut()?;
        let kind = target.kind();
        let (occupied, stream_index) = match target {
            PacketTarget::Video => session
                .video
                .as_ref()
                .map(|v| (v.slot_occupied(), v.stream_index())),
            PacketTarget::Audio => session
                .audio
                .as_ref()
                .map(|a| (a.slot_occupied(), a.stream_index())),
        }
        .ok_or(Error::NoStream(kind))?;

        if occupied {
            return Err(Error::SlotOccupied(kind));
        }
        let held = session.reader.current().ok_or(Error::NoPacket)?;
        if held.stream_index() != stream_index {
            return Err(Error::invalid_data(format!(
                "packet of stream {} cannot go to the {kind} slot (stream {stream_index})",
                held.stream_index()
            )));
        }

        let packet = session.reader.take().ok_or(Error::NoPacket)?;
        match (target, &mut session.video, &mut session.audio) {
            (PacketTarget::Video, Some(video), _) => video.put_packet(packet),
            (PacketTarget::Audio, _, Some(audio)) => audio.put_packet(packet),
            _ => Err(Error::NoStream(kind)),
        }
    }

    /**
        Drop the packet read last, e.g. a subtitle packet.
    */
    pub fn discard_packet(&mut self) {
        if let Ok(session) = self.session_mut() {
            session.reader.discard();
        }
    }

    pub fn pause_read_packet(&mut self) -> OptResult {
        self.session()?;
        self.control.pause_read_packet();
        Ok(())
    }

    pub fn resume_read_packet(&mut self) -> OptResult {
        self.session()?;
        self.control.resume_read_packet();
        Ok(())
    }

    // ── Video ─────────────────────────────────────────────────────────

    /**
        Feed the video slot to the decoder and try to take a frame out.
        Once the container is exhausted, this drains the decoder instead.
    */
    pub fn decode_video(&mut self) -> DecodeResult {
        let session = match self.driving_session() {
            Ok(session) => session,
            Err(e) => return DecodeResult::Fail(e),
        };
        let input_ended = session.reader.is_eof();
        match session.video.as_mut() {
            Some(video) => to_decode_result(StreamKind::Video, video.decode(input_ended)),
            None => DecodeResult::Fail(Error::NoStream(StreamKind::Video)),
        }
    }

    /**
        Copy the frame from the last successful [`decode_video`] into
        `buffer`, growing its regions only when they are too small.

        [`decode_video`]: PlayerContext::decode_video
    */
    pub fn move_decoded_video_frame_to_buffer(
        &mut self,
        buffer: &mut DecodedVideoBuffer,
    ) -> OptResult {
        self.session_mut()?
            .video
            .as_mut()
            .ok_or(Error::NoStream(StreamKind::Video))?
            .move_to_buffer(buffer)
    }

    /**
        Drop the video decoder's queued packets and reference frames.
    */
    pub fn flush_video_codec_buffer(&mut self) -> OptResult {
        self.session_mut()?
            .video
            .as_mut()
            .ok_or(Error::NoStream(StreamKind::Video))?
            .flush();
        Ok(())
    }

    // ── Audio ─────────────────────────────────────────────────────────

    pub fn decode_audio(&mut self) -> DecodeResult {
        let session = match self.driving_session() {
            Ok(session) => session,
            Err(e) => return DecodeResult::Fail(e),
        };
        let input_ended = session.reader.is_eof();
        match session.audio.as_mut() {
            Some(audio) => to_decode_result(StreamKind::Audio, audio.decode(input_ended)),
            None => DecodeResult::Fail(Error::NoStream(StreamKind::Audio)),
        }
    }

    /**
        Resample the frame from the last successful
        [`decode_audio`](PlayerContext::decode_audio) into `buffer`. Each
        frame can be moved once.
    */
    pub fn move_decoded_audio_frame_to_buffer(
        &mut self,
        buffer: &mut DecodedAudioBuffer,
    ) -> OptResult {
        self.session_mut()?
            .audio
            .as_mut()
            .ok_or(Error::NoStream(StreamKind::Audio))?
            .move_to_buffer(buffer)
    }

    /**
        Drop the audio decoder's queued packets and the resampler state.
    */
    pub fn flush_audio_codec_buffer(&mut self) -> OptResult {
        self.session_mut()?
            .audio
            .as_mut()
            .ok_or(Error::NoStream(StreamKind::Audio))?
            .flush();
        Ok(())
    }

    // ── Transport ─────────────────────────────────────────────────────

    /**
        Seek so that the next decode call on the reference stream delivers
        the first frame at or after `target_ms`. Blocks for the whole
        decode-and-discard pass.
    */
    pub fn seek_to(&mut self, target_ms: i64) -> OptResult {
        self.seek_to_with(target_ms, SeekOptions::default())
    }

    pub fn seek_to_with(&mut self, target_ms: i64, options: SeekOptions) -> OptResult {
        let control = self.control.clone();
        // Supersedes anything the control thread posted
        control.take_seek_request();
        self.session_mut()?.seek(target_ms, options, &control)?;
        Ok(())
    }

    /**
        Rewind to the start of the container and drop all decoder state.
    */
    pub fn reset_decode_progress(&mut self) -> OptResult {
        self.control.take_seek_request();
        self.session_mut()?.reset_progress()
    }

    /**
        Free every resource. Safe to call more than once.
    */
    pub fn release(&mut self) -> OptResult {
        if self.state == PlayerState::Released {
            return Ok(());
        }
        if let Some(session) = self.session.take() {
            debug!(packets = session.reader.packets_read(), "releasing player context");
            drop(session);
        }
        self.control.take_seek_request();
        self.state = PlayerState::Released;
        info!("released player context");
        Ok(())
    }
}

impl<B: MediaBackend> Drop for PlayerContext<B> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use tmedia_types::{LayoutPreference, Plane, VideoLayout};

    use super::*;
    use crate::synthetic::{SyntheticBackend, SyntheticConfig};

    fn prepared(config: SyntheticConfig) -> PlayerContext<SyntheticBackend> {
        let mut ctx = PlayerContext::new(SyntheticBackend::new(config));
        ctx.prepare("synthetic.mp4", PrepareOptions::new()).unwrap();
        ctx
    }

    /// Read until the next video packet, move it and decode until a frame
    /// comes out. Returns the frame's pts in milliseconds.
    fn next_video_frame(
        ctx: &mut PlayerContext<SyntheticBackend>,
        buffer: &mut DecodedVideoBuffer,
    ) -> Option<i64> {
        for _ in 0..10_000 {
            match ctx.decode_video() {
                DecodeResult::Success | DecodeResult::SuccessAndSkipNextPkt => {
                    ctx.move_decoded_video_frame_to_buffer(buffer).unwrap();
                    return Some(buffer.pts_ms());
                }
                DecodeResult::End => return None,
                DecodeResult::FailAndNeedMorePkt => loop {
                    match ctx.read_packet() {
                        ReadPacketResult::Video => {
                            ctx.move_packet_ref(PacketTarget::Video).unwrap();
                            break;
                        }
                        ReadPacketResult::Eof => break,
                        ReadPacketResult::Fail(e) => panic!("read failed: {e}"),
                        _ => ctx.discard_packet(),
                    }
                },
                DecodeResult::Fail(e) => panic!("decode failed: {e}"),
            }
        }
        panic!("decoder never produced a frame");
    }

    #[test]
    fn prepare_reports_streams_and_duration() {
        let ctx = prepared(SyntheticConfig::default().with_subtitles(true));
        assert_eq!(ctx.state(), PlayerState::Ready);
        assert_eq!(ctx.duration_ms(), Some(10_000));

        let video = ctx.video_stream().unwrap();
        assert_eq!(video.video().map(|v| (v.width, v.height)), Some((64, 36)));
        let audio = ctx.audio_stream().unwrap();
        assert_eq!(audio.audio().map(|a| a.sample_rate), Some(44100));
        assert_eq!(ctx.subtitle_streams().count(), 1);
        assert_eq!(ctx.video_decode_path(), Some(DecodePath::Software));
        assert_eq!(
            ctx.audio_output_format(),
            Some(AudioOutputFormat::default())
        );
        assert_eq!(ctx.metadata().and_then(|m| m.get("title")), Some("synthetic"));
    }

    #[test]
    fn lifecycle_errors() {
        let mut ctx = PlayerContext::new(SyntheticBackend::default());
        assert!(matches!(ctx.read_packet(), ReadPacketResult::Fail(Error::NotPrepared)));
        assert!(matches!(ctx.decode_video(), DecodeResult::Fail(Error::NotPrepared)));
        assert!(matches!(ctx.seek_to(0), Err(Error::NotPrepared)));

        ctx.prepare("a.mp4", PrepareOptions::new()).unwrap();
        assert!(matches!(
            ctx.prepare("a.mp4", PrepareOptions::new()),
            Err(Error::AlreadyPrepared)
        ));

        ctx.release().unwrap();
        ctx.release().unwrap();
        assert_eq!(ctx.state(), PlayerState::Released);
        assert!(matches!(ctx.read_packet(), ReadPacketResult::Fail(Error::Released)));
        assert!(matches!(
            ctx.prepare("a.mp4", PrepareOptions::new()),
            Err(Error::Released)
        ));
        assert!(ctx.media_info().is_none());
    }

    #[test]
    fn failed_prepare_is_terminal() {
        let config = SyntheticConfig::default().with_fail_open(true);
        let mut ctx = PlayerContext::new(SyntheticBackend::new(config));
        assert!(ctx.prepare("missing.mp4", PrepareOptions::new()).is_err());
        assert_eq!(ctx.state(), PlayerState::Failed);
        assert!(matches!(
            ctx.prepare("missing.mp4", PrepareOptions::new()),
            Err(Error::PrepareFailed)
        ));
        assert!(matches!(ctx.decode_audio(), DecodeResult::Fail(Error::PrepareFailed)));
    }

    #[test]
    fn container_without_audio_or_video_fails() {
        let config = SyntheticConfig::default()
            .with_video(false)
            .with_audio(false)
            .with_subtitles(true);
        let mut ctx = PlayerContext::new(SyntheticBackend::new(config));
        assert!(matches!(
            ctx.prepare("subs.mkv", PrepareOptions::new()),
            Err(Error::UnsupportedFormat(_))
        ));
        assert_eq!(ctx.state(), PlayerState::Failed);
    }

    #[test]
    fn prepare_release_cycles_leave_no_resources() {
        let backend =
            SyntheticBackend::new(SyntheticConfig::default().with_hardware_available(true));
        for hardware in [false, true, false, true] {
            let mut ctx = PlayerContext::new(backend.clone());
            ctx.prepare("cycle.mp4", PrepareOptions::new().with_hardware(hardware))
                .unwrap();
            let live = backend.live_resources();
            assert_eq!(live.demuxers, 1);
            assert_eq!(live.decoders, 2);
            assert_eq!(live.hw_devices, usize::from(hardware));
            let mut frame = DecodedVideoBuffer::default();
            assert!(next_video_frame(&mut ctx, &mut frame).is_some());
            ctx.release().unwrap();
            assert_eq!(backend.live_resources().total(), 0);
        }
        {
            // Dropped without an explicit release
            let mut ctx = PlayerContext::new(backend.clone());
            ctx.prepare("drop.mp4", PrepareOptions::new()).unwrap();
            assert!(backend.live_resources().total() > 0);
        }
        assert_eq!(backend.live_resources().total(), 0);

        // A failed prepare frees what it opened before failing
        let failing = SyntheticBackend::new(SyntheticConfig::default().with_fail_decoder(true));
        let mut ctx = PlayerContext::new(failing.clone());
        assert!(ctx.prepare("broken.mp4", PrepareOptions::new()).is_err());
        assert_eq!(failing.live_resources().total(), 0);
    }

    #[test]
    fn hardware_falls_back_to_software_once() {
        let mut ctx = PlayerContext::new(SyntheticBackend::default());
        ctx.prepare("a.mp4", PrepareOptions::new().with_hardware(true))
            .unwrap();
        assert_eq!(ctx.video_decode_path(), Some(DecodePath::Software));

        let config = SyntheticConfig::default().with_hardware_available(true);
        let mut ctx = PlayerContext::new(SyntheticBackend::new(config));
        ctx.prepare("a.mp4", PrepareOptions::new().with_hardware(true))
            .unwrap();
        assert_eq!(ctx.video_decode_path(), Some(DecodePath::Hardware));
    }

    #[test]
    fn move_packet_ref_checks_slot_and_stream() {
        let mut ctx = prepared(SyntheticConfig::default());
        assert!(matches!(
            ctx.move_packet_ref(PacketTarget::Video),
            Err(Error::NoPacket)
        ));

        // Container order starts with the first video packet
        assert!(matches!(ctx.read_packet(), ReadPacketResult::Video));
        assert!(matches!(
            ctx.move_packet_ref(PacketTarget::Audio),
            Err(Error::InvalidData(_))
        ));
        ctx.move_packet_ref(PacketTarget::Video).unwrap();
        assert!(matches!(
            ctx.move_packet_ref(PacketTarget::Video),
            Err(Error::SlotOccupied(StreamKind::Video))
        ));
    }

    #[test]
    fn paused_reads_do_not_advance() {
        let mut ctx = prepared(SyntheticConfig::default());
        assert!(matches!(ctx.read_packet(), ReadPacketResult::Video));
        let read = ctx.packets_read();

        ctx.pause_read_packet().unwrap();
        for _ in 0..5 {
            assert!(matches!(ctx.read_packet(), ReadPacketResult::Paused));
        }
        assert_eq!(ctx.packets_read(), read);
        // The held packet survived the paused reads
        ctx.move_packet_ref(PacketTarget::Video).unwrap();

        ctx.resume_read_packet().unwrap();
        assert!(ctx.read_packet().has_packet());
        assert_eq!(ctx.packets_read(), read + 1);
    }

    #[test]
    fn pause_then_seek_yields_the_same_frames() {
        let mut ctx = prepared(SyntheticConfig::default());
        let mut frame = DecodedVideoBuffer::default();

        ctx.seek_to(3000).unwrap();
        let first: Vec<_> = (0..10).map(|_| next_video_frame(&mut ctx, &mut frame)).collect();

        ctx.pause_read_packet().unwrap();
        for _ in 0..3 {
            assert!(matches!(ctx.read_packet(), ReadPacketResult::Paused));
        }
        ctx.seek_to(3000).unwrap();
        // The pause survives the seek
        assert!(matches!(ctx.read_packet(), ReadPacketResult::Paused));
        ctx.resume_read_packet().unwrap();
        let second: Vec<_> = (0..10).map(|_| next_video_frame(&mut ctx, &mut frame)).collect();

        assert_eq!(first, second);
        assert_eq!(first[0], Some(3000));
    }

    #[test]
    fn first_frame_and_native_layout() {
        let mut ctx = prepared(SyntheticConfig::default());
        let mut frame = DecodedVideoBuffer::new(LayoutPreference::Native);
        assert_eq!(next_video_frame(&mut ctx, &mut frame), Some(0));
        assert_eq!(frame.layout(), Some(VideoLayout::Yuv420p));
        assert_eq!(frame.plane(Plane::Y).len(), 64 * 36);
        assert_eq!(frame.plane(Plane::U).len(), 32 * 18);
        assert_eq!(frame.plane(Plane::V).len(), 32 * 18);
        assert!(frame.plane(Plane::Rgba).is_empty());
        assert_eq!(frame.duration_ms(), 33);

        let mut rgba = DecodedVideoBuffer::new(LayoutPreference::Rgba);
        assert_eq!(next_video_frame(&mut ctx, &mut rgba), Some(33));
        assert_eq!(rgba.layout(), Some(VideoLayout::Rgba));
        assert_eq!(rgba.plane(Plane::Rgba).len(), 64 * 36 * 4);
        assert!(rgba.plane(Plane::Y).is_empty());
    }

    #[test]
    fn buffer_reuse_grows_once_per_size() {
        let mut ctx = prepared(SyntheticConfig::default());
        let mut frame = DecodedVideoBuffer::new(LayoutPreference::Native);
        let mut capacity = 0;
        for _ in 0..60 {
            next_video_frame(&mut ctx, &mut frame).unwrap();
            let now = frame.plane(Plane::Y).capacity();
            assert!(now >= capacity);
            capacity = now;
        }
        // Y, U and V each grew exactly once
        assert_eq!(frame.grow_count(), 3);
    }

    #[test]
    fn seek_lands_within_one_frame() {
        let mut ctx = prepared(SyntheticConfig::default());
        let mut frame = DecodedVideoBuffer::default();
        for (target, expected) in [(5000, 5000), (5500, 5500), (0, 0), (9990, 9967), (1234, 1233)]
        {
            ctx.seek_to(target).unwrap();
            let pts = next_video_frame(&mut ctx, &mut frame).unwrap();
            assert_eq!(pts, expected, "seek to {target}");
            assert!(pts >= target - 34 && pts < target + 34);
        }
    }

    #[test]
    fn seek_beyond_duration_delivers_last_frame_then_end() {
        let mut ctx = prepared(SyntheticConfig::default());
        let mut frame = DecodedVideoBuffer::default();
        ctx.seek_to(20_000).unwrap();
        assert_eq!(next_video_frame(&mut ctx, &mut frame), Some(9967));
        assert_eq!(next_video_frame(&mut ctx, &mut frame), None);
        assert!(matches!(ctx.read_packet(), ReadPacketResult::Eof));
    }

    #[test]
    fn seek_to_zero_round_trips() {
        let mut ctx = prepared(SyntheticConfig::default());
        let mut frame = DecodedVideoBuffer::default();
        let fresh: Vec<_> = (0..5).map(|_| next_video_frame(&mut ctx, &mut frame)).collect();

        ctx.seek_to(7000).unwrap();
        next_video_frame(&mut ctx, &mut frame).unwrap();
        ctx.seek_to(0).unwrap();
        let again: Vec<_> = (0..5).map(|_| next_video_frame(&mut ctx, &mut frame)).collect();
        assert_eq!(fresh, again);
    }

    #[test]
    fn min_step_widens_the_landing_window() {
        let mut ctx = prepared(SyntheticConfig::default());
        let mut frame = DecodedVideoBuffer::default();
        ctx.seek_to_with(5500, SeekOptions::new().with_min_step_ms(500))
            .unwrap();
        let pts = next_video_frame(&mut ctx, &mut frame).unwrap();
        assert!(pts > 5000 && pts <= 5500, "landed at {pts}");
    }

    #[test]
    fn audio_only_seek_uses_audio_reference() {
        let mut ctx = prepared(SyntheticConfig::default().with_video(false));
        let mut pcm = DecodedAudioBuffer::new();
        ctx.seek_to(5000).unwrap();
        assert!(ctx.decode_audio().has_frame());
        ctx.move_decoded_audio_frame_to_buffer(&mut pcm).unwrap();
        assert_eq!(pcm.pts_ms(), 4992);
        assert!(pcm.samples() > 0);
    }

    #[test]
    fn seek_keeps_the_audio_frame_playing_at_the_target() {
        let mut ctx = prepared(SyntheticConfig::default());
        ctx.seek_to(5000).unwrap();

        let mut pcm = DecodedAudioBuffer::new();
        assert!(ctx.decode_audio().has_frame());
        ctx.move_decoded_audio_frame_to_buffer(&mut pcm).unwrap();
        // 1024-sample packets: the one starting at 4992 ms covers 5000 ms
        assert_eq!(pcm.pts_ms(), 4992);

        let mut frame = DecodedVideoBuffer::default();
        assert_eq!(next_video_frame(&mut ctx, &mut frame), Some(5000));
    }

    #[test]
    fn positions_are_relative_to_the_stream_start() {
        let mut ctx = prepared(SyntheticConfig::default().with_start_ms(1400));
        assert_eq!(ctx.video_stream().and_then(|s| s.start_time), Some(126_000));
        let mut frame = DecodedVideoBuffer::default();
        assert_eq!(next_video_frame(&mut ctx, &mut frame), Some(0));

        ctx.seek_to(5000).unwrap();
        let mut pcm = DecodedAudioBuffer::new();
        assert!(ctx.decode_audio().has_frame());
        ctx.move_decoded_audio_frame_to_buffer(&mut pcm).unwrap();
        assert_eq!(pcm.pts_ms(), 4992);
        assert_eq!(next_video_frame(&mut ctx, &mut frame), Some(5000));

        ctx.reset_decode_progress().unwrap();
        assert_eq!(next_video_frame(&mut ctx, &mut frame), Some(0));
    }

    #[test]
    fn skipping_video_seeks_on_audio() {
        let mut ctx = prepared(SyntheticConfig::default());
        ctx.seek_to_with(2000, SeekOptions::new().skip_video(true))
            .unwrap();
        let mut pcm = DecodedAudioBuffer::new();
        assert!(ctx.decode_audio().has_frame());
        ctx.move_decoded_audio_frame_to_buffer(&mut pcm).unwrap();
        assert!((1976..=2000).contains(&pcm.pts_ms()), "landed at {}", pcm.pts_ms());
        // Video was only read, never decoded
        assert!(matches!(ctx.decode_video(), DecodeResult::FailAndNeedMorePkt));
    }

    #[test]
    fn control_thread_seek_applies_on_next_call() {
        let mut ctx = prepared(SyntheticConfig::default());
        let control = ctx.control().clone();
        std::thread::spawn(move || control.request_seek(6000))
            .join()
            .unwrap();
        assert!(ctx.control().has_pending_seek());
        assert_eq!(ctx.seek_generation(), 0);

        let mut frame = DecodedVideoBuffer::default();
        assert_eq!(next_video_frame(&mut ctx, &mut frame), Some(6000));
        assert_eq!(ctx.seek_generation(), 1);
        assert!(!ctx.control().has_pending_seek());
    }

    #[test]
    fn pending_seek_replaces_the_next_read() {
        let mut ctx = prepared(SyntheticConfig::default());
        let read_before = ctx.packets_read();
        ctx.control().request_seek(3000);

        assert!(matches!(ctx.read_packet(), ReadPacketResult::Seeked));
        assert_eq!(ctx.seek_generation(), 1);
        assert!(ctx.packets_read() > read_before);

        // The landed frame comes out before anything new is read
        let mut frame = DecodedVideoBuffer::default();
        assert!(ctx.decode_video().has_frame());
        ctx.move_decoded_video_frame_to_buffer(&mut frame).unwrap();
        assert_eq!(frame.pts_ms(), 3000);
    }

    #[test]
    fn reset_rewinds_without_decoding() {
        let mut ctx = prepared(SyntheticConfig::default());
        let mut frame = DecodedVideoBuffer::default();
        for _ in 0..40 {
            next_video_frame(&mut ctx, &mut frame).unwrap();
        }
        ctx.reset_decode_progress().unwrap();
        assert!(matches!(ctx.decode_video(), DecodeResult::FailAndNeedMorePkt));
        assert_eq!(next_video_frame(&mut ctx, &mut frame), Some(0));
    }

    #[test]
    fn flush_drops_queued_frames() {
        let mut ctx = prepared(SyntheticConfig::default());
        let mut frame = DecodedVideoBuffer::default();
        next_video_frame(&mut ctx, &mut frame).unwrap();
        ctx.flush_video_codec_buffer().unwrap();
        ctx.flush_audio_codec_buffer().unwrap();
        assert!(matches!(
            ctx.move_decoded_video_frame_to_buffer(&mut frame),
            Err(Error::NoFrame)
        ));
    }

    #[test]
    fn need_more_packets_is_bounded() {
        let config = SyntheticConfig::default().with_reorder_delay(4);
        let mut ctx = prepared(config);
        let mut starved = 0;
        let mut frames = 0;
        loop {
            match ctx.decode_video() {
                DecodeResult::FailAndNeedMorePkt => {
                    starved += 1;
                    assert!(starved <= 5, "decoder starved for {starved} packets");
                    loop {
                        match ctx.read_packet() {
                            ReadPacketResult::Video => {
                                ctx.move_packet_ref(PacketTarget::Video).unwrap();
                                break;
                            }
                            ReadPacketResult::Eof => break,
                            _ => ctx.discard_packet(),
                        }
                    }
                }
                DecodeResult::Success | DecodeResult::SuccessAndSkipNextPkt => {
                    starved = 0;
                    frames += 1;
                }
                DecodeResult::End => break,
                DecodeResult::Fail(e) => panic!("{e}"),
            }
        }
        assert_eq!(frames, 300);
    }
}
