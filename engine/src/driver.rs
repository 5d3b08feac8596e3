/*!
    Pull driver running the read, move and decode loop for a client.

    Each [`Driver::next`] call returns as soon as one buffer was filled.
    When a decoder emits a frame without taking its packet, reading is
    paused and the same pipeline is decoded again on the next call before
    any new packet is read. After a seek, both pipelines are decoded once
    before reading so the frames the seek kept come out first. At the end
    of the container both pipelines are drained, alternating between them,
    until both report their end.
*/

use std::collections::VecDeque;

use tracing::{debug, warn};

use tmedia_types::{DecodedAudioBuffer, DecodedVideoBuffer, MediaBackend, Result};

use crate::context::PlayerContext;
use crate::result::{DecodeResult, PacketTarget, ReadPacketResult};

/**
    What a [`Driver::next`] call produced.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivered {
    /// The video buffer holds a new frame.
    Video,
    /// The audio buffer holds new PCM.
    Audio,
    /// Both pipelines are drained. Further calls keep returning this until
    /// a seek or reset.
    End,
    /// Reading was paused through the control handle.
    Paused,
}

pub struct Driver<'a, B: MediaBackend> {
    ctx: &'a mut PlayerContext<B>,
    eof: bool,
    video_done: bool,
    audio_done: bool,
    /// Pipelines to decode before reading, front first.
    resume: VecDeque<PacketTarget>,
    /// Reading was paused by this driver, not by the client.
    holding: bool,
    generation: u64,
    drain_audio_first: bool,
}

impl<'a, B: MediaBackend> Driver<'a, B> {
    pub fn new(ctx: &'a mut PlayerContext<B>) -> Self {
        let generation = ctx.seek_generation();
        let mut driver = Self {
            ctx,
            eof: false,
            video_done: true,
            audio_done: true,
            resume: VecDeque::new(),
            holding: false,
            generation,
            drain_audio_first: false,
        };
        driver.restart();
        driver
    }

    pub fn context(&mut self) -> &mut PlayerContext<B> {
        self.ctx
    }

    /**
        Run the loop until one buffer is filled, the media ends, or the
        client paused reading.

        Decode failures are logged and skipped. Read failures and lifecycle
        errors are returned.
    */
    pub fn next(
        &mut self,
        video: &mut DecodedVideoBuffer,
        audio: &mut DecodedAudioBuffer,
    ) -> Result<Delivered> {
        loop {
            self.sync_generation()?;

            while let Some(target) = self.resume.pop_front() {
                if let Some(delivered) = self.decode(target, video, audio)? {
                    return Ok(delivered);
                }
            }

            if self.eof {
                return self.drain(video, audio);
            }

            let read = self.ctx.read_packet();
            self.sync_generation()?;
            match read {
                ReadPacketResult::Video => {
                    self.ctx.move_packet_ref(PacketTarget::Video)?;
                    if let Some(delivered) = self.decode(PacketTarget::Video, video, audio)? {
                        return Ok(delivered);
                    }
                }
                ReadPacketResult::Audio => {
                    self.ctx.move_packet_ref(PacketTarget::Audio)?;
                    if let Some(delivered) = self.decode(PacketTarget::Audio, video, audio)? {
                        return Ok(delivered);
                    }
                }
                ReadPacketResult::Subtitle
                | ReadPacketResult::VideoAttachment
                | ReadPacketResult::Unknown => self.ctx.discard_packet(),
                ReadPacketResult::Eof => {
                    debug!(packets = self.ctx.packets_read(), "container exhausted, draining");
                    self.eof = true;
                }
                ReadPacketResult::Seeked => {}
                ReadPacketResult::Paused => return Ok(Delivered::Paused),
                ReadPacketResult::Fail(e) => return Err(e),
            }
        }
    }

    /**
        Pick up a seek or reset that happened since the last call. The
        frame the seek landed on is delivered before anything is read.
    */
    fn sync_generation(&mut self) -> Result<()> {
        let generation = self.ctx.seek_generation();
        if generation == self.generation {
            return Ok(());
        }
        self.generation = generation;
        self.release_reading()?;
        self.restart();
        debug!(generation, "position changed, restarting loop");
        Ok(())
    }

    /**
        Forget end of stream and queue every open pipeline for one decode
        before the next read.
    */
    fn restart(&mut self) {
        self.eof = false;
        self.video_done = self.ctx.video_stream().is_none();
        self.audio_done = self.ctx.audio_stream().is_none();
        self.resume.clear();
        if !self.video_done {
            self.resume.push_back(PacketTarget::Video);
        }
        if !self.audio_done {
            self.resume.push_back(PacketTarget::Audio);
        }
    }

    fn decode(
        &mut self,
        target: PacketTarget,
        video: &mut DecodedVideoBuffer,
        audio: &mut DecodedAudioBuffer,
    ) -> Result<Option<Delivered>> {
        let result = match target {
            PacketTarget::Video => self.ctx.decode_video(),
            PacketTarget::Audio => self.ctx.decode_audio(),
        };
        match result {
            DecodeResult::Success => {
                self.release_reading()?;
                self.deliver(target, video, audio).map(Some)
            }
            DecodeResult::SuccessAndSkipNextPkt => {
                self.hold_reading(target)?;
                self.deliver(target, video, audio).map(Some)
            }
            DecodeResult::FailAndNeedMorePkt => {
                self.release_reading()?;
                Ok(None)
            }
            DecodeResult::End => {
                self.mark_done(target);
                self.release_reading()?;
                Ok(None)
            }
            DecodeResult::Fail(e) => {
                warn!(?target, error = %e, "skipping undecodable packet");
                self.release_reading()?;
                Ok(None)
            }
        }
    }

    fn deliver(
        &mut self,
        target: PacketTarget,
        video: &mut DecodedVideoBuffer,
        audio: &mut DecodedAudioBuffer,
    ) -> Result<Delivered> {
        match target {
            PacketTarget::Video => {
                self.ctx.move_decoded_video_frame_to_buffer(video)?;
                Ok(Delivered::Video)
            }
            PacketTarget::Audio => {
                self.ctx.move_decoded_audio_frame_to_buffer(audio)?;
                Ok(Delivered::Audio)
            }
        }
    }

    fn drain(
        &mut self,
        video: &mut DecodedVideoBuffer,
        audio: &mut DecodedAudioBuffer,
    ) -> Result<Delivered> {
        self.drain_audio_first = !self.drain_audio_first;
        let order = if self.drain_audio_first {
            [PacketTarget::Audio, PacketTarget::Video]
        } else {
            [PacketTarget::Video, PacketTarget::Audio]
        };

        for target in order {
            if self.is_done(target) {
                continue;
            }
            let result = match target {
                PacketTarget::Video => self.ctx.decode_video(),
                PacketTarget::Audio => self.ctx.decode_audio(),
            };
            match result {
                DecodeResult::Success | DecodeResult::SuccessAndSkipNextPkt => {
                    return self.deliver(target, video, audio);
                }
                DecodeResult::Fail(e) => {
                    warn!(?target, error = %e, "drain failed, dropping the rest of the stream");
                    self.mark_done(target);
                }
                DecodeResult::FailAndNeedMorePkt | DecodeResult::End => self.mark_done(target),
            }
        }

        Ok(Delivered::End)
    }

    fn is_done(&self, target: PacketTarget) -> bool {
        match target {
            PacketTarget::Video => self.video_done,
            PacketTarget::Audio => self.audio_done,
        }
    }

    fn mark_done(&mut self, target: PacketTarget) {
        match target {
            PacketTarget::Video => self.video_done = true,
            PacketTarget::Audio => self.audio_done = true,
        }
    }

    fn hold_reading(&mut self, target: PacketTarget) -> Result<()> {
        if !self.holding && !self.ctx.control().is_paused() {
            self.ctx.pause_read_packet()?;
            self.holding = true;
        }
        self.resume.push_front(target);
        Ok(())
    }

    fn release_reading(&mut self) -> Result<()> {
        if self.holding {
            self.ctx.resume_read_packet()?;
            self.holding = false;
        }
        Ok(())
    }
}

impl<B: MediaBackend> Drop for Driver<'_, B> {
    fn drop(&mut self) {
        if self.holding {
            let _ = self.ctx.resume_read_packet();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::config::PrepareOptions;
    use crate::synthetic::{SyntheticBackend, SyntheticConfig};

    #[derive(Debug, Default)]
    struct Playback {
        video_pts: Vec<i64>,
        audio_samples: usize,
        audio_pts: Vec<i64>,
    }

    fn prepared(config: SyntheticConfig) -> PlayerContext<SyntheticBackend> {
        let mut ctx = PlayerContext::new(SyntheticBackend::new(config));
        ctx.prepare("synthetic.mp4", PrepareOptions::new()).unwrap();
        ctx
    }

    fn play_to_end(driver: &mut Driver<'_, SyntheticBackend>) -> Playback {
        let mut video = DecodedVideoBuffer::default();
        let mut audio = DecodedAudioBuffer::new();
        let mut playback = Playback::default();
        for _ in 0..100_000 {
            match driver.next(&mut video, &mut audio).unwrap() {
                Delivered::Video => playback.video_pts.push(video.pts_ms()),
                Delivered::Audio => {
                    playback.audio_samples += audio.samples();
                    playback.audio_pts.push(audio.pts_ms());
                }
                Delivered::End => return playback,
                Delivered::Paused => panic!("unexpected pause"),
            }
        }
        panic!("playback never ended");
    }

    fn assert_increasing(pts: &[i64]) {
        for pair in pts.windows(2) {
            assert!(pair[0] < pair[1], "{} then {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn plays_ten_seconds_end_to_end() {
        let mut ctx = prepared(SyntheticConfig::default());
        let mut driver = Driver::new(&mut ctx);
        let playback = play_to_end(&mut driver);

        assert_eq!(playback.video_pts.len(), 300);
        assert_eq!(playback.video_pts.first(), Some(&0));
        assert_eq!(playback.video_pts.last(), Some(&9967));
        assert_increasing(&playback.video_pts);

        // Resampler tail included
        assert_eq!(playback.audio_samples, 441_000);
        assert_increasing(&playback.audio_pts);

        let mut video = DecodedVideoBuffer::default();
        let mut audio = DecodedAudioBuffer::new();
        assert_eq!(driver.next(&mut video, &mut audio).unwrap(), Delivered::End);
    }

    #[test]
    fn multi_frame_packets_are_drained_before_reading_on() {
        let config = SyntheticConfig::default().with_frames_per_packet(3);
        let mut ctx = prepared(config);
        let playback = play_to_end(&mut Driver::new(&mut ctx));

        assert_eq!(playback.video_pts.len(), 300);
        assert_increasing(&playback.video_pts);
        // The driver never leaves reading paused behind
        assert!(!ctx.control().is_paused());
    }

    #[test]
    fn corrupt_packets_are_skipped() {
        let config = SyntheticConfig::default().with_corrupt_frame(45);
        let mut ctx = prepared(config);
        let playback = play_to_end(&mut Driver::new(&mut ctx));
        assert_eq!(playback.video_pts.len(), 299);
        assert!(!playback.video_pts.contains(&1500));
    }

    #[test]
    fn side_streams_are_read_and_dropped() {
        let config = SyntheticConfig::default()
            .with_subtitles(true)
            .with_attached_picture(true)
            .with_attachment(true);
        let mut ctx = prepared(config);
        let playback = play_to_end(&mut Driver::new(&mut ctx));
        assert_eq!(playback.video_pts.len(), 300);
        assert_eq!(playback.audio_samples, 441_000);
    }

    #[test]
    fn audio_only_playback() {
        let mut ctx = prepared(SyntheticConfig::default().with_video(false));
        let playback = play_to_end(&mut Driver::new(&mut ctx));
        assert!(playback.video_pts.is_empty());
        assert_eq!(playback.audio_samples, 441_000);
    }

    #[test]
    fn control_thread_seek_restarts_delivery() {
        let mut ctx = prepared(SyntheticConfig::default());
        let control = ctx.control().clone();
        let mut driver = Driver::new(&mut ctx);
        let mut video = DecodedVideoBuffer::default();
        let mut audio = DecodedAudioBuffer::new();

        let mut frames = 0;
        while frames < 10 {
            if driver.next(&mut video, &mut audio).unwrap() == Delivered::Video {
                frames += 1;
            }
        }

        thread::spawn(move || control.request_seek(8000)).join().unwrap();
        let landed = loop {
            if driver.next(&mut video, &mut audio).unwrap() == Delivered::Video {
                break video.pts_ms();
            }
        };
        assert_eq!(landed, 8000);

        let rest = play_to_end(&mut driver);
        assert_eq!(rest.video_pts.len(), 59);
        assert_eq!(rest.video_pts.first(), Some(&8033));
    }

    #[test]
    fn audio_resumes_at_the_seek_target_without_gaps() {
        for reorder_delay in [2, 4] {
            let config = SyntheticConfig::default().with_reorder_delay(reorder_delay);
            let mut ctx = prepared(config);
            ctx.seek_to(5000).unwrap();
            let playback = play_to_end(&mut Driver::new(&mut ctx));

            assert_eq!(playback.video_pts.first(), Some(&5000));
            assert_eq!(playback.audio_pts.first(), Some(&4992), "delay {reorder_delay}");
            for pair in playback.audio_pts.windows(2) {
                assert!(pair[1] - pair[0] <= 24, "gap between {} and {}", pair[0], pair[1]);
            }
            // Every sample from the packet covering the target onwards
            assert_eq!(playback.audio_samples, 441_000 - 215 * 1024);
        }
    }

    #[test]
    fn start_offset_is_hidden_from_delivered_positions() {
        let mut ctx = prepared(SyntheticConfig::default().with_start_ms(1400));
        let playback = play_to_end(&mut Driver::new(&mut ctx));
        assert_eq!(playback.video_pts.first(), Some(&0));
        assert_eq!(playback.video_pts.last(), Some(&9967));
        assert_eq!(playback.audio_pts.first(), Some(&0));
        assert_eq!(playback.audio_samples, 441_000);
    }

    #[test]
    fn seek_to_end_then_replay_from_start() {
        let mut ctx = prepared(SyntheticConfig::default());
        ctx.seek_to(20_000).unwrap();
        let tail = play_to_end(&mut Driver::new(&mut ctx));
        assert_eq!(tail.video_pts, [9967]);

        ctx.reset_decode_progress().unwrap();
        let full = play_to_end(&mut Driver::new(&mut ctx));
        assert_eq!(full.video_pts.len(), 300);
    }

    #[test]
    fn client_pause_is_reported() {
        let mut ctx = prepared(SyntheticConfig::default());
        let control = ctx.control().clone();
        let mut driver = Driver::new(&mut ctx);
        let mut video = DecodedVideoBuffer::default();
        let mut audio = DecodedAudioBuffer::new();

        control.pause_read_packet();
        assert_eq!(driver.next(&mut video, &mut audio).unwrap(), Delivered::Paused);
        assert_eq!(driver.context().packets_read(), 0);

        control.resume_read_packet();
        assert_ne!(driver.next(&mut video, &mut audio).unwrap(), Delivered::Paused);
    }
}
