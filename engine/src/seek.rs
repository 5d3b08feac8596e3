/*!
    Seek engine.

    A seek is a keyframe-aligned container seek on the reference stream
    followed by decode-and-discard up to the target. The reference stream
    is the main video stream unless it is skipped or absent, then the main
    audio stream. The first reference frame whose span reaches past the
    target is kept and handed out by the next decode call.

    The span of a frame is its duration, or the caller's minimum step when
    one is given. A frame without a timestamp ends the search.

    When video is the reference, audio read on the way is decoded and
    dropped until its first frame reaching the target, which is kept for
    the next audio decode call. Positions are relative to each stream's
    start time.
*/

use tracing::{debug, info, warn};

use tmedia_types::{Error, MediaBackend, Rational, Result};

use crate::config::SeekOptions;
use crate::context::Session;
use crate::control::ControlHandle;
use crate::pipeline::DecodeStep;
use crate::result::ReadPacketResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Reference {
    Video,
    Audio,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Settle {
    /// The current reference frame reaches the target.
    Found,
    NeedMore,
    /// The reference pipeline drained before reaching the target.
    Ended,
}

/// Stream the container seeks on.
#[derive(Clone, Copy, Debug)]
struct SeekStream {
    index: usize,
    time_base: Rational,
    start_ts: i64,
}

/**
    Where a finished seek landed.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SeekOutcome {
    /// Requested target after clamping to the media duration.
    pub target_ms: i64,
    /// Timestamp of the frame the next decode call delivers.
    pub landed_ms: Option<i64>,
    /// Reference frames decoded and thrown away on the way.
    pub discarded: u32,
}

impl<B: MediaBackend> Session<B> {
    pub(crate) fn seek(
        &mut self,
        target_ms: i64,
        options: SeekOptions,
        control: &ControlHandle,
    ) -> Result<SeekOutcome> {
        let reference = self.reference_for(options);
        let SeekStream {
            index: stream_index,
            time_base,
            start_ts,
        } = self.seek_stream(reference)?;

        let duration_ms = self.info.duration_ms().unwrap_or(i64::MAX).max(0);
        let target_ms = target_ms.clamp(0, duration_ms);
        let target_ts = time_base.millis_to_ts(target_ms) + start_ts;
        debug!(target_ms, target_ts, stream = stream_index, ?reference, "seeking");

        // Reading stays paused while the pipelines are inconsistent with
        // the reader. A pause the caller set before the seek is kept.
        let was_paused = control.is_paused();
        control.pause_read_packet();
        let repositioned = self.reposition(stream_index, target_ts);
        if !was_paused {
            control.resume_read_packet();
        }
        repositioned?;
        self.seek_generation += 1;

        let Some(reference) = reference else {
            info!(target_ms, "seek repositioned without decoding");
            return Ok(SeekOutcome {
                target_ms,
                landed_ms: None,
                discarded: 0,
            });
        };

        let tolerance = (options.min_step_ms > 0)
            .then(|| time_base.millis_to_ts(options.min_step_ms).max(1));
        let mut discarded = 0;

        loop {
            match self.reader.read() {
                ReadPacketResult::Video if reference == Reference::Video => {
                    self.move_to_reference(reference)?;
                    match self.settle(reference, target_ts, tolerance, false, &mut discarded) {
                        Settle::Found | Settle::Ended => break,
                        Settle::NeedMore => {}
                    }
                }
                ReadPacketResult::Audio if reference == Reference::Audio => {
                    self.move_to_reference(reference)?;
                    match self.settle(reference, target_ts, tolerance, false, &mut discarded) {
                        Settle::Found | Settle::Ended => break,
                        Settle::NeedMore => {}
                    }
                }
                ReadPacketResult::Audio if !options.skip_audio => self.discard_audio(target_ms)?,
                ReadPacketResult::Eof => {
                    self.settle(reference, target_ts, tolerance, true, &mut discarded);
                    break;
                }
                ReadPacketResult::Fail(e) => return Err(e),
                _ => self.reader.discard(),
            }
        }

        // Found, or drained past the end: either way the current frame is
        // what the caller sees next.
        let landed_ts = match reference {
            Reference::Video => self.video.as_mut().and_then(|video| {
                video.hold_for_delivery();
                video.frame_pts()
            }),
            Reference::Audio => self.audio.as_mut().and_then(|audio| {
                audio.hold_for_delivery();
                audio.frame_pts()
            }),
        };
        let landed_ms = landed_ts.map(|ts| time_base.ts_to_millis(ts - start_ts));

        info!(target_ms, ?landed_ms, discarded, "seek finished");
        Ok(SeekOutcome {
            target_ms,
            landed_ms,
            discarded,
        })
    }

    /**
        Rewind to the start without decoding anything.
    */
    pub(crate) fn reset_progress(&mut self) -> Result<()> {
        let reference = self.reference_for(SeekOptions::default());
        let stream = self.seek_stream(reference)?;
        self.reposition(stream.index, stream.start_ts)?;
        self.seek_generation += 1;
        debug!(stream = stream.index, "decode progress reset");
        Ok(())
    }

    fn reference_for(&self, options: SeekOptions) -> Option<Reference> {
        if self.video.is_some() && !options.skip_video {
            Some(Reference::Video)
        } else if self.audio.is_some() && !options.skip_audio {
            Some(Reference::Audio)
        } else {
            None
        }
    }

    /**
        The stream the container seeks on. Without a reference stream, the
        main video stream still positions the reader.
    */
    fn seek_stream(&self, reference: Option<Reference>) -> Result<SeekStream> {
        let video = self.video.as_ref().map(|v| SeekStream {
            index: v.stream_index(),
            time_base: v.time_base(),
            start_ts: v.start_ts(),
        });
        let audio = self.audio.as_ref().map(|a| SeekStream {
            index: a.stream_index(),
            time_base: a.time_base(),
            start_ts: a.start_ts(),
        });
        match reference {
            Some(Reference::Video) => video,
            Some(Reference::Audio) => audio,
            None => video.or(audio),
        }
        .ok_or(Error::NotPrepared)
    }

    /**
        Move the reader to the keyframe at or before `target_ts` and drop
        everything the pipelines hold.
    */
    fn reposition(&mut self, stream_index: usize, target_ts: i64) -> Result<()> {
        self.reader.seek(stream_index, target_ts)?;
        if let Some(video) = &mut self.video {
            video.flush();
        }
        if let Some(audio) = &mut self.audio {
            audio.flush();
        }
        Ok(())
    }

    fn move_to_reference(&mut self, reference: Reference) -> Result<()> {
        let packet = self.reader.take().ok_or(Error::NoPacket)?;
        match reference {
            Reference::Video => self
                .video
                .as_mut()
                .ok_or(Error::NotPrepared)?
                .put_packet(packet),
            Reference::Audio => self
                .audio
                .as_mut()
                .ok_or(Error::NotPrepared)?
                .put_packet(packet),
        }
    }

    /**
        Decode the reference pipeline until it wants input, drains, or
        produces a frame reaching the target.
    */
    fn settle(
        &mut self,
        reference: Reference,
        target_ts: i64,
        tolerance: Option<i64>,
        input_ended: bool,
        discarded: &mut u32,
    ) -> Settle {
        loop {
            let step = match reference {
                Reference::Video => self.video.as_mut().map(|v| v.decode(input_ended)),
                Reference::Audio => self.audio.as_mut().map(|a| a.decode_for_seek(input_ended)),
            };
            let Some(step) = step else {
                return Settle::Ended;
            };

            match step {
                Ok(DecodeStep::Frame { .. }) => {
                    let (pts, duration) = match reference {
                        Reference::Video => self
                            .video
                            .as_ref()
                            .map(|v| (v.frame_pts(), v.frame_duration())),
                        Reference::Audio => self
                            .audio
                            .as_ref()
                            .map(|a| (a.frame_pts(), a.frame_duration())),
                    }
                    .unwrap_or_default();
                    let span = tolerance.unwrap_or(duration).max(1);
                    match pts {
                        Some(pts) if pts + span <= target_ts => *discarded += 1,
                        _ => return Settle::Found,
                    }
                }
                Ok(DecodeStep::NeedMore) => return Settle::NeedMore,
                Ok(DecodeStep::End) => return Settle::Ended,
                Err(e) => {
                    warn!(error = %e, "decode failed while seeking");
                    return if input_ended {
                        Settle::Ended
                    } else {
                        Settle::NeedMore
                    };
                }
            }
        }
    }

    /**
        Feed a non-reference audio packet to its decoder. Frames ending
        before `target_ms` are thrown away; the first one reaching it is
        kept for delivery and later packets queue up behind it.
    */
    fn discard_audio(&mut self, target_ms: i64) -> Result<()> {
        let Some(audio) = self.audio.as_mut() else {
            self.reader.discard();
            return Ok(());
        };
        let packet = self.reader.take().ok_or(Error::NoPacket)?;
        if audio.has_pending_delivery() || audio.slot_occupied() {
            audio.queue_packet(packet);
            return Ok(());
        }

        let target_ts = audio.time_base().millis_to_ts(target_ms) + audio.start_ts();
        audio.put_packet(packet)?;
        loop {
            match audio.decode_for_seek(false) {
                Ok(DecodeStep::Frame { .. }) => match audio.frame_pts() {
                    Some(pts) if pts + audio.frame_duration().max(1) <= target_ts => {}
                    _ => {
                        debug!(pts = ?audio.frame_pts(), "audio reached the seek target");
                        audio.hold_for_delivery();
                        return Ok(());
                    }
                },
                Ok(DecodeStep::NeedMore | DecodeStep::End) => return Ok(()),
                Err(e) => {
                    debug!(error = %e, "dropped undecodable audio while seeking");
                    return Ok(());
                }
            }
        }
    }
}
