/*!
    Audio decode pipeline.

    Decoded frames keep the codec's sample format until they are moved out;
    resampling to the fixed output format happens at move time. When the
    decoder is drained, whatever the resampler still holds is delivered as
    one last frame before the pipeline reports the end.

    A seek can leave a decoded frame waiting for delivery while the reader
    moves on. Audio packets read in that window queue up behind the slot
    and are decoded in order once the waiting frame is out.
*/

use std::collections::VecDeque;

use tracing::{debug, warn};

use tmedia_types::{
    AudioFrameRef, AudioOutputFormat, DecodedAudioBuffer, Error, FrameTiming, GrowableRegion,
    MediaBackend, Rational, Resampler, Result, StreamDescriptor, StreamKind,
};

use crate::pipeline::{DecodeCore, DecodeStep};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Output {
    /// The current decoded frame.
    Frame,
    /// Samples flushed out of the resampler at end of stream.
    Tail,
}

pub(crate) struct AudioPipeline<B: MediaBackend> {
    core: DecodeCore<B::AudioDecoder>,
    resampler: B::Resampler,
    stream_index: usize,
    time_base: Rational,
    /// Stream timestamp delivered as 0 ms.
    start_ts: i64,
    /// Packets waiting behind the slot.
    backlog: VecDeque<B::Packet>,
    output: Option<Output>,
    tail: GrowableRegion,
    tail_samples: usize,
    drained: bool,
    /// End of the last delivered PCM, in milliseconds.
    next_pts_ms: i64,
}

impl<B: MediaBackend> AudioPipeline<B> {
    pub fn open(
        backend: &B,
        demuxer: &B::Demuxer,
        stream: &StreamDescriptor,
        output: AudioOutputFormat,
    ) -> Result<Self> {
        let decoder = backend.audio_decoder(demuxer, stream)?;
        let resampler = backend.resampler(stream, output)?;

        debug!(
            stream = stream.index,
            codec = %stream.codec_name,
            rate = output.sample_rate,
            channels = output.channels.channels(),
            format = ?output.sample_format,
            "opened audio pipeline"
        );

        Ok(Self {
            core: DecodeCore::new(decoder, StreamKind::Audio),
            resampler,
            stream_index: stream.index,
            time_base: stream.time_base,
            start_ts: stream.start_ts(),
            backlog: VecDeque::new(),
            output: None,
            tail: GrowableRegion::new(),
            tail_samples: 0,
            drained: false,
            next_pts_ms: 0,
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

    pub fn put_packet(&mut self, packet: B::Packet) -> Result<()> {
        self.core.put_packet(packet)
    }

    /**
        Queue a packet behind the slot. Used while a frame is waiting for
        delivery.
    */
    pub fn queue_packet(&mut self, packet: B::Packet) {
        self.backlog.push_back(packet);
    }

    /**
        True while the slot or the backlog still holds input.
    */
    pub fn slot_occupied(&self) -> bool {
        self.core.slot_occupied() || !self.backlog.is_empty()
    }

    pub fn has_pending_delivery(&self) -> bool {
        self.core.has_pending_delivery()
    }

    /**
        Advance the decoder. Once it is drained, the resampler tail comes out
        as one more frame.

        Queued packets are fed before the pipeline asks for more input or
        reports the end.
    */
    pub fn decode(&mut self, input_ended: bool) -> Result<DecodeStep> {
        loop {
            self.refill_slot()?;
            let backlogged = !self.backlog.is_empty();
            let step = match self.core.decode(input_ended && !backlogged) {
                Ok(step) => step,
                Err(e) if backlogged => {
                    warn!(error = %e, "dropped undecodable queued audio");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match step {
                DecodeStep::Frame { skip_next } => {
                    self.output = Some(Output::Frame);
                    return Ok(DecodeStep::Frame {
                        skip_next: skip_next || !self.backlog.is_empty(),
                    });
                }
                DecodeStep::NeedMore if backlogged => {}
                DecodeStep::NeedMore => return Ok(step),
                DecodeStep::End if !self.drained => {
                    self.drained = true;
                    self.tail_samples = self.resampler.drain(&mut self.tail)?;
                    if self.tail_samples > 0 {
                        debug!(samples = self.tail_samples, "flushed resampler tail");
                        self.output = Some(Output::Tail);
                        return Ok(DecodeStep::Frame { skip_next: false });
                    }
                    self.output = None;
                    return Ok(step);
                }
                DecodeStep::End => {
                    self.output = None;
                    return Ok(step);
                }
            }
        }
    }

    fn refill_slot(&mut self) -> Result<()> {
        if self.core.slot_occupied() || self.core.has_pending_delivery() {
            return Ok(());
        }
        match self.backlog.pop_front() {
            Some(packet) => self.core.put_packet(packet),
            None => Ok(()),
        }
    }

    /**
        Decode without producing output, for seeking. The resampler is not
        involved.
    */
    pub fn decode_for_seek(&mut self, input_ended: bool) -> Result<DecodeStep> {
        self.core.decode(input_ended)
    }

    pub fn frame_pts(&self) -> Option<i64> {
        self.core.frame().and_then(|f| f.pts())
    }

    /**
        Duration of the current frame in stream ticks.
    */
    pub fn frame_duration(&self) -> i64 {
        let Some(frame) = self.core.frame() else {
            return 0;
        };
        frame.duration().unwrap_or_else(|| {
            let rate = i32::try_from(frame.sample_rate()).unwrap_or(0);
            Rational::new(1, rate).rescale(frame.samples() as i64, self.time_base)
        })
    }

    pub fn hold_for_delivery(&mut self) {
        self.core.hold_for_delivery();
    }

    /**
        Resample the current output into `buffer`.
    */
    pub fn move_to_buffer(&mut self, buffer: &mut DecodedAudioBuffer) -> Result<()> {
        let format = self.resampler.output_format();
        match self.output {
            Some(Output::Frame) => {
                let frame = self.core.frame().ok_or(Error::NoFrame)?;
                let samples = self.resampler.resample(frame, buffer.pcm_mut())?;
                let pts_ms = frame
                    .pts()
                    .map_or(self.next_pts_ms, |pts| {
                        self.time_base.ts_to_millis(pts - self.start_ts)
                    });
                buffer.set_frame(pts_ms, samples, format);
                self.next_pts_ms = pts_ms + format.samples_to_millis(samples);
            }
            Some(Output::Tail) => {
                buffer.pcm_mut().fill(self.tail.as_slice());
                buffer.set_frame(self.next_pts_ms, self.tail_samples, format);
                self.next_pts_ms += format.samples_to_millis(self.tail_samples);
            }
            None => return Err(Error::NoFrame),
        }
        // Each output is resampled once
        self.output = None;
        Ok(())
    }

    /**
        Drop queued packets, frames and held-back samples.
    */
    pub fn flush(&mut self) {
        self.core.flush();
        self.backlog.clear();
        self.resampler.reset();
        self.output = None;
        self.tail.clear();
        self.tail_samples = 0;
        self.drained = false;
    }
}
