/*!
    The decode state machine shared by the video and audio pipelines.

    A pipeline owns one decoder, one packet slot and two frames. Decoded
    output always lands in the scratch frame and is then swapped with the
    current one, so the last frame survives the decoder reporting end of
    stream.
*/

use std::mem;

use tracing::warn;

use tmedia_types::{Decoder, Error, ReceiveStatus, Result, SendStatus, StreamKind};

use crate::result::DecodeResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PipelineState {
    /// Accepting packets.
    Opened,
    /// End of stream was signalled; buffered frames are coming out.
    Draining,
    /// Fully drained.
    Ended,
}

/**
    One step of the state machine.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DecodeStep {
    /// A new frame is current. `skip_next` is set while the slot still
    /// holds a packet the decoder refused.
    Frame { skip_next: bool },
    NeedMore,
    End,
}

impl From<DecodeStep> for DecodeResult {
    fn from(step: DecodeStep) -> Self {
        match step {
            DecodeStep::Frame { skip_next: false } => DecodeResult::Success,
            DecodeStep::Frame { skip_next: true } => DecodeResult::SuccessAndSkipNextPkt,
            DecodeStep::NeedMore => DecodeResult::FailAndNeedMorePkt,
            DecodeStep::End => DecodeResult::End,
        }
    }
}

pub(crate) struct DecodeCore<D: Decoder> {
    decoder: D,
    kind: StreamKind,
    state: PipelineState,
    slot: Option<D::Packet>,
    frame: D::Frame,
    scratch: D::Frame,
    has_frame: bool,
    pending_delivery: bool,
}

impl<D: Decoder> DecodeCore<D> {
    pub fn new(decoder: D, kind: StreamKind) -> Self {
        let frame = decoder.new_frame();
        let scratch = decoder.new_frame();
        Self {
            decoder,
            kind,
            state: PipelineState::Opened,
            slot: None,
            frame,
            scratch,
            has_frame: false,
            pending_delivery: false,
        }
    }

    /**
        Move a packet into the slot. Fails if the previous one was not
        consumed yet.
    */
    pub fn put_packet(&mut self, packet: D::Packet) -> Result<()> {
        if self.slot.is_some() {
            return Err(Error::SlotOccupied(self.kind));
        }
        self.slot = Some(packet);
        Ok(())
    }

    pub fn slot_occupied(&self) -> bool {
        self.slot.is_some()
    }

    /**
        The most recently decoded frame.
    */
    pub fn frame(&self) -> Option<&D::Frame> {
        self.has_frame.then_some(&self.frame)
    }

    /**
        Feed the slot (or end of stream once input has ended and the slot
        is empty), then try to take one frame out.
    */
    pub fn decode(&mut self, input_ended: bool) -> Result<DecodeStep> {
        if self.pending_delivery {
            self.pending_delivery = false;
            return Ok(DecodeStep::Frame {
                skip_next: self.slot.is_some(),
            });
        }
        if self.state == PipelineState::Ended {
            return Ok(DecodeStep::End);
        }

        if let Some(packet) = self.slot.take() {
            match self.decoder.send_packet(&packet)? {
                SendStatus::Accepted => {}
                SendStatus::Full => self.slot = Some(packet),
            }
        } else if input_ended && self.state == PipelineState::Opened {
            if self.decoder.send_eof()? == SendStatus::Accepted {
                self.state = PipelineState::Draining;
            }
        }

        let received = match self.decoder.receive_frame(&mut self.scratch) {
            Ok(received) => received,
            Err(e) => {
                // A failed decode never leaves input behind
                self.slot = None;
                return Err(e);
            }
        };
        match received {
            ReceiveStatus::Frame => {
                mem::swap(&mut self.frame, &mut self.scratch);
                self.has_frame = true;
                Ok(DecodeStep::Frame {
                    skip_next: self.slot.is_some(),
                })
            }
            ReceiveStatus::NoFrameYet if self.slot.is_some() => {
                // Refused input and produced nothing; retrying would spin
                self.slot = None;
                Err(Error::codec(format!(
                    "{} decoder refused a packet without producing a frame",
                    self.kind
                )))
            }
            ReceiveStatus::NoFrameYet if self.state == PipelineState::Draining => {
                warn!(kind = %self.kind, "decoder stalled while draining");
                self.state = PipelineState::Ended;
                Ok(DecodeStep::End)
            }
            ReceiveStatus::NoFrameYet => Ok(DecodeStep::NeedMore),
            ReceiveStatus::End => {
                self.state = PipelineState::Ended;
                Ok(DecodeStep::End)
            }
        }
    }

    /**
        Make the next [`DecodeCore::decode`] hand out the current frame
        again without touching the decoder.
    */
    pub fn hold_for_delivery(&mut self) {
        self.pending_delivery = self.has_frame;
    }

    pub fn has_pending_delivery(&self) -> bool {
        self.pending_delivery
    }

    /**
        Drop buffered packets and reference frames, keeping the decoder open.
    */
    pub fn flush(&mut self) {
        self.decoder.flush();
        self.slot = None;
        self.has_frame = false;
        self.pending_delivery = false;
        self.state = PipelineState::Opened;
    }
}

/**
    Turn a step into the host-facing result, logging failures.
*/
pub(crate) fn to_decode_result(kind: StreamKind, step: Result<DecodeStep>) -> DecodeResult {
    match step {
        Ok(step) => step.into(),
        Err(e) => {
            warn!(%kind, error = %e, "decode failed");
            DecodeResult::Fail(e)
        }
    }
}
