/*!
    Audio resampling.
*/

use ffmpeg_next::{
    ChannelLayout as FFmpegChannelLayout, format::Sample,
    software::resampling::context::Context as ResamplerContext,
    util::frame::audio::Audio as AudioFrameFFmpeg,
};
use tracing::debug;

use tmedia_decode::FfmpegAudioFrame;
use tmedia_source::convert::{channel_layout_to_ffmpeg, sample_format_to_ffmpeg};
use tmedia_types::{AudioOutputFormat, Error, GrowableRegion, Resampler, Result};

/// Headroom added to every output frame for the resampler's filter delay.
const OUTPUT_PADDING: usize = 64;

/**
    Resamples decoded audio to one fixed output format.

    The resampler context is lazily initialized on first use and
    reinitialized if the input format changes.

    Note: Audio resampling is stateful. Frames should be processed
    in order, and `drain()` should be called at end of stream.
*/
pub struct FfmpegResampler {
    output: AudioOutputFormat,
    dst_sample: Sample,
    dst_layout: FFmpegChannelLayout,
    resampler_state: Option<ResamplerState>,
}

struct ResamplerState {
    context: ResamplerContext,
    src_sample_rate: u32,
    src_channels: u16,
    src_format: Sample,
}

impl FfmpegResampler {
    pub fn new(output: AudioOutputFormat) -> Result<Self> {
        Ok(Self {
            output,
            dst_sample: sample_format_to_ffmpeg(output.sample_format)?,
            dst_layout: channel_layout_to_ffmpeg(output.channels),
            resampler_state: None,
        })
    }

    /**
        Initialize or reinitialize the resampler for the given input frame.
    */
    fn state_for(&mut self, frame: &AudioFrameFFmpeg) -> Result<&mut ResamplerState> {
        let (rate, channels, format) = (frame.rate(), frame.channels(), frame.format());

        let needs_init = match &self.resampler_state {
            None => true,
            Some(state) => {
                state.src_sample_rate != rate
                    || state.src_channels != channels
                    || state.src_format != format
            }
        };

        if needs_init {
            let context = ResamplerContext::get(
                format,
                frame.channel_layout(),
                rate,
                self.dst_sample,
                self.dst_layout,
                self.output.sample_rate,
            )
            .map_err(|e| Error::codec(format!("failed to create resampler: {}", e)))?;

            debug!(
                src_rate = rate,
                src_channels = channels,
                dst_rate = self.output.sample_rate,
                "created resampler"
            );

            self.resampler_state = Some(ResamplerState {
                context,
                src_sample_rate: rate,
                src_channels: channels,
                src_format: format,
            });
        }

        self.resampler_state
            .as_mut()
            .ok_or_else(|| Error::codec("resampler not initialized"))
    }

    fn new_output_frame(&self, samples: usize) -> AudioFrameFFmpeg {
        let mut frame = AudioFrameFFmpeg::new(self.dst_sample, samples, self.dst_layout);
        frame.set_rate(self.output.sample_rate);
        frame
    }

    /**
        Copy the packed output plane into `dst`.
    */
    fn copy_out(&self, frame: &AudioFrameFFmpeg, dst: &mut GrowableRegion) -> usize {
        let samples = frame.samples();
        let bytes = samples * self.output.bytes_per_frame();
        dst.fill(&frame.data(0)[..bytes]);
        samples
    }
}

impl Resampler for FfmpegResampler {
    type Frame = FfmpegAudioFrame;

    fn output_format(&self) -> AudioOutputFormat {
        self.output
    }

    fn resample(&mut self, frame: &FfmpegAudioFrame, dst: &mut GrowableRegion) -> Result<usize> {
        let src = frame.as_ffmpeg();
        if src.samples() == 0 {
            dst.clear();
            return Ok(0);
        }

        let out_rate = self.output.sample_rate as u64;
        let state = self.state_for(src)?;
        let delay = state.context.delay().map_or(0, |d| d.output.max(0) as usize);

        // Output may exceed the input length by the samples held back so far
        let estimate = (src.samples() as u64 * out_rate).div_ceil(src.rate().max(1) as u64)
            as usize
            + delay
            + OUTPUT_PADDING;

        let mut dst_frame = self.new_output_frame(estimate);
        let state = self.state_for(src)?;
        state
            .context
            .run(src, &mut dst_frame)
            .map_err(|e| Error::codec(format!("resampling failed: {}", e)))?;

        Ok(self.copy_out(&dst_frame, dst))
    }

    fn drain(&mut self, dst: &mut GrowableRegion) -> Result<usize> {
        let delay = match &self.resampler_state {
            Some(state) => state.context.delay().map_or(0, |d| d.output.max(0) as usize),
            None => 0,
        };
        if delay == 0 {
            dst.clear();
            return Ok(0);
        }

        let mut dst_frame = self.new_output_frame(delay + OUTPUT_PADDING);
        if let Some(state) = self.resampler_state.as_mut() {
            state
                .context
                .flush(&mut dst_frame)
                .map_err(|e| Error::codec(format!("resampler flush failed: {}", e)))?;
        }

        Ok(self.copy_out(&dst_frame, dst))
    }

    /**
        Drop the resampler so the next frame starts from a clean state.
    */
    fn reset(&mut self) {
        self.resampler_state = None;
    }
}

impl std::fmt::Debug for FfmpegResampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegResampler")
            .field("output", &self.output)
            .field("initialized", &self.resampler_state.is_some())
            .finish()
    }
}
