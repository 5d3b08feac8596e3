/*!
    Video frame conversion to RGBA.
*/

use ffmpeg_next::{
    format::Pixel,
    software::scaling::{context::Context as ScalerContext, flag::Flags as ScalerFlags},
    util::frame::video::Video as VideoFrameFFmpeg,
};
use tracing::debug;

use tmedia_decode::FfmpegVideoFrame;
use tmedia_types::{Error, GrowableRegion, Result, RgbaConverter};

/**
    Converts decoded frames to tightly packed RGBA at their own size.

    The scaler context and its output frame are created lazily and rebuilt
    only when the input geometry or format changes.
*/
pub struct FfmpegRgbaConverter {
    scaler_state: Option<ScalerState>,
}

struct ScalerState {
    context: ScalerContext,
    output: VideoFrameFFmpeg,
    src_width: u32,
    src_height: u32,
    src_format: Pixel,
}

impl FfmpegRgbaConverter {
    pub fn new() -> Self {
        Self { scaler_state: None }
    }

    fn scaler_for(&mut self, frame: &VideoFrameFFmpeg) -> Result<&mut ScalerState> {
        let (width, height, format) = (frame.width(), frame.height(), frame.format());

        let needs_init = match &self.scaler_state {
            None => true,
            Some(state) => {
                state.src_width != width || state.src_height != height || state.src_format != format
            }
        };

        if needs_init {
            let context = ScalerContext::get(
                format,
                width,
                height,
                Pixel::RGBA,
                width,
                height,
                ScalerFlags::BILINEAR,
            )
            .map_err(|e| Error::codec(format!("failed to create scaler: {}", e)))?;

            debug!(?format, width, height, "created rgba scaler");

            self.scaler_state = Some(ScalerState {
                context,
                output: VideoFrameFFmpeg::new(Pixel::RGBA, width, height),
                src_width: width,
                src_height: height,
                src_format: format,
            });
        }

        self.scaler_state
            .as_mut()
            .ok_or_else(|| Error::codec("scaler not initialized"))
    }
}

impl Default for FfmpegRgbaConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl RgbaConverter for FfmpegRgbaConverter {
    type Frame = FfmpegVideoFrame;

    fn convert(&mut self, frame: &FfmpegVideoFrame, dst: &mut GrowableRegion) -> Result<()> {
        let src = frame.as_ffmpeg();
        if src.width() == 0 || src.height() == 0 {
            return Err(Error::invalid_data("input frame has zero dimensions"));
        }

        let state = self.scaler_for(src)?;
        state
            .context
            .run(src, &mut state.output)
            .map_err(|e| Error::codec(format!("scaling failed: {}", e)))?;

        // Drop the row padding swscale leaves in the output
        let row_bytes = state.output.width() as usize * 4;
        let height = state.output.height() as usize;
        let stride = state.output.stride(0);
        let data = state.output.data(0);

        let out = dst.fill_in_place(row_bytes * height);
        for (y, row) in out.chunks_exact_mut(row_bytes).enumerate() {
            let start = y * stride;
            row.copy_from_slice(&data[start..start + row_bytes]);
        }

        Ok(())
    }
}

impl std::fmt::Debug for FfmpegRgbaConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegRgbaConverter")
            .field("initialized", &self.scaler_state.is_some())
            .finish()
    }
}
