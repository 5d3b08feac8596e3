/*!
    Prepare and seek options.
*/

use tmedia_types::{AudioOutputFormat, AudioParams, ChannelLayout, SampleFormat};

/**
    What the caller asks for when preparing a context.

    Every target is optional; unset targets fall back to 44100 Hz, signed
    16-bit samples, and the source channel count capped at stereo.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Try a hardware video decoder first.
    pub request_hardware: bool,
    /// Output channel count, clamped to 1..=2.
    pub target_audio_channels: Option<u16>,
    /// Output sample rate in Hz.
    pub target_audio_sample_rate: Option<u32>,
    /// Output bit depth: 8, 16 or 32.
    pub target_audio_bit_depth: Option<u32>,
}

impl PrepareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hardware(mut self, request_hardware: bool) -> Self {
        self.request_hardware = request_hardware;
        self
    }

    pub fn with_audio_channels(mut self, channels: u16) -> Self {
        self.target_audio_channels = Some(channels);
        self
    }

    pub fn with_audio_sample_rate(mut self, sample_rate: u32) -> Self {
        self.target_audio_sample_rate = Some(sample_rate);
        self
    }

    pub fn with_audio_bit_depth(mut self, bits: u32) -> Self {
        self.target_audio_bit_depth = Some(bits);
        self
    }

    /**
        Decide the fixed output format for an audio stream.

        Unsupported bit depths and zero rates fall back to the defaults.
    */
    pub fn audio_output_for(&self, source: &AudioParams) -> AudioOutputFormat {
        let channels = self
            .target_audio_channels
            .unwrap_or(source.channels.min(2))
            .clamp(1, 2);

        let sample_rate = self
            .target_audio_sample_rate
            .filter(|rate| *rate > 0)
            .unwrap_or(AudioOutputFormat::DEFAULT_SAMPLE_RATE);

        let sample_format = self
            .target_audio_bit_depth
            .and_then(SampleFormat::from_bit_depth)
            .unwrap_or(SampleFormat::S16);

        AudioOutputFormat::new(sample_rate, ChannelLayout::from_count(channels), sample_format)
    }
}

/**
    How a seek lands.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeekOptions {
    /// Tolerance in milliseconds; zero means one frame duration.
    pub min_step_ms: i64,
    /// Read audio packets but never decode them while seeking.
    pub skip_audio: bool,
    /// Read video packets but never decode them while seeking.
    pub skip_video: bool,
}

impl SeekOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_step_ms(mut self, min_step_ms: i64) -> Self {
        self.min_step_ms = min_step_ms.max(0);
        self
    }

    pub fn skip_audio(mut self, skip: bool) -> Self {
        self.skip_audio = skip;
        self
    }

    pub fn skip_video(mut self, skip: bool) -> Self {
        self.skip_video = skip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(channels: u16) -> AudioParams {
        AudioParams {
            channels,
            sample_format: Some(SampleFormat::F32),
            sample_rate: 48000,
            bitrate: None,
        }
    }

    #[test]
    fn defaults_follow_the_source_up_to_stereo() {
        let options = PrepareOptions::default();
        let mono = options.audio_output_for(&source(1));
        assert_eq!(mono.channels, ChannelLayout::Mono);
        assert_eq!(mono.sample_rate, 44100);
        assert_eq!(mono.sample_format, SampleFormat::S16);

        let surround = options.audio_output_for(&source(6));
        assert_eq!(surround.channels, ChannelLayout::Stereo);
    }

    #[test]
    fn requested_targets_are_honored_and_clamped() {
        let options = PrepareOptions::new()
            .with_audio_channels(6)
            .with_audio_sample_rate(48000)
            .with_audio_bit_depth(32);
        let output = options.audio_output_for(&source(2));
        assert_eq!(output.channels, ChannelLayout::Stereo);
        assert_eq!(output.sample_rate, 48000);
        assert_eq!(output.sample_format, SampleFormat::S32);

        let output = PrepareOptions::new()
            .with_audio_channels(0)
            .with_audio_bit_depth(24)
            .audio_output_for(&source(2));
        assert_eq!(output.channels, ChannelLayout::Mono);
        assert_eq!(output.sample_format, SampleFormat::S16);
    }

    #[test]
    fn seek_options_builder() {
        let options = SeekOptions::new()
            .with_min_step_ms(-5)
            .skip_audio(true);
        assert_eq!(options.min_step_ms, 0);
        assert!(options.skip_audio);
        assert!(!options.skip_video);
    }
}
