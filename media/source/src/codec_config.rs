/*!
    Opaque codec configuration for passing to decoders.
*/

use ffmpeg_next::codec;

use tmedia_types::Rational;

/**
    Codec parameters of one source stream, plus its time base.

    This keeps ffmpeg-next types out of the engine: the decode crate takes a
    `CodecConfig` from the demuxer and builds a decoder from it.
*/
pub struct CodecConfig {
    parameters: codec::Parameters,
    time_base: Rational,
}

impl CodecConfig {
    pub(crate) fn new(parameters: codec::Parameters, time_base: Rational) -> Self {
        Self {
            parameters,
            time_base,
        }
    }

    pub fn time_base(&self) -> Rational {
        self.time_base
    }

    pub fn codec_id(&self) -> codec::Id {
        self.parameters.id()
    }

    /**
        Consume the config, returning the raw codec parameters.
    */
    pub fn into_parameters(self) -> codec::Parameters {
        self.parameters
    }
}

impl Clone for CodecConfig {
    fn clone(&self) -> Self {
        Self {
            parameters: self.parameters.clone(),
            time_base: self.time_base,
        }
    }
}

impl std::fmt::Debug for CodecConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecConfig")
            .field("codec_id", &self.parameters.id())
            .field("time_base", &self.time_base)
            .finish_non_exhaustive()
    }
}
