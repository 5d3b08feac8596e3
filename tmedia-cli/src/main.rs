/*!
    tmedia command-line client.

    - `tmedia probe <file>` lists the streams and metadata of a container.
    - `tmedia decode <file>` decodes a file through the engine as fast as
      it goes and reports what was delivered.
    - `tmedia demo` does the same with ten seconds of generated media, no
      FFmpeg libraries needed at runtime.

    Logging goes to stderr and follows `RUST_LOG`, for example
    `RUST_LOG=tmedia_engine=debug tmedia demo --seek 5000`.
*/

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tmedia_engine::synthetic::{SyntheticBackend, SyntheticConfig};
use tmedia_engine::{Delivered, Driver, MediaBackend, PlayerContext, PrepareOptions, SeekOptions};
use tmedia_ffmpeg::FfmpegBackend;
use tmedia_types::{
    ContainerInfo, DecodedAudioBuffer, DecodedVideoBuffer, LayoutPreference, SampleFormat,
    StreamDescriptor, StreamParams, VideoLayout,
};

#[derive(Parser)]
#[command(name = "tmedia", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the streams and metadata of a media file.
    Probe {
        path: PathBuf,

        /// Print the inventory as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Decode a media file and report what came out.
    Decode {
        path: PathBuf,

        #[command(flatten)]
        playback: PlaybackArgs,
    },
    /// Decode ten seconds of generated 30 fps video and 44.1 kHz audio.
    Demo {
        #[command(flatten)]
        playback: PlaybackArgs,

        /// Frames the generated decoder holds back before output.
        #[arg(long, default_value_t = 2)]
        reorder_delay: usize,
    },
}

#[derive(Args)]
struct PlaybackArgs {
    /// Try a hardware video decoder first.
    #[arg(long)]
    hw: bool,

    /// Output channel count (1 or 2).
    #[arg(long)]
    channels: Option<u16>,

    /// Output sample rate in Hz.
    #[arg(long)]
    rate: Option<u32>,

    /// Output bit depth (8, 16 or 32).
    #[arg(long)]
    bits: Option<u32>,

    /// Seek to this position, in milliseconds, before decoding.
    #[arg(long)]
    seek: Option<i64>,

    /// Minimum seek step in milliseconds.
    #[arg(long, default_value_t = 0)]
    min_step: i64,

    /// Stop after this many video frames.
    #[arg(long)]
    frames: Option<u64>,

    /// Deliver video as RGBA instead of the native layout.
    #[arg(long)]
    rgba: bool,
}

impl PlaybackArgs {
    fn prepare_options(&self) -> PrepareOptions {
        let mut options = PrepareOptions::new().with_hardware(self.hw);
        if let Some(channels) = self.channels {
            options = options.with_audio_channels(channels);
        }
        if let Some(rate) = self.rate {
            options = options.with_audio_sample_rate(rate);
        }
        if let Some(bits) = self.bits {
            options = options.with_audio_bit_depth(bits);
        }
        options
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Probe { path, json } => cmd_probe(&path, json),
        Command::Decode { path, playback } => {
            let player = PlayerContext::new(FfmpegBackend::new());
            cmd_play(player, &path, &playback)
        }
        Command::Demo {
            playback,
            reorder_delay,
        } => {
            let config = SyntheticConfig::default()
                .with_reorder_delay(reorder_delay)
                .with_hardware_available(true);
            let player = PlayerContext::new(SyntheticBackend::new(config));
            cmd_play(player, Path::new("synthetic"), &playback)
        }
    }
}

fn cmd_probe(path: &Path, json: bool) -> Result<()> {
    let info = tmedia_ffmpeg::probe(path)
        .with_context(|| format!("failed to probe {}", path.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    print_container(&info);
    Ok(())
}

fn print_container(info: &ContainerInfo) {
    println!("Format:    {}", info.format_name);
    match info.duration_ms {
        Some(ms) => println!("Duration:  {}", format_millis(ms)),
        None => println!("Duration:  unknown"),
    }

    println!();
    println!("Streams ({}):", info.streams.len());
    for stream in &info.streams {
        println!("  {}", describe_stream(stream));
    }

    if !info.metadata.is_empty() {
        println!();
        println!("Metadata:");
        for (key, value) in info.metadata.iter() {
            println!("  {key}: {value}");
        }
    }
}

fn describe_stream(stream: &StreamDescriptor) -> String {
    let mut line = format!("#{} {} {}", stream.index, stream.kind, stream.codec_name);
    match &stream.params {
        StreamParams::Video(video) => {
            line.push_str(&format!(" {}x{}", video.width, video.height));
            if let Some(format) = video.pixel_format {
                line.push_str(&format!(" {format:?}"));
            }
            if let Some(fps) = video.fps() {
                line.push_str(&format!(" {fps:.3} fps"));
            }
            if video.attached_picture {
                line.push_str(" (attached picture)");
            }
        }
        StreamParams::Audio(audio) => {
            line.push_str(&format!(" {} Hz {} ch", audio.sample_rate, audio.channels));
            if let Some(format) = audio.sample_format {
                line.push_str(&format!(" {format:?}"));
            }
        }
        StreamParams::None => {}
    }
    if let Some(language) = stream.metadata.get("language") {
        line.push_str(&format!(" [{language}]"));
    }
    line
}

fn cmd_play<B: MediaBackend>(
    mut player: PlayerContext<B>,
    path: &Path,
    args: &PlaybackArgs,
) -> Result<()> {
    player
        .prepare(path, args.prepare_options())
        .with_context(|| format!("failed to prepare {}", path.display()))?;

    if let Some(info) = player.media_info() {
        print_container(info.container());
    }
    println!();
    if let Some(decode_path) = player.video_decode_path() {
        println!("Video decoding: {decode_path:?}");
    }
    if let Some(format) = player.audio_output_format() {
        println!(
            "Audio output:   {} Hz, {} ch, {:?}",
            format.sample_rate,
            format.channels.channels(),
            format.sample_format
        );
    }

    if let Some(target) = args.seek {
        let options = SeekOptions::new().with_min_step_ms(args.min_step);
        player
            .seek_to_with(target, options)
            .with_context(|| format!("failed to seek to {target} ms"))?;
    }

    let preference = if args.rgba {
        LayoutPreference::Rgba
    } else {
        LayoutPreference::Native
    };
    let mut video = DecodedVideoBuffer::new(preference);
    let mut audio = DecodedAudioBuffer::new();
    let mut stats = PlaybackStats::default();

    info!(path = %path.display(), "decoding");
    let mut driver = Driver::new(&mut player);
    loop {
        match driver.next(&mut video, &mut audio)? {
            Delivered::Video => {
                stats.record_video(&video);
                if args.frames.is_some_and(|limit| stats.video_frames >= limit) {
                    break;
                }
            }
            Delivered::Audio => stats.record_audio(&audio),
            Delivered::End => break,
            Delivered::Paused => bail!("reading was paused with nothing to resume it"),
        }
    }
    drop(driver);

    stats.print(player.packets_read(), &video);
    player.release()?;
    Ok(())
}

#[derive(Default)]
struct PlaybackStats {
    video_frames: u64,
    first_video_ms: Option<i64>,
    last_video_ms: Option<i64>,
    layout: Option<VideoLayout>,
    audio_frames: u64,
    audio_samples: u64,
    first_audio_ms: Option<i64>,
    peak: f64,
}

impl PlaybackStats {
    fn record_video(&mut self, video: &DecodedVideoBuffer) {
        self.video_frames += 1;
        self.first_video_ms.get_or_insert(video.pts_ms());
        self.last_video_ms = Some(video.pts_ms());
        self.layout = video.layout();
    }

    fn record_audio(&mut self, audio: &DecodedAudioBuffer) {
        self.audio_frames += 1;
        self.audio_samples += audio.samples() as u64;
        self.first_audio_ms.get_or_insert(audio.pts_ms());
        if let Some(format) = audio.format() {
            let peak = peak_level(audio.pcm().as_slice(), format.sample_format);
            self.peak = self.peak.max(peak);
        }
    }

    fn print(&self, packets: u64, video: &DecodedVideoBuffer) {
        println!();
        println!("Packets read:   {packets}");
        println!("Video frames:   {}", self.video_frames);
        if let (Some(first), Some(last)) = (self.first_video_ms, self.last_video_ms) {
            println!("  range:        {} .. {}", format_millis(first), format_millis(last));
        }
        if let Some(layout) = self.layout {
            println!(
                "  layout:       {layout:?} {}x{} (buffer grew {} times)",
                video.width(),
                video.height(),
                video.grow_count()
            );
        }
        println!("Audio frames:   {}", self.audio_frames);
        println!("  samples:      {}", self.audio_samples);
        if let Some(first) = self.first_audio_ms {
            println!("  first:        {}", format_millis(first));
        }
        if self.audio_frames > 0 {
            println!("  peak:         {:.1} dBFS", 20.0 * self.peak.max(1e-9).log10());
        }
    }
}

/**
    Largest absolute sample value in interleaved PCM, scaled to 0.0..=1.0.
*/
fn peak_level(pcm: &[u8], format: SampleFormat) -> f64 {
    let normalized: Box<dyn Iterator<Item = f64>> = match format {
        SampleFormat::U8 => Box::new(pcm.iter().map(|&s| (f64::from(s) - 128.0) / 128.0)),
        SampleFormat::S16 => Box::new(
            pcm.chunks_exact(2)
                .map(|c| f64::from(bytemuck::pod_read_unaligned::<i16>(c)) / 32768.0),
        ),
        SampleFormat::S32 => Box::new(
            pcm.chunks_exact(4)
                .map(|c| f64::from(bytemuck::pod_read_unaligned::<i32>(c)) / 2_147_483_648.0),
        ),
        SampleFormat::F32 => Box::new(
            pcm.chunks_exact(4)
                .map(|c| f64::from(bytemuck::pod_read_unaligned::<f32>(c))),
        ),
        SampleFormat::F64 => {
            Box::new(pcm.chunks_exact(8).map(bytemuck::pod_read_unaligned::<f64>))
        }
        _ => return 0.0,
    };
    normalized.map(f64::abs).fold(0.0, f64::max)
}

fn format_millis(ms: i64) -> String {
    let sign = if ms < 0 { "-" } else { "" };
    let ms = ms.unsigned_abs();
    format!(
        "{sign}{}:{:02}.{:03}",
        ms / 60_000,
        (ms / 1000) % 60,
        ms % 1000
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_format_as_minutes_seconds() {
        assert_eq!(format_millis(0), "0:00.000");
        assert_eq!(format_millis(9_967), "0:09.967");
        assert_eq!(format_millis(61_005), "1:01.005");
        assert_eq!(format_millis(-1_500), "-0:01.500");
    }

    #[test]
    fn peak_of_signed_16_bit_pcm() {
        let samples: [i16; 4] = [0, -16384, 8192, 100];
        let pcm: &[u8] = bytemuck::cast_slice(&samples);
        assert_eq!(peak_level(pcm, SampleFormat::S16), 0.5);
    }

    #[test]
    fn peak_of_unsigned_8_bit_pcm() {
        assert_eq!(peak_level(&[128, 192, 128], SampleFormat::U8), 0.5);
    }

    #[test]
    fn cli_parses_demo_arguments() {
        let cli = Cli::try_parse_from(["tmedia", "demo", "--seek", "5000", "--frames", "3"])
            .unwrap();
        let Command::Demo { playback, .. } = cli.command else {
            panic!("expected the demo command");
        };
        assert_eq!(playback.seek, Some(5000));
        assert_eq!(playback.frames, Some(3));
        assert!(!playback.hw);
    }
}
