use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};

use termplay::audio::{AudioOutcome, AudioPlayer, FfplayAudio, SilentAudio};
use termplay::clock::DropPolicy;
use termplay::config::{PlaybackConfig, PlaybackRequest};
use termplay::error_codes::{envelope_for, find_coded_error};
use termplay::frame_buffer::DEFAULT_CAPACITY;
use termplay::frame_source::FrameSource;
use termplay::glyph::{GlyphMapper, GlyphRamp};
use termplay::logging;
use termplay::session::{run_session, SessionOptions, SessionReport};
use termplay::terminal::TerminalGuard;

const AGENT_MODE_ENV: &str = "TERMPLAY_AGENT_MODE";
const DISPLAY_BUFFER_BYTES: usize = 1 << 18;

fn version() -> &'static str {
    match option_env!("TERMPLAY_GIT_HASH") {
        Some(hash) => Box::leak(format!("{} ({hash})", env!("CARGO_PKG_VERSION")).into_boxed_str()),
        None => env!("CARGO_PKG_VERSION"),
    }
}

#[derive(Debug, Parser)]
#[command(name = "termplay")]
#[command(about = "Play a video file as ASCII art in the terminal, in sync with its audio")]
#[command(version = version())]
#[command(group(ArgGroup::new("input").required(true).args(["video", "video_flag"])))]
struct Cli {
    /// Video file to play.
    video: Option<PathBuf>,
    #[arg(long = "video", value_name = "VIDEO")]
    video_flag: Option<PathBuf>,
    /// Render glyph density only, without colour.
    #[arg(long = "grey", visible_alias = "grayscale")]
    grey: bool,
    /// Override the terminal-derived size, as COLSxROWS.
    #[arg(long)]
    size: Option<String>,
    /// Override the probed frame rate.
    #[arg(long)]
    fps: Option<f64>,
    /// Frames decoded ahead of the renderer.
    #[arg(long = "buffer", default_value_t = DEFAULT_CAPACITY)]
    buffer: usize,
    #[arg(long = "no-audio")]
    no_audio: bool,
    #[arg(long, value_enum, default_value_t = GlyphRamp::Detailed)]
    ramp: GlyphRamp,
    /// Whether frames lost to read errors keep their time slot.
    #[arg(long = "drop-policy", value_enum, default_value_t = DropPolicy::Advance)]
    drop_policy: DropPolicy,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        if let Err(error) = ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)) {
            log::warn!("failed to install interrupt handler: {error}");
        }
    }

    match run_play(cli, stop.clone()) {
        Ok(report) => {
            if let AudioOutcome::Failed(reason) = &report.audio {
                eprintln!("warning: audio playback failed: {reason}");
            }
            if report.render.interrupted || stop.load(Ordering::SeqCst) {
                ExitCode::from(130)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(error) => {
            report_error(&error);
            let code = find_coded_error(&error).map_or(1, |coded| coded.exit_code());
            ExitCode::from(code as u8)
        }
    }
}

fn run_play(cli: Cli, stop: Arc<AtomicBool>) -> Result<SessionReport> {
    let Cli {
        video,
        video_flag,
        grey,
        size,
        fps,
        buffer,
        no_audio,
        ramp,
        drop_policy,
        verbose: _,
    } = cli;
    let input = video
        .or(video_flag)
        .context("a video file path is required")?;

    let config = PlaybackConfig::resolve(PlaybackRequest {
        input,
        grayscale: grey,
        size,
        fps,
        buffer_capacity: buffer,
        audio: !no_audio,
        ramp,
        drop_policy,
    })?;

    let source = FrameSource::spawn_ffmpeg(&config.ffmpeg, &config.input, config.params)?;
    let audio: Box<dyn AudioPlayer> = if config.audio {
        Box::new(FfplayAudio::new(&config.ffplay))
    } else {
        Box::new(SilentAudio)
    };

    let _terminal = TerminalGuard::enter(io::stdout()).context("failed to prepare terminal")?;
    let display = BufWriter::with_capacity(DISPLAY_BUFFER_BYTES, io::stdout());

    run_session(
        source,
        display,
        GlyphMapper::new(config.ramp, config.color_mode),
        audio,
        &config.input,
        &SessionOptions {
            buffer_capacity: config.buffer_capacity,
            drop_policy: config.drop_policy,
            prime_before_start: true,
            stop: Some(stop),
        },
    )
}

fn report_error(error: &anyhow::Error) {
    let agent_mode = std::env::var(AGENT_MODE_ENV).is_ok_and(|value| value == "1");
    if agent_mode {
        match serde_json::to_string(&envelope_for(error)) {
            Ok(json) => eprintln!("{json}"),
            Err(_) => eprintln!("error: {error:#}"),
        }
    } else {
        eprintln!("error: {error:#}");
    }
}
