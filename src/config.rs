//! Resolves command-line options, environment and probes into one validated
//! playback configuration. Every check here runs before any thread starts.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use serde_json::json;

use crate::clock::DropPolicy;
use crate::error_codes::{
    CodedError, INPUT_NOT_A_FILE, INPUT_NOT_FOUND, INVALID_BUFFER_CAPACITY, INVALID_FRAME_RATE,
};
use crate::glyph::{ColorMode, GlyphRamp};
use crate::probe::{frame_size_for_terminal, terminal_size, FrameRateProbe, ValueSource};
use crate::stream::{is_supported_fps, parse_size, StreamParams, MAX_FPS, MIN_FPS};

pub const FFMPEG_ENV: &str = "TERMPLAY_FFMPEG";
pub const FFPLAY_ENV: &str = "TERMPLAY_FFPLAY";

/// Raw options as given on the command line.
#[derive(Debug, Clone)]
pub struct PlaybackRequest {
    pub input: PathBuf,
    pub grayscale: bool,
    pub size: Option<String>,
    pub fps: Option<f64>,
    pub buffer_capacity: usize,
    pub audio: bool,
    pub ramp: GlyphRamp,
    pub drop_policy: DropPolicy,
}

#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    pub input: PathBuf,
    pub params: StreamParams,
    pub size_source: ValueSource,
    pub fps_source: ValueSource,
    pub color_mode: ColorMode,
    pub ramp: GlyphRamp,
    pub buffer_capacity: usize,
    pub audio: bool,
    pub drop_policy: DropPolicy,
    pub ffmpeg: OsString,
    pub ffplay: OsString,
}

impl PlaybackConfig {
    pub fn resolve(request: PlaybackRequest) -> Result<Self> {
        Self::resolve_with(request, &FrameRateProbe::default(), terminal_size)
    }

    pub fn resolve_with(
        request: PlaybackRequest,
        probe: &FrameRateProbe,
        terminal: impl FnOnce() -> ((u16, u16), ValueSource),
    ) -> Result<Self> {
        validate_input(&request.input)?;

        if request.buffer_capacity == 0 {
            return Err(anyhow!(CodedError::usage(
                INVALID_BUFFER_CAPACITY,
                "--buffer must be at least 1",
            )
            .with_details(json!({ "provided": request.buffer_capacity }))));
        }

        let ((width, height), size_source) = match request.size.as_deref() {
            Some(raw) => (parse_size(raw)?, ValueSource::Override),
            None => {
                let ((cols, rows), source) = terminal();
                (frame_size_for_terminal(cols, rows), source)
            }
        };

        let (fps, fps_source) = match request.fps {
            Some(fps) if is_supported_fps(fps) => (fps, ValueSource::Override),
            Some(fps) => {
                return Err(anyhow!(CodedError::usage(
                    INVALID_FRAME_RATE,
                    format!("--fps must be between {MIN_FPS} and {MAX_FPS}, got {fps}"),
                )
                .with_details(json!({ "provided": fps }))));
            }
            None => probe.probe(&request.input),
        };

        let params = StreamParams::new(width, height, fps)?;
        log::info!(
            "stream: {}x{} ({size_source}) at {:.3} fps ({fps_source})",
            params.width(),
            params.height(),
            params.fps()
        );

        Ok(Self {
            input: request.input,
            params,
            size_source,
            fps_source,
            color_mode: if request.grayscale {
                ColorMode::Grayscale
            } else {
                ColorMode::Color
            },
            ramp: request.ramp,
            buffer_capacity: request.buffer_capacity,
            audio: request.audio,
            drop_policy: request.drop_policy,
            ffmpeg: env::var_os(FFMPEG_ENV).unwrap_or_else(|| OsString::from("ffmpeg")),
            ffplay: env::var_os(FFPLAY_ENV).unwrap_or_else(|| OsString::from("ffplay")),
        })
    }
}

fn validate_input(input: &std::path::Path) -> Result<()> {
    if !input.exists() {
        return Err(anyhow!(CodedError::usage(
            INPUT_NOT_FOUND,
            format!("video file '{}' does not exist", input.display()),
        )
        .with_details(json!({ "path": input.display().to_string() }))));
    }
    if !input.is_file() {
        return Err(anyhow!(CodedError::usage(
            INPUT_NOT_A_FILE,
            format!("'{}' is not a file", input.display()),
        )
        .with_details(json!({ "path": input.display().to_string() }))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::error_codes::{find_coded_error, INVALID_SIZE};
    use crate::probe::FALLBACK_FPS;

    fn request(input: PathBuf) -> PlaybackRequest {
        PlaybackRequest {
            input,
            grayscale: false,
            size: None,
            fps: None,
            buffer_capacity: 10,
            audio: true,
            ramp: GlyphRamp::Detailed,
            drop_policy: DropPolicy::Advance,
        }
    }

    fn offline_probe() -> FrameRateProbe {
        FrameRateProbe::with_programs("termplay-missing-mediainfo", "termplay-missing-ffprobe")
    }

    fn code_of(error: &anyhow::Error) -> Option<&'static str> {
        find_coded_error(error).map(|coded| coded.code)
    }

    #[test]
    fn missing_input_is_reported_before_probing() {
        let dir = tempdir().expect("tempdir should create");
        let error = PlaybackConfig::resolve_with(
            request(dir.path().join("absent.mp4")),
            &offline_probe(),
            || panic!("terminal should not be queried"),
        )
        .expect_err("missing input should fail");
        assert_eq!(code_of(&error), Some(INPUT_NOT_FOUND));
    }

    #[test]
    fn directory_input_is_rejected() {
        let dir = tempdir().expect("tempdir should create");
        let error = PlaybackConfig::resolve_with(
            request(dir.path().to_path_buf()),
            &offline_probe(),
            || ((80, 24), ValueSource::Fallback),
        )
        .expect_err("directory should fail");
        assert_eq!(code_of(&error), Some(INPUT_NOT_A_FILE));
    }

    #[test]
    fn terminal_size_and_fallback_rate_are_used_by_default() {
        let dir = tempdir().expect("tempdir should create");
        let input = dir.path().join("clip.mp4");
        fs::write(&input, b"not really a video").expect("input should write");

        let config = PlaybackConfig::resolve_with(request(input), &offline_probe(), || {
            ((120, 40), ValueSource::Probed("terminal"))
        })
        .expect("config should resolve");
        assert_eq!(config.params.width(), 120);
        assert_eq!(config.params.height(), 39);
        assert_eq!(config.params.fps(), FALLBACK_FPS);
        assert_eq!(config.fps_source, ValueSource::Fallback);
        assert_eq!(config.color_mode, ColorMode::Color);
    }

    #[test]
    fn overrides_win_and_are_validated() {
        let dir = tempdir().expect("tempdir should create");
        let input = dir.path().join("clip.mp4");
        fs::write(&input, b"x").expect("input should write");

        let mut overridden = request(input.clone());
        overridden.size = Some("64x20".to_owned());
        overridden.fps = Some(12.5);
        overridden.grayscale = true;
        let config = PlaybackConfig::resolve_with(overridden, &offline_probe(), || {
            panic!("terminal should not be queried")
        })
        .expect("config should resolve");
        assert_eq!((config.params.width(), config.params.height()), (64, 20));
        assert_eq!(config.params.fps(), 12.5);
        assert_eq!(config.size_source, ValueSource::Override);
        assert_eq!(config.color_mode, ColorMode::Grayscale);

        let mut bad_size = request(input.clone());
        bad_size.size = Some("64by20".to_owned());
        let error = PlaybackConfig::resolve_with(bad_size, &offline_probe(), || {
            ((80, 24), ValueSource::Fallback)
        })
        .expect_err("bad size should fail");
        assert_eq!(code_of(&error), Some(INVALID_SIZE));

        for fps in [0.0, 1e-300, 5000.0] {
            let mut bad_fps = request(input.clone());
            bad_fps.fps = Some(fps);
            let error = PlaybackConfig::resolve_with(bad_fps, &offline_probe(), || {
                ((80, 24), ValueSource::Fallback)
            })
            .expect_err("bad fps should fail");
            assert_eq!(code_of(&error), Some(INVALID_FRAME_RATE), "fps {fps}");
        }

        let mut bad_buffer = request(input);
        bad_buffer.buffer_capacity = 0;
        let error = PlaybackConfig::resolve_with(bad_buffer, &offline_probe(), || {
            ((80, 24), ValueSource::Fallback)
        })
        .expect_err("zero buffer should fail");
        assert_eq!(code_of(&error), Some(INVALID_BUFFER_CAPACITY));
    }
}
