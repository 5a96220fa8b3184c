//! Audio playback adapter. Playback is opaque: the player is released by the
//! start gate and runs to completion on its own thread.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};

use anyhow::{bail, Context, Result};

use crate::start_gate::StartGate;

pub trait AudioPlayer: Send {
    fn label(&self) -> &'static str;
    /// Blocks until the whole track has played.
    fn play(self: Box<Self>, input: &Path) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutcome {
    Completed,
    /// Audio was disabled or the start was abandoned.
    Skipped,
    Failed(String),
}

/// Plays the input's audio track with `ffplay` and no video window.
pub struct FfplayAudio {
    program: OsString,
}

impl FfplayAudio {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
        }
    }
}

impl AudioPlayer for FfplayAudio {
    fn label(&self) -> &'static str {
        "ffplay"
    }

    fn play(self: Box<Self>, input: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .args(player_args(input))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| {
                format!(
                    "failed to start audio player '{}'",
                    Path::new(&self.program).display()
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().last().unwrap_or("").trim();
            if detail.is_empty() {
                bail!("audio player exited with {}", output.status);
            }
            bail!("audio player exited with {}: {detail}", output.status);
        }
        Ok(())
    }
}

/// Stand-in used with `--no-audio`.
pub struct SilentAudio;

impl AudioPlayer for SilentAudio {
    fn label(&self) -> &'static str {
        "silent"
    }

    fn play(self: Box<Self>, _input: &Path) -> Result<()> {
        Ok(())
    }
}

pub fn player_args(input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-nodisp", "-autoexit", "-loglevel", "error", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args
}

/// Starts the audio thread. It blocks on `gate` before touching the player, and
/// reports failure through [`AudioOutcome`] instead of an error.
pub fn spawn_audio_task(
    player: Box<dyn AudioPlayer>,
    input: PathBuf,
    gate: StartGate,
) -> Result<JoinHandle<AudioOutcome>> {
    thread::Builder::new()
        .name("termplay-audio".to_owned())
        .spawn(move || {
            if gate.wait().is_none() {
                return AudioOutcome::Skipped;
            }
            let label = player.label();
            log::debug!("audio: starting {label} for {}", input.display());
            match player.play(&input) {
                Ok(()) => AudioOutcome::Completed,
                Err(error) => {
                    log::error!("audio playback failed ({label}): {error:#}");
                    AudioOutcome::Failed(format!("{error:#}"))
                }
            }
        })
        .context("failed to spawn audio thread")
}
