//! Pull-style adapter over the external decoder's raw RGB24 byte stream.

use std::ffi::{OsStr, OsString};
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use thiserror::Error;

use crate::error_codes::{CodedError, DECODER_SPAWN_FAILED};
use crate::stream::{Frame, StreamParams};

/// A recoverable failure to read one frame. The next call starts a fresh read.
#[derive(Debug, Error)]
pub enum FrameReadError {
    #[error("short frame read: expected {expected} bytes, received {received}")]
    Short { expected: usize, received: usize },
    #[error("decoder stream read failed: {0}")]
    Io(#[from] std::io::Error),
}

pub struct FrameSource<R: Read> {
    reader: Option<R>,
    child: Option<Child>,
    params: StreamParams,
    finished: bool,
}

impl<R: Read> FrameSource<R> {
    /// Wraps an already-open byte stream. No process is owned.
    pub fn from_reader(reader: R, params: StreamParams) -> Self {
        Self {
            reader: Some(reader),
            child: None,
            params,
            finished: false,
        }
    }

    pub fn params(&self) -> StreamParams {
        self.params
    }

    /// Reads exactly one frame.
    ///
    /// `Ok(None)` is a clean end of stream at a frame boundary. A stream that ends
    /// part-way through a frame yields [`FrameReadError::Short`] once, then
    /// `Ok(None)`.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameReadError> {
        if self.finished {
            return Ok(None);
        }
        let Some(reader) = self.reader.as_mut() else {
            self.finished = true;
            return Ok(None);
        };

        let expected = self.params.frame_size();
        let mut buffer = vec![0_u8; expected];
        let mut filled = 0;
        while filled < expected {
            match reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(error) => return Err(FrameReadError::Io(error)),
            }
        }

        if filled == 0 {
            self.finished = true;
            return Ok(None);
        }
        if filled < expected {
            return Err(FrameReadError::Short {
                expected,
                received: filled,
            });
        }

        Frame::from_raw(self.params.width(), self.params.height(), buffer)
            .map(Some)
            .ok_or(FrameReadError::Short {
                expected,
                received: filled,
            })
    }

    /// Drops the pipe, then waits for the owned process (if any) to exit.
    pub fn close(mut self) -> Result<Option<ExitStatus>> {
        drop(self.reader.take());
        match self.child.take() {
            Some(mut child) => {
                let status = child
                    .wait()
                    .context("failed waiting for decoder process to exit")?;
                Ok(Some(status))
            }
            None => Ok(None),
        }
    }
}

impl<R: Read> Drop for FrameSource<R> {
    fn drop(&mut self) {
        drop(self.reader.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl FrameSource<ChildStdout> {
    /// Starts the decoder and takes ownership of its stdout.
    pub fn spawn_ffmpeg(ffmpeg: &OsStr, input: &Path, params: StreamParams) -> Result<Self> {
        let mut child = Command::new(ffmpeg)
            .args(decoder_args(input, params))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|error| {
                anyhow!(CodedError::lifecycle(
                    DECODER_SPAWN_FAILED,
                    format!(
                        "failed to start decoder '{}': {error}",
                        Path::new(ffmpeg).display()
                    ),
                )
                .with_details(json!({ "program": ffmpeg.to_string_lossy() })))
            })?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!("failed to capture decoder stdout"));
            }
        };
        log::debug!(
            "decoder started (pid {}) for {} at {}x{}",
            child.id(),
            input.display(),
            params.width(),
            params.height()
        );

        Ok(Self {
            reader: Some(stdout),
            child: Some(child),
            params,
            finished: false,
        })
    }
}

/// Arguments that make ffmpeg emit headerless RGB24 frames scaled to the stream size.
pub fn decoder_args(input: &Path, params: StreamParams) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-nostdin", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.extend(
        [
            "-f".to_owned(),
            "rawvideo".to_owned(),
            "-pix_fmt".to_owned(),
            "rgb24".to_owned(),
            "-vf".to_owned(),
            format!("scale={}:{}", params.width(), params.height()),
            "-".to_owned(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args
}
