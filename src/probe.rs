//! Frame-rate and terminal-size discovery. Every query has a fallback so the
//! pipeline can always start.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::stream::is_supported_fps;

pub const FALLBACK_FPS: f64 = 30.0;
pub const FALLBACK_TERMINAL_SIZE: (u16, u16) = (80, 24);

/// Where a stream parameter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    Override,
    Probed(&'static str),
    Fallback,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override => f.write_str("command line"),
            Self::Probed(tool) => write!(f, "{tool}"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

/// Accepts decimal (`29.970`) and rational (`30000/1001`) rates.
/// Values outside the supported range are rejected.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let value = raw.lines().next()?.trim();
    let rate = match value.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => value.parse::<f64>().ok()?,
    };
    is_supported_fps(rate).then_some(rate)
}

pub struct FrameRateProbe {
    mediainfo: OsString,
    ffprobe: OsString,
}

impl Default for FrameRateProbe {
    fn default() -> Self {
        Self {
            mediainfo: OsString::from("mediainfo"),
            ffprobe: OsString::from("ffprobe"),
        }
    }
}

impl FrameRateProbe {
    pub fn with_programs(mediainfo: impl AsRef<OsStr>, ffprobe: impl AsRef<OsStr>) -> Self {
        Self {
            mediainfo: mediainfo.as_ref().to_owned(),
            ffprobe: ffprobe.as_ref().to_owned(),
        }
    }

    /// mediainfo, then ffprobe, then [`FALLBACK_FPS`].
    pub fn probe(&self, input: &Path) -> (f64, ValueSource) {
        let mut mediainfo_args = vec![OsString::from("--Inform=Video;%FrameRate%")];
        mediainfo_args.push(input.as_os_str().to_owned());
        if let Some(rate) =
            query(&self.mediainfo, &mediainfo_args).and_then(|out| parse_frame_rate(&out))
        {
            return (rate, ValueSource::Probed("mediainfo"));
        }

        let mut ffprobe_args = [
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=r_frame_rate",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ]
        .into_iter()
        .map(OsString::from)
        .collect::<Vec<_>>();
        ffprobe_args.push(input.as_os_str().to_owned());
        if let Some(rate) =
            query(&self.ffprobe, &ffprobe_args).and_then(|out| parse_frame_rate(&out))
        {
            return (rate, ValueSource::Probed("ffprobe"));
        }

        log::info!(
            "could not determine frame rate of {}; using {FALLBACK_FPS}",
            input.display()
        );
        (FALLBACK_FPS, ValueSource::Fallback)
    }
}

fn query(program: &OsStr, args: &[OsString]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|error| {
            log::debug!(
                "probe '{}' unavailable: {error}",
                Path::new(program).display()
            );
        })
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

/// Terminal `(columns, rows)`, or [`FALLBACK_TERMINAL_SIZE`].
pub fn terminal_size() -> ((u16, u16), ValueSource) {
    match crossterm::terminal::size() {
        Ok((cols, rows)) if cols > 0 && rows > 0 => ((cols, rows), ValueSource::Probed("terminal")),
        Ok(_) => (FALLBACK_TERMINAL_SIZE, ValueSource::Fallback),
        Err(error) => {
            log::debug!("terminal size unavailable: {error}");
            (FALLBACK_TERMINAL_SIZE, ValueSource::Fallback)
        }
    }
}

/// Frame size for a terminal: one row is left free so a full block never scrolls.
pub fn frame_size_for_terminal(cols: u16, rows: u16) -> (u32, u32) {
    (
        u32::from(cols.max(1)),
        u32::from(rows.saturating_sub(1).max(1)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_and_rational_rates() {
        assert_eq!(parse_frame_rate("25.000\n"), Some(25.0));
        let ntsc = parse_frame_rate("30000/1001").expect("rational should parse");
        assert!((ntsc - 29.970_03).abs() < 1e-4);
    }

    #[test]
    fn rejects_unusable_rates() {
        for raw in [
            "", "abc", "0", "-24", "0/0", "24/0", "inf", "NaN", "1/1e300", "1e-300", "90000",
        ] {
            assert_eq!(parse_frame_rate(raw), None, "{raw:?} should be rejected");
        }
    }

    #[test]
    fn missing_tools_fall_back_to_thirty() {
        let probe = FrameRateProbe::with_programs(
            "termplay-missing-mediainfo",
            "termplay-missing-ffprobe",
        );
        let (fps, source) = probe.probe(Path::new("clip.mp4"));
        assert_eq!(fps, FALLBACK_FPS);
        assert_eq!(source, ValueSource::Fallback);
    }

    #[test]
    fn terminal_frame_size_reserves_a_row() {
        assert_eq!(frame_size_for_terminal(80, 24), (80, 23));
        assert_eq!(frame_size_for_terminal(10, 1), (10, 1));
        assert_eq!(frame_size_for_terminal(0, 0), (1, 1));
    }
}
