use std::thread;
use std::time::{Duration, Instant};

use clap::ValueEnum;

use crate::stream::is_supported_fps;

/// How frames lost to read errors affect the presentation index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DropPolicy {
    /// Lost frames still consume their time slot, keeping video aligned with audio.
    #[default]
    Advance,
    /// Only rendered frames advance the index.
    Hold,
}

impl DropPolicy {
    pub fn next_index(self, index: u64, dropped_before: u32) -> u64 {
        match self {
            Self::Advance => index.saturating_add(u64::from(dropped_before)),
            Self::Hold => index,
        }
    }
}

/// Absolute presentation schedule anchored to a single start instant.
///
/// Frame `n` is due at `start + n / fps`. Every target is derived from the
/// frame index, never from the previous frame's actual presentation time, so
/// lateness on one frame does not shift the following ones.
#[derive(Debug, Clone, Copy)]
pub struct PresentationClock {
    start: Instant,
    fps: f64,
}

impl PresentationClock {
    /// `fps` must pass [`is_supported_fps`]; `StreamParams` guarantees this.
    pub fn new(start: Instant, fps: f64) -> Self {
        debug_assert!(is_supported_fps(fps));
        Self { start, fps }
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// Offset of frame `index` from the start instant.
    pub fn offset(&self, index: u64) -> Duration {
        Duration::from_secs_f64(index as f64 / self.fps)
    }

    pub fn target(&self, index: u64) -> Instant {
        self.start + self.offset(index)
    }

    /// Time left until frame `index` is due; zero when already late.
    pub fn delay_until(&self, index: u64, now: Instant) -> Duration {
        self.target(index).saturating_duration_since(now)
    }

    /// Sleeps until frame `index` is due. Returns immediately when running behind.
    pub fn wait_for(&self, index: u64) {
        let delay = self.delay_until(index, Instant::now());
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}
