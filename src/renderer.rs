use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

use crate::ascii_frame::AsciiFrame;
use crate::clock::{DropPolicy, PresentationClock};
use crate::frame_buffer::FrameReceiver;
use crate::glyph::GlyphMapper;
use crate::start_gate::StartGate;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderSummary {
    /// Release instant of the start gate; `None` if the start was abandoned.
    pub started_at: Option<Instant>,
    pub frames_rendered: u64,
    /// Frame reads the producer reported as lost.
    pub frames_dropped: u64,
    /// Frames shown more than one interval after their target.
    pub late_frames: u64,
    pub max_lateness: Duration,
    pub interrupted: bool,
}

/// Pops frames in order, converts them and presents each at its clock target.
pub struct Renderer<W: Write> {
    display: W,
    mapper: GlyphMapper,
    drop_policy: DropPolicy,
    stop: Option<Arc<AtomicBool>>,
}

impl<W: Write> Renderer<W> {
    pub fn new(display: W, mapper: GlyphMapper) -> Self {
        Self {
            display,
            mapper,
            drop_policy: DropPolicy::default(),
            stop: None,
        }
    }

    pub fn with_drop_policy(mut self, drop_policy: DropPolicy) -> Self {
        self.drop_policy = drop_policy;
        self
    }

    /// The render loop exits before the next frame once `stop` is set.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn into_display(self) -> W {
        self.display
    }

    /// Waits on the gate, then renders until the buffer is closed and drained.
    ///
    /// Dropping `frames` on return unblocks a producer stuck on a full buffer.
    pub fn run(
        &mut self,
        frames: FrameReceiver,
        fps: f64,
        gate: &StartGate,
    ) -> Result<RenderSummary> {
        let Some(start) = gate.wait() else {
            log::debug!("renderer: start was abandoned before release");
            return Ok(RenderSummary::default());
        };

        let clock = PresentationClock::new(start, fps);
        let interval = clock.frame_interval();
        let mut summary = RenderSummary {
            started_at: Some(start),
            ..RenderSummary::default()
        };
        let mut index = 0_u64;

        while let Some(frame) = frames.pop() {
            if self.stop_requested() {
                summary.interrupted = true;
                break;
            }

            let dropped = frame.dropped_before();
            if dropped > 0 {
                summary.frames_dropped += u64::from(dropped);
                log::debug!("renderer: {dropped} frame(s) lost before frame {index}");
            }
            index = self.drop_policy.next_index(index, dropped);

            let block = self.mapper.convert(&frame);
            drop(frame);

            clock.wait_for(index);
            if self.stop_requested() {
                summary.interrupted = true;
                break;
            }

            let lateness = Instant::now().saturating_duration_since(clock.target(index));
            if lateness > interval {
                summary.late_frames += 1;
            }
            summary.max_lateness = summary.max_lateness.max(lateness);

            self.present(&block)
                .with_context(|| format!("failed to present frame {index}"))?;
            summary.frames_rendered += 1;
            index += 1;
        }

        Ok(summary)
    }

    fn present(&mut self, block: &AsciiFrame) -> std::io::Result<()> {
        queue!(self.display, MoveTo(0, 0), Clear(ClearType::All))?;
        block.write_ansi(&mut self.display)?;
        self.display.flush()
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|stop| stop.load(Ordering::SeqCst))
    }
}
