//! Playback session wiring.
//!
//! Three threads: the decoder thread fills the frame buffer as soon as it
//! starts, while the render and audio threads block on a shared start gate.
//! The calling thread releases the gate once the first frame is buffered and
//! then joins all three.

use std::io::{Read, Write};
use std::path::Path;
use std::process::ExitStatus;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};

use crate::audio::{spawn_audio_task, AudioOutcome, AudioPlayer};
use crate::clock::DropPolicy;
use crate::frame_buffer::{frame_buffer, FrameSender, TryPushError, DEFAULT_CAPACITY};
use crate::frame_source::FrameSource;
use crate::glyph::GlyphMapper;
use crate::renderer::{RenderSummary, Renderer};
use crate::start_gate::StartGate;

/// More consecutive failed reads than this is treated as a dead decoder.
pub const MAX_CONSECUTIVE_READ_ERRORS: u32 = 16;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub buffer_capacity: usize,
    pub drop_policy: DropPolicy,
    /// Hold the start gate until the first frame is buffered.
    pub prime_before_start: bool,
    pub stop: Option<Arc<AtomicBool>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_CAPACITY,
            drop_policy: DropPolicy::default(),
            prime_before_start: true,
            stop: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProducerReport {
    pub frames_decoded: u64,
    pub frames_dropped: u64,
    /// Pushes that found the buffer full and had to wait for the renderer.
    pub buffer_full_waits: u64,
    /// The renderer stopped taking frames before the stream ended.
    pub consumer_gone: bool,
    pub decoder_status: Option<ExitStatus>,
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub render: RenderSummary,
    pub producer: ProducerReport,
    pub audio: AudioOutcome,
}

/// Runs one playback to completion.
///
/// Audio failure is reported in [`SessionReport::audio`] and never fails the
/// session. Render failures and an unrecoverable decoder are returned as errors
/// after every thread has been joined.
pub fn run_session<R, W>(
    source: FrameSource<R>,
    display: W,
    mapper: GlyphMapper,
    audio: Box<dyn AudioPlayer>,
    input: &Path,
    options: &SessionOptions,
) -> Result<SessionReport>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let fps = source.params().fps();
    let (sender, receiver) = frame_buffer(options.buffer_capacity)?;
    let (primed_tx, primed_rx) = mpsc::sync_channel::<()>(1);
    let primed_tx = options.prime_before_start.then_some(primed_tx);

    let producer = spawn_producer(source, sender, primed_tx)?;

    let (gate, trigger) = StartGate::arm();

    let mut renderer = Renderer::new(display, mapper).with_drop_policy(options.drop_policy);
    if let Some(stop) = &options.stop {
        renderer = renderer.with_stop_flag(stop.clone());
    }
    let render_gate = gate.clone();
    let render = thread::Builder::new()
        .name("termplay-render".to_owned())
        .spawn(move || renderer.run(receiver, fps, &render_gate))
        .context("failed to spawn render thread")?;

    let audio = spawn_audio_task(audio, input.to_path_buf(), gate)?;

    if options.prime_before_start {
        // Err only means the producer finished without a frame.
        let _ = primed_rx.recv();
    }
    let started_at = trigger.release();
    log::debug!("session: start gate released at {started_at:?}");

    let render = join_thread(render, "render")?;
    let audio = join_thread(audio, "audio")?;
    let producer = join_thread(producer, "decoder")?;

    let render = render?;
    let producer = producer?;
    log::info!(
        "session: rendered {} frame(s), decoded {}, dropped {}",
        render.frames_rendered,
        producer.frames_decoded,
        producer.frames_dropped
    );
    log::info!(
        "session: buffer full {} time(s), late {}, max lateness {:?}, audio {:?}",
        producer.buffer_full_waits,
        render.late_frames,
        render.max_lateness,
        audio
    );

    Ok(SessionReport {
        render,
        producer,
        audio,
    })
}

/// Decoder thread: reads frames and pushes them until end of stream, a dead
/// decoder, or the renderer going away. Always closes the buffer and reaps the
/// decoder process before returning.
pub fn spawn_producer<R>(
    mut source: FrameSource<R>,
    sender: FrameSender,
    mut primed: Option<mpsc::SyncSender<()>>,
) -> Result<JoinHandle<Result<ProducerReport>>>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name("termplay-decoder".to_owned())
        .spawn(move || {
            let mut report = ProducerReport::default();
            let mut pending_drops = 0_u32;
            let mut consecutive_errors = 0_u32;

            let outcome: Result<()> = loop {
                match source.next_frame() {
                    Ok(Some(frame)) => {
                        consecutive_errors = 0;
                        report.frames_decoded += 1;
                        let frame = frame.with_dropped_before(pending_drops);
                        let pushed = match sender.try_push(frame) {
                            Ok(()) => Ok(()),
                            Err(TryPushError::Full(frame)) => {
                                report.buffer_full_waits += 1;
                                sender.push(frame).map_err(|_| ())
                            }
                            Err(TryPushError::Disconnected(_)) => Err(()),
                        };
                        if pushed.is_err() {
                            log::debug!("decoder: renderer stopped taking frames");
                            report.consumer_gone = true;
                            break Ok(());
                        }
                        pending_drops = 0;
                        if let Some(primed) = primed.take() {
                            let _ = primed.send(());
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(error) => {
                        report.frames_dropped += 1;
                        pending_drops = pending_drops.saturating_add(1);
                        consecutive_errors += 1;
                        log::debug!("decoder: skipping frame read: {error}");
                        if consecutive_errors > MAX_CONSECUTIVE_READ_ERRORS {
                            break Err(anyhow!(error).context(format!(
                                "decoder stream failed {consecutive_errors} times in a row"
                            )));
                        }
                    }
                }
            };

            sender.close();
            drop(primed);
            report.decoder_status = source.close()?;

            if let Some(status) = report.decoder_status {
                if !status.success() && !report.consumer_gone {
                    if report.frames_decoded == 0 {
                        return Err(anyhow!(
                            "decoder exited with {status} without producing a frame"
                        ));
                    }
                    log::warn!("decoder exited with {status}");
                }
            }

            outcome.map(|()| report)
        })
        .context("failed to spawn decoder thread")
}

fn join_thread<T>(handle: JoinHandle<T>, name: &str) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow!("{name} thread panicked"))
}
