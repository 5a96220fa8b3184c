//! Bounded FIFO between the decoder thread and the renderer.
//!
//! Built on `mpsc::sync_channel`: `push` blocks while `capacity` frames are
//! queued, `pop` blocks while the queue is empty, and closing (dropping or
//! calling [`FrameSender::close`]) lets the receiver drain what is left before
//! it observes the end.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use anyhow::{anyhow, Result};
use serde_json::json;

use crate::error_codes::{CodedError, INVALID_BUFFER_CAPACITY};
use crate::stream::Frame;

pub const DEFAULT_CAPACITY: usize = 10;

/// Producer half. Not `Clone`: the buffer has exactly one producer.
pub struct FrameSender {
    sender: SyncSender<Frame>,
}

/// Consumer half.
pub struct FrameReceiver {
    receiver: Receiver<Frame>,
}

/// Returned when the consumer has gone away; carries the frame back.
#[derive(Debug)]
pub struct Disconnected(pub Frame);

#[derive(Debug)]
pub enum TryPushError {
    Full(Frame),
    Disconnected(Frame),
}

pub fn frame_buffer(capacity: usize) -> Result<(FrameSender, FrameReceiver)> {
    if capacity == 0 {
        return Err(anyhow!(CodedError::usage(
            INVALID_BUFFER_CAPACITY,
            "frame buffer capacity must be at least 1",
        )
        .with_details(json!({ "provided": capacity }))));
    }
    let (sender, receiver) = mpsc::sync_channel(capacity);
    Ok((FrameSender { sender }, FrameReceiver { receiver }))
}

impl FrameSender {
    /// Blocks while the buffer is full.
    pub fn push(&self, frame: Frame) -> Result<(), Disconnected> {
        self.sender
            .send(frame)
            .map_err(|mpsc::SendError(frame)| Disconnected(frame))
    }

    pub fn try_push(&self, frame: Frame) -> Result<(), TryPushError> {
        self.sender.try_send(frame).map_err(|error| match error {
            TrySendError::Full(frame) => TryPushError::Full(frame),
            TrySendError::Disconnected(frame) => TryPushError::Disconnected(frame),
        })
    }

    /// No more frames will arrive. Already-queued frames stay poppable.
    pub fn close(self) {
        drop(self);
    }
}

impl FrameReceiver {
    /// Next frame in decode order, or `None` once closed and drained.
    pub fn pop(&self) -> Option<Frame> {
        self.receiver.recv().ok()
    }
}

impl Iterator for FrameReceiver {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.pop()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    fn tagged(tag: u8) -> Frame {
        Frame::from_raw(1, 1, vec![tag, tag, tag]).expect("frame should build")
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(frame_buffer(0).is_err());
    }

    #[test]
    fn never_holds_more_than_capacity() {
        let (sender, receiver) = frame_buffer(3).expect("buffer should build");
        for tag in 0..3 {
            sender.try_push(tagged(tag)).expect("push within capacity");
        }
        assert!(matches!(
            sender.try_push(tagged(9)),
            Err(TryPushError::Full(_))
        ));
        assert_eq!(receiver.pop().map(|frame| frame.pixel(0, 0)[0]), Some(0));
        sender.try_push(tagged(3)).expect("pop should free one slot");
        assert!(matches!(
            sender.try_push(tagged(9)),
            Err(TryPushError::Full(_))
        ));
    }

    #[test]
    fn blocked_producer_resumes_after_pop() {
        let (sender, receiver) = frame_buffer(1).expect("buffer should build");
        sender.push(tagged(0)).expect("first push");

        let producer = thread::spawn(move || {
            let started = Instant::now();
            sender.push(tagged(1)).expect("second push");
            started.elapsed()
        });

        thread::sleep(Duration::from_millis(50));
        assert_eq!(receiver.pop().map(|frame| frame.pixel(0, 0)[0]), Some(0));
        let blocked_for = producer.join().expect("producer should not panic");
        assert!(blocked_for >= Duration::from_millis(40));
        assert_eq!(receiver.pop().map(|frame| frame.pixel(0, 0)[0]), Some(1));
    }

    #[test]
    fn close_drains_pending_frames_in_order() {
        let (sender, receiver) = frame_buffer(4).expect("buffer should build");
        for tag in 0..4 {
            sender.push(tagged(tag)).expect("push");
        }
        sender.close();
        let tags = receiver
            .map(|frame| frame.pixel(0, 0)[0])
            .collect::<Vec<_>>();
        assert_eq!(tags, vec![0, 1, 2, 3]);
    }

    #[test]
    fn order_survives_slow_consumer() {
        let (sender, receiver) = frame_buffer(2).expect("buffer should build");
        let producer = thread::spawn(move || {
            for tag in 0..20 {
                sender.push(tagged(tag)).expect("push");
                if tag % 7 == 0 {
                    thread::sleep(Duration::from_millis(2));
                }
            }
        });
        let mut seen = Vec::new();
        while let Some(frame) = receiver.pop() {
            seen.push(frame.pixel(0, 0)[0]);
            if seen.len() % 3 == 0 {
                thread::sleep(Duration::from_millis(1));
            }
        }
        producer.join().expect("producer should not panic");
        assert_eq!(seen, (0..20).collect::<Vec<u8>>());
    }

    #[test]
    fn push_fails_once_consumer_is_gone() {
        let (sender, receiver) = frame_buffer(1).expect("buffer should build");
        drop(receiver);
        assert!(sender.push(tagged(0)).is_err());
    }
}
