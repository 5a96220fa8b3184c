//! termplay: plays a video file as ASCII art in the terminal, in step with its
//! audio track.
//!
//! An external decoder streams raw RGB24 frames into a bounded buffer; a render
//! thread presents them on an absolute clock; a start gate releases the render
//! and audio threads at the same instant.

pub mod ascii_frame;
pub mod audio;
pub mod clock;
pub mod config;
pub mod error_codes;
pub mod frame_buffer;
pub mod frame_source;
pub mod glyph;
pub mod logging;
pub mod probe;
pub mod renderer;
pub mod session;
pub mod start_gate;
pub mod stream;
pub mod terminal;
