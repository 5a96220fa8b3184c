//! Stream parameters and the decoded frame type shared by every pipeline stage.

use anyhow::{anyhow, Result};
use image::RgbImage;
use serde_json::json;

use crate::error_codes::{CodedError, INVALID_FRAME_RATE, INVALID_SIZE};

/// Bytes per RGB24 pixel.
pub const RGB_CHANNELS: usize = 3;

/// Accepted frame-rate range. Outside it a frame interval or target offset
/// would not fit a `Duration`.
pub const MIN_FPS: f64 = 0.001;
pub const MAX_FPS: f64 = 1000.0;

/// Dimensions and nominal rate agreed on before the decoder starts.
///
/// Never changes for the lifetime of a run. Construct through [`StreamParams::new`]
/// so that a zero dimension or a bogus frame rate is reported as a configuration
/// error instead of surfacing mid-stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamParams {
    width: u32,
    height: u32,
    fps: f64,
}

impl StreamParams {
    pub fn new(width: u32, height: u32, fps: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!(CodedError::usage(
                INVALID_SIZE,
                format!("stream size {width}x{height} must be non-zero"),
            )
            .with_details(json!({ "width": width, "height": height }))));
        }
        if !is_supported_fps(fps) {
            return Err(anyhow!(CodedError::usage(
                INVALID_FRAME_RATE,
                format!("frame rate {fps} must be between {MIN_FPS} and {MAX_FPS}"),
            )
            .with_details(json!({ "min": MIN_FPS, "max": MAX_FPS }))));
        }
        (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(RGB_CHANNELS))
            .ok_or_else(|| {
                anyhow!(CodedError::usage(
                    INVALID_SIZE,
                    format!("stream size {width}x{height} overflows the frame size"),
                ))
            })?;
        Ok(Self { width, height, fps })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Size of one raw RGB24 frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * RGB_CHANNELS
    }
}

/// Finite and within [`MIN_FPS`, `MAX_FPS`].
pub fn is_supported_fps(fps: f64) -> bool {
    fps.is_finite() && (MIN_FPS..=MAX_FPS).contains(&fps)
}

/// One decoded RGB24 image.
///
/// `dropped_before` is the number of frame reads that failed between the
/// previous delivered frame and this one.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    dropped_before: u32,
}

impl Frame {
    /// Wraps a raw row-major RGB24 buffer. Returns `None` when the buffer length
    /// does not match `width * height * 3`.
    pub fn from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Option<Self> {
        if bytes.len() != width as usize * height as usize * RGB_CHANNELS {
            return None;
        }
        RgbImage::from_raw(width, height, bytes).map(|image| Self {
            image,
            dropped_before: 0,
        })
    }

    pub fn with_dropped_before(mut self, dropped: u32) -> Self {
        self.dropped_before = dropped;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dropped_before(&self) -> u32 {
        self.dropped_before
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// Parses `COLSxROWS` (also `COLSXROWS`).
pub fn parse_size(raw: &str) -> Result<(u32, u32)> {
    let invalid = |reason: &str| {
        anyhow!(CodedError::usage(
            INVALID_SIZE,
            format!("invalid --size '{raw}': {reason}"),
        )
        .with_details(json!({ "provided": raw, "expected": "COLSxROWS" })))
    };

    let value = raw.trim();
    let (cols_raw, rows_raw) = value
        .split_once('x')
        .or_else(|| value.split_once('X'))
        .ok_or_else(|| invalid("expected COLSxROWS"))?;
    let cols = cols_raw
        .trim()
        .parse::<u32>()
        .map_err(|_| invalid("cols must be an integer"))?;
    let rows = rows_raw
        .trim()
        .parse::<u32>()
        .map_err(|_| invalid("rows must be an integer"))?;
    if cols == 0 || rows == 0 {
        return Err(invalid("cols/rows must be > 0"));
    }
    Ok((cols, rows))
}
