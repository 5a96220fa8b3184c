//! Pixel to glyph mapping.
//!
//! Pure functions: a pixel's perceptual luminance picks a glyph from a
//! dark-to-light ramp. In colour mode the pixel's RGB travels with the glyph.

use clap::ValueEnum;

use crate::ascii_frame::{AsciiCell, AsciiFrame};
use crate::stream::Frame;

const GAMMA: f32 = 2.2;

/// Ordered from visually darkest (index 0) to lightest.
const DETAILED_RAMP: &str =
    " .`-^\",:;Il!i~+_-?][}{1)(|\\/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";
const STANDARD_RAMP: &str = " .:-=+*#%@";
const BLOCK_RAMP: &str = " ░▒▓█";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum GlyphRamp {
    Standard,
    #[default]
    Detailed,
    Blocks,
}

impl GlyphRamp {
    pub fn glyphs(self) -> Vec<char> {
        match self {
            Self::Standard => STANDARD_RAMP,
            Self::Detailed => DETAILED_RAMP,
            Self::Blocks => BLOCK_RAMP,
        }
        .chars()
        .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    #[default]
    Color,
    Grayscale,
}

/// Gamma-aware luminance in `[0, 1]`.
///
/// Channels are linearised with gamma 2.2, weighted 0.299/0.587/0.114 and the
/// sum is re-encoded with the inverse gamma.
pub fn perceptual_luminance([r, g, b]: [u8; 3]) -> f32 {
    let linear = |channel: u8| (f32::from(channel) / 255.0).powf(GAMMA);
    let sum = 0.299 * linear(r) + 0.587 * linear(g) + 0.114 * linear(b);
    sum.clamp(0.0, 1.0).powf(1.0 / GAMMA)
}

/// `clamp(floor(luma * ramp_len), 0, ramp_len - 1)`; 0 is the darkest glyph.
pub fn luma_to_glyph_index(luma: f32, ramp_len: usize) -> usize {
    if ramp_len == 0 {
        return 0;
    }
    let index = (luma.clamp(0.0, 1.0) * ramp_len as f32).floor() as usize;
    index.min(ramp_len - 1)
}

#[derive(Debug, Clone)]
pub struct GlyphMapper {
    ramp: Vec<char>,
    mode: ColorMode,
}

impl GlyphMapper {
    pub fn new(ramp: GlyphRamp, mode: ColorMode) -> Self {
        Self {
            ramp: ramp.glyphs(),
            mode,
        }
    }

    pub fn map_pixel(&self, rgb: [u8; 3]) -> AsciiCell {
        let index = luma_to_glyph_index(perceptual_luminance(rgb), self.ramp.len());
        let glyph = self.ramp.get(index).copied().unwrap_or(' ');
        AsciiCell {
            glyph,
            color: match self.mode {
                ColorMode::Color => Some(rgb),
                ColorMode::Grayscale => None,
            },
        }
    }

    pub fn convert(&self, frame: &Frame) -> AsciiFrame {
        let cells = frame
            .image()
            .pixels()
            .map(|pixel| self.map_pixel(pixel.0))
            .collect();
        AsciiFrame::from_cells(frame.width() as usize, frame.height() as usize, cells)
    }
}
