use std::io::{self, Write};

use crossterm::queue;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsciiCell {
    pub glyph: char,
    /// Foreground colour; `None` in grayscale mode.
    pub color: Option<[u8; 3]>,
}

/// A frame converted to terminal text, `height` rows of `width` cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiFrame {
    width: usize,
    height: usize,
    cells: Vec<AsciiCell>,
}

impl AsciiFrame {
    /// Missing cells are padded with blanks and extra cells are dropped.
    pub fn from_cells(width: usize, height: usize, mut cells: Vec<AsciiCell>) -> Self {
        cells.resize(
            width * height,
            AsciiCell {
                glyph: ' ',
                color: None,
            },
        );
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn rows(&self) -> impl Iterator<Item = &[AsciiCell]> {
        self.cells.chunks(self.width.max(1))
    }

    #[cfg(test)]
    pub(crate) fn lines(&self) -> Vec<String> {
        self.rows()
            .map(|row| row.iter().map(|cell| cell.glyph).collect())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn to_text(&self) -> String {
        if self.cells.is_empty() {
            return String::new();
        }
        let mut value = self.lines().join("\n");
        value.push('\n');
        value
    }

    /// Writes the block with ANSI colour escapes. Colour codes are only emitted
    /// when the colour changes, and every row ends with a reset. No trailing
    /// newline, so a full-height block never scrolls the terminal.
    pub fn write_ansi<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (row_index, row) in self.rows().enumerate() {
            if row_index > 0 {
                out.write_all(b"\n")?;
            }
            let mut current = None;
            let mut run = String::with_capacity(self.width);
            for cell in row {
                if cell.color != current {
                    if !run.is_empty() {
                        queue!(out, Print(&run))?;
                        run.clear();
                    }
                    match cell.color {
                        Some([r, g, b]) => queue!(out, SetForegroundColor(Color::Rgb { r, g, b }))?,
                        None => queue!(out, ResetColor)?,
                    }
                    current = cell.color;
                }
                run.push(cell.glyph);
            }
            if !run.is_empty() {
                queue!(out, Print(&run))?;
            }
            if current.is_some() {
                queue!(out, ResetColor)?;
            }
        }
        Ok(())
    }
}
