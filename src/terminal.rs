use std::io::{self, Write};

use crossterm::cursor::{Hide, Show};
use crossterm::style::ResetColor;
use crossterm::{execute, queue};

/// Hides the cursor for the lifetime of the guard and restores cursor and
/// colours when dropped, on success and error paths alike.
pub struct TerminalGuard<W: Write> {
    out: W,
}

impl<W: Write> TerminalGuard<W> {
    pub fn enter(mut out: W) -> io::Result<Self> {
        execute!(out, Hide)?;
        Ok(Self { out })
    }
}

impl<W: Write> Drop for TerminalGuard<W> {
    fn drop(&mut self) {
        let _ = queue!(self.out, ResetColor, Show);
        let _ = self.out.write_all(b"\n");
        let _ = self.out.flush();
    }
}
