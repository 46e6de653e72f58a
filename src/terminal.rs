use anyhow::Context;
use crossterm::{
    cursor, queue,
    style::ResetColor,
    terminal::{self, ClearType},
};
use std::io::{Stdout, Write, stdout};

/// Keeps the terminal in raw mode on the alternate screen while alive.
pub struct TerminalGuard {
    sync_updates: bool,
}

impl TerminalGuard {
    pub fn new(sync_updates: bool) -> anyhow::Result<Self> {
        terminal::enable_raw_mode().context("enable raw mode")?;
        // Drop undoes raw mode even when the screen setup below fails.
        let guard = Self { sync_updates };

        let mut out = stdout();
        queue!(
            out,
            terminal::EnterAlternateScreen,
            terminal::Clear(ClearType::All),
            cursor::Hide,
            cursor::MoveTo(0, 0)
        )
        .context("prepare alternate screen")?;
        out.flush().context("flush terminal setup")?;
        log::debug!("terminal: raw mode on alternate screen (sync updates: {sync_updates})");
        Ok(guard)
    }

    pub fn stdout() -> Stdout {
        stdout()
    }

    /// Current size as `(cols, rows)`.
    pub fn size() -> anyhow::Result<(u16, u16)> {
        terminal::size().context("get terminal size")
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut out = stdout();
        // A frame interrupted mid-write may have left these modes on.
        if self.sync_updates {
            let _ = out.write_all(b"\x1b[?2026l");
        }
        let _ = out.write_all(b"\x1b[?7h");
        let _ = queue!(out, ResetColor, cursor::Show, terminal::LeaveAlternateScreen);
        let _ = out.flush();
        log::debug!("terminal: restored");
    }
}
