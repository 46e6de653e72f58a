use crate::canvas::{Cell, glyph_width};
use crate::render::{Frame, Renderer, draw_overlay_popup};
use std::io::Write;

/// Paints a [`crate::canvas::GlyphCanvas`] as truecolor text on a black background.
pub struct GlyphRenderer {
    last_fg: Option<(u8, u8, u8)>,
}

impl GlyphRenderer {
    pub fn new() -> Self {
        Self { last_fg: None }
    }
}

impl Default for GlyphRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes one row of cells, switching the foreground color only when it changes. A wide glyph
/// consumes the following column; one that would overhang the right edge is replaced by a
/// space.
pub fn write_row(
    out: &mut dyn Write,
    cells: &[Cell],
    last_fg: &mut Option<(u8, u8, u8)>,
) -> std::io::Result<()> {
    let mut col = 0;
    while col < cells.len() {
        let cell = &cells[col];
        if cell.is_blank() {
            out.write_all(b" ")?;
            col += 1;
            continue;
        }
        let width = glyph_width(cell.glyph);
        if col + width > cells.len() {
            out.write_all(b" ")?;
            col += 1;
            continue;
        }
        if *last_fg != Some(cell.fg) {
            let (r, g, b) = cell.fg;
            write!(out, "\x1b[38;2;{r};{g};{b}m")?;
            *last_fg = Some(cell.fg);
        }
        write!(out, "{}", cell.glyph)?;
        col += width;
    }
    Ok(())
}

impl Renderer for GlyphRenderer {
    fn name(&self) -> &'static str {
        "glyph"
    }

    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        let canvas = frame.canvas;
        let cols = canvas.cols().min(frame.term_cols as usize);
        let rows = canvas.rows().min(frame.term_rows as usize);
        if cols == 0 || rows == 0 {
            return Ok(());
        }

        if frame.sync_updates {
            out.write_all(b"\x1b[?2026h")?;
        }
        // Home, reset, black background. Autowrap off so writing the last column never scrolls.
        out.write_all(b"\x1b[H\x1b[0m\x1b[48;2;0;0;0m\x1b[?7l")?;
        self.last_fg = None;

        for row in 0..rows {
            write!(out, "\x1b[{};1H", row + 1)?;
            write_row(out, &canvas.row(row)[..cols], &mut self.last_fg)?;
        }

        let mut hud_lines = frame.hud.lines();
        for i in 0..frame.hud_rows as usize {
            let screen_row = rows + i + 1;
            if screen_row > frame.term_rows as usize {
                break;
            }
            write!(out, "\x1b[{screen_row};1H\x1b[0m\x1b[2K")?;
            if let Some(line) = hud_lines.next() {
                let clipped: String = line.chars().take(frame.term_cols as usize).collect();
                write!(out, "\x1b[38;2;120;200;120m{clipped}\x1b[0m")?;
            }
        }

        if let Some(text) = frame.overlay {
            draw_overlay_popup(out, frame.term_cols, frame.term_rows, text)?;
        }

        out.write_all(b"\x1b[0m\x1b[?7h")?;
        if frame.sync_updates {
            out.write_all(b"\x1b[?2026l")?;
        }
        out.flush()?;
        Ok(())
    }
}
