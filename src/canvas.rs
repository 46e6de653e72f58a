use crate::color::Hsl;

pub const PX_PER_COL: usize = 8;
pub const PX_PER_ROW: usize = 16;

// Faded glyphs at or below this channel value are dropped.
const FADE_FLOOR: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// `(x, y)` is the glyph center.
    Center,
    /// `(x, y)` is the left end of the text baseline.
    Baseline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlyphColor {
    Rgb(u8, u8, u8),
    Hsl(Hsl),
}

impl GlyphColor {
    pub fn to_rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Rgb(r, g, b) => (r, g, b),
            Self::Hsl(hsl) => hsl.to_rgb(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphStyle {
    pub size_px: f32,
    pub anchor: Anchor,
    pub color: GlyphColor,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Self = Self::black(1.0);

    pub const fn black(a: f32) -> Self {
        Self { r: 0, g: 0, b: 0, a }
    }
}

pub trait Viewport {
    fn size_px(&self) -> (usize, usize);

    fn fill_rect(&mut self, rect: Rect, color: Rgba);

    fn draw_glyph(&mut self, glyph: char, x: f32, y: f32, style: &GlyphStyle);

    fn clear(&mut self) {
        let (w, h) = self.size_px();
        self.fill_rect(
            Rect {
                x: 0.0,
                y: 0.0,
                w: w as f32,
                h: h as f32,
            },
            Rgba::BLACK,
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub glyph: char,
    pub fg: (u8, u8, u8),
    pub size_px: u16,
}

impl Cell {
    pub const BLANK: Self = Self {
        glyph: ' ',
        fg: (0, 0, 0),
        size_px: 0,
    };

    pub fn is_blank(&self) -> bool {
        self.glyph == ' ' || self.fg == (0, 0, 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub cols: usize,
    pub rows: usize,
    pub cells: Vec<Cell>,
}

impl Snapshot {
    pub fn row(&self, r: usize) -> &[Cell] {
        &self.cells[r * self.cols..(r + 1) * self.cols]
    }
}

/// Terminal-backed viewport: a grid of character cells, each spanning
/// `PX_PER_COL x PX_PER_ROW` virtual pixels on a black background. A glyph lands in the cell
/// containing its anchor; later draws overwrite earlier ones.
pub struct GlyphCanvas {
    cols: usize,
    rows: usize,
    cells: Vec<Cell>,
}

impl GlyphCanvas {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![Cell::BLANK; cols * rows],
        }
    }

    /// Returns true when the size changed. Contents are cleared on resize.
    pub fn resize(&mut self, cols: usize, rows: usize) -> bool {
        if cols == self.cols && rows == self.rows {
            return false;
        }
        self.cols = cols;
        self.rows = rows;
        self.cells = vec![Cell::BLANK; cols * rows];
        true
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell(&self, col: usize, row: usize) -> Option<&Cell> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells.get(row * self.cols + col)
    }

    pub fn row(&self, r: usize) -> &[Cell] {
        &self.cells[r * self.cols..(r + 1) * self.cols]
    }

    pub fn lit_cells(&self) -> usize {
        self.cells.iter().filter(|c| !c.is_blank()).count()
    }

    pub fn capture(&self) -> Snapshot {
        Snapshot {
            cols: self.cols,
            rows: self.rows,
            cells: self.cells.clone(),
        }
    }

    fn cell_at(&self, x: f32, y: f32) -> Option<usize> {
        if !(x >= 0.0 && y >= 0.0) {
            return None;
        }
        let col = (x / PX_PER_COL as f32) as usize;
        let row = (y / PX_PER_ROW as f32) as usize;
        (col < self.cols && row < self.rows).then(|| row * self.cols + col)
    }
}

impl Viewport for GlyphCanvas {
    fn size_px(&self) -> (usize, usize) {
        (self.cols * PX_PER_COL, self.rows * PX_PER_ROW)
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let a = color.a.clamp(0.0, 1.0);
        if a <= 0.0 || self.cols == 0 || self.rows == 0 {
            return;
        }
        let c0 = (rect.x.max(0.0) / PX_PER_COL as f32).floor() as usize;
        let r0 = (rect.y.max(0.0) / PX_PER_ROW as f32).floor() as usize;
        let c1 = (((rect.x + rect.w) / PX_PER_COL as f32).ceil().max(0.0) as usize).min(self.cols);
        let r1 = (((rect.y + rect.h) / PX_PER_ROW as f32).ceil().max(0.0) as usize).min(self.rows);

        let blend = |fg: u8, over: u8| (fg as f32 * (1.0 - a) + over as f32 * a) as u8;
        for row in r0..r1 {
            for cell in &mut self.cells[row * self.cols + c0.min(c1)..row * self.cols + c1] {
                if a >= 1.0 {
                    *cell = Cell::BLANK;
                    continue;
                }
                let (r, g, b) = cell.fg;
                cell.fg = (blend(r, color.r), blend(g, color.g), blend(b, color.b));
                let (r, g, b) = cell.fg;
                if r.max(g).max(b) <= FADE_FLOOR {
                    *cell = Cell::BLANK;
                }
            }
        }
    }

    fn draw_glyph(&mut self, glyph: char, x: f32, y: f32, style: &GlyphStyle) {
        let y = match style.anchor {
            Anchor::Center => y,
            Anchor::Baseline => y - style.size_px * 0.5,
        };
        let Some(i) = self.cell_at(x, y) else {
            return;
        };
        self.cells[i] = Cell {
            glyph,
            fg: style.color.to_rgb(),
            size_px: style.size_px.clamp(0.0, u16::MAX as f32) as u16,
        };
    }
}

/// Number of terminal columns a glyph occupies (East Asian wide and fullwidth forms take two).
pub fn glyph_width(ch: char) -> usize {
    let c = ch as u32;
    let wide = matches!(
        c,
        0x1100..=0x115F
            | 0x2E80..=0x303E
            | 0x3041..=0x33FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xA000..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x1F300..=0x1F64F
            | 0x20000..=0x3FFFD
    );
    if wide { 2 } else { 1 }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub glyph: char,
    pub x: f32,
    pub y: f32,
    pub style: GlyphStyle,
}

/// Viewport that records every primitive instead of drawing. Used by tests and the benchmark.
#[derive(Debug, Clone, Default)]
pub struct RecordingViewport {
    pub width: usize,
    pub height: usize,
    pub glyphs: Vec<DrawCall>,
    pub fills: Vec<(Rect, Rgba)>,
}

impl RecordingViewport {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        self.glyphs.clear();
        self.fills.clear();
    }
}

impl Viewport for RecordingViewport {
    fn size_px(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.fills.push((rect, color));
    }

    fn draw_glyph(&mut self, glyph: char, x: f32, y: f32, style: &GlyphStyle) {
        self.glyphs.push(DrawCall {
            glyph,
            x,
            y,
            style: *style,
        });
    }
}
