use crate::canvas::{Anchor, GlyphColor, GlyphStyle, Rect, Rgba, Viewport};

pub const RAIN_FONT_PX: usize = 16;
/// Opacity of the black wash painted over the previous tick, which leaves fading trails.
pub const RAIN_FADE_ALPHA: f32 = 0.05;
pub const RAIN_RESET_THRESHOLD: f32 = 0.975;
pub const RAIN_START_SPREAD: f32 = 50.0;

const RAIN_GLYPH_BASE: u32 = 0x30A0;
const RAIN_GLYPH_SPAN: u32 = 96;
const RAIN_COLOR: GlyphColor = GlyphColor::Rgb(0, 255, 0);

pub struct MatrixRain {
    drops: Vec<f32>,
    width: usize,
    height: usize,
}

impl MatrixRain {
    pub fn new() -> Self {
        Self {
            drops: Vec::new(),
            width: 0,
            height: 0,
        }
    }

    pub fn columns(&self) -> usize {
        self.drops.len()
    }

    /// Drop heights in rows; negative values are still above the viewport.
    pub fn drops(&self) -> &[f32] {
        &self.drops
    }

    /// Re-seeds every drop when the viewport size changed. Returns true in that case.
    pub fn resize(&mut self, width: usize, height: usize, rng: &mut fastrand::Rng) -> bool {
        if width == self.width && height == self.height && !self.drops.is_empty() {
            return false;
        }
        self.width = width;
        self.height = height;
        let columns = width.div_ceil(RAIN_FONT_PX);
        self.drops.clear();
        self.drops
            .extend((0..columns).map(|_| rng.f32() * -RAIN_START_SPREAD));
        true
    }

    pub fn tick(&mut self, viewport: &mut dyn Viewport, rng: &mut fastrand::Rng) {
        let (w, h) = viewport.size_px();
        if self.resize(w, h, rng) {
            log::debug!("idle: {} rain columns for {w}x{h}", self.drops.len());
        }

        viewport.fill_rect(
            Rect {
                x: 0.0,
                y: 0.0,
                w: w as f32,
                h: h as f32,
            },
            Rgba::black(RAIN_FADE_ALPHA),
        );

        let font = RAIN_FONT_PX as f32;
        let style = GlyphStyle {
            size_px: font,
            anchor: Anchor::Baseline,
            color: RAIN_COLOR,
        };
        let bottom = h as f32;
        for (i, drop) in self.drops.iter_mut().enumerate() {
            let glyph = rain_glyph(rng);
            let y = *drop * font;
            viewport.draw_glyph(glyph, i as f32 * font, y, &style);

            if y > bottom && rng.f32() > RAIN_RESET_THRESHOLD {
                *drop = 0.0;
            }
            *drop += 1.0;
        }
    }
}

impl Default for MatrixRain {
    fn default() -> Self {
        Self::new()
    }
}

pub fn rain_glyph(rng: &mut fastrand::Rng) -> char {
    char::from_u32(RAIN_GLYPH_BASE + rng.u32(0..RAIN_GLYPH_SPAN)).unwrap_or('ア')
}
