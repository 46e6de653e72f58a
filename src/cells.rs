use crate::audio::AudioSnapshot;
use crate::canvas::{Anchor, GlyphColor, GlyphStyle, Viewport};
use crate::color::{ColorMode, Hsl};
use crate::config::DEFAULT_CELL_SIZE;
use crate::downsample::PixelBuffer;
use crate::palette::Palette;

/// Cells darker than this are background and are not drawn.
pub const SKIP_LUMINANCE: f32 = 20.0;
pub const LUMINANCE_GAIN: f32 = 1.3;
pub const BASS_HUE_THRESHOLD: f32 = 0.45;
pub const FLOW_PERIOD_MS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub columns: usize,
    pub rows: usize,
    pub cell_size: u32,
}

impl Grid {
    pub fn for_viewport(width_px: usize, height_px: usize, cell_size: i32) -> Self {
        let cell = sanitize_cell_size(cell_size);
        Self {
            columns: width_px.div_ceil(cell as usize),
            rows: height_px.div_ceil(cell as usize),
            cell_size: cell,
        }
    }
}

pub fn sanitize_cell_size(cell_size: i32) -> u32 {
    if cell_size > 0 {
        cell_size as u32
    } else {
        DEFAULT_CELL_SIZE as u32
    }
}

/// Everything a frame's cell pass depends on, fixed for the duration of one tick.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub elapsed_ms: f64,
    pub cell_size: u32,
    pub color_mode: ColorMode,
    pub brightness_boost: i32,
    pub palette: &'a Palette,
    pub audio: AudioSnapshot,
    pub viewport_width: usize,
}

pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    let mean = (r as f32 + g as f32 + b as f32) / 3.0;
    (mean * LUMINANCE_GAIN).min(255.0)
}

pub fn base_index(luminance: f32, palette_len: usize) -> usize {
    let top = palette_len.saturating_sub(1);
    let idx = ((luminance.clamp(0.0, 255.0) / 255.0) * top as f32).floor() as usize;
    idx.min(top)
}

pub fn flow_offset(elapsed_ms: f64, row: usize) -> i64 {
    (elapsed_ms / FLOW_PERIOD_MS - row as f64 / 2.0).floor() as i64
}

/// Downward-scrolling index: the base index shifted by a time and row dependent offset.
pub fn flow_index(base: usize, elapsed_ms: f64, row: usize, palette_len: usize) -> usize {
    if palette_len == 0 {
        return 0;
    }
    let shift = (flow_offset(elapsed_ms, row).unsigned_abs() % palette_len as u64) as usize;
    (base % palette_len + shift) % palette_len
}

pub fn jitter_range(bass_norm: f32) -> i32 {
    2 + (bass_norm.clamp(0.0, 1.0) * 20.0).floor() as i32
}

pub fn jittered_index(base: usize, jitter: i32, palette_len: usize) -> usize {
    let top = palette_len.saturating_sub(1) as i64;
    (base as i64 + jitter as i64).clamp(0, top) as usize
}

/// Volume-driven hue that swings from yellow toward red once bass crosses the threshold.
pub fn dynamic_hue(volume_norm: f32, bass_norm: f32) -> f32 {
    if bass_norm > BASS_HUE_THRESHOLD {
        let intensity = ((bass_norm - BASS_HUE_THRESHOLD) / (1.0 - BASS_HUE_THRESHOLD)).min(1.0);
        60.0 - intensity * 60.0
    } else {
        180.0 + volume_norm * 50.0
    }
}

pub fn rainbow_hue(x_px: f32, viewport_width: usize, elapsed_ms: f64) -> f32 {
    let w = viewport_width.max(1) as f32;
    x_px / w * 360.0 + (elapsed_ms / 10.0) as f32
}

pub fn lightness(luminance: f32, volume_norm: f32, brightness_boost: i32) -> f32 {
    let base = (luminance / 255.0 * 50.0 + volume_norm * 40.0).min(90.0);
    (base + brightness_boost as f32).clamp(0.0, 100.0)
}

/// Font size for this frame: louder audio draws larger glyphs on the same spacing.
pub fn glyph_size(cell_size: u32, volume_norm: f32) -> f32 {
    (cell_size as f32 * (1.0 + 0.3 * volume_norm.clamp(0.0, 1.0))).floor()
}

fn wrap_hue(h: f32) -> f32 {
    h.rem_euclid(360.0)
}

/// Hue shared by every cell in the frame, or `None` when it varies per cell.
fn frame_hue(ctx: &RenderContext<'_>) -> Option<f32> {
    let vol = ctx.audio.volume_norm();
    let bass = ctx.audio.bass_norm();
    match ctx.color_mode {
        ColorMode::Rainbow => None,
        ColorMode::Dynamic | ColorMode::Flow => Some(wrap_hue(dynamic_hue(vol, bass))),
        mode => Some(mode.base_hue()),
    }
}

pub fn cell_hue(ctx: &RenderContext<'_>, x_px: f32) -> f32 {
    frame_hue(ctx)
        .unwrap_or_else(|| wrap_hue(rainbow_hue(x_px, ctx.viewport_width, ctx.elapsed_ms)))
}

/// Final palette index for a cell in `row` with base index `base`.
pub fn pick_index(ctx: &RenderContext<'_>, base: usize, row: usize, rng: &mut fastrand::Rng) -> usize {
    let len = ctx.palette.len();
    if ctx.color_mode == ColorMode::Flow {
        flow_index(base, ctx.elapsed_ms, row, len)
    } else {
        let range = jitter_range(ctx.audio.bass_norm());
        jittered_index(base, rng.i32(-range..=range), len)
    }
}

/// Paints every lit cell of `pixels` onto `viewport` and returns the number of glyphs drawn.
pub fn render_cells(
    ctx: &RenderContext<'_>,
    pixels: &PixelBuffer,
    viewport: &mut dyn Viewport,
    rng: &mut fastrand::Rng,
) -> usize {
    let len = ctx.palette.len();
    if len == 0 {
        return 0;
    }
    let vol = ctx.audio.volume_norm();
    let cell = ctx.cell_size as f32;
    let half = cell / 2.0;
    let saturation = ctx.color_mode.saturation();
    let shared_hue = frame_hue(ctx);
    let size_px = glyph_size(ctx.cell_size, vol);

    let mut drawn = 0usize;
    for y in 0..pixels.height() {
        let cy = y as f32 * cell + half;
        for x in 0..pixels.width() {
            let (r, g, b) = pixels.rgb(x, y);
            let lum = luminance(r, g, b);
            if lum < SKIP_LUMINANCE {
                continue;
            }

            let idx = pick_index(ctx, base_index(lum, len), y, rng);
            let glyph = ctx.palette.glyph(idx);

            let cx = x as f32 * cell + half;
            let hue = shared_hue.unwrap_or_else(|| {
                wrap_hue(rainbow_hue(cx, ctx.viewport_width, ctx.elapsed_ms))
            });
            let style = GlyphStyle {
                size_px,
                anchor: Anchor::Center,
                color: GlyphColor::Hsl(Hsl::new(
                    hue,
                    saturation,
                    lightness(lum, vol, ctx.brightness_boost),
                )),
            };
            viewport.draw_glyph(glyph, cx, cy, &style);
            drawn += 1;
        }
    }
    drawn
}
