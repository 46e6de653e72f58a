use glyphcam::audio::{AudioExtractor, AudioSnapshot};
use glyphcam::canvas::{Anchor, GlyphColor, RecordingViewport};
use glyphcam::cells::{
    Grid, RenderContext, base_index, dynamic_hue, flow_index, glyph_size, jitter_range, lightness,
    luminance, pick_index, rainbow_hue, render_cells,
};
use glyphcam::color::ColorMode;
use glyphcam::downsample::PixelBuffer;
use glyphcam::palette::{Palette, PaletteRegistry};

fn solid(w: usize, h: usize, rgb: (u8, u8, u8)) -> PixelBuffer {
    let mut data = Vec::with_capacity(w * h * 4);
    for _ in 0..w * h {
        data.extend_from_slice(&[rgb.0, rgb.1, rgb.2, 255]);
    }
    PixelBuffer::from_rgba(w, h, data)
}

fn ctx<'a>(palette: &'a Palette, mode: ColorMode, audio: AudioSnapshot) -> RenderContext<'a> {
    RenderContext {
        elapsed_ms: 0.0,
        cell_size: 16,
        color_mode: mode,
        brightness_boost: 0,
        palette,
        audio,
        viewport_width: 640,
    }
}

fn hsl_of(color: GlyphColor) -> glyphcam::color::Hsl {
    match color {
        GlyphColor::Hsl(hsl) => hsl,
        GlyphColor::Rgb(..) => panic!("cell renderer should emit HSL colors"),
    }
}

// ── Skipping ────────────────────────────────────────────────────────────────

#[test]
fn dark_cells_are_never_drawn() {
    let registry = PaletteRegistry::new();
    let mut rng = fastrand::Rng::with_seed(1);
    for mode in ColorMode::ALL {
        // mean 15 * 1.3 = 19.5, just under the cutoff
        for rgb in [(0, 0, 0), (15, 15, 15), (45, 0, 0)] {
            let mut vp = RecordingViewport::new(64, 64);
            let c = ctx(registry.default_palette(), mode, AudioSnapshot::new(255.0, 255.0));
            let drawn = render_cells(&c, &solid(4, 4, rgb), &mut vp, &mut rng);
            assert_eq!(drawn, 0, "mode={mode:?} rgb={rgb:?}");
            assert!(vp.glyphs.is_empty());
        }
    }
}

#[test]
fn cells_at_the_cutoff_are_drawn() {
    let registry = PaletteRegistry::new();
    let mut vp = RecordingViewport::new(64, 64);
    let c = ctx(registry.default_palette(), ColorMode::Matrix, AudioSnapshot::SILENT);
    // mean 16 * 1.3 = 20.8
    let drawn = render_cells(&c, &solid(3, 2, (16, 16, 16)), &mut vp, &mut fastrand::Rng::with_seed(2));
    assert_eq!(drawn, 6);
    assert_eq!(vp.glyphs.len(), 6);
}

// ── Index selection ────────────────────────────────────────────────────────

#[test]
fn base_index_follows_luminance_for_every_palette() {
    let registry = PaletteRegistry::new();
    for name in registry.names() {
        let len = registry.get(name).len();
        for l in 20..=255u32 {
            let l = l as f32;
            let idx = base_index(l, len);
            assert_eq!(idx, ((l / 255.0) * (len - 1) as f32).floor() as usize);
            assert!(idx < len);
        }
    }
}

#[test]
fn luminance_is_boosted_and_capped() {
    assert_eq!(luminance(0, 0, 0), 0.0);
    assert!((luminance(100, 100, 100) - 130.0).abs() < 1e-3);
    assert_eq!(luminance(255, 255, 255), 255.0);
    assert_eq!(luminance(200, 200, 200), 255.0);
}

#[test]
fn jittered_indices_stay_in_range() {
    let registry = PaletteRegistry::new();
    let mut rng = fastrand::Rng::with_seed(42);
    for name in registry.names() {
        let palette = registry.get(name);
        let len = palette.len();
        for bass in [0.0, 60.0, 128.0, 255.0] {
            let c = ctx(palette, ColorMode::Cyber, AudioSnapshot::new(0.0, bass));
            for base in [0, len / 2, len - 1] {
                for _ in 0..500 {
                    assert!(pick_index(&c, base, 3, &mut rng) < len);
                }
            }
        }
    }
}

#[test]
fn flow_indices_wrap_for_any_time() {
    let registry = PaletteRegistry::new();
    for name in registry.names() {
        let len = registry.get(name).len();
        for elapsed in [0.0, 1.0, 29.9, 30.0, 12_345.6, 1.0e9, 1.0e13] {
            for row in [0usize, 1, 5, 77, 1_000] {
                for base in 0..len {
                    assert!(flow_index(base, elapsed, row, len) < len);
                }
            }
        }
    }
}

#[test]
fn flow_offset_uses_the_magnitude_of_a_negative_shift() {
    // t=0, row 5: floor(0 - 2.5) = -3
    assert_eq!(flow_index(0, 0.0, 5, 10), 3);
    // t=300ms, row 0: floor(10) = 10, wraps to 0 in a ten glyph palette
    assert_eq!(flow_index(2, 300.0, 0, 10), 2);
    // advancing time by one period moves every row by one glyph
    assert_eq!(flow_index(0, 330.0, 0, 10), 1);
}

#[test]
fn flow_mode_ignores_the_rng() {
    let registry = PaletteRegistry::new();
    let palette = registry.default_palette();
    let mut c = ctx(palette, ColorMode::Flow, AudioSnapshot::new(200.0, 255.0));
    c.elapsed_ms = 1_234.0;
    let a = pick_index(&c, 7, 4, &mut fastrand::Rng::with_seed(1));
    let b = pick_index(&c, 7, 4, &mut fastrand::Rng::with_seed(999));
    assert_eq!(a, b);
    assert_eq!(a, flow_index(7, 1_234.0, 4, palette.len()));
}

#[test]
fn jitter_range_grows_with_bass() {
    assert_eq!(jitter_range(0.0), 2);
    assert_eq!(jitter_range(0.5), 12);
    assert_eq!(jitter_range(1.0), 22);
    assert_eq!(jitter_range(3.0), 22);
}

// ── Color ───────────────────────────────────────────────────────────────────

#[test]
fn dynamic_hue_ignores_bass_up_to_the_threshold() {
    for vol in [0.0, 0.25, 0.5, 1.0] {
        let reference = dynamic_hue(vol, 0.0);
        for bass in [0.1, 0.3, 0.45] {
            assert_eq!(dynamic_hue(vol, bass), reference);
        }
        assert_eq!(reference, 180.0 + vol * 50.0);
    }
}

#[test]
fn dynamic_hue_falls_toward_red_above_the_threshold() {
    let mut prev = dynamic_hue(0.5, 0.4501);
    assert!(prev <= 60.0);
    for step in 1..=100 {
        let bass = 0.4501 + step as f32 * (1.0 - 0.4501) / 100.0;
        let hue = dynamic_hue(0.5, bass);
        assert!(hue < prev, "bass={bass} hue={hue} prev={prev}");
        prev = hue;
    }
    assert!(dynamic_hue(0.5, 1.0).abs() < 1e-4);
}

#[test]
fn lightness_is_always_a_percentage() {
    for l in (0..=255).step_by(5) {
        for vol in [0.0, 0.3, 0.7, 1.0] {
            for boost in [-100, -40, 0, 25, 100] {
                let v = lightness(l as f32, vol, boost);
                assert!((0.0..=100.0).contains(&v), "l={l} vol={vol} boost={boost} -> {v}");
            }
        }
    }
    assert_eq!(lightness(255.0, 1.0, 0), 90.0);
}

#[test]
fn rainbow_hue_spans_the_viewport() {
    assert_eq!(rainbow_hue(0.0, 800, 0.0), 0.0);
    assert_eq!(rainbow_hue(400.0, 800, 0.0), 180.0);
    assert_eq!(rainbow_hue(0.0, 800, 1_000.0), 100.0);
}

#[test]
fn glyphs_swell_with_volume() {
    assert_eq!(glyph_size(16, 0.0), 16.0);
    assert_eq!(glyph_size(16, 1.0), 20.0);
    assert_eq!(glyph_size(10, 0.5), 11.0);
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn white_in_bw_mode_is_unsaturated_and_dense() {
    let registry = PaletteRegistry::new();
    let palette = registry.default_palette();
    let len = palette.len();
    assert_eq!(base_index(luminance(255, 255, 255), len), len - 1);

    let mut vp = RecordingViewport::new(32, 32);
    let c = ctx(palette, ColorMode::Bw, AudioSnapshot::SILENT);
    render_cells(&c, &solid(2, 2, (255, 255, 255)), &mut vp, &mut fastrand::Rng::with_seed(5));
    assert_eq!(vp.glyphs.len(), 4);
    let dense = &palette.glyphs()[len - 3..];
    for call in &vp.glyphs {
        assert_eq!(hsl_of(call.style.color).s, 0.0);
        assert!(dense.contains(&call.glyph), "{}", call.glyph);
    }
}

#[test]
fn mid_gray_in_matrix_mode_jitters_by_at_most_two() {
    let registry = PaletteRegistry::new();
    let palette = registry.default_palette();
    let len = palette.len();
    let base = base_index(128.0, len);
    assert_eq!(base, (128.0f32 / 255.0 * (len - 1) as f32).floor() as usize);

    let c = ctx(palette, ColorMode::Matrix, AudioSnapshot::SILENT);
    let mut rng = fastrand::Rng::with_seed(77);
    let mut seen_low = false;
    let mut seen_high = false;
    for _ in 0..2_000 {
        let idx = pick_index(&c, base, 0, &mut rng);
        assert!(idx.abs_diff(base) <= 2);
        seen_low |= idx == base - 2;
        seen_high |= idx == base + 2;
    }
    assert!(seen_low && seen_high);
}

#[test]
fn missing_audio_tap_reads_as_silence() {
    let mut ex = AudioExtractor::new();
    assert_eq!(ex.volume(), 0.0);
    assert_eq!(ex.bass_energy(), 0.0);
    let audio = ex.snapshot();
    assert_eq!(audio, AudioSnapshot::SILENT);

    let registry = PaletteRegistry::new();
    let mut vp = RecordingViewport::new(32, 32);
    let c = ctx(registry.default_palette(), ColorMode::Dynamic, audio);
    render_cells(&c, &solid(2, 1, (120, 140, 160)), &mut vp, &mut fastrand::Rng::with_seed(3));
    assert_eq!(vp.glyphs.len(), 2);
    for call in &vp.glyphs {
        assert_eq!(hsl_of(call.style.color).h, 180.0);
    }
}

#[test]
fn glyphs_are_centered_in_their_cells() {
    let registry = PaletteRegistry::new();
    let mut vp = RecordingViewport::new(48, 32);
    let mut c = ctx(registry.default_palette(), ColorMode::Fire, AudioSnapshot::SILENT);
    c.cell_size = 16;
    render_cells(&c, &solid(3, 2, (200, 90, 60)), &mut vp, &mut fastrand::Rng::with_seed(9));
    let centers: Vec<(f32, f32)> = vp.glyphs.iter().map(|g| (g.x, g.y)).collect();
    assert_eq!(
        centers,
        vec![(8.0, 8.0), (24.0, 8.0), (40.0, 8.0), (8.0, 24.0), (24.0, 24.0), (40.0, 24.0)]
    );
    assert!(vp.glyphs.iter().all(|g| g.style.anchor == Anchor::Center));
    assert!(vp.glyphs.iter().all(|g| hsl_of(g.style.color).h == 0.0));
}

#[test]
fn grid_rounds_up_and_replaces_bad_cell_sizes() {
    let g = Grid::for_viewport(800, 600, 12);
    assert_eq!((g.columns, g.rows, g.cell_size), (67, 50, 12));
    let g = Grid::for_viewport(800, 600, 0);
    assert_eq!((g.columns, g.rows, g.cell_size), (50, 38, 16));
    let g = Grid::for_viewport(800, 600, -5);
    assert_eq!(g.cell_size, 16);
}

#[test]
fn unknown_palette_key_falls_back_to_the_default() {
    let registry = PaletteRegistry::new();
    for key in ["", "nope", "klingon", "   "] {
        let p = registry.get(key);
        assert_eq!(p.name(), "japanese");
        assert!(!p.is_empty());
    }
    assert_eq!(registry.get(" ASCII ").name(), "ascii");
}
