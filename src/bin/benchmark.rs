use std::io::sink;
use std::time::Instant;

use anyhow::Result;
use glyphcam::audio::AudioSnapshot;
use glyphcam::canvas::{GlyphCanvas, Viewport};
use glyphcam::cells::{Grid, RenderContext, render_cells};
use glyphcam::color::ColorMode;
use glyphcam::downsample::Downsampler;
use glyphcam::idle::MatrixRain;
use glyphcam::palette::PaletteRegistry;
use glyphcam::render::{Frame, GlyphRenderer, Renderer};
use glyphcam::source::TestPattern;

struct Args {
    frames: usize,
    cols: usize,
    rows: usize,
    cell: i32,
    source_w: usize,
    source_h: usize,
    ci_smoke: bool,
    quick: bool,
    max_ms: f64,
}

fn parse_args() -> Args {
    let mut args = Args {
        frames: 240,
        cols: 200,
        rows: 60,
        cell: 16,
        source_w: 960,
        source_h: 540,
        ci_smoke: false,
        quick: false,
        max_ms: 8.0,
    };

    let argv = std::env::args().skip(1).collect::<Vec<_>>();
    let mut i = 0usize;
    while i < argv.len() {
        let k = argv[i].as_str();
        let v = argv.get(i + 1).map(|s| s.as_str());
        let num = v.and_then(|x| x.parse::<usize>().ok());
        match (k, num) {
            ("--frames", Some(n)) => args.frames = n.max(1),
            ("--cols", Some(n)) => args.cols = n.max(1),
            ("--rows", Some(n)) => args.rows = n.max(1),
            ("--cell", Some(n)) => args.cell = n.clamp(1, 256) as i32,
            ("--source-w", Some(n)) => args.source_w = n.max(1),
            ("--source-h", Some(n)) => args.source_h = n.max(1),
            _ => {}
        }
        match (k, v) {
            ("--max-ms", Some(x)) => {
                if let Ok(ms) = x.parse::<f64>() {
                    args.max_ms = ms.max(0.1);
                }
            }
            ("--ci-smoke", _) => args.ci_smoke = true,
            ("--quick", _) => args.quick = true,
            _ => {}
        }
        i += 1;
    }
    if args.quick {
        args.frames = args.frames.min(60);
    }
    args
}

/// Loud-ish audio with a bass swell that crosses the hue threshold every couple of seconds.
fn synth_audio(step: usize) -> AudioSnapshot {
    let t = step as f32 / 60.0;
    let bass = ((t * 2.1).sin() * 0.5 + 0.5) * 230.0;
    let volume = (0.3 + 0.2 * (t * 3.7).sin()) * 255.0;
    AudioSnapshot::new(volume, bass)
}

fn bench_modes(args: &Args, worst: &mut f64) {
    let palettes = PaletteRegistry::new();
    let mut canvas = GlyphCanvas::new(args.cols, args.rows);
    let (vw, vh) = canvas.size_px();
    let grid = Grid::for_viewport(vw, vh, args.cell);
    let mut rng = fastrand::Rng::with_seed(7);

    println!(
        "cell renderer: canvas={}x{} cells grid={}x{} source={}x{} frames/mode={}",
        args.cols, args.rows, grid.columns, grid.rows, args.source_w, args.source_h, args.frames
    );
    for mode in ColorMode::ALL {
        let mut down = Downsampler::new();
        let mut source = TestPattern::new(args.source_w, args.source_h);
        let mut lit = 0usize;
        let start = Instant::now();
        for f in 0..args.frames {
            down.update(&mut source, grid.columns, grid.rows, f % 2 == 0);
            canvas.clear();
            let ctx = RenderContext {
                elapsed_ms: f as f64 * 1000.0 / 60.0,
                cell_size: grid.cell_size,
                color_mode: mode,
                brightness_boost: 0,
                palette: palettes.default_palette(),
                audio: synth_audio(f),
                viewport_width: vw,
            };
            lit += render_cells(&ctx, down.buffer(), &mut canvas, &mut rng);
        }
        let ms = start.elapsed().as_secs_f64() * 1000.0 / args.frames as f64;
        *worst = worst.max(ms);
        println!(
            "  {:<9} {:>8.3} ms/frame  glyphs/frame={:>6}  reallocs={}",
            mode.label(),
            ms,
            lit / args.frames,
            down.reallocations()
        );
    }
}

fn bench_idle(args: &Args, worst: &mut f64) {
    let mut canvas = GlyphCanvas::new(args.cols, args.rows);
    let mut rain = MatrixRain::new();
    let mut rng = fastrand::Rng::with_seed(11);
    let start = Instant::now();
    for _ in 0..args.frames {
        rain.tick(&mut canvas, &mut rng);
    }
    let ms = start.elapsed().as_secs_f64() * 1000.0 / args.frames as f64;
    *worst = worst.max(ms);
    println!(
        "idle rain: {:>8.3} ms/frame  columns={} lit cells={}",
        ms,
        rain.columns(),
        canvas.lit_cells()
    );
}

fn bench_present(args: &Args) -> Result<()> {
    let palettes = PaletteRegistry::new();
    let mut canvas = GlyphCanvas::new(args.cols, args.rows);
    let (vw, vh) = canvas.size_px();
    let grid = Grid::for_viewport(vw, vh, args.cell);
    let mut down = Downsampler::new();
    let mut source = TestPattern::new(args.source_w, args.source_h).freeze_at(1.0);
    down.update(&mut source, grid.columns, grid.rows, false);
    let ctx = RenderContext {
        elapsed_ms: 0.0,
        cell_size: grid.cell_size,
        color_mode: ColorMode::Rainbow,
        brightness_boost: 0,
        palette: palettes.default_palette(),
        audio: synth_audio(0),
        viewport_width: vw,
    };
    render_cells(&ctx, down.buffer(), &mut canvas, &mut fastrand::Rng::with_seed(1));

    let mut renderer = GlyphRenderer::new();
    let mut out = sink();
    let frame = Frame {
        term_cols: args.cols as u16,
        term_rows: args.rows as u16,
        canvas: &canvas,
        hud: "",
        hud_rows: 0,
        overlay: None,
        sync_updates: true,
    };
    let start = Instant::now();
    for _ in 0..args.frames {
        renderer.render(&frame, &mut out)?;
    }
    let ms = start.elapsed().as_secs_f64() * 1000.0 / args.frames as f64;
    println!("present ({}): {:>8.3} ms/frame", renderer.name(), ms);
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args();
    let mut worst = 0.0f64;
    bench_modes(&args, &mut worst);
    bench_idle(&args, &mut worst);
    bench_present(&args)?;

    if args.ci_smoke && worst > args.max_ms {
        anyhow::bail!(
            "slowest path took {:.3} ms/frame, budget {:.3} ms",
            worst,
            args.max_ms
        );
    }
    Ok(())
}
