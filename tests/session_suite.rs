use glyphcam::audio::{AnalyserTap, FrequencyTap};
use glyphcam::canvas::{GlyphCanvas, RecordingViewport, Rgba};
use glyphcam::config::{Settings, VideoSource};
use glyphcam::downsample::DownsampleOutcome;
use glyphcam::idle::MatrixRain;
use glyphcam::scheduler::{Scheduler, TickMode};
use glyphcam::source::{FrameSource, FrameView, TestPattern};
use std::cell::Cell;
use std::rc::Rc;

/// Fixed-frame source whose readiness the test controls.
struct StaticSource {
    width: usize,
    height: usize,
    rgba: Vec<u8>,
    ready: bool,
}

impl StaticSource {
    /// One row of `columns` pixels, white for the left `lit` columns and black elsewhere.
    fn left_lit(columns: usize, lit: usize) -> Self {
        let mut rgba = Vec::new();
        for x in 0..columns {
            let v = if x < lit { 255 } else { 0 };
            rgba.extend_from_slice(&[v, v, v, 255]);
        }
        Self {
            width: columns,
            height: 1,
            rgba,
            ready: true,
        }
    }
}

impl FrameSource for StaticSource {
    fn kind(&self) -> VideoSource {
        VideoSource::File
    }

    fn label(&self) -> &str {
        "static"
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn frame(&mut self) -> Option<FrameView<'_>> {
        self.ready.then_some(FrameView {
            width: self.width,
            height: self.height,
            rgba: &self.rgba,
        })
    }
}

/// Lit frame whose readiness and end of stream are switched from outside.
struct SwitchedSource {
    inner: StaticSource,
    ready: Rc<Cell<bool>>,
    ended: Rc<Cell<bool>>,
}

impl SwitchedSource {
    fn new(ready: &Rc<Cell<bool>>, ended: &Rc<Cell<bool>>) -> Self {
        Self {
            inner: StaticSource::left_lit(4, 4),
            ready: Rc::clone(ready),
            ended: Rc::clone(ended),
        }
    }
}

impl FrameSource for SwitchedSource {
    fn kind(&self) -> VideoSource {
        VideoSource::Camera
    }

    fn label(&self) -> &str {
        "switched"
    }

    fn is_ready(&self) -> bool {
        self.ready.get()
    }

    fn dimensions(&self) -> (usize, usize) {
        self.inner.dimensions()
    }

    fn frame(&mut self) -> Option<FrameView<'_>> {
        if self.ready.get() { self.inner.frame() } else { None }
    }

    fn has_ended(&self) -> bool {
        self.ended.get()
    }
}

/// Capture process that exited without ever delivering a frame.
struct ExitedSource {
    ended: bool,
}

impl FrameSource for ExitedSource {
    fn kind(&self) -> VideoSource {
        VideoSource::Camera
    }

    fn label(&self) -> &str {
        "camera /dev/video9"
    }

    fn is_ready(&self) -> bool {
        false
    }

    fn dimensions(&self) -> (usize, usize) {
        (64, 36)
    }

    fn frame(&mut self) -> Option<FrameView<'_>> {
        None
    }

    fn has_ended(&self) -> bool {
        self.ended
    }
}

fn scheduler() -> Scheduler {
    Scheduler::new(fastrand::Rng::with_seed(1234))
}

#[test]
fn sessions_start_idle_and_run_the_rain() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(800, 600);
    let report = s.tick(&Settings::default(), &mut vp, 0.0);
    assert_eq!(report.mode, TickMode::Idle);
    assert_eq!(report.glyphs, 0);
    assert_eq!(s.rain().columns(), 50);
    assert_eq!(vp.glyphs.len(), 50);
    assert_eq!(vp.fills.len(), 1);
    assert_eq!(vp.fills[0].1, Rgba::black(0.05));
}

#[test]
fn starting_a_session_switches_to_capture() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(640, 480);
    s.start(Box::new(TestPattern::new(320, 180).freeze_at(0.5)), None, true);
    assert!(s.session().is_active());
    assert!(s.session().is_mirrored());

    let report = s.tick(&Settings::default(), &mut vp, 16.0);
    assert_eq!(report.mode, TickMode::Capture);
    assert_eq!(report.frame, Some(DownsampleOutcome::Drawn));
    let grid = report.grid.unwrap();
    assert_eq!((grid.columns, grid.rows), (40, 30));
    assert!(report.glyphs > 0);
    assert_eq!(report.glyphs, vp.glyphs.len());
    // The capture tick starts from an opaque black clear.
    assert_eq!(vp.fills.first().map(|f| f.1), Some(Rgba::BLACK));
}

#[test]
fn stopping_is_observed_on_the_next_tick() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(320, 160);
    let tap: Box<dyn FrequencyTap> = Box::new(AnalyserTap::detached());
    s.start(Box::new(TestPattern::new(64, 36)), Some(tap), false);
    assert!(s.has_audio());
    assert_eq!(s.tick(&Settings::default(), &mut vp, 0.0).mode, TickMode::Capture);

    s.stop();
    // Nothing is torn down until the scheduler runs again.
    assert!(s.source().is_some());
    assert_eq!(s.tick(&Settings::default(), &mut vp, 16.0).mode, TickMode::Idle);
    assert!(s.source().is_none());
    assert!(!s.has_audio());
}

#[test]
fn the_active_flag_is_rechecked_every_tick() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(160, 160);
    s.start(Box::new(TestPattern::new(32, 32)), None, false);
    let settings = Settings::default();
    let modes: Vec<TickMode> = (0..4)
        .map(|i| {
            if i == 2 {
                s.session_mut().set_active(false);
            }
            s.tick(&settings, &mut vp, i as f64 * 16.0).mode
        })
        .collect();
    assert_eq!(
        modes,
        vec![TickMode::Capture, TickMode::Capture, TickMode::Idle, TickMode::Idle]
    );
}

#[test]
fn resize_mid_session_regrids_on_the_next_tick() {
    let mut s = scheduler();
    let settings = Settings::default();
    let mut vp = RecordingViewport::new(800, 600);
    s.start(Box::new(TestPattern::new(960, 540)), None, true);

    let before = s.tick(&settings, &mut vp, 0.0).grid.unwrap();
    assert_eq!((before.columns, before.rows), (50, 38));

    vp.width = 1920;
    vp.height = 1080;
    vp.reset();
    let after = s.tick(&settings, &mut vp, 16.0);
    let grid = after.grid.unwrap();
    assert_eq!((grid.columns, grid.rows), (120, 68));
    assert_eq!(s.downsampler().buffer().width(), 120);
    assert_eq!(s.downsampler().buffer().height(), 68);
    assert_eq!(after.frame, Some(DownsampleOutcome::Drawn));
    assert!(vp.glyphs.iter().all(|g| g.x < 1920.0 + 8.0 && g.y < 1080.0 + 8.0));
}

#[test]
fn idle_rain_reseeds_for_a_new_width() {
    let mut s = scheduler();
    let settings = Settings::default();
    let mut vp = RecordingViewport::new(800, 600);
    for i in 0..10 {
        s.tick(&settings, &mut vp, i as f64);
    }
    assert_eq!(s.rain().columns(), 50);

    vp.width = 1920;
    vp.height = 1080;
    vp.reset();
    s.tick(&settings, &mut vp, 10.0);
    assert_eq!(s.rain().columns(), 120);
    assert_eq!(vp.glyphs.len(), 120);
    // Fresh drops have advanced exactly one row past their seeded start.
    assert!(s.rain().drops().iter().all(|&d| d <= 1.0 && d > -50.0));
}

#[test]
fn rain_drops_eventually_restart_at_the_top() {
    let mut rain = MatrixRain::new();
    let mut canvas = GlyphCanvas::new(16, 4);
    let mut rng = fastrand::Rng::with_seed(5);
    let mut restarted = false;
    for _ in 0..2_000 {
        let before: Vec<f32> = rain.drops().to_vec();
        rain.tick(&mut canvas, &mut rng);
        restarted |= before
            .iter()
            .zip(rain.drops())
            .any(|(b, a)| *a == 1.0 && *b > 1.0);
    }
    assert!(restarted);
    assert_eq!(rain.columns(), 8);
    assert!(canvas.lit_cells() > 0);
}

#[test]
fn a_source_that_is_not_ready_draws_nothing() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(64, 16);
    let mut src = StaticSource::left_lit(4, 4);
    src.ready = false;
    s.start(Box::new(src), None, false);
    let report = s.tick(&Settings::default(), &mut vp, 0.0);
    assert_eq!(report.mode, TickMode::Capture);
    assert_eq!(report.frame, Some(DownsampleOutcome::Skipped));
    assert_eq!(report.glyphs, 0);
}

#[test]
fn mirroring_flips_columns() {
    let settings = Settings::default();

    let mut plain = scheduler();
    let mut vp = RecordingViewport::new(64, 16);
    plain.start(Box::new(StaticSource::left_lit(4, 2)), None, false);
    plain.tick(&settings, &mut vp, 0.0);
    let xs: Vec<f32> = vp.glyphs.iter().map(|g| g.x).collect();
    assert_eq!(xs, vec![8.0, 24.0]);

    let mut mirrored = scheduler();
    let mut vp = RecordingViewport::new(64, 16);
    mirrored.start(Box::new(StaticSource::left_lit(4, 2)), None, true);
    mirrored.tick(&settings, &mut vp, 0.0);
    let xs: Vec<f32> = vp.glyphs.iter().map(|g| g.x).collect();
    assert_eq!(xs, vec![40.0, 56.0]);

    assert!(!mirrored.session_mut().toggle_mirrored());
    vp.reset();
    mirrored.tick(&settings, &mut vp, 16.0);
    let xs: Vec<f32> = vp.glyphs.iter().map(|g| g.x).collect();
    assert_eq!(xs, vec![8.0, 24.0]);
}

#[test]
fn unknown_palette_renders_with_the_default() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(64, 16);
    s.start(Box::new(StaticSource::left_lit(4, 4)), None, false);
    let settings = Settings {
        palette: "does-not-exist".to_string(),
        ..Settings::default()
    };
    let report = s.tick(&settings, &mut vp, 0.0);
    assert_eq!(report.glyphs, 4);
    let japanese = s.palettes().get("japanese");
    assert!(vp.glyphs.iter().all(|g| japanese.glyphs().contains(&g.glyph)));
}

#[test]
fn invalid_cell_size_uses_the_default() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(64, 32);
    s.start(Box::new(StaticSource::left_lit(4, 4)), None, false);
    let settings = Settings {
        cell_size: 0,
        ..Settings::default()
    };
    let grid = s.tick(&settings, &mut vp, 0.0).grid.unwrap();
    assert_eq!((grid.columns, grid.rows, grid.cell_size), (4, 2, 16));
}

#[test]
fn the_downsample_buffer_is_reused_between_ticks() {
    let mut s = scheduler();
    let mut canvas = GlyphCanvas::new(80, 24);
    s.start(Box::new(TestPattern::new(160, 90)), None, false);
    for i in 0..5 {
        s.tick(&Settings::default(), &mut canvas, i as f64 * 16.0);
    }
    assert_eq!(s.downsampler().reallocations(), 1);
    canvas.resize(100, 30);
    s.tick(&Settings::default(), &mut canvas, 100.0);
    assert_eq!(s.downsampler().reallocations(), 2);
}

#[test]
fn skipped_frames_redraw_the_last_good_buffer() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(64, 16);
    let ready = Rc::new(Cell::new(true));
    let ended = Rc::new(Cell::new(false));
    s.start(Box::new(SwitchedSource::new(&ready, &ended)), None, false);

    let first = s.tick(&Settings::default(), &mut vp, 0.0);
    assert_eq!(first.frame, Some(DownsampleOutcome::Drawn));
    assert_eq!(first.glyphs, 4);

    ready.set(false);
    vp.reset();
    let second = s.tick(&Settings::default(), &mut vp, 16.0);
    assert_eq!(second.mode, TickMode::Capture);
    assert_eq!(second.frame, Some(DownsampleOutcome::Skipped));
    assert_eq!(second.glyphs, 4);
    let xs: Vec<f32> = vp.glyphs.iter().map(|g| g.x).collect();
    assert_eq!(xs, vec![8.0, 24.0, 40.0, 56.0]);
}

#[test]
fn a_source_that_dies_before_its_first_frame_ends_the_session() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(320, 160);
    let tap: Box<dyn FrequencyTap> = Box::new(AnalyserTap::detached());
    s.start(Box::new(ExitedSource { ended: true }), Some(tap), true);

    let report = s.tick(&Settings::default(), &mut vp, 0.0);
    assert_eq!(report.mode, TickMode::Idle);
    assert_eq!(report.failed_source.as_deref(), Some("camera /dev/video9"));
    assert!(!s.session().is_active());
    assert!(s.source().is_none());
    assert!(!s.has_audio());
    // The rain takes over on the same tick.
    assert_eq!(vp.glyphs.len(), s.rain().columns());

    let next = s.tick(&Settings::default(), &mut vp, 16.0);
    assert_eq!(next.mode, TickMode::Idle);
    assert!(next.failed_source.is_none());
}

#[test]
fn a_source_still_starting_up_keeps_the_session() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(64, 16);
    s.start(Box::new(ExitedSource { ended: false }), None, false);
    let report = s.tick(&Settings::default(), &mut vp, 0.0);
    assert_eq!(report.mode, TickMode::Capture);
    assert!(report.failed_source.is_none());
    assert!(s.session().is_active());
}

#[test]
fn a_source_that_ends_after_drawing_stays_on_its_last_frame() {
    let mut s = scheduler();
    let mut vp = RecordingViewport::new(64, 16);
    let ready = Rc::new(Cell::new(true));
    let ended = Rc::new(Cell::new(false));
    s.start(Box::new(SwitchedSource::new(&ready, &ended)), None, false);
    assert_eq!(s.tick(&Settings::default(), &mut vp, 0.0).glyphs, 4);
    ready.set(false);
    ended.set(true);
    vp.reset();
    let report = s.tick(&Settings::default(), &mut vp, 16.0);
    assert_eq!(report.mode, TickMode::Capture);
    assert_eq!(report.frame, Some(DownsampleOutcome::Skipped));
    assert_eq!(report.glyphs, 4);
    assert!(report.failed_source.is_none());
    assert!(s.session().is_active());
}
