use crate::audio::{AudioExtractor, AudioSnapshot, FrequencyTap};
use crate::canvas::Viewport;
use crate::cells::{Grid, RenderContext, render_cells};
use crate::config::{BRIGHTNESS_LIMIT, Settings};
use crate::downsample::{DownsampleOutcome, Downsampler};
use crate::idle::MatrixRain;
use crate::palette::PaletteRegistry;
use crate::source::FrameSource;

/// Flags owned by the running session. Mutated only through the setters, between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    active: bool,
    mirrored: bool,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_mirrored(&mut self, mirrored: bool) {
        self.mirrored = mirrored;
    }

    pub fn toggle_mirrored(&mut self) -> bool {
        self.mirrored = !self.mirrored;
        self.mirrored
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    Capture,
    Idle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub mode: TickMode,
    /// Grid used this tick; `None` while idle.
    pub grid: Option<Grid>,
    pub frame: Option<DownsampleOutcome>,
    pub glyphs: usize,
    pub audio: AudioSnapshot,
    /// Label of a source that ended before its first frame. The session went idle this tick.
    pub failed_source: Option<String>,
}

impl TickReport {
    fn idle() -> Self {
        Self {
            mode: TickMode::Idle,
            grid: None,
            frame: None,
            glyphs: 0,
            audio: AudioSnapshot::SILENT,
            failed_source: None,
        }
    }
}

/// Drives exactly one of the two painters per tick. Which one is decided from the session's
/// `active` flag every tick, so stopping takes effect on the next tick without interrupting
/// the current one.
pub struct Scheduler {
    session: Session,
    source: Option<Box<dyn FrameSource>>,
    audio: AudioExtractor,
    palettes: PaletteRegistry,
    downsampler: Downsampler,
    rain: MatrixRain,
    rng: fastrand::Rng,
    last_grid: Option<Grid>,
    unknown_palette: Option<String>,
    has_drawn: bool,
}

impl Scheduler {
    pub fn new(rng: fastrand::Rng) -> Self {
        Self {
            session: Session::default(),
            source: None,
            audio: AudioExtractor::new(),
            palettes: PaletteRegistry::new(),
            downsampler: Downsampler::new(),
            rain: MatrixRain::new(),
            rng,
            last_grid: None,
            unknown_palette: None,
            has_drawn: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn palettes(&self) -> &PaletteRegistry {
        &self.palettes
    }

    pub fn downsampler(&self) -> &Downsampler {
        &self.downsampler
    }

    pub fn rain(&self) -> &MatrixRain {
        &self.rain
    }

    pub fn source(&self) -> Option<&dyn FrameSource> {
        self.source.as_deref()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.has_tap()
    }

    pub fn start(
        &mut self,
        source: Box<dyn FrameSource>,
        tap: Option<Box<dyn FrequencyTap>>,
        mirrored: bool,
    ) {
        log::info!(
            "session: start '{}' (mirrored={mirrored}, audio={})",
            source.label(),
            tap.is_some()
        );
        self.source = Some(source);
        self.has_drawn = false;
        match tap {
            Some(tap) => self.audio.attach(tap),
            None => {
                self.audio.detach();
            }
        }
        self.session.set_mirrored(mirrored);
        self.session.set_active(true);
    }

    /// Clears the active flag. Resources are released by the next tick.
    pub fn stop(&mut self) {
        self.session.set_active(false);
    }

    pub fn tick(
        &mut self,
        settings: &Settings,
        viewport: &mut dyn Viewport,
        elapsed_ms: f64,
    ) -> TickReport {
        if !self.session.is_active() {
            self.release();
            self.rain.tick(viewport, &mut self.rng);
            return TickReport::idle();
        }
        if !self.has_drawn && self.source.as_deref().is_some_and(|s| s.has_ended()) {
            let label = self
                .source
                .as_deref()
                .map(|s| s.label().to_string())
                .unwrap_or_default();
            log::warn!("session: '{label}' ended before its first frame");
            self.session.set_active(false);
            self.release();
            self.rain.tick(viewport, &mut self.rng);
            return TickReport {
                failed_source: Some(label),
                ..TickReport::idle()
            };
        }
        let Some(source) = self.source.as_deref_mut() else {
            self.session.set_active(false);
            self.rain.tick(viewport, &mut self.rng);
            return TickReport::idle();
        };

        if !self.palettes.contains(&settings.palette)
            && self.unknown_palette.as_deref() != Some(settings.palette.as_str())
        {
            log::warn!(
                "palette '{}' not found, using '{}'",
                settings.palette,
                self.palettes.default_palette().name()
            );
            self.unknown_palette = Some(settings.palette.clone());
        }
        let palette = self.palettes.get(&settings.palette);

        viewport.clear();
        let (width, height) = viewport.size_px();
        let grid = Grid::for_viewport(width, height, settings.cell_size);
        if self.last_grid != Some(grid) {
            log::info!(
                "grid {}x{} at {}px cells for {width}x{height}",
                grid.columns,
                grid.rows,
                grid.cell_size
            );
            self.last_grid = Some(grid);
        }

        let frame = self
            .downsampler
            .update(source, grid.columns, grid.rows, self.session.is_mirrored());
        self.has_drawn |= frame == DownsampleOutcome::Drawn;
        let audio = self.audio.snapshot();
        let ctx = RenderContext {
            elapsed_ms,
            cell_size: grid.cell_size,
            color_mode: settings.color_mode,
            brightness_boost: settings
                .brightness_boost
                .clamp(-BRIGHTNESS_LIMIT, BRIGHTNESS_LIMIT),
            palette,
            audio,
            viewport_width: width,
        };
        let glyphs = render_cells(&ctx, self.downsampler.buffer(), viewport, &mut self.rng);

        TickReport {
            mode: TickMode::Capture,
            grid: Some(grid),
            frame: Some(frame),
            glyphs,
            audio,
            failed_source: None,
        }
    }

    fn release(&mut self) {
        if let Some(source) = self.source.take() {
            log::info!("session: released '{}'", source.label());
        }
        if self.audio.detach().is_some() {
            log::info!("session: audio tap detached");
        }
        self.last_grid = None;
    }
}
