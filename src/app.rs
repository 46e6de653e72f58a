use crate::audio::{AudioSystem, FrequencyTap};
use crate::canvas::GlyphCanvas;
use crate::config::{AudioSource, Config, Settings, parse_capture_size};
use crate::error::SourceError;
use crate::palette::PaletteRegistry;
use crate::render::{Frame, GlyphRenderer, Renderer};
use crate::scheduler::{Scheduler, TickMode, TickReport};
use crate::snapshot::save_snapshot;
use crate::source::open_source;
use crate::terminal::TerminalGuard;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::io::BufWriter;
use std::time::{Duration, Instant};

const CELL_SIZE_STEP: i32 = 2;
const BRIGHTNESS_STEP: i32 = 5;
const NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    None,
    Quit,
    Start,
    Stop,
    Snapshot,
    ToggleMirror,
}

struct Ui {
    show_hud: bool,
    show_help: bool,
    /// Start screen status line; holds the last acquisition error.
    status: Option<String>,
    notice: Option<(String, Instant)>,
}

impl Ui {
    fn new() -> Self {
        Self {
            show_hud: true,
            show_help: false,
            status: None,
            notice: None,
        }
    }

    fn notify(&mut self, text: impl Into<String>) {
        self.notice = Some((text.into(), Instant::now()));
    }

    fn current_notice(&mut self) -> Option<&str> {
        if self
            .notice
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() > NOTICE_TTL)
        {
            self.notice = None;
        }
        self.notice.as_ref().map(|(t, _)| t.as_str())
    }
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let capture_size = parse_capture_size(&cfg.capture_size)
        .ok_or_else(|| SourceError::InvalidCaptureSize(cfg.capture_size.clone()))?;

    let _term = TerminalGuard::new(cfg.sync_updates)?;
    let mut out = BufWriter::new(TerminalGuard::stdout());
    let mut renderer = GlyphRenderer::new();

    let mut last_size = TerminalGuard::size()?;
    if last_size.1 < 2 || last_size.0 < 4 {
        return Err(anyhow::anyhow!(
            "terminal too small (need at least 4x2, got {}x{})",
            last_size.0,
            last_size.1
        ));
    }

    let mut settings = Settings::from_config(&cfg);
    let mut scheduler = Scheduler::new(fastrand::Rng::new());
    let mut canvas = GlyphCanvas::new(0, 0);
    let mut audio_system: Option<AudioSystem> = None;
    let mut ui = Ui::new();
    let mut fps = FpsCounter::new();
    let mut session_start = Instant::now();
    let mut last_report: Option<TickReport> = None;

    log::info!(
        "video={:?} audio={:?} capture={}x{} palette={} mode={}",
        cfg.video,
        cfg.audio,
        capture_size.0,
        capture_size.1,
        settings.palette,
        settings.color_mode.label()
    );

    if cfg.autostart {
        audio_system = acquire(&cfg, capture_size, &mut scheduler, &mut ui);
        session_start = Instant::now();
    }

    loop {
        let now = Instant::now();

        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    let active = scheduler.session().is_active();
                    let action = handle_key(
                        k.code,
                        k.modifiers,
                        active,
                        &mut settings,
                        scheduler.palettes(),
                        &mut ui,
                    );
                    match action {
                        Action::None => {}
                        Action::Quit => {
                            log::info!("quit");
                            return Ok(());
                        }
                        Action::Start => {
                            audio_system = acquire(&cfg, capture_size, &mut scheduler, &mut ui);
                            session_start = Instant::now();
                        }
                        Action::Stop => {
                            scheduler.stop();
                            audio_system = None;
                            ui.notify("capture stopped");
                        }
                        Action::ToggleMirror => {
                            let on = scheduler.session_mut().toggle_mirrored();
                            ui.notify(format!("mirror {}", on_off(on)));
                        }
                        Action::Snapshot => match save_snapshot(&canvas.capture(), &cfg.snapshot_dir)
                        {
                            Ok(path) => ui.notify(format!("saved {}", path.display())),
                            Err(err) => {
                                log::warn!("snapshot failed: {err:#}");
                                ui.notify(format!("snapshot failed: {err}"));
                            }
                        },
                    }
                }
                Event::Resize(c, r) => last_size = (c, r),
                _ => {}
            }
        }

        // Resize events can be missed by some terminals.
        let sz = TerminalGuard::size()?;
        if sz != last_size {
            last_size = sz;
        }
        let (term_cols, term_rows) = last_size;

        let hud = if ui.show_hud {
            build_hud(
                term_cols as usize,
                &settings,
                &scheduler,
                audio_system.as_ref(),
                last_report.as_ref(),
                fps.fps(),
                ui.current_notice(),
            )
        } else {
            String::new()
        };
        let hud_rows = hud_rows_for_text(term_rows, ui.show_hud, &hud);
        let visual_rows = term_rows.saturating_sub(hud_rows).max(1);
        if canvas.resize(term_cols as usize, visual_rows as usize) {
            log::info!("terminal {term_cols}x{term_rows}, canvas {term_cols}x{visual_rows} cells");
        }

        let elapsed_ms = session_start.elapsed().as_secs_f64() * 1000.0;
        let report = scheduler.tick(&settings, &mut canvas, elapsed_ms);
        let mode = report.mode;
        if mode == TickMode::Idle && audio_system.is_some() {
            audio_system = None;
        }
        if let Some(label) = &report.failed_source {
            ui.status = Some(failed_source_status(label));
        }
        last_report = Some(report);

        let start_panel;
        let overlay = if ui.show_help {
            Some(help_popup_text())
        } else if mode == TickMode::Idle {
            start_panel = start_screen_text(&cfg, ui.status.as_deref());
            Some(start_panel.as_str())
        } else {
            None
        };

        let frame = Frame {
            term_cols,
            term_rows,
            canvas: &canvas,
            hud: &hud,
            hud_rows,
            overlay,
            sync_updates: cfg.sync_updates,
        };
        renderer.render(&frame, &mut out)?;
        fps.tick();

        let target = Duration::from_secs_f32(1.0 / cfg.fps.max(1) as f32);
        let elapsed = now.elapsed();
        if elapsed < target {
            std::thread::sleep(target - elapsed);
        }
    }
}

/// Opens the configured video source and, best effort, the audio source, then hands both to
/// the scheduler. Video failure leaves the session idle with a retry prompt; audio failure
/// only means the renderer gets no audio tap.
fn acquire(
    cfg: &Config,
    capture_size: (usize, usize),
    scheduler: &mut Scheduler,
    ui: &mut Ui,
) -> Option<AudioSystem> {
    let source = match open_source(cfg.video, cfg.input.as_deref(), capture_size) {
        Ok(source) => source,
        Err(err) => {
            log::warn!("video acquisition failed: {err}");
            ui.status = Some(format!("{err}. Press Enter to retry."));
            return None;
        }
    };

    let (audio_system, tap): (Option<AudioSystem>, Option<Box<dyn FrequencyTap>>) =
        if cfg.audio == AudioSource::None {
            (None, None)
        } else {
            match AudioSystem::open(cfg.audio, cfg.device.as_deref(), cfg.track.as_deref()) {
                Ok((sys, tap)) => (Some(sys), Some(Box::new(tap) as Box<dyn FrequencyTap>)),
                Err(err) => {
                    log::warn!("audio acquisition failed, continuing without audio: {err}");
                    ui.notify(format!("audio unavailable: {err}"));
                    (None, None)
                }
            }
        };

    ui.status = None;
    scheduler.start(source, tap, cfg.mirror.resolve(cfg.video));
    audio_system
}

fn handle_key(
    code: KeyCode,
    mods: KeyModifiers,
    active: bool,
    settings: &mut Settings,
    palettes: &PaletteRegistry,
    ui: &mut Ui,
) -> Action {
    if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
        return Action::Quit;
    }
    if ui.show_help {
        match code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return Action::Quit,
            KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::F(1) => {
                ui.show_help = false;
                return Action::None;
            }
            _ => {}
        }
    }

    match code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Action::Quit,
        KeyCode::Enter | KeyCode::Char(' ') if !active => Action::Start,
        KeyCode::Char('x') | KeyCode::Char('X') if active => Action::Stop,
        KeyCode::Char('s') | KeyCode::Char('S') if active => Action::Snapshot,
        KeyCode::Char('m') | KeyCode::Char('M') => Action::ToggleMirror,
        KeyCode::Char('p') => {
            settings.palette = palettes.cycle(&settings.palette, 1).to_string();
            Action::None
        }
        KeyCode::Char('P') => {
            settings.palette = palettes.cycle(&settings.palette, -1).to_string();
            Action::None
        }
        KeyCode::Char('c') => {
            settings.color_mode = settings.color_mode.cycle(1);
            Action::None
        }
        KeyCode::Char('C') => {
            settings.color_mode = settings.color_mode.cycle(-1);
            Action::None
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            settings.step_cell_size(CELL_SIZE_STEP);
            Action::None
        }
        KeyCode::Char('-') | KeyCode::Char('_') => {
            settings.step_cell_size(-CELL_SIZE_STEP);
            Action::None
        }
        KeyCode::Char(']') => {
            settings.step_brightness(BRIGHTNESS_STEP);
            Action::None
        }
        KeyCode::Char('[') => {
            settings.step_brightness(-BRIGHTNESS_STEP);
            Action::None
        }
        KeyCode::Char('i') | KeyCode::Char('I') => {
            ui.show_hud = !ui.show_hud;
            Action::None
        }
        KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::F(1) => {
            ui.show_help = !ui.show_help;
            Action::None
        }
        _ => Action::None,
    }
}

fn failed_source_status(label: &str) -> String {
    format!("{label} stopped before the first frame. Press Enter to retry.")
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

fn build_hud(
    cols: usize,
    settings: &Settings,
    scheduler: &Scheduler,
    audio: Option<&AudioSystem>,
    report: Option<&TickReport>,
    fps: f32,
    notice: Option<&str>,
) -> String {
    let palette = scheduler.palettes().get(&settings.palette).name();
    let session = scheduler.session();
    let mut lines = vec![format!(
        "palette {} | mode {} | cell {}px | brightness {:+} | mirror {} | {:>4.1} fps",
        palette,
        settings.color_mode.label(),
        settings.cell_size,
        settings.brightness_boost,
        on_off(session.is_mirrored()),
        fps
    )];

    match (scheduler.source(), report) {
        (Some(source), Some(r)) if r.mode == TickMode::Capture => {
            let grid = r
                .grid
                .map(|g| format!("{}x{}", g.columns, g.rows))
                .unwrap_or_default();
            lines.push(format!(
                "video {}{} | audio {} | vol {:>5.1} bass {:>5.1} | grid {} | glyphs {}",
                source.label(),
                if source.has_ended() { " (ended)" } else { "" },
                audio.map(AudioSystem::label).unwrap_or("none"),
                r.audio.volume,
                r.audio.bass_energy,
                grid,
                r.glyphs
            ));
        }
        _ => lines.push("idle".to_string()),
    }

    lines.push(match notice {
        Some(text) => text.to_string(),
        None => "keys: p palette | c color | +/- size | [/] brightness | m mirror | s snapshot | x stop | i HUD | ? help | q quit".to_string(),
    });

    lines
        .iter()
        .flat_map(|l| hard_wrap_line(l, cols.max(1)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn hud_rows_for_text(term_rows: u16, show_hud: bool, hud: &str) -> u16 {
    if !show_hud {
        return 0;
    }
    let wanted = hud.lines().count() as u16;
    wanted.min(term_rows.saturating_sub(1))
}

fn hard_wrap_line(line: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(width.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

fn start_screen_text(cfg: &Config, status: Option<&str>) -> String {
    let mut text = format!(
        "GLYPHCAM\n\
\n\
video  {:?}{}\n\
audio  {:?}\n\
\n\
Enter / Space  start capture\n\
?  help    q  quit",
        cfg.video,
        cfg.input
            .as_deref()
            .map(|i| format!(" ({i})"))
            .unwrap_or_default(),
        cfg.audio,
    );
    if let Some(status) = status {
        text.push_str("\n\n");
        text.push_str(status);
    }
    text
}

fn help_popup_text() -> &'static str {
    "Glyphcam Hotkeys\n\
enter/space  start capture (from the start screen)\n\
x  stop capture and return to the start screen\n\
p / P  next / previous palette\n\
c / C  next / previous color mode\n\
+ / -  larger / smaller cells\n\
] / [  brighter / darker\n\
m  mirror on/off\n\
s  save snapshot (.ans)\n\
i  show/hide HUD\n\
? or h or F1  toggle this help\n\
q or esc  quit"
}

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        if dt >= 0.5 {
            self.fps = self.frames as f32 / dt;
            self.frames = 0;
            self.last = now;
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}
