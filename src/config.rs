use crate::color::ColorMode;
use crate::palette::DEFAULT_PALETTE;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub const DEFAULT_CELL_SIZE: i32 = 16;
pub const MIN_CELL_SIZE: i32 = 4;
pub const MAX_CELL_SIZE: i32 = 64;
pub const BRIGHTNESS_LIMIT: i32 = 100;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "glyphcam",
    version,
    about = "Live camera, video or screen as audio-reactive glyph art in the terminal"
)]
pub struct Config {
    #[arg(long, value_enum, default_value_t = VideoSource::Camera)]
    pub video: VideoSource,

    /// Video file path, camera device, or screen/display id (platform specific).
    #[arg(long)]
    pub input: Option<String>,

    #[arg(long, default_value = "960x540")]
    pub capture_size: String,

    #[arg(long, value_enum, default_value_t = AudioSource::Mic)]
    pub audio: AudioSource,

    /// Substring of the audio input device name.
    #[arg(long)]
    pub device: Option<String>,

    /// WAV file analysed and played back in a loop with `--audio track`.
    #[arg(long)]
    pub track: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_PALETTE)]
    pub palette: String,

    #[arg(long, default_value_t = DEFAULT_CELL_SIZE, allow_negative_numbers = true)]
    pub cell_size: i32,

    #[arg(long, value_enum, default_value_t = ColorMode::Dynamic)]
    pub color_mode: ColorMode,

    #[arg(long, value_enum, default_value_t = MirrorMode::Auto)]
    pub mirror: MirrorMode,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub brightness: i32,

    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,

    #[arg(long, default_value = ".")]
    pub snapshot_dir: PathBuf,

    /// Skip the start screen and open sources immediately.
    #[arg(long, default_value_t = false)]
    pub autostart: bool,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    /// Log destination (the terminal itself is busy drawing). Defaults to the temp dir.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VideoSource {
    #[value(alias = "webcam", alias = "cam")]
    Camera,
    #[value(alias = "video", alias = "upload")]
    File,
    #[value(alias = "display", alias = "screen-share")]
    Screen,
    #[value(alias = "test", alias = "synthetic")]
    TestPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AudioSource {
    #[value(alias = "microphone")]
    Mic,
    #[value(alias = "tab", alias = "loopback")]
    System,
    #[value(alias = "music", alias = "file")]
    Track,
    #[value(alias = "off")]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MirrorMode {
    Auto,
    On,
    Off,
}

impl MirrorMode {
    /// Cameras face the user, so they mirror by default; files and screens do not.
    pub fn resolve(self, video: VideoSource) -> bool {
        match self {
            Self::On => true,
            Self::Off => false,
            Self::Auto => matches!(video, VideoSource::Camera),
        }
    }
}

pub fn parse_capture_size(raw: &str) -> Option<(usize, usize)> {
    let (w, h) = raw.trim().to_ascii_lowercase().split_once('x').map(|(w, h)| {
        (w.trim().parse::<usize>(), h.trim().parse::<usize>())
    })?;
    match (w, h) {
        (Ok(w), Ok(h)) if (2..=7680).contains(&w) && (2..=4320).contains(&h) => Some((w, h)),
        _ => None,
    }
}

/// Values the render tick reads fresh every frame. Input handlers only ever edit this struct;
/// the renderer never sees a half-applied change.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub palette: String,
    pub cell_size: i32,
    pub color_mode: ColorMode,
    pub brightness_boost: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            palette: DEFAULT_PALETTE.to_string(),
            cell_size: DEFAULT_CELL_SIZE,
            color_mode: ColorMode::Dynamic,
            brightness_boost: 0,
        }
    }
}

impl Settings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            palette: cfg.palette.clone(),
            cell_size: cfg.cell_size,
            color_mode: cfg.color_mode,
            brightness_boost: cfg.brightness.clamp(-BRIGHTNESS_LIMIT, BRIGHTNESS_LIMIT),
        }
    }

    pub fn step_cell_size(&mut self, delta: i32) {
        let base = if self.cell_size > 0 {
            self.cell_size
        } else {
            DEFAULT_CELL_SIZE
        };
        self.cell_size = base.saturating_add(delta).clamp(MIN_CELL_SIZE, MAX_CELL_SIZE);
    }

    pub fn step_brightness(&mut self, delta: i32) {
        self.brightness_boost =
            self.brightness_boost.saturating_add(delta).clamp(-BRIGHTNESS_LIMIT, BRIGHTNESS_LIMIT);
    }
}
