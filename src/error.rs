use std::path::PathBuf;
use thiserror::Error;

/// Failures while opening a frame source. The render loop never sees these: the app reports
/// them on the start screen and stays idle.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("ffmpeg not found in PATH (install ffmpeg or use --video test-pattern)")]
    FfmpegMissing,
    #[error("failed to run ffmpeg: {0}")]
    FfmpegProbe(#[source] std::io::Error),
    #[error("spawn ffmpeg for {what}: {source}")]
    Spawn {
        what: String,
        #[source]
        source: std::io::Error,
    },
    #[error("ffmpeg stdout unavailable")]
    NoStdout,
    #[error("video file not found: {0}")]
    MissingFile(PathBuf),
    #[error("--video file requires --input <path>")]
    NoInputPath,
    #[error("invalid capture size '{0}' (expected WxH, e.g. 960x540)")]
    InvalidCaptureSize(String),
    #[error("{0} capture is not supported on this platform")]
    UnsupportedPlatform(&'static str),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no input device matching: {0}")]
    NoMatchingDevice(String),
    #[error("no default {0} device found")]
    NoDefaultDevice(&'static str),
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),
    #[error("{context}: {message}")]
    Backend { context: &'static str, message: String },
    #[error("track {}: {reason}", path.display())]
    Track { path: PathBuf, reason: String },
    #[error("--audio track requires --track <file.wav>")]
    NoTrackPath,
    #[error("{0}")]
    Unsupported(&'static str),
}

impl AudioError {
    pub(crate) fn backend(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Backend {
            context,
            message: err.to_string(),
        }
    }
}
