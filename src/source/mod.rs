mod ffmpeg;
mod pattern;

pub use ffmpeg::{FfmpegSource, ensure_ffmpeg_available, ffmpeg_args};
pub use pattern::TestPattern;

use crate::config::VideoSource;
use crate::error::SourceError;

/// Borrowed view of the most recent RGBA frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub width: usize,
    pub height: usize,
    pub rgba: &'a [u8],
}

/// Something the downsampler can read frames from: a camera, a looping video file, a screen
/// grab, or a synthetic pattern.
pub trait FrameSource {
    fn kind(&self) -> VideoSource;

    fn label(&self) -> &str;

    /// True once at least one full frame is available.
    fn is_ready(&self) -> bool;

    /// Native pixel size of the frames this source produces.
    fn dimensions(&self) -> (usize, usize);

    /// Latest frame, or `None` when nothing is readable yet.
    fn frame(&mut self) -> Option<FrameView<'_>>;

    /// True once the source can produce no further frames.
    fn has_ended(&self) -> bool {
        false
    }
}

pub fn open_source(
    kind: VideoSource,
    input: Option<&str>,
    capture_size: (usize, usize),
) -> Result<Box<dyn FrameSource>, SourceError> {
    let (w, h) = capture_size;
    match kind {
        VideoSource::TestPattern => Ok(Box::new(TestPattern::new(w, h))),
        _ => Ok(Box::new(FfmpegSource::spawn(kind, input, w, h)?)),
    }
}
