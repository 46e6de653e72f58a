use super::{FrameSource, FrameView};
use crate::config::VideoSource;
use crate::error::SourceError;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

const CAPTURE_FPS: u32 = 30;

pub fn ensure_ffmpeg_available() -> Result<(), SourceError> {
    match Command::new("ffmpeg")
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(SourceError::FfmpegMissing),
        Err(err) => Err(SourceError::FfmpegProbe(err)),
    }
}

/// Arguments that make ffmpeg emit `width x height` raw RGBA frames on stdout.
pub fn ffmpeg_args(
    kind: VideoSource,
    input: Option<&str>,
    width: usize,
    height: usize,
) -> Result<Vec<String>, SourceError> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error", "-nostdin"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let fps = CAPTURE_FPS.to_string();
    let fps = fps.as_str();

    match kind {
        VideoSource::File => {
            let path = input.ok_or(SourceError::NoInputPath)?;
            if !Path::new(path).exists() {
                return Err(SourceError::MissingFile(path.into()));
            }
            // Loop forever at native speed.
            args.extend(["-stream_loop", "-1", "-re", "-i", path].map(String::from));
        }
        VideoSource::Camera => {
            if cfg!(target_os = "linux") {
                let dev = input.unwrap_or("/dev/video0");
                args.extend(["-f", "v4l2", "-framerate", fps, "-i", dev].map(String::from));
            } else if cfg!(target_os = "macos") {
                let dev = format!("{}:none", input.unwrap_or("0"));
                args.extend(["-f", "avfoundation", "-framerate", fps, "-i", dev.as_str()].map(String::from));
            } else if cfg!(target_os = "windows") {
                let dev = input.ok_or(SourceError::UnsupportedPlatform(
                    "camera without --input <device name>",
                ))?;
                let dev = format!("video={dev}");
                args.extend(["-f", "dshow", "-i", dev.as_str()].map(String::from));
            } else {
                return Err(SourceError::UnsupportedPlatform("camera"));
            }
        }
        VideoSource::Screen => {
            if cfg!(target_os = "linux") {
                let display = input
                    .map(str::to_string)
                    .or_else(|| std::env::var("DISPLAY").ok())
                    .unwrap_or_else(|| ":0.0".to_string());
                args.extend(["-f", "x11grab", "-framerate", fps, "-i", display.as_str()].map(String::from));
            } else if cfg!(target_os = "macos") {
                let dev = format!("{}:none", input.unwrap_or("Capture screen 0"));
                args.extend(
                    ["-f", "avfoundation", "-capture_cursor", "1", "-framerate", fps, "-i", dev.as_str()]
                        .map(String::from),
                );
            } else if cfg!(target_os = "windows") {
                let target = input.unwrap_or("desktop");
                args.extend(["-f", "gdigrab", "-framerate", fps, "-i", target].map(String::from));
            } else {
                return Err(SourceError::UnsupportedPlatform("screen"));
            }
        }
        VideoSource::TestPattern => {
            return Err(SourceError::UnsupportedPlatform("ffmpeg test pattern"));
        }
    }

    let scale = format!("scale={width}:{height}");
    args.extend(["-an", "-vf", scale.as_str(), "-pix_fmt", "rgba", "-f", "rawvideo", "-"].map(String::from));
    Ok(args)
}

struct SharedFrame {
    pixels: Vec<u8>,
    seq: u64,
}

/// Frames decoded by an ffmpeg child process. A reader thread fills a back buffer and swaps it
/// into a shared slot; [`FrameSource::frame`] swaps the slot into the front buffer, so no frame
/// is copied.
pub struct FfmpegSource {
    kind: VideoSource,
    label: String,
    width: usize,
    height: usize,
    child: Child,
    shared: Arc<Mutex<SharedFrame>>,
    ready: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    front: Vec<u8>,
    seen_seq: u64,
    reader: Option<thread::JoinHandle<()>>,
}

impl FfmpegSource {
    pub fn spawn(
        kind: VideoSource,
        input: Option<&str>,
        width: usize,
        height: usize,
    ) -> Result<Self, SourceError> {
        let args = ffmpeg_args(kind, input, width, height)?;
        ensure_ffmpeg_available()?;

        let label = match (kind, input) {
            (VideoSource::File, Some(path)) => Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string()),
            (_, Some(dev)) => format!("{kind:?} {dev}").to_lowercase(),
            (_, None) => format!("{kind:?}").to_lowercase(),
        };

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SourceError::Spawn {
                what: label.clone(),
                source,
            })?;
        log::info!("video: ffmpeg {}", args.join(" "));

        let stdout = child.stdout.take().ok_or(SourceError::NoStdout)?;
        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    log::warn!("ffmpeg: {line}");
                }
            });
        }

        let frame_len = width * height * 4;
        let shared = Arc::new(Mutex::new(SharedFrame {
            pixels: vec![0; frame_len],
            seq: 0,
        }));
        let ready = Arc::new(AtomicBool::new(false));
        let alive = Arc::new(AtomicBool::new(true));

        let reader = {
            let shared = Arc::clone(&shared);
            let ready = Arc::clone(&ready);
            let alive = Arc::clone(&alive);
            let label = label.clone();
            thread::spawn(move || {
                read_frames(stdout, frame_len, &shared, &ready);
                alive.store(false, Ordering::Relaxed);
                log::info!("video: '{label}' stream ended");
            })
        };

        Ok(Self {
            kind,
            label,
            width,
            height,
            child,
            shared,
            ready,
            alive,
            front: vec![0; frame_len],
            seen_seq: 0,
            reader: Some(reader),
        })
    }
}

fn read_frames(
    mut stdout: ChildStdout,
    frame_len: usize,
    shared: &Mutex<SharedFrame>,
    ready: &AtomicBool,
) {
    let mut back = vec![0u8; frame_len];
    loop {
        if let Err(err) = stdout.read_exact(&mut back) {
            if err.kind() != io::ErrorKind::UnexpectedEof {
                log::warn!("video: read frame: {err}");
            }
            return;
        }
        let Ok(mut slot) = shared.lock() else {
            return;
        };
        std::mem::swap(&mut slot.pixels, &mut back);
        slot.seq = slot.seq.wrapping_add(1);
        drop(slot);
        ready.store(true, Ordering::Release);
    }
}

impl FrameSource for FfmpegSource {
    fn kind(&self) -> VideoSource {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn frame(&mut self) -> Option<FrameView<'_>> {
        if !self.is_ready() {
            return None;
        }
        if let Ok(mut slot) = self.shared.lock() {
            if slot.seq != self.seen_seq {
                std::mem::swap(&mut slot.pixels, &mut self.front);
                self.seen_seq = slot.seq;
            }
        }
        Some(FrameView {
            width: self.width,
            height: self.height,
            rgba: &self.front,
        })
    }

    fn has_ended(&self) -> bool {
        !self.alive.load(Ordering::Relaxed)
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(h) = self.reader.take() {
            let _ = h.join();
        }
    }
}
