use super::analyser::AnalyserTap;
use crate::config::AudioSource;
use crate::error::AudioError;
use anyhow::{Context, bail};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use ringbuf::traits::{Producer as _, Split as _};
use ringbuf::{HeapProd, HeapRb};
use std::io::{self, Write};
use std::path::Path;

#[cfg(target_os = "macos")]
use screencapturekit::cm::AudioBufferList;
#[cfg(target_os = "macos")]
use screencapturekit::prelude::*;

pub fn list_input_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let devices = host.input_devices().context("enumerate input devices")?;

    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let mut out = io::stdout();
    writeln!(out, "Input devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        let marker = if default_name.as_deref() == Some(name.as_str()) {
            " (default)"
        } else {
            ""
        };
        writeln!(out, "  - {name}{marker}")?;
    }
    Ok(())
}

enum AudioBackend {
    Cpal(cpal::Stream),
    #[cfg(target_os = "macos")]
    ScreenCaptureKit(SCStream),
}

/// Owns the live audio stream feeding an [`AnalyserTap`]. Dropping it stops capture/playback.
pub struct AudioSystem {
    backend: AudioBackend,
    label: String,
    pub sample_rate_hz: u32,
}

impl AudioSystem {
    pub fn open(
        source: AudioSource,
        device_query: Option<&str>,
        track: Option<&Path>,
    ) -> Result<(Self, AnalyserTap), AudioError> {
        match source {
            AudioSource::Mic => Self::open_mic(device_query),
            AudioSource::System => Self::open_system(),
            AudioSource::Track => {
                let path = track.ok_or(AudioError::NoTrackPath)?;
                Self::open_track(path)
            }
            AudioSource::None => Err(AudioError::Unsupported("audio analysis disabled")),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    fn open_mic(device_query: Option<&str>) -> Result<(Self, AnalyserTap), AudioError> {
        let host = cpal::default_host();
        let device = select_mic_input_device(&host, device_query)?;
        let supported = device
            .default_input_config()
            .map_err(|e| AudioError::backend("get default input config", e))?;
        let sample_rate_hz = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.config();

        let (mut prod, cons) = analysis_ring(sample_rate_hz).split();
        let err_fn = |err| log::warn!("audio input stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            ),
            SampleFormat::I16 => device.build_input_stream(
                &config,
                move |data: &[i16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            ),
            SampleFormat::U16 => device.build_input_stream(
                &config,
                move |data: &[u16], _| push_interleaved(data, channels, &mut prod),
                err_fn,
                None,
            ),
            fmt => return Err(AudioError::UnsupportedFormat(format!("{fmt:?}"))),
        }
        .map_err(|e| AudioError::backend("build input stream", e))?;

        stream
            .play()
            .map_err(|e| AudioError::backend("start input stream", e))?;

        let label = device.name().unwrap_or_else(|_| "microphone".to_string());
        log::info!("audio: microphone '{label}' at {sample_rate_hz} Hz, {channels} ch");
        Ok((
            Self {
                backend: AudioBackend::Cpal(stream),
                label,
                sample_rate_hz,
            },
            AnalyserTap::new(cons),
        ))
    }

    fn open_track(path: &Path) -> Result<(Self, AnalyserTap), AudioError> {
        let (track_rate, samples) = read_wav_mono(path).map_err(|e| AudioError::Track {
            path: path.to_path_buf(),
            reason: format!("{e:#}"),
        })?;

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDefaultDevice("output"))?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::backend("get default output config", e))?;
        let sample_rate_hz = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.config();

        let player = TrackPlayer::new(samples, track_rate, sample_rate_hz);
        let (prod, cons) = analysis_ring(sample_rate_hz).split();

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_track_stream::<f32>(&device, &config, player, prod),
            SampleFormat::I16 => build_track_stream::<i16>(&device, &config, player, prod),
            SampleFormat::U16 => build_track_stream::<u16>(&device, &config, player, prod),
            fmt => return Err(AudioError::UnsupportedFormat(format!("{fmt:?}"))),
        }
        .map_err(|e| AudioError::backend("build output stream", e))?;

        stream
            .play()
            .map_err(|e| AudioError::backend("start output stream", e))?;

        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "track".to_string());
        log::info!("audio: looping track '{label}' ({track_rate} Hz -> {sample_rate_hz} Hz)");
        Ok((
            Self {
                backend: AudioBackend::Cpal(stream),
                label,
                sample_rate_hz,
            },
            AnalyserTap::new(cons),
        ))
    }

    fn open_system() -> Result<(Self, AnalyserTap), AudioError> {
        #[cfg(not(target_os = "macos"))]
        {
            Err(AudioError::Unsupported(
                "--audio system is only supported on macOS; use --audio mic with a loopback device",
            ))
        }

        #[cfg(target_os = "macos")]
        {
            let sample_rate_hz = 48_000u32;
            let (prod, cons) = analysis_ring(sample_rate_hz).split();
            let handler = SystemAudioHandler {
                prod: std::sync::Mutex::new(prod),
            };
            let stream = start_system_audio_stream(handler)?;
            log::info!("audio: system capture at {sample_rate_hz} Hz");
            Ok((
                Self {
                    backend: AudioBackend::ScreenCaptureKit(stream),
                    label: "system".to_string(),
                    sample_rate_hz,
                },
                AnalyserTap::new(cons),
            ))
        }
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        match &mut self.backend {
            // The cpal stream stops when it is dropped with us.
            AudioBackend::Cpal(_stream) => {}
            #[cfg(target_os = "macos")]
            AudioBackend::ScreenCaptureKit(stream) => {
                let _ = stream.stop_capture();
            }
        }
        log::info!("audio: closed '{}'", self.label);
    }
}

fn analysis_ring(sample_rate_hz: u32) -> HeapRb<f32> {
    HeapRb::<f32>::new((sample_rate_hz as usize / 2).max(super::FFT_SIZE * 4))
}

fn select_mic_input_device(
    host: &cpal::Host,
    device_query: Option<&str>,
) -> Result<cpal::Device, AudioError> {
    let Some(want) = device_query.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty())
    else {
        return host
            .default_input_device()
            .ok_or(AudioError::NoDefaultDevice("input"));
    };

    let devices = host
        .input_devices()
        .map_err(|e| AudioError::backend("enumerate input devices", e))?;
    for dev in devices {
        let matches = dev
            .name()
            .map(|n| n.to_lowercase().contains(&want))
            .unwrap_or(false);
        if matches {
            return Ok(dev);
        }
    }
    Err(AudioError::NoMatchingDevice(want))
}

fn push_interleaved<T: Sample<Float = f32> + Copy>(
    data: &[T],
    channels: usize,
    prod: &mut HeapProd<f32>,
) {
    let channels = channels.max(1);
    for frame in data.chunks(channels) {
        let acc: f32 = frame.iter().map(|s| s.to_float_sample()).sum();
        let _ = prod.try_push(acc / frame.len() as f32);
    }
}

fn build_track_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut player: TrackPlayer,
    mut prod: HeapProd<f32>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = (config.channels as usize).max(1);
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let s = player.next_sample();
                let _ = prod.try_push(s);
                for out in frame.iter_mut() {
                    *out = T::from_sample(s);
                }
            }
        },
        |err| log::warn!("track output stream error: {err}"),
        None,
    )
}

/// Looping mono sample player with linear-interpolated rate conversion.
pub struct TrackPlayer {
    samples: Vec<f32>,
    step: f64,
    pos: f64,
}

impl TrackPlayer {
    pub fn new(samples: Vec<f32>, source_rate_hz: u32, output_rate_hz: u32) -> Self {
        let step = source_rate_hz.max(1) as f64 / output_rate_hz.max(1) as f64;
        Self {
            samples,
            step,
            pos: 0.0,
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        let n = self.samples.len();
        if n == 0 {
            return 0.0;
        }
        let i = self.pos as usize;
        let frac = (self.pos - i as f64) as f32;
        let a = self.samples[i % n];
        let b = self.samples[(i + 1) % n];
        self.pos += self.step;
        if self.pos >= n as f64 {
            self.pos -= n as f64;
        }
        a + (b - a) * frac
    }
}

/// Decodes a RIFF/WAVE file (PCM 16/24-bit or IEEE float 32-bit) to mono `f32`.
pub fn read_wav_mono(path: &Path) -> anyhow::Result<(u32, Vec<f32>)> {
    let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        bail!("not a RIFF/WAVE file");
    }

    let le16 = |o: usize| u16::from_le_bytes([bytes[o], bytes[o + 1]]);
    let le32 = |o: usize| u32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]);

    let mut format: Option<(u16, u16, u32, u16)> = None;
    let mut data: Option<&[u8]> = None;
    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = le32(pos + 4) as usize;
        let start = pos + 8;
        let end = start.saturating_add(size).min(bytes.len());
        match id {
            b"fmt " if size >= 16 && start + 16 <= bytes.len() => {
                format = Some((le16(start), le16(start + 2), le32(start + 4), le16(start + 14)));
            }
            b"data" => data = Some(&bytes[start..end]),
            _ => {}
        }
        pos = start.saturating_add(size).saturating_add(size % 2);
    }

    let (audio_format, channels, sample_rate, bits) = format.context("missing fmt chunk")?;
    let data = data.context("missing data chunk")?;
    if channels == 0 {
        bail!("invalid channel count");
    }
    // WAVE_FORMAT_EXTENSIBLE carries the real format in its sub-format GUID; the width decides.
    let float = match audio_format {
        1 => false,
        3 => true,
        0xFFFE => bits == 32,
        other => bail!("unsupported wav format tag {other}"),
    };

    let decode: fn(&[u8]) -> f32 = match (float, bits) {
        (false, 16) => |b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32_768.0,
        (false, 24) => |b| (i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8) as f32 / 8_388_608.0,
        (true, 32) => |b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        _ => bail!("unsupported wav sample layout: float={float} bits={bits}"),
    };

    let width = bits as usize / 8;
    let ch = channels as usize;
    let samples = data
        .chunks_exact(width * ch)
        .map(|frame| {
            let acc: f32 = frame.chunks_exact(width).map(decode).sum();
            (acc / ch as f32).clamp(-1.0, 1.0)
        })
        .collect();
    Ok((sample_rate, samples))
}

#[cfg(target_os = "macos")]
struct SystemAudioHandler {
    prod: std::sync::Mutex<HeapProd<f32>>,
}

#[cfg(target_os = "macos")]
impl SCStreamOutputTrait for SystemAudioHandler {
    fn did_output_sample_buffer(&self, sample: CMSampleBuffer, of_type: SCStreamOutputType) {
        if !matches!(of_type, SCStreamOutputType::Audio) {
            return;
        }

        let _ = sample.make_data_ready();
        let Some(fmt) = sample.format_description() else {
            return;
        };
        if fmt.audio_is_big_endian() {
            return;
        }
        let is_float = fmt.audio_is_float();
        let bits = fmt.audio_bits_per_channel().unwrap_or(32);
        let channels = fmt.audio_channel_count().unwrap_or(2).max(1) as usize;

        let Some(abl) = sample.audio_buffer_list() else {
            return;
        };
        let Ok(mut prod) = self.prod.lock() else {
            return;
        };

        if is_float && bits == 32 {
            push_buffer_list::<f32>(&abl, channels, &mut prod, |s| s);
        } else if !is_float && bits == 16 {
            push_buffer_list::<i16>(&abl, channels, &mut prod, |s| s as f32 / 32_768.0);
        }
    }
}

#[cfg(target_os = "macos")]
fn start_system_audio_stream(
    handler: impl SCStreamOutputTrait + 'static,
) -> Result<SCStream, AudioError> {
    // Needs Screen Recording permission for the terminal application.
    let content = SCShareableContent::get()
        .map_err(|e| AudioError::backend("SCShareableContent::get (Screen Recording permission)", e))?;
    let displays = content.displays();
    let display = displays
        .first()
        .ok_or(AudioError::Unsupported("no displays found (ScreenCaptureKit)"))?;

    let filter = SCContentFilter::create()
        .with_display(display)
        .with_excluding_windows(&[])
        .build();

    // Video is unused; keep it tiny but not throttled, or audio arrives in large chunks.
    let config = SCStreamConfiguration::new()
        .with_width(2)
        .with_height(2)
        .with_queue_depth(1)
        .with_fps(60)
        .with_captures_audio(true)
        .with_sample_rate(48_000)
        .with_channel_count(2);

    let mut stream = SCStream::new(&filter, &config);
    stream.add_output_handler(handler, SCStreamOutputType::Audio);
    stream
        .start_capture()
        .map_err(|e| AudioError::backend("SCStream::start_capture", e))?;
    Ok(stream)
}

/// Downmixes interleaved (one buffer) or planar (one buffer per channel) PCM into `prod`.
#[cfg(target_os = "macos")]
fn push_buffer_list<T: Copy>(
    list: &AudioBufferList,
    channels: usize,
    prod: &mut HeapProd<f32>,
    to_f32: fn(T) -> f32,
) {
    let width = std::mem::size_of::<T>();
    let mut planes: Vec<(&[T], usize)> = Vec::new();
    for buf in list.iter() {
        let data = buf.data();
        if data.is_empty() {
            continue;
        }
        // SAFETY: ScreenCaptureKit delivers sample-aligned buffers in the advertised format.
        let samples: &[T] =
            unsafe { std::slice::from_raw_parts(data.as_ptr().cast(), data.len() / width) };
        planes.push((samples, (buf.number_channels as usize).max(1)));
        if planes.len() >= channels {
            break;
        }
    }

    match planes.as_slice() {
        [] => {}
        [(interleaved, ch)] => {
            for frame in interleaved.chunks_exact(*ch) {
                let acc: f32 = frame.iter().map(|&s| to_f32(s)).sum();
                let _ = prod.try_push((acc / *ch as f32).clamp(-1.0, 1.0));
            }
        }
        planar => {
            let frames = planar.iter().map(|(p, _)| p.len()).min().unwrap_or(0);
            for i in 0..frames {
                let acc: f32 = planar.iter().map(|(p, _)| to_f32(p[i])).sum();
                let _ = prod.try_push((acc / planar.len() as f32).clamp(-1.0, 1.0));
            }
        }
    }
}
