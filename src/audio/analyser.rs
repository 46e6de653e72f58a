use ringbuf::HeapCons;
use ringbuf::traits::Consumer as _;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

pub const FFT_SIZE: usize = 256;
pub const BIN_COUNT: usize = FFT_SIZE / 2;

const SMOOTHING: f32 = 0.8;
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// A frequency-domain view of an audio stream, refreshed whenever it is read.
pub trait FrequencyTap {
    fn bin_count(&self) -> usize;

    /// Fills `out` with byte magnitudes (0..255) for the most recent analysis window.
    /// `out` shorter than `bin_count()` receives the lowest bins only.
    fn byte_frequency_data(&mut self, out: &mut [u8]);
}

/// Byte spectrum analyser over the latest `FFT_SIZE` mono samples.
///
/// Mirrors the usual browser analyser node: Blackman window, magnitudes scaled by `1/N`,
/// exponential smoothing across reads, then decibels mapped linearly from
/// `[-100 dB, -30 dB]` onto `0..=255`.
pub struct AnalyserTap {
    input: Option<HeapCons<f32>>,
    window: Vec<f32>,
    ring: Vec<f32>,
    write_pos: usize,
    fft: Arc<dyn Fft<f32>>,
    fft_buf: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl AnalyserTap {
    /// Tap fed by an audio callback through a ring buffer.
    pub fn new(input: HeapCons<f32>) -> Self {
        let mut tap = Self::detached();
        tap.input = Some(input);
        tap
    }

    /// Tap with no live input; samples arrive through [`AnalyserTap::push_samples`].
    pub fn detached() -> Self {
        let n = FFT_SIZE;
        let window = (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * PI * t).cos() + 0.08 * (4.0 * PI * t).cos()
            })
            .collect();
        let mut planner = FftPlanner::<f32>::new();
        Self {
            input: None,
            window,
            ring: vec![0.0; n],
            write_pos: 0,
            fft: planner.plan_fft_forward(n),
            fft_buf: vec![Complex { re: 0.0, im: 0.0 }; n],
            smoothed: vec![0.0; BIN_COUNT],
        }
    }

    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            self.push(s);
        }
    }

    fn push(&mut self, s: f32) {
        self.ring[self.write_pos] = if s.is_finite() { s } else { 0.0 };
        self.write_pos = (self.write_pos + 1) % self.ring.len();
    }

    fn drain_input(&mut self) {
        let Some(mut input) = self.input.take() else {
            return;
        };
        while let Some(s) = input.try_pop() {
            self.push(s);
        }
        self.input = Some(input);
    }

    fn analyse(&mut self) {
        let n = FFT_SIZE;
        for i in 0..n {
            let s = self.ring[(self.write_pos + i) % n];
            self.fft_buf[i] = Complex {
                re: s * self.window[i],
                im: 0.0,
            };
        }
        self.fft.process(&mut self.fft_buf);

        let scale = 1.0 / n as f32;
        for (k, acc) in self.smoothed.iter_mut().enumerate() {
            let c = self.fft_buf[k];
            let mag = (c.re * c.re + c.im * c.im).sqrt() * scale;
            *acc = SMOOTHING * *acc + (1.0 - SMOOTHING) * mag;
        }
    }
}

impl FrequencyTap for AnalyserTap {
    fn bin_count(&self) -> usize {
        BIN_COUNT
    }

    fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.drain_input();
        self.analyse();
        for (dst, &mag) in out.iter_mut().zip(self.smoothed.iter()) {
            *dst = magnitude_to_byte(mag);
        }
    }
}

pub fn magnitude_to_byte(mag: f32) -> u8 {
    if mag.is_nan() || mag <= 0.0 {
        return 0;
    }
    let db = 20.0 * mag.log10();
    let scaled = (255.0 / (MAX_DB - MIN_DB)) * (db - MIN_DB);
    scaled.floor().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decibel_mapping_bounds() {
        assert_eq!(magnitude_to_byte(0.0), 0);
        assert_eq!(magnitude_to_byte(f32::NAN), 0);
        // -100 dB and below map to zero, -30 dB and above saturate.
        assert_eq!(magnitude_to_byte(1e-5), 0);
        assert_eq!(magnitude_to_byte(1.0), 255);
        // -65 dB sits halfway.
        let mid = magnitude_to_byte(10f32.powf(-65.0 / 20.0));
        assert!((126..=128).contains(&mid), "mid={mid}");
    }
}
