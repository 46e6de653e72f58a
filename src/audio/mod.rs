mod analyser;
mod capture;

pub use analyser::{AnalyserTap, BIN_COUNT, FFT_SIZE, FrequencyTap, magnitude_to_byte};
pub use capture::{AudioSystem, TrackPlayer, list_input_devices, read_wav_mono};

/// Number of lowest bins averaged into the bass reading.
pub const BASS_BINS: usize = 5;

/// Audio readings for one tick. Never carried over between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioSnapshot {
    /// Mean byte magnitude over every bin, 0..255.
    pub volume: f32,
    /// Mean byte magnitude over the lowest [`BASS_BINS`] bins, 0..255.
    pub bass_energy: f32,
}

impl AudioSnapshot {
    pub const SILENT: Self = Self {
        volume: 0.0,
        bass_energy: 0.0,
    };

    pub fn new(volume: f32, bass_energy: f32) -> Self {
        Self {
            volume: volume.clamp(0.0, 255.0),
            bass_energy: bass_energy.clamp(0.0, 255.0),
        }
    }

    pub fn volume_norm(&self) -> f32 {
        (self.volume / 255.0).clamp(0.0, 1.0)
    }

    pub fn bass_norm(&self) -> f32 {
        (self.bass_energy / 255.0).clamp(0.0, 1.0)
    }
}

pub fn mean_volume(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    sum as f32 / bins.len() as f32
}

pub fn bass_energy(bins: &[u8]) -> f32 {
    mean_volume(&bins[..bins.len().min(BASS_BINS)])
}

/// Scalar features over an optional analysis tap. Without a tap every reading is zero.
pub struct AudioExtractor {
    tap: Option<Box<dyn FrequencyTap>>,
    bins: Vec<u8>,
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioExtractor {
    pub fn new() -> Self {
        Self {
            tap: None,
            bins: Vec::new(),
        }
    }

    pub fn with_tap(tap: Box<dyn FrequencyTap>) -> Self {
        let mut ex = Self::new();
        ex.attach(tap);
        ex
    }

    pub fn attach(&mut self, tap: Box<dyn FrequencyTap>) {
        self.bins = vec![0; tap.bin_count()];
        self.tap = Some(tap);
    }

    pub fn detach(&mut self) -> Option<Box<dyn FrequencyTap>> {
        self.bins.clear();
        self.tap.take()
    }

    pub fn has_tap(&self) -> bool {
        self.tap.is_some()
    }

    /// Reads the tap once and returns the mean over all bins.
    pub fn volume(&mut self) -> f32 {
        if !self.refresh() {
            return 0.0;
        }
        mean_volume(&self.bins)
    }

    /// Reads the tap once and returns the mean over the lowest bins.
    pub fn bass_energy(&mut self) -> f32 {
        if !self.refresh() {
            return 0.0;
        }
        bass_energy(&self.bins)
    }

    /// Both readings from a single tap read. Use this once per tick.
    pub fn snapshot(&mut self) -> AudioSnapshot {
        if !self.refresh() {
            return AudioSnapshot::SILENT;
        }
        AudioSnapshot::new(mean_volume(&self.bins), bass_energy(&self.bins))
    }

    fn refresh(&mut self) -> bool {
        let Some(tap) = self.tap.as_mut() else {
            return false;
        };
        tap.byte_frequency_data(&mut self.bins);
        true
    }
}
