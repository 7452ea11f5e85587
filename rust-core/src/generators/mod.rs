//! Playback signal generators
//!
//! Each generator produces one sample per call and is only ever driven from
//! the playback side of the audio callback.

pub mod noise;
pub mod sine;
pub mod sweep;

pub use noise::{PinkNoise, WhiteNoise};
pub use sine::SineGenerator;
pub use sweep::SweepGenerator;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Selects the playback source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum GeneratorType {
    #[default]
    Silence = 0,
    WhiteNoise = 1,
    PinkNoise = 2,
    Sine = 3,
    Sweep = 4,
}

impl GeneratorType {
    pub const ALL: [GeneratorType; 5] = [
        GeneratorType::Silence,
        GeneratorType::WhiteNoise,
        GeneratorType::PinkNoise,
        GeneratorType::Sine,
        GeneratorType::Sweep,
    ];

    /// Inverse of `as u8`; unknown values map to silence
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => GeneratorType::WhiteNoise,
            2 => GeneratorType::PinkNoise,
            3 => GeneratorType::Sine,
            4 => GeneratorType::Sweep,
            _ => GeneratorType::Silence,
        }
    }
}

impl fmt::Display for GeneratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeneratorType::Silence => "Silence",
            GeneratorType::WhiteNoise => "White Noise",
            GeneratorType::PinkNoise => "Pink Noise",
            GeneratorType::Sine => "Sine",
            GeneratorType::Sweep => "Sweep",
        };
        f.write_str(name)
    }
}

/// All playback generators plus the active selection
pub struct SignalGenerator {
    active: GeneratorType,
    sample_rate: f64,
    white: WhiteNoise,
    pink: PinkNoise,
    sine: SineGenerator,
    sweep: SweepGenerator,
}

impl SignalGenerator {
    /// Create generators for `sample_rate`; the sweep spans one analysis frame
    pub fn new(sample_rate: f64, analysis_samples: usize, sine_frequency: f64) -> Self {
        let mut sine = SineGenerator::new(1000.0, sample_rate);
        sine.set_frequency(sine_frequency);

        Self {
            active: GeneratorType::Silence,
            sample_rate,
            white: WhiteNoise::new(),
            pink: PinkNoise::new(),
            sine,
            sweep: SweepGenerator::new(sample_rate, analysis_samples as f64 / sample_rate),
        }
    }

    /// Replace the noise sources with seeded ones
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.white = WhiteNoise::with_seed(seed);
        self.pink = PinkNoise::with_seed(seed.wrapping_add(1));
        self
    }

    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        match self.active {
            GeneratorType::Silence => 0.0,
            GeneratorType::WhiteNoise => self.white.next_sample(),
            GeneratorType::PinkNoise => self.pink.next_sample(),
            GeneratorType::Sine => self.sine.next_sample(),
            GeneratorType::Sweep => self.sweep.next_sample(),
        }
    }

    pub fn active(&self) -> GeneratorType {
        self.active
    }

    pub fn set_active(&mut self, generator: GeneratorType) {
        self.active = generator;
    }

    pub fn set_sine_frequency(&mut self, frequency: f64) {
        self.sine.set_frequency(frequency);
    }

    /// Sweep period in samples
    pub fn sweep_samples(&self) -> usize {
        self.sweep.period()
    }

    /// Stretch the sweep to span `samples` (one analysis frame); restarts it
    pub fn set_sweep_samples(&mut self, samples: usize) {
        self.sweep.set_length(samples as f64 / self.sample_rate);
    }

    /// Restart the sweep so it lines up with the start of a capture frame
    pub fn sync(&mut self) {
        self.sweep.reset();
    }
}
