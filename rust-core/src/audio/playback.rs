//! Playback side of the audio callback
//!
//! Generates the test signal, scales it by the output volume and writes it
//! to every output channel. The mono reference (what was actually played)
//! is handed back to the caller for the internal-reference capture mode.

use crate::config::AudioConfig;
use crate::generators::{GeneratorType, SignalGenerator};
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

/// Live playback settings
///
/// Control threads write, the audio callback reads. No locks, no
/// allocations.
#[derive(Debug)]
pub struct PlaybackControls {
    generator: AtomicU8,
    /// f64 bits
    volume: AtomicU64,
    /// f64 bits
    sine_frequency: AtomicU64,
    /// Sweep period in samples; follows the analysis length
    sweep_samples: AtomicUsize,
}

impl PlaybackControls {
    pub fn new(
        generator: GeneratorType,
        volume: f64,
        sine_frequency: f64,
        sweep_samples: usize,
    ) -> Self {
        let controls = Self {
            generator: AtomicU8::new(generator as u8),
            volume: AtomicU64::new(0),
            sine_frequency: AtomicU64::new(sine_frequency.to_bits()),
            sweep_samples: AtomicUsize::new(sweep_samples),
        };
        controls.set_volume(volume);
        controls
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(
            config.generator,
            config.output_volume,
            config.sine_frequency,
            config.analysis_samples,
        )
    }

    #[inline]
    pub fn generator(&self) -> GeneratorType {
        GeneratorType::from_u8(self.generator.load(Ordering::Acquire))
    }

    pub fn set_generator(&self, generator: GeneratorType) {
        self.generator.store(generator as u8, Ordering::Release);
    }

    #[inline]
    pub fn volume(&self) -> f64 {
        f64::from_bits(self.volume.load(Ordering::Acquire))
    }

    /// Set the output gain, clamped to 0..=1 (NaN mutes)
    pub fn set_volume(&self, volume: f64) {
        let clamped = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.volume.store(clamped.to_bits(), Ordering::Release);
    }

    #[inline]
    pub fn sine_frequency(&self) -> f64 {
        f64::from_bits(self.sine_frequency.load(Ordering::Acquire))
    }

    pub fn set_sine_frequency(&self, frequency: f64) {
        self.sine_frequency.store(frequency.to_bits(), Ordering::Release);
    }

    #[inline]
    pub fn sweep_samples(&self) -> usize {
        self.sweep_samples.load(Ordering::Acquire)
    }

    /// Sweep period for running stages; applied at their next period
    pub fn set_sweep_samples(&self, samples: usize) {
        self.sweep_samples.store(samples.max(1), Ordering::Release);
    }
}

impl Default for PlaybackControls {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

/// Runs the signal generators inside the output callback
pub struct PlaybackStage {
    generator: SignalGenerator,
    controls: Arc<PlaybackControls>,
    channels: usize,
}

impl PlaybackStage {
    pub fn new(
        generator: SignalGenerator,
        controls: Arc<PlaybackControls>,
        channels: usize,
    ) -> Self {
        Self {
            generator,
            controls,
            channels: channels.max(1),
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Restart the sweep at the next rendered sample
    #[inline]
    pub fn sync(&mut self) {
        self.generator.sync();
    }

    /// Fill one interleaved output period
    ///
    /// Writes the mono reference for every frame into `reference`, which
    /// must hold at least `output.len() / channels` samples. Returns the
    /// number of frames rendered.
    pub fn render(&mut self, output: &mut [f32], reference: &mut [f32]) -> usize {
        let sweep_samples = self.controls.sweep_samples();
        if sweep_samples != self.generator.sweep_samples() {
            self.generator.set_sweep_samples(sweep_samples);
        }

        let generator = self.controls.generator();
        if generator != self.generator.active() {
            self.generator.set_active(generator);
        }
        self.generator.set_sine_frequency(self.controls.sine_frequency());
        let volume = self.controls.volume();

        let frames = (output.len() / self.channels).min(reference.len());
        for (frame, r) in output
            .chunks_exact_mut(self.channels)
            .take(frames)
            .zip(reference.iter_mut())
        {
            let sample = (self.generator.next_sample() * volume) as f32;
            frame.fill(sample);
            *r = sample;
        }

        frames
    }
}
