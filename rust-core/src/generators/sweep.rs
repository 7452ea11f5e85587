//! Logarithmic (exponential) sine sweep
//!
//! The instantaneous frequency rises geometrically from `fmin` to `fmax`
//! over `length` seconds (rounded to whole samples), then the sweep starts
//! over. See Farina,
//! "Simultaneous measurement of impulse response and distortion with a
//! swept-sine technique".

use std::f64::consts::TAU;

/// Lowest sweep frequency in Hz
pub const SWEEP_FMIN: f64 = 30.0;

pub struct SweepGenerator {
    sample_rate: f64,
    /// Sweep duration in seconds
    length: f64,
    fmin: f64,
    fmax: f64,
    /// Per-sample frequency ratio
    growth: f64,
    frequency: f64,
    phase: f64,
    /// Samples emitted since the last restart
    position: usize,
    /// Sweep period in samples
    period: usize,
}

impl SweepGenerator {
    pub fn new(sample_rate: f64, length: f64) -> Self {
        let mut sweep = Self {
            sample_rate,
            length,
            fmin: SWEEP_FMIN,
            fmax: sample_rate / 2.0,
            growth: 1.0,
            frequency: SWEEP_FMIN,
            phase: 0.0,
            position: 0,
            period: 1,
        };
        sweep.reset();
        sweep
    }

    /// Next sample; amplitude follows `sqrt(f / fmax)` so the sweep reaches
    /// unity at `fmax` and stays within [-1, 1]
    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        let amplitude = (self.frequency / self.fmax).sqrt();
        let sample = amplitude * self.phase.sin();

        self.phase += TAU * self.frequency / self.sample_rate;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
        self.frequency *= self.growth;
        self.position += 1;

        if self.position >= self.period {
            self.reset();
        }

        sample
    }

    /// Restart at `fmin` with zero phase
    pub fn reset(&mut self) {
        self.fmin = SWEEP_FMIN;
        self.fmax = self.sample_rate / 2.0;
        self.frequency = self.fmin;
        self.phase = 0.0;
        self.position = 0;

        let samples = (self.length * self.sample_rate).round();
        self.period = if samples.is_finite() && samples >= 1.0 { samples as usize } else { 1 };
        self.growth = if self.period > 1 && self.fmax > self.fmin {
            (self.fmax / self.fmin).powf(1.0 / self.period as f64)
        } else {
            1.0
        };
    }

    /// Sweep duration in seconds
    pub fn set_length(&mut self, length: f64) {
        self.length = length;
        self.reset();
    }

    /// Samples per sweep
    pub fn period(&self) -> usize {
        self.period
    }

    /// Current instantaneous frequency in Hz
    pub fn frequency(&self) -> f64 {
        self.frequency
    }
}
