//! Fixed-frequency sine oscillator

use std::f64::consts::TAU;

/// Sine oscillator with a running phase accumulator
///
/// Changing the frequency keeps the current phase, so the waveform has no
/// discontinuity at the switch.
pub struct SineGenerator {
    frequency: f64,
    sample_rate: f64,
    phase: f64,
}

impl SineGenerator {
    pub fn new(frequency: f64, sample_rate: f64) -> Self {
        Self {
            frequency,
            sample_rate,
            phase: 0.0,
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        let sample = self.phase.sin();
        self.phase += TAU * self.frequency / self.sample_rate;
        if self.phase >= TAU {
            self.phase -= TAU;
        }
        sample
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Set the frequency in Hz; values below 1e-8 Hz are ignored
    pub fn set_frequency(&mut self, frequency: f64) {
        if frequency < 1e-8 || !frequency.is_finite() {
            return;
        }
        self.frequency = frequency;
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Set the sample rate; restarts the waveform at phase zero
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.phase = 0.0;
    }
}

impl Default for SineGenerator {
    fn default() -> Self {
        Self::new(1000.0, 48000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_matches_closed_form() {
        let mut sine = SineGenerator::new(1000.0, 48000.0);
        for n in 0..4800 {
            let expected = (2.0 * PI * 1000.0 * n as f64 / 48000.0).sin();
            assert!((sine.next_sample() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_frequency_change_is_continuous() {
        let mut sine = SineGenerator::new(440.0, 48000.0);
        let mut last = 0.0;
        for _ in 0..1234 {
            last = sine.next_sample();
        }

        sine.set_frequency(880.0);
        let next = sine.next_sample();

        // Largest possible step at 880 Hz is 2π·880/48000 ≈ 0.115
        assert!((next - last).abs() < 0.12);
    }

    #[test]
    fn test_ignores_tiny_frequency() {
        let mut sine = SineGenerator::default();
        sine.set_frequency(0.0);
        assert_eq!(sine.frequency(), 1000.0);
        sine.set_frequency(f64::NAN);
        assert_eq!(sine.frequency(), 1000.0);
    }

    #[test]
    fn test_sample_rate_restarts_phase() {
        let mut sine = SineGenerator::default();
        for _ in 0..17 {
            sine.next_sample();
        }
        sine.set_sample_rate(96000.0);
        assert_eq!(sine.next_sample(), 0.0);
        assert_eq!(sine.sample_rate(), 96000.0);
    }
}
