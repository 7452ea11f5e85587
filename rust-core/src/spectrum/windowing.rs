//! Windowing functions for spectral analysis
//!
//! Applies windows to time-domain frames before the FFT to reduce spectral
//! leakage. Coefficients depend only on length and position, so they are
//! computed on the fly instead of being cached per slot.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window applied to input and reference before the forward transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFilter {
    /// Rectangular window (samples pass through unchanged)
    None,

    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    /// Sidelobe attenuation: ~53 dB
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    /// Sidelobe attenuation: ~74 dB
    #[default]
    Blackman,
}

impl WindowFilter {
    /// Coefficient at position `n` of a window with `length` samples
    #[inline]
    pub fn coefficient(&self, n: usize, length: usize) -> f64 {
        if length < 2 {
            return 1.0;
        }

        let angle = 2.0 * PI * n as f64 / (length - 1) as f64;

        match self {
            WindowFilter::None => 1.0,
            WindowFilter::Hann => 0.5 - 0.5 * angle.cos(),
            WindowFilter::Hamming => 0.54 - 0.46 * angle.cos(),
            WindowFilter::Blackman => 0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos(),
        }
    }

    /// Human readable name
    pub fn label(&self) -> &'static str {
        match self {
            WindowFilter::None => "None",
            WindowFilter::Hann => "Hann",
            WindowFilter::Hamming => "Hamming",
            WindowFilter::Blackman => "Blackman",
        }
    }
}

/// Write `input * window` into `out` without allocating
///
/// Both slices must have the same length.
pub fn apply_window_into(out: &mut [f64], input: &[f64], filter: WindowFilter) {
    debug_assert_eq!(out.len(), input.len());
    let length = input.len();

    if filter == WindowFilter::None {
        out.copy_from_slice(input);
        return;
    }

    for (n, (o, &x)) in out.iter_mut().zip(input.iter()).enumerate() {
        *o = x * filter.coefficient(n, length);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn windowed_ones(filter: WindowFilter, length: usize) -> Vec<f64> {
        let mut out = vec![0.0; length];
        apply_window_into(&mut out, &vec![1.0; length], filter);
        out
    }

    #[test]
    fn test_window_shapes() {
        let length = 161;

        let hann = windowed_ones(WindowFilter::Hann, length);
        let hamming = windowed_ones(WindowFilter::Hamming, length);
        let blackman = windowed_ones(WindowFilter::Blackman, length);

        // Symmetric
        assert!((hann[0] - hann[length - 1]).abs() < 1e-10);
        assert!((hamming[0] - hamming[length - 1]).abs() < 1e-10);
        assert!((blackman[0] - blackman[length - 1]).abs() < 1e-10);

        // Unity at the center
        let center = length / 2;
        assert!((hann[center] - 1.0).abs() < 1e-10);
        assert!((hamming[center] - 1.0).abs() < 1e-10);
        assert!((blackman[center] - 1.0).abs() < 1e-10);

        // Hamming keeps 0.08 at the edges, Blackman goes to zero
        assert!(hamming[0] > 0.07 && hamming[0] < 0.09);
        assert!(blackman[0].abs() < 1e-10);
    }

    #[test]
    fn test_apply_window_none_is_identity() {
        let input: Vec<f64> = (0..64).map(|n| n as f64 * 0.25 - 3.0).collect();
        let mut out = vec![0.0; 64];
        apply_window_into(&mut out, &input, WindowFilter::None);
        assert_eq!(out, input);
    }

    #[test]
    fn test_apply_window_scales_by_coefficient() {
        let input = vec![2.0; 128];
        let mut out = vec![0.0; 128];
        apply_window_into(&mut out, &input, WindowFilter::Hamming);

        for (n, o) in out.iter().enumerate() {
            assert!((o - 2.0 * WindowFilter::Hamming.coefficient(n, 128)).abs() < 1e-12);
        }
        // Coherent gain of Hamming is about 0.54
        let mean = out.iter().sum::<f64>() / (2.0 * 128.0);
        assert!(mean > 0.5 && mean < 0.58);
    }

    #[test]
    fn test_short_window_is_flat() {
        assert_eq!(WindowFilter::Blackman.coefficient(0, 1), 1.0);
        assert_eq!(windowed_ones(WindowFilter::Hann, 1), vec![1.0]);
    }
}
