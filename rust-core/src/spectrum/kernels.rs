//! Spectral kernels shared by the analysis chain
//!
//! Transfer function division, segment-summed PSD/CSD coherence and the
//! bin smoothing used for display. All kernels write into caller-owned
//! buffers.

use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::ops::{AddAssign, Div};

/// Number of bins on each side of the display smoothing window
pub const SMOOTHING_RADIUS: usize = 10;

/// What to do when a reference bin is (close to) zero
///
/// `Propagate` keeps plain IEEE division, so silent reference bins show up
/// as Inf/NaN and the consumer decides how to draw them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum DivisionPolicy {
    #[default]
    Propagate,

    /// Divide by at least `floor` (keeps the phase of the denominator)
    Clamp { floor: f64 },

    /// Emit zero wherever the denominator magnitude is below `floor`
    Mask { floor: f64 },
}

impl DivisionPolicy {
    #[inline]
    fn divide_complex(&self, num: Complex<f64>, den: Complex<f64>) -> Complex<f64> {
        match *self {
            DivisionPolicy::Propagate => num / den,
            DivisionPolicy::Clamp { floor } => {
                let magnitude = den.norm();
                if magnitude >= floor {
                    num / den
                } else if magnitude > 0.0 {
                    num / (den * (floor / magnitude))
                } else {
                    num / floor
                }
            }
            DivisionPolicy::Mask { floor } => {
                if den.norm() < floor {
                    Complex::new(0.0, 0.0)
                } else {
                    num / den
                }
            }
        }
    }

    #[inline]
    fn divide_real(&self, num: f64, den: f64) -> f64 {
        match *self {
            DivisionPolicy::Propagate => num / den,
            DivisionPolicy::Clamp { floor } => num / den.max(floor),
            DivisionPolicy::Mask { floor } => {
                if den < floor {
                    0.0
                } else {
                    num / den
                }
            }
        }
    }
}

/// `out[i] = input[i] / reference[i]` (H = Y/X)
pub fn transfer_function(
    out: &mut [Complex<f64>],
    input: &[Complex<f64>],
    reference: &[Complex<f64>],
    policy: DivisionPolicy,
) {
    for ((h, &y), &x) in out.iter_mut().zip(input).zip(reference) {
        *h = policy.divide_complex(y, x);
    }
}

/// `out[i] = |spectrum[i]|`
pub fn magnitude(out: &mut [f64], spectrum: &[Complex<f64>]) {
    for (m, c) in out.iter_mut().zip(spectrum) {
        *m = c.norm();
    }
}

/// Phase of every bin in radians
pub fn phase(out: &mut [f64], spectrum: &[Complex<f64>]) {
    for (p, c) in out.iter_mut().zip(spectrum) {
        *p = c.arg();
    }
}

/// Half-width of the PSD/CSD segment for a given analysis length
pub fn coherence_depth(length: usize) -> usize {
    (length / 1024).clamp(64, 512)
}

/// Output buffers of [`coherence`]
pub struct CoherenceBuffers<'a> {
    pub psd_input: &'a mut [f64],
    pub psd_reference: &'a mut [f64],
    pub csd: &'a mut [Complex<f64>],
    pub coherence: &'a mut [f64],
}

/// Segment-summed magnitude squared coherence
///
/// For each bin `i` the PSDs and the CSD are summed over
/// `j ∈ [i - depth, i + depth]` (clipped to the spectrum), then
/// `coherence = |Σcsd|² / (Σpsd_ref · Σpsd_in)`. Summing over a segment is
/// what keeps the estimate informative; a single bin is always coherent.
pub fn coherence(
    out: CoherenceBuffers<'_>,
    input: &[Complex<f64>],
    reference: &[Complex<f64>],
    depth: usize,
    policy: DivisionPolicy,
) {
    let length = input.len();

    for i in 0..length {
        let start = i.saturating_sub(depth);
        let end = (i + depth + 1).min(length);

        let mut psd_in = 0.0;
        let mut psd_ref = 0.0;
        let mut csd = Complex::new(0.0, 0.0);

        for (&y, &x) in input[start..end].iter().zip(&reference[start..end]) {
            psd_ref += x.norm_sqr();
            psd_in += y.norm_sqr();
            csd += x.conj() * y;
        }

        out.psd_input[i] = psd_in;
        out.psd_reference[i] = psd_ref;
        out.csd[i] = csd;
        out.coherence[i] = policy.divide_real(csd.norm_sqr(), psd_ref * psd_in);
    }
}

/// Unweighted moving average over `±SMOOTHING_RADIUS` bins
///
/// The window is clipped at both ends and the mean is taken over the bins
/// actually covered.
pub fn smooth<T>(out: &mut [T], input: &[T])
where
    T: Copy + Default + AddAssign + Div<f64, Output = T>,
{
    let length = input.len();

    for (i, o) in out.iter_mut().enumerate().take(length) {
        let start = i.saturating_sub(SMOOTHING_RADIUS);
        let end = (i + SMOOTHING_RADIUS + 1).min(length);

        let mut sum = T::default();
        for &v in &input[start..end] {
            sum += v;
        }
        *o = sum / (end - start) as f64;
    }
}

/// Index of the largest value, ignoring NaN
pub fn peak_bin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex<f64> {
        Complex::new(re, im)
    }

    #[test]
    fn test_transfer_function_ratio() {
        let input = [c(1.0, 1.0), c(2.0, 0.0), c(0.0, -3.0)];
        let reference = [c(1.0, 1.0), c(4.0, 0.0), c(0.0, 1.0)];
        let mut h = [c(0.0, 0.0); 3];

        transfer_function(&mut h, &input, &reference, DivisionPolicy::Propagate);

        assert!((h[0] - c(1.0, 0.0)).norm() < 1e-12);
        assert!((h[1] - c(0.5, 0.0)).norm() < 1e-12);
        assert!((h[2] - c(-3.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_zero_reference_propagates() {
        let input = [c(1.0, 0.0), c(0.0, 0.0)];
        let reference = [c(0.0, 0.0), c(0.0, 0.0)];
        let mut h = [c(0.0, 0.0); 2];

        transfer_function(&mut h, &input, &reference, DivisionPolicy::Propagate);

        assert!(!h[0].is_finite());
        assert!(h[1].is_nan());
    }

    #[test]
    fn test_zero_reference_policies() {
        let input = [c(1.0, 0.0)];
        let reference = [c(0.0, 0.0)];
        let mut h = [c(0.0, 0.0)];

        transfer_function(&mut h, &input, &reference, DivisionPolicy::Mask { floor: 1e-12 });
        assert_eq!(h[0], c(0.0, 0.0));

        transfer_function(&mut h, &input, &reference, DivisionPolicy::Clamp { floor: 1e-3 });
        assert!(h[0].is_finite());
        assert!((h[0].norm() - 1e3).abs() < 1e-6);

        // Clamping keeps the phase of a tiny but non-zero denominator
        let reference = [c(0.0, 1e-9)];
        transfer_function(&mut h, &input, &reference, DivisionPolicy::Clamp { floor: 1e-3 });
        assert!((h[0] - c(0.0, -1e3)).norm() < 1e-6);
    }

    #[test]
    fn test_coherence_depth_clamped() {
        assert_eq!(coherence_depth(1024), 64);
        assert_eq!(coherence_depth(65536), 64);
        assert_eq!(coherence_depth(1 << 17), 128);
        assert_eq!(coherence_depth(1 << 20), 512);
    }

    #[test]
    fn test_coherence_of_scaled_copy_is_one() {
        let len = 256;
        let reference: Vec<Complex<f64>> = (0..len)
            .map(|i| c((i as f64 * 0.3).sin() + 0.1, (i as f64 * 0.7).cos()))
            .collect();
        let input: Vec<Complex<f64>> = reference.iter().map(|x| x * c(0.5, 0.25)).collect();

        let mut psd_input = vec![0.0; len];
        let mut psd_reference = vec![0.0; len];
        let mut csd = vec![c(0.0, 0.0); len];
        let mut coh = vec![0.0; len];

        coherence(
            CoherenceBuffers {
                psd_input: &mut psd_input,
                psd_reference: &mut psd_reference,
                csd: &mut csd,
                coherence: &mut coh,
            },
            &input,
            &reference,
            8,
            DivisionPolicy::Propagate,
        );

        for &v in &coh {
            assert!((v - 1.0).abs() < 1e-9);
        }
        // |0.5 + 0.25i|² = 0.3125
        assert!((psd_input[100] / psd_reference[100] - 0.3125).abs() < 1e-9);
    }

    #[test]
    fn test_coherence_of_unrelated_signals_is_low() {
        let len = 512;
        let reference: Vec<Complex<f64>> = (0..len).map(|i| c(1.0, 0.0) * if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let input: Vec<Complex<f64>> = (0..len).map(|_| c(1.0, 0.0)).collect();

        let mut psd_input = vec![0.0; len];
        let mut psd_reference = vec![0.0; len];
        let mut csd = vec![c(0.0, 0.0); len];
        let mut coh = vec![0.0; len];

        coherence(
            CoherenceBuffers {
                psd_input: &mut psd_input,
                psd_reference: &mut psd_reference,
                csd: &mut csd,
                coherence: &mut coh,
            },
            &input,
            &reference,
            64,
            DivisionPolicy::Propagate,
        );

        // Alternating signs cancel across the segment
        assert!(coh[256] < 1e-3);
        assert!(coh.iter().all(|&v| (0.0..=1.0 + 1e-12).contains(&v)));
    }

    #[test]
    fn test_smooth_constant_is_unchanged() {
        let input = vec![3.0; 50];
        let mut out = vec![0.0; 50];
        smooth(&mut out, &input);
        assert!(out.iter().all(|&v| (v - 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_smooth_impulse_spreads() {
        let mut input = vec![0.0; 64];
        input[32] = 21.0;
        let mut out = vec![0.0; 64];
        smooth(&mut out, &input);

        // 21 bins in the window, so each covered bin gets 1.0
        assert!((out[32] - 1.0).abs() < 1e-12);
        assert!((out[22] - 1.0).abs() < 1e-12);
        assert!((out[42] - 1.0).abs() < 1e-12);
        assert_eq!(out[21], 0.0);
        assert_eq!(out[43], 0.0);
    }

    #[test]
    fn test_smooth_complex() {
        let input = vec![c(1.0, -2.0); 30];
        let mut out = vec![c(0.0, 0.0); 30];
        smooth(&mut out, &input);
        assert!((out[0] - c(1.0, -2.0)).norm() < 1e-12);
        assert!((out[29] - c(1.0, -2.0)).norm() < 1e-12);
    }

    #[test]
    fn test_peak_bin() {
        assert_eq!(peak_bin(&[0.1, 5.0, f64::NAN, 2.0]), Some(1));
        assert_eq!(peak_bin(&[]), None);
    }
}
