//! FFT engine using realfft for real-valued signals
//!
//! One engine is planned per analysis slot at startup. All buffers the
//! transforms need are allocated up front so that running a frame through
//! the engine never touches the allocator.

use num_complex::Complex;
use realfft::{ComplexToReal, FftError, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Forward and inverse real FFT plans bound to one length
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Real-to-complex processor
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Complex-to-real processor
    c2r: Arc<dyn ComplexToReal<f64>>,

    /// Time-domain work buffer (realfft consumes its input)
    real_buffer: Vec<f64>,

    /// Half spectrum work buffer (fft_size/2 + 1 bins)
    half_spectrum: Vec<Complex<f64>>,

    /// Scratch for the forward plan
    forward_scratch: Vec<Complex<f64>>,

    /// Scratch for the inverse plan
    inverse_scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Plan forward and inverse transforms for `fft_size` samples
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        let forward_scratch = r2c.make_scratch_vec();
        let inverse_scratch = c2r.make_scratch_vec();

        Self {
            fft_size,
            r2c,
            c2r,
            real_buffer: vec![0.0; fft_size],
            half_spectrum: vec![Complex::new(0.0, 0.0); fft_size / 2 + 1],
            forward_scratch,
            inverse_scratch,
        }
    }

    /// Forward transform into a full-length, conjugate-symmetric spectrum
    ///
    /// Every bin is divided by `fft_size`. `signal` and `spectrum` must both be
    /// `fft_size` long.
    pub fn forward_normalized(
        &mut self,
        signal: &[f64],
        spectrum: &mut [Complex<f64>],
    ) -> Result<(), FftError> {
        self.real_buffer.copy_from_slice(signal);
        self.r2c.process_with_scratch(
            &mut self.real_buffer,
            &mut self.half_spectrum,
            &mut self.forward_scratch,
        )?;

        let n = self.fft_size;
        let scale = 1.0 / n as f64;
        let half = n / 2;

        for (k, bin) in self.half_spectrum.iter().enumerate() {
            spectrum[k] = *bin * scale;
        }
        // Mirror the negative frequencies
        for k in 1..half {
            spectrum[n - k] = spectrum[k].conj();
        }

        Ok(())
    }

    /// Inverse transform of a full-length spectrum, divided by `fft_size`
    ///
    /// Only bins `0..=fft_size/2` are read; the rest are assumed to be the
    /// conjugate mirror. `spectrum` is left untouched.
    pub fn inverse_normalized(
        &mut self,
        spectrum: &[Complex<f64>],
        signal: &mut [f64],
    ) -> Result<(), FftError> {
        let half = self.fft_size / 2;
        self.half_spectrum.copy_from_slice(&spectrum[..=half]);

        // A real signal has purely real DC and Nyquist bins
        self.half_spectrum[0].im = 0.0;
        self.half_spectrum[half].im = 0.0;

        self.c2r.process_with_scratch(
            &mut self.half_spectrum,
            signal,
            &mut self.inverse_scratch,
        )?;

        let scale = 1.0 / self.fft_size as f64;
        for s in signal.iter_mut() {
            *s *= scale;
        }

        Ok(())
    }
}
