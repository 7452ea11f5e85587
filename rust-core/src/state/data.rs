//! Buffers and metadata of one analysis frame

use crate::spectrum::kernels;
use num_complex::Complex;

/// Opaque white, RGBA
pub const DEFAULT_COLOR: u32 = 0xFFFF_FFFF;

/// Every buffer derived from one captured frame
///
/// All sequences are exactly `length` long. Spectra are full length and
/// conjugate-symmetric; only bins `0..=length/2` carry information.
#[derive(Debug, Clone)]
pub struct StateData {
    /// Number of samples in this frame
    pub length: usize,

    /// Unprocessed input
    pub input: Vec<f64>,
    /// Unprocessed reference
    pub reference: Vec<f64>,

    /// Input after the window filter
    pub windowed_input: Vec<f64>,
    /// Reference after the window filter
    pub windowed_reference: Vec<f64>,

    /// Normalized DFT of the input
    pub spectrum_input: Vec<Complex<f64>>,
    /// Normalized DFT of the reference
    pub spectrum_reference: Vec<Complex<f64>>,

    /// |spectrum_input|, averaged across frames
    pub magnitude: Vec<f64>,
    pub smoothed_magnitude: Vec<f64>,

    /// H = Y/X
    pub transfer_function: Vec<Complex<f64>>,
    pub smoothed_transfer_function: Vec<Complex<f64>>,

    /// Inverse DFT of the transfer function
    pub impulse_response: Vec<f64>,
    pub smoothed_impulse_response: Vec<f64>,

    /// Segment-summed PSD of the input
    pub psd_input: Vec<f64>,
    /// Segment-summed PSD of the reference
    pub psd_reference: Vec<f64>,
    /// Segment-summed CSD
    pub csd: Vec<Complex<f64>>,
    pub coherence: Vec<f64>,
    pub smoothed_coherence: Vec<f64>,

    // Presentation metadata, filled in by whoever owns the snapshot
    /// RGBA color to draw this frame in
    pub color: u32,
    pub name: String,
    pub active: bool,
    pub visible: bool,
    /// Seconds spanned by the frame
    pub fft_duration: f64,
    /// Sample rate in Hz
    pub sample_rate: f64,
}

impl StateData {
    /// Zeroed buffers for a frame of `length` samples
    pub fn new(length: usize) -> Self {
        let real = || vec![0.0; length];
        let complex = || vec![Complex::new(0.0, 0.0); length];

        Self {
            length,
            input: real(),
            reference: real(),
            windowed_input: real(),
            windowed_reference: real(),
            spectrum_input: complex(),
            spectrum_reference: complex(),
            magnitude: real(),
            smoothed_magnitude: real(),
            transfer_function: complex(),
            smoothed_transfer_function: complex(),
            impulse_response: real(),
            smoothed_impulse_response: real(),
            psd_input: real(),
            psd_reference: real(),
            csd: complex(),
            coherence: real(),
            smoothed_coherence: real(),
            color: DEFAULT_COLOR,
            name: String::new(),
            active: true,
            visible: true,
            fft_duration: 0.0,
            sample_rate: 0.0,
        }
    }

    /// Overwrite `self` with `source`, reusing the buffers already held
    ///
    /// After the first call at a given length no further allocation happens.
    pub fn copy_from(&mut self, source: &StateData) {
        self.length = source.length;
        self.input.clone_from(&source.input);
        self.reference.clone_from(&source.reference);
        self.windowed_input.clone_from(&source.windowed_input);
        self.windowed_reference.clone_from(&source.windowed_reference);
        self.spectrum_input.clone_from(&source.spectrum_input);
        self.spectrum_reference.clone_from(&source.spectrum_reference);
        self.magnitude.clone_from(&source.magnitude);
        self.smoothed_magnitude.clone_from(&source.smoothed_magnitude);
        self.transfer_function.clone_from(&source.transfer_function);
        self.smoothed_transfer_function
            .clone_from(&source.smoothed_transfer_function);
        self.impulse_response.clone_from(&source.impulse_response);
        self.smoothed_impulse_response
            .clone_from(&source.smoothed_impulse_response);
        self.psd_input.clone_from(&source.psd_input);
        self.psd_reference.clone_from(&source.psd_reference);
        self.csd.clone_from(&source.csd);
        self.coherence.clone_from(&source.coherence);
        self.smoothed_coherence.clone_from(&source.smoothed_coherence);
        self.color = source.color;
        self.name.clone_from(&source.name);
        self.active = source.active;
        self.visible = source.visible;
        self.fft_duration = source.fft_duration;
        self.sample_rate = source.sample_rate;
    }

    /// An empty snapshot (no frame available yet)
    pub fn empty() -> Self {
        Self::new(0)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Center frequency of `bin` in Hz (needs `sample_rate`)
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        if self.length == 0 {
            return 0.0;
        }
        bin as f64 * self.sample_rate / self.length as f64
    }

    /// Bin closest to `frequency` Hz, limited to the meaningful half
    pub fn nearest_bin(&self, frequency: f64) -> usize {
        if self.length == 0 || self.sample_rate <= 0.0 {
            return 0;
        }
        let bin = (frequency * self.length as f64 / self.sample_rate).round();
        (bin.max(0.0) as usize).min(self.length / 2)
    }

    /// Bin with the largest averaged magnitude in the meaningful half
    pub fn peak_bin(&self) -> Option<usize> {
        let half = (self.length / 2 + 1).min(self.magnitude.len());
        kernels::peak_bin(&self.magnitude[..half])
    }

    /// Phase of the transfer function in radians, per bin
    pub fn transfer_phase(&self) -> Vec<f64> {
        let mut out = vec![0.0; self.length];
        kernels::phase(&mut out, &self.transfer_function);
        out
    }

    /// Magnitude of the transfer function in dB, per bin
    pub fn transfer_magnitude_db(&self) -> Vec<f64> {
        self.transfer_function
            .iter()
            .map(|h| 20.0 * h.norm().log10())
            .collect()
    }

    pub(crate) fn buffers_have_length(&self, length: usize) -> bool {
        [
            self.input.len(),
            self.reference.len(),
            self.windowed_input.len(),
            self.windowed_reference.len(),
            self.spectrum_input.len(),
            self.spectrum_reference.len(),
            self.magnitude.len(),
            self.smoothed_magnitude.len(),
            self.transfer_function.len(),
            self.smoothed_transfer_function.len(),
            self.impulse_response.len(),
            self.smoothed_impulse_response.len(),
            self.psd_input.len(),
            self.psd_reference.len(),
            self.csd.len(),
            self.coherence.len(),
            self.smoothed_coherence.len(),
        ]
        .iter()
        .all(|&len| len == length)
    }
}

impl Default for StateData {
    fn default() -> Self {
        Self::empty()
    }
}
