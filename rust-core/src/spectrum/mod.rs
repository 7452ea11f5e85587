//! Spectral kernels: windowing, FFT, transfer function and coherence math

pub mod averaging;
pub mod fft;
pub mod kernels;
pub mod windowing;

pub use averaging::MagnitudeAverager;
pub use fft::FftEngine;
pub use kernels::DivisionPolicy;
pub use windowing::WindowFilter;
