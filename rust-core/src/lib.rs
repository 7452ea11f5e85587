//! Loopback Analyzer - real-time transfer function measurement
//!
//! Plays a test signal, captures the response together with a reference,
//! and estimates frequency response, impulse response and coherence from
//! fixed-length frames. Capture runs in the audio callback, analysis on a
//! background worker; both share a fixed pool of pre-allocated slots.

pub mod audio;
pub mod config;
pub mod error;
pub mod generators;
pub mod spectrum;
pub mod state;

pub use audio::{AudioProcessor, DuplexStage};
pub use config::AudioConfig;
pub use error::AnalyzerError;
pub use generators::GeneratorType;
pub use spectrum::{DivisionPolicy, WindowFilter};
pub use state::StateData;
