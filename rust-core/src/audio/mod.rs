//! Real-time audio side: playback, capture, analysis worker and cpal glue

pub mod buffer;
pub mod capture;
pub mod input;
pub mod output;
pub mod playback;
pub mod processor;
pub mod worker;

pub use buffer::ReferenceRing;
pub use capture::{CaptureStage, ChannelRouting, DuplexStage};
pub use input::{AudioDeviceInfo, AudioError, AudioInput};
pub use output::AudioOutput;
pub use playback::{PlaybackControls, PlaybackStage};
pub use processor::AudioProcessor;
pub use worker::{AnalysisWorker, WorkOutcome};
