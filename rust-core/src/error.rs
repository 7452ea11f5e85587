//! Crate-level error type

use crate::audio::input::AudioError;
use crate::config::ConfigError;
use crate::state::{PoolError, SlotError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Slot pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Analysis error: {0}")]
    Slot(#[from] SlotError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Failed to spawn analysis worker: {0}")]
    Worker(std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
