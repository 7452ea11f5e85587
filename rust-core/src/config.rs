//! Analyzer configuration
//!
//! Everything the capture pipeline needs to know about the stream and the
//! analysis: sample rate, analysis length, channel routing, window filter,
//! averaging depth and the playback generator. Loaded from TOML, validated
//! before it reaches the pipeline.

use crate::generators::GeneratorType;
use crate::spectrum::kernels::DivisionPolicy;
use crate::spectrum::windowing::WindowFilter;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Shortest supported analysis length (samples)
pub const MIN_ANALYSIS_LEN: usize = 1 << 10;

/// Longest supported analysis length (samples)
pub const MAX_ANALYSIS_LEN: usize = 1 << 16;

/// Maximum number of frames in the cross-frame magnitude average
pub const MAX_AVERAGE_COUNT: usize = 8;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Analysis length {0} is not a power of two between {} and {}", MIN_ANALYSIS_LEN, MAX_ANALYSIS_LEN)]
    AnalysisLength(usize),

    #[error("Average count {0} exceeds the maximum of {}", MAX_AVERAGE_COUNT)]
    AverageCount(usize),

    #[error("Channel count must be 1 (internal reference) or 2 (external reference), got {0}")]
    ChannelCount(u16),

    #[error("Invalid channel mapping: reference {reference}, input {input}")]
    ChannelMapping { reference: u16, input: u16 },

    #[error("Sample rate must be positive")]
    SampleRate,

    #[error("Output volume must be a finite value in 0..=1, got {0}")]
    OutputVolume(f64),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Audio and analysis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Stream sample rate in Hz
    pub sample_rate: u32,

    /// Samples per analysis frame (power of two)
    pub analysis_samples: usize,

    /// Requested hardware period in frames
    pub buffer_frames: u32,

    /// 1 = internal reference (generator output), 2 = reference + input
    pub channel_count: u16,

    /// Capture channel carrying the reference (two-channel mode)
    pub reference_channel: u16,

    /// Capture channel carrying the measured response
    pub input_channel: u16,

    /// Window applied before the forward transform
    pub window_filter: WindowFilter,

    /// Number of frames in the cross-frame magnitude average (0 disables)
    pub average_count: usize,

    /// Playback gain, 0..=1
    pub output_volume: f64,

    /// Active playback generator
    pub generator: GeneratorType,

    /// Sine generator frequency in Hz
    pub sine_frequency: f64,

    /// Handling of near-zero reference bins
    pub division_policy: DivisionPolicy,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            analysis_samples: 32768,
            buffer_frames: 512,
            channel_count: 2,
            reference_channel: 0,
            input_channel: 1,
            window_filter: WindowFilter::Blackman,
            average_count: 2,
            output_volume: 1.0,
            generator: GeneratorType::Silence,
            sine_frequency: 1000.0,
            division_policy: DivisionPolicy::Propagate,
        }
    }
}

impl AudioConfig {
    /// Parse a TOML document; missing keys fall back to defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check every field against the ranges the pipeline supports
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_supported_analysis_length(self.analysis_samples) {
            return Err(ConfigError::AnalysisLength(self.analysis_samples));
        }

        if self.average_count > MAX_AVERAGE_COUNT {
            return Err(ConfigError::AverageCount(self.average_count));
        }

        if self.sample_rate == 0 {
            return Err(ConfigError::SampleRate);
        }

        if !self.output_volume.is_finite() || !(0.0..=1.0).contains(&self.output_volume) {
            return Err(ConfigError::OutputVolume(self.output_volume));
        }

        match self.channel_count {
            1 => {}
            2 => {
                let valid = self.reference_channel < 2
                    && self.input_channel < 2
                    && self.reference_channel != self.input_channel;
                if !valid {
                    return Err(ConfigError::ChannelMapping {
                        reference: self.reference_channel,
                        input: self.input_channel,
                    });
                }
            }
            other => return Err(ConfigError::ChannelCount(other)),
        }

        Ok(())
    }

    /// Convert a sample count to seconds at the configured rate
    pub fn samples_to_seconds(&self, count: usize) -> f64 {
        count as f64 / self.sample_rate as f64
    }

    /// Time span covered by one analysis frame
    pub fn fft_duration(&self) -> f64 {
        self.samples_to_seconds(self.analysis_samples)
    }

    /// True when reference and input arrive on swapped capture channels
    pub fn is_swapped(&self) -> bool {
        self.channel_count == 2 && self.reference_channel > self.input_channel
    }
}

/// Every analysis length the slot pool is built for
pub fn supported_analysis_lengths() -> Vec<usize> {
    std::iter::successors(Some(MIN_ANALYSIS_LEN), |&len| len.checked_mul(2))
        .take_while(|&len| len <= MAX_ANALYSIS_LEN)
        .collect()
}

pub fn is_supported_analysis_length(length: usize) -> bool {
    length.is_power_of_two() && (MIN_ANALYSIS_LEN..=MAX_ANALYSIS_LEN).contains(&length)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = AudioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_rate, 48000);
        assert_eq!(config.analysis_samples, 32768);
    }

    #[test]
    fn test_supported_lengths() {
        let lengths = supported_analysis_lengths();
        assert_eq!(lengths.first(), Some(&MIN_ANALYSIS_LEN));
        assert_eq!(lengths.last(), Some(&MAX_ANALYSIS_LEN));
        assert!(lengths.windows(2).all(|w| w[1] == w[0] * 2));
    }

    #[test]
    fn test_rejects_bad_length() {
        let config = AudioConfig {
            analysis_samples: 3000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::AnalysisLength(3000))));

        let config = AudioConfig {
            analysis_samples: MAX_ANALYSIS_LEN * 2,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_channels() {
        let config = AudioConfig {
            channel_count: 3,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ChannelCount(3))));

        let config = AudioConfig {
            reference_channel: 1,
            input_channel: 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ChannelMapping { .. })));

        // Mapping is irrelevant with an internal reference
        let config = AudioConfig {
            channel_count: 1,
            reference_channel: 5,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_average_count() {
        let config = AudioConfig {
            average_count: MAX_AVERAGE_COUNT + 1,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::AverageCount(_))));
    }

    #[test]
    fn test_from_toml_partial() {
        let config = AudioConfig::from_toml_str(
            r#"
            sample_rate = 44100
            analysis_samples = 4096
            window_filter = "hamming"
            generator = "pink_noise"
            reference_channel = 1
            input_channel = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.analysis_samples, 4096);
        assert_eq!(config.window_filter, WindowFilter::Hamming);
        assert_eq!(config.generator, GeneratorType::PinkNoise);
        assert!(config.is_swapped());
        // Untouched keys keep their defaults
        assert_eq!(config.average_count, 2);
    }

    #[test]
    fn test_from_toml_invalid() {
        assert!(matches!(
            AudioConfig::from_toml_str("analysis_samples = 1000"),
            Err(ConfigError::AnalysisLength(1000))
        ));
        assert!(matches!(
            AudioConfig::from_toml_str("sample_rate = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_fft_duration() {
        let config = AudioConfig {
            sample_rate: 48000,
            analysis_samples: 48000usize.next_power_of_two(),
            ..Default::default()
        };
        assert!((config.fft_duration() - 65536.0 / 48000.0).abs() < 1e-12);
        assert!((config.samples_to_seconds(24000) - 0.5).abs() < 1e-12);
    }
}
