//! Audio input capture using cpal
//!
//! Opens the capture stream at the configured rate, channel count and period
//! size and drives a `CaptureStage` from its callback.

use super::buffer::ReferenceConsumer;
use super::capture::CaptureStage;
use crate::config::AudioConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio device found")]
    NoDevice,

    #[error("Failed to get device name: {0}")]
    DeviceName(String),

    #[error("Failed to enumerate devices: {0}")]
    Devices(String),

    #[error("Failed to query device configs: {0}")]
    SupportedConfigs(String),

    #[error("Failed to get default config: {0}")]
    DefaultConfig(String),

    #[error("Failed to build stream: {0}")]
    BuildStream(String),

    #[error("Failed to play stream: {0}")]
    PlayStream(String),

    #[error("Device does not support {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("Device does not support {0} channels at the requested rate")]
    UnsupportedChannels(u16),
}

/// Audio device information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Audio input stream
pub struct AudioInput {
    stream: Stream,
    device_info: AudioDeviceInfo,
}

impl AudioInput {
    /// Open the default input device
    ///
    /// `reference` carries the generated signal from the output stream and
    /// is only needed with an internal reference (one capture channel).
    pub fn from_default_device(
        config: &AudioConfig,
        capture: CaptureStage,
        reference: Option<ReferenceConsumer>,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(AudioError::NoDevice)?;

        Self::from_device(device, config, capture, reference)
    }

    /// Open a specific input device
    pub fn from_device(
        device: Device,
        config: &AudioConfig,
        mut capture: CaptureStage,
        mut reference: Option<ReferenceConsumer>,
    ) -> Result<Self, AudioError> {
        let name = device
            .name()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;

        let ranges: Vec<SupportedStreamConfigRange> = device
            .supported_input_configs()
            .map_err(|e| AudioError::SupportedConfigs(e.to_string()))?
            .collect();
        check_support(&ranges, config.sample_rate, config.channel_count)?;

        let channels = capture.routing().channels();
        let stream_config = stream_config(config, config.channel_count);

        let device_info = AudioDeviceInfo {
            name,
            sample_rate: config.sample_rate,
            channels: config.channel_count,
        };

        // Generated reference for one chunk, allocated here and never again
        let mut generated = vec![0.0f32; scratch_frames(config)];

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for chunk in data.chunks(generated.len() * channels) {
                        let frames = chunk.len() / channels;
                        let period = &mut generated[..frames];
                        match reference.as_mut() {
                            Some(reference) => {
                                reference.pop_into(period);
                            }
                            None => period.fill(0.0),
                        }
                        capture.capture(chunk, period);
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio input stream error");
                },
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))?;

        tracing::info!(
            device = %device_info.name,
            sample_rate = device_info.sample_rate,
            channels = device_info.channels,
            buffer_frames = config.buffer_frames,
            "input stream opened"
        );

        Ok(Self {
            stream,
            device_info,
        })
    }

    /// Start capturing audio
    pub fn start(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    /// Pause audio capture
    pub fn pause(&self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    /// Get device information
    pub fn device_info(&self) -> &AudioDeviceInfo {
        &self.device_info
    }
}

/// Stream parameters with a fixed period size
pub(crate) fn stream_config(config: &AudioConfig, channels: u16) -> StreamConfig {
    StreamConfig {
        channels,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: BufferSize::Fixed(config.buffer_frames),
    }
}

/// Frames per callback chunk; periods longer than this are split
pub(crate) fn scratch_frames(config: &AudioConfig) -> usize {
    (config.buffer_frames as usize).max(1)
}

/// Check the requested rate and channel count against the device ranges
pub(crate) fn check_support(
    ranges: &[SupportedStreamConfigRange],
    sample_rate: u32,
    channels: u16,
) -> Result<(), AudioError> {
    let rate = SampleRate(sample_rate);
    let at_rate: Vec<&SupportedStreamConfigRange> = ranges
        .iter()
        .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
        .collect();

    if at_rate.is_empty() {
        return Err(AudioError::UnsupportedSampleRate(sample_rate));
    }
    if !at_rate.iter().any(|range| range.channels() >= channels) {
        return Err(AudioError::UnsupportedChannels(channels));
    }
    Ok(())
}

/// List available audio input devices
pub fn list_input_devices() -> Result<Vec<AudioDeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let device_iter = host
        .input_devices()
        .map_err(|e| AudioError::Devices(e.to_string()))?;

    for device in device_iter {
        if let Ok(name) = device.name() {
            if let Ok(config) = device.default_input_config() {
                devices.push(AudioDeviceInfo {
                    name,
                    sample_rate: config.sample_rate().0,
                    channels: config.channels(),
                });
            }
        }
    }

    Ok(devices)
}
