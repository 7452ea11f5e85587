//! Audio output playback using cpal
//!
//! Plays the active test signal. With an internal reference the generated
//! mono signal is also pushed to the capture stream through a
//! `ReferenceProducer`.

use super::buffer::ReferenceProducer;
use super::input::{check_support, scratch_frames, stream_config, AudioDeviceInfo, AudioError};
use super::playback::PlaybackStage;
use crate::config::AudioConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, SupportedStreamConfigRange};

/// Audio output stream
pub struct AudioOutput {
    stream: Stream,
    device_info: AudioDeviceInfo,
}

impl AudioOutput {
    /// Open the default output device
    ///
    /// `playback` builds the stage once the device channel count is known.
    pub fn from_default_device(
        config: &AudioConfig,
        playback: impl FnOnce(usize) -> PlaybackStage,
        reference: Option<ReferenceProducer>,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        Self::from_device(device, config, playback, reference)
    }

    /// Open a specific output device
    pub fn from_device(
        device: Device,
        config: &AudioConfig,
        playback: impl FnOnce(usize) -> PlaybackStage,
        mut reference: Option<ReferenceProducer>,
    ) -> Result<Self, AudioError> {
        let name = device
            .name()
            .map_err(|e| AudioError::DeviceName(e.to_string()))?;

        let channels = device
            .default_output_config()
            .map_err(|e| AudioError::DefaultConfig(e.to_string()))?
            .channels();

        let ranges: Vec<SupportedStreamConfigRange> = device
            .supported_output_configs()
            .map_err(|e| AudioError::SupportedConfigs(e.to_string()))?
            .collect();
        check_support(&ranges, config.sample_rate, channels)?;

        let stream_config = stream_config(config, channels);
        let mut playback = playback(usize::from(channels));
        let frame_width = playback.channels();

        let device_info = AudioDeviceInfo {
            name,
            sample_rate: config.sample_rate,
            channels,
        };

        let mut generated = vec![0.0f32; scratch_frames(config)];

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for chunk in data.chunks_mut(generated.len() * frame_width) {
                        let frames = playback.render(chunk, &mut generated);
                        if let Some(reference) = reference.as_mut() {
                            reference.push(&generated[..frames]);
                        }
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio output stream error");
                },
                None,
            )
            .map_err(|e| AudioError::BuildStream(e.to_string()))?;

        tracing::info!(
            device = %device_info.name,
            sample_rate = device_info.sample_rate,
            channels = device_info.channels,
            "output stream opened"
        );

        Ok(Self {
            stream,
            device_info,
        })
    }

    /// Start playing audio
    pub fn start(&self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::PlayStream(e.to_string()))
    }

    /// Pause audio playback
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

/// List available audio output devices
pub fn list_output_devices() -> Result<Vec<AudioDeviceInfo>, AudioError> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let device_iter = host
        .output_devices()
        .map_err(|e| AudioError::Devices(e.to_string()))?;

    for device in device_iter {
        if let Ok(name) = device.name() {
            if let Ok(config) = device.default_output_config() {
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
