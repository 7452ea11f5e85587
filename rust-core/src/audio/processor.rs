//! Analyzer facade
//!
//! Owns the slot pool, the playback controls, the analysis worker thread
//! and the audio streams. Control threads talk to this; the audio callback
//! and the worker only ever see the shared `Pipeline`.

use super::buffer::ReferenceRing;
use super::capture::{CaptureStage, ChannelRouting, DuplexStage};
use super::input::{list_input_devices, AudioDeviceInfo, AudioInput};
use super::output::AudioOutput;
use super::playback::{PlaybackControls, PlaybackStage};
use super::worker::AnalysisWorker;
use crate::config::{supported_analysis_lengths, AudioConfig};
use crate::error::{AnalyzerError, Result};
use crate::generators::{GeneratorType, SignalGenerator};
use crate::state::{Occupancy, Pipeline, PoolError, SharedFilterState, SlotPool, StateData};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Reference ring capacity, in periods
const REFERENCE_PERIODS: usize = 8;

/// Loopback analyzer
pub struct AudioProcessor {
    config: AudioConfig,

    /// Slots, queues and shared filter state
    pipeline: Arc<Pipeline>,

    /// Generator, volume and sine frequency (live)
    controls: Arc<PlaybackControls>,

    /// Worker termination flag
    running: Arc<AtomicBool>,

    /// Worker thread handle
    worker: Option<JoinHandle<()>>,

    /// Audio input stream
    audio_input: Option<AudioInput>,

    /// Audio output stream
    audio_output: Option<AudioOutput>,
}

impl AudioProcessor {
    /// Build slots for every supported analysis length
    ///
    /// Plans every FFT up front, so this takes a while for the long lengths.
    pub fn new(config: AudioConfig) -> Result<Self> {
        Self::with_lengths(config, &supported_analysis_lengths())
    }

    /// Build slots only for `lengths`; `config.analysis_samples` must be one
    /// of them
    pub fn with_lengths(config: AudioConfig, lengths: &[usize]) -> Result<Self> {
        config.validate()?;

        let pool = SlotPool::new(lengths)?;
        let filter = SharedFilterState::new(
            config.window_filter,
            config.average_count,
            config.division_policy,
        );
        let pipeline = Arc::new(Pipeline::new(pool, config.analysis_samples, filter)?);

        Ok(Self {
            controls: Arc::new(PlaybackControls::from_config(&config)),
            config,
            pipeline,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            audio_input: None,
            audio_output: None,
        })
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    pub fn controls(&self) -> &Arc<PlaybackControls> {
        &self.controls
    }

    /// True while the worker thread runs
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// True while audio streams are open
    pub fn is_streaming(&self) -> bool {
        self.audio_input.is_some()
    }

    /// Start the analysis worker thread (no audio device involved)
    pub fn start_worker(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        self.running.store(true, Ordering::Release);
        let worker = AnalysisWorker::new(Arc::clone(&self.pipeline));
        match worker.spawn(Arc::clone(&self.running)) {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(AnalyzerError::Worker(e))
            }
        }
    }

    /// Open the default devices and start playback, capture and analysis
    ///
    /// Returns the input device name.
    pub fn start(&mut self) -> Result<String> {
        self.start_worker()?;

        if let Some(input) = &self.audio_input {
            return Ok(input.device_info().name.clone());
        }

        if let Err(e) = self.open_streams() {
            self.stop();
            return Err(e);
        }

        let name = self
            .audio_input
            .as_ref()
            .map(|input| input.device_info().name.clone())
            .unwrap_or_default();
        tracing::info!(device = %name, length = self.config.analysis_samples, "analyzer started");
        Ok(name)
    }

    fn open_streams(&mut self) -> Result<()> {
        let routing = ChannelRouting::from_config(&self.config);

        let (producer, consumer) = match routing {
            ChannelRouting::Internal => {
                let capacity = (self.config.buffer_frames as usize).max(1) * REFERENCE_PERIODS;
                let (producer, consumer) = ReferenceRing::new(capacity).split();
                (Some(producer), Some(consumer))
            }
            ChannelRouting::External { .. } => (None, None),
        };

        let generator = self.signal_generator();
        let controls = Arc::clone(&self.controls);
        let output = AudioOutput::from_default_device(
            &self.config,
            move |channels| PlaybackStage::new(generator, controls, channels),
            producer,
        )?;

        let capture = CaptureStage::new(Arc::clone(&self.pipeline), routing);
        let input = AudioInput::from_default_device(&self.config, capture, consumer)?;

        output.start()?;
        input.start()?;

        self.audio_output = Some(output);
        self.audio_input = Some(input);
        Ok(())
    }

    fn close_streams(&mut self) {
        if let Some(input) = self.audio_input.take() {
            let _ = input.pause();
        }
        if let Some(output) = self.audio_output.take() {
            let _ = output.pause();
        }
    }

    /// Close the streams and join the worker
    pub fn stop(&mut self) {
        let was_streaming = self.is_streaming();
        self.close_streams();

        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        if was_streaming {
            tracing::info!(frames = self.frame_count(), "analyzer stopped");
        }
    }

    /// Apply a new configuration
    ///
    /// A different analysis length or window filter discards every frame
    /// in flight and clears the magnitude history. Stream parameters
    /// (rate, channels, period) reopen the streams if they are running.
    pub fn set_config(&mut self, config: AudioConfig) -> Result<()> {
        config.validate()?;
        if !self.pipeline.pool().contains_length(config.analysis_samples) {
            return Err(PoolError::MissingBucket(config.analysis_samples).into());
        }

        let old = &self.config;
        let stream_changed = old.sample_rate != config.sample_rate
            || old.buffer_frames != config.buffer_frames
            || old.channel_count != config.channel_count
            || old.reference_channel != config.reference_channel
            || old.input_channel != config.input_channel;
        let analysis_changed = old.analysis_samples != config.analysis_samples
            || old.window_filter != config.window_filter;

        let reopen = stream_changed && self.is_streaming();
        if reopen {
            self.close_streams();
        }

        if analysis_changed || stream_changed {
            self.pipeline
                .reset(config.analysis_samples, config.window_filter)?;
            tracing::debug!(
                length = config.analysis_samples,
                window = config.window_filter.label(),
                "analysis reset"
            );
        }

        {
            let mut filter = self.pipeline.filter().lock();
            filter.averager.set_count(config.average_count);
            filter.division = config.division_policy;
        }

        self.controls.set_generator(config.generator);
        self.controls.set_volume(config.output_volume);
        self.controls.set_sine_frequency(config.sine_frequency);
        self.controls.set_sweep_samples(config.analysis_samples);

        self.config = config;

        if reopen {
            self.open_streams()?;
        }
        Ok(())
    }

    /// Switch the playback generator while streaming
    pub fn set_generator(&mut self, generator: GeneratorType) {
        self.config.generator = generator;
        self.controls.set_generator(generator);
    }

    /// Set the playback gain (clamped to 0..=1)
    pub fn set_output_volume(&mut self, volume: f64) {
        self.controls.set_volume(volume);
        self.config.output_volume = self.controls.volume();
    }

    pub fn set_sine_frequency(&mut self, frequency: f64) {
        self.config.sine_frequency = frequency;
        self.controls.set_sine_frequency(frequency);
    }

    /// Frames published so far; poll and compare to detect new data
    pub fn frame_count(&self) -> u64 {
        self.pipeline.queues().frame_count()
    }

    /// Capture periods skipped because every slot was busy
    pub fn dropped_periods(&self) -> u64 {
        self.pipeline.queues().dropped_periods()
    }

    pub fn occupancy(&self) -> Occupancy {
        self.pipeline.queues().occupancy()
    }

    /// Deep copy of the newest analysed frame, with rate and duration set
    pub fn state_data(&self) -> Option<StateData> {
        let mut data = self.pipeline.snapshot()?;
        self.fill_metadata(&mut data);
        Some(data)
    }

    /// Like `state_data`, but copies into a buffer the caller keeps
    ///
    /// Polling readers should prefer this; it does not allocate once `out`
    /// has the frame length. Returns false before the first frame.
    pub fn state_data_into(&self, out: &mut StateData) -> bool {
        if !self.pipeline.snapshot_into(out) {
            return false;
        }
        self.fill_metadata(out);
        true
    }

    fn fill_metadata(&self, data: &mut StateData) {
        data.sample_rate = f64::from(self.config.sample_rate);
        data.fft_duration = self.config.samples_to_seconds(data.length);
    }

    /// Callback stage for driving the analyzer from another audio backend
    ///
    /// Only one capture stage may feed the pipeline at a time; do not mix
    /// this with `start`.
    pub fn duplex_stage(&self, output_channels: usize) -> DuplexStage {
        let playback = PlaybackStage::new(
            self.signal_generator(),
            Arc::clone(&self.controls),
            output_channels,
        );
        let capture = CaptureStage::new(
            Arc::clone(&self.pipeline),
            ChannelRouting::from_config(&self.config),
        );
        DuplexStage::new(playback, capture, self.config.buffer_frames as usize)
    }

    /// A worker bound to this pipeline, for stepping analysis by hand
    pub fn worker(&self) -> AnalysisWorker {
        AnalysisWorker::new(Arc::clone(&self.pipeline))
    }

    /// List available audio input devices
    pub fn list_devices() -> Result<Vec<AudioDeviceInfo>> {
        Ok(list_input_devices()?)
    }

    fn signal_generator(&self) -> SignalGenerator {
        let mut generator = SignalGenerator::new(
            f64::from(self.config.sample_rate),
            self.config.analysis_samples,
            self.config.sine_frequency,
        );
        generator.set_active(self.config.generator);
        generator
    }
}

impl Drop for AudioProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::WorkOutcome;
    use crate::spectrum::windowing::WindowFilter;
    use crate::state::POOL_SIZE;

    fn config() -> AudioConfig {
        AudioConfig {
            analysis_samples: 1024,
            window_filter: WindowFilter::None,
            average_count: 0,
            buffer_frames: 256,
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let bad = AudioConfig {
            analysis_samples: 1000,
            ..config()
        };
        assert!(matches!(
            AudioProcessor::with_lengths(bad, &[1024]),
            Err(AnalyzerError::Config(_))
        ));

        // Valid length without a bucket
        let missing = AudioConfig {
            analysis_samples: 4096,
            ..config()
        };
        assert!(matches!(
            AudioProcessor::with_lengths(missing, &[1024]),
            Err(AnalyzerError::Pool(PoolError::MissingBucket(4096)))
        ));
    }

    #[test]
    fn test_no_snapshot_before_first_frame() {
        let processor = AudioProcessor::with_lengths(config(), &[1024]).unwrap();
        assert!(processor.state_data().is_none());
        assert_eq!(processor.frame_count(), 0);
        assert_eq!(processor.occupancy().unused, POOL_SIZE);
    }

    #[test]
    fn test_state_data_into_reuses_buffer() {
        let processor = AudioProcessor::with_lengths(config(), &[1024]).unwrap();
        let mut stage = processor.duplex_stage(2);
        let mut worker = processor.worker();

        let mut out = StateData::empty();
        assert!(!processor.state_data_into(&mut out));
        assert!(out.is_empty());

        let input: Vec<f32> = (0..1024)
            .flat_map(|n| {
                let r = (n as f32 * 0.03).sin();
                [r, 0.5 * r]
            })
            .collect();
        let mut output = vec![0.0f32; 512];
        for period in input.chunks(512) {
            stage.process(period, &mut output);
        }
        assert_eq!(worker.process_one().unwrap(), WorkOutcome::Published);

        assert!(processor.state_data_into(&mut out));
        assert_eq!(out.length, 1024);
        assert_eq!(out.sample_rate, f64::from(processor.config().sample_rate));
        let buffer = out.transfer_function.as_ptr();

        assert!(processor.state_data_into(&mut out));
        assert_eq!(out.transfer_function.as_ptr(), buffer);
        assert_eq!(out.impulse_response, processor.state_data().unwrap().impulse_response);
    }

    #[test]
    fn test_set_config_needs_bucket() {
        let mut processor = AudioProcessor::with_lengths(config(), &[1024]).unwrap();
        let result = processor.set_config(AudioConfig {
            analysis_samples: 2048,
            ..config()
        });
        assert!(matches!(result, Err(AnalyzerError::Pool(_))));
        assert_eq!(processor.config().analysis_samples, 1024);
    }

    #[test]
    fn test_live_controls_update_config() {
        let mut processor = AudioProcessor::with_lengths(config(), &[1024]).unwrap();

        processor.set_generator(GeneratorType::PinkNoise);
        processor.set_output_volume(3.0);
        processor.set_sine_frequency(440.0);

        assert_eq!(processor.controls().generator(), GeneratorType::PinkNoise);
        assert_eq!(processor.config().output_volume, 1.0);
        assert_eq!(processor.controls().sine_frequency(), 440.0);
        assert!(processor.config().validate().is_ok());
    }

    #[test]
    fn test_length_change_stretches_running_sweep() {
        let mut processor = AudioProcessor::with_lengths(
            AudioConfig {
                generator: GeneratorType::Sweep,
                ..config()
            },
            &[1024, 4096],
        )
        .unwrap();
        let mut stale = processor.duplex_stage(1);

        processor
            .set_config(AudioConfig {
                analysis_samples: 4096,
                ..processor.config().clone()
            })
            .unwrap();
        assert_eq!(processor.controls().sweep_samples(), 4096);
        let mut fresh = processor.duplex_stage(1);

        // Only the rendered sweep is compared; the captured input is silence
        let input = vec![0.0f32; 2 * 256];
        let mut expected = vec![0.0f32; 256];
        let mut output = vec![0.0f32; 256];
        for _ in 0..8 {
            fresh.process(&input, &mut expected);
            stale.process(&input, &mut output);
            assert_eq!(output, expected);
        }
    }

    #[test]
    fn test_worker_start_stop() {
        let mut processor = AudioProcessor::with_lengths(config(), &[1024]).unwrap();
        processor.start_worker().unwrap();
        assert!(processor.is_running());
        // Starting twice is a no-op
        processor.start_worker().unwrap();

        processor.stop();
        assert!(!processor.is_running());
        assert!(!processor.is_streaming());
    }
}
