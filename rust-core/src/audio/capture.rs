//! Capture side of the audio callback
//!
//! Fills the held analysis slot one sample pair per frame and hands it to
//! the worker once full. Runs on the real-time thread: no allocation, no
//! logging, and the only lock that can block is the short queue lock.

use super::playback::PlaybackStage;
use crate::config::AudioConfig;
use crate::state::{Pipeline, SlotHandle};
use std::sync::Arc;

/// Where reference and input come from in the capture stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRouting {
    /// Mono capture; the generated playback signal is the reference
    Internal,

    /// Two-channel capture with explicit channel indices
    External { reference: usize, input: usize },
}

impl ChannelRouting {
    pub fn from_config(config: &AudioConfig) -> Self {
        if config.channel_count == 1 {
            ChannelRouting::Internal
        } else {
            ChannelRouting::External {
                reference: usize::from(config.reference_channel),
                input: usize::from(config.input_channel),
            }
        }
    }

    /// Interleaved channels per capture frame
    pub fn channels(&self) -> usize {
        match self {
            ChannelRouting::Internal => 1,
            ChannelRouting::External { .. } => 2,
        }
    }

    /// Split one capture frame into `(reference, input)`
    #[inline]
    fn demux(&self, frame: &[f32], generated: f32) -> (f64, f64) {
        match *self {
            ChannelRouting::Internal => (f64::from(generated), f64::from(frame[0])),
            ChannelRouting::External { reference, input } => {
                (f64::from(frame[reference]), f64::from(frame[input]))
            }
        }
    }
}

/// Writes captured periods into analysis slots
pub struct CaptureStage {
    pipeline: Arc<Pipeline>,
    routing: ChannelRouting,
    held: Option<SlotHandle>,
    offset: usize,
}

impl CaptureStage {
    pub fn new(pipeline: Arc<Pipeline>, routing: ChannelRouting) -> Self {
        Self {
            pipeline,
            routing,
            held: None,
            offset: 0,
        }
    }

    pub fn routing(&self) -> ChannelRouting {
        self.routing
    }

    /// Samples already written into the held slot
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Make sure a slot is held, acquiring one if needed
    ///
    /// Handles from before a queue reset are dropped here.
    #[inline]
    pub fn ensure_slot(&mut self) -> Option<SlotHandle> {
        let queues = self.pipeline.queues();

        if let Some(handle) = self.held {
            if handle.generation() == queues.generation() {
                return Some(handle);
            }
            self.held = None;
        }

        let handle = queues.try_acquire()?;
        self.held = Some(handle);
        self.offset = 0;
        Some(handle)
    }

    /// Consume one interleaved capture period
    ///
    /// `generated` is the mono playback signal of the same period (only
    /// read with `ChannelRouting::Internal`). Frames that find no free slot
    /// are dropped and counted.
    pub fn capture(&mut self, input: &[f32], generated: &[f32]) {
        let channels = self.routing.channels();
        let frames = input.len() / channels;
        let mut frame = 0;

        while frame < frames {
            let Some(handle) = self.ensure_slot() else {
                self.pipeline.queues().note_dropped_period();
                return;
            };
            let Some(slot) = self.pipeline.pool().slot(handle) else {
                self.held = None;
                return;
            };
            // The worker may still be finishing this slot from before a reset
            let Some(mut slot) = slot.try_lock() else {
                self.pipeline.queues().note_dropped_period();
                return;
            };

            let length = slot.length();
            let take = (length - self.offset).min(frames - frame);

            for i in 0..take {
                let index = frame + i;
                let start = index * channels;
                let generated = generated.get(index).copied().unwrap_or(0.0);
                let (reference, sample) = self.routing.demux(&input[start..start + channels], generated);
                slot.write_sample(self.offset + i, reference, sample);
            }
            drop(slot);

            self.offset += take;
            frame += take;

            if self.offset == length {
                self.pipeline.queues().push_pending(handle);
                self.held = None;
                self.offset = 0;
            }
        }
    }
}

/// One callback driving both playback and capture
///
/// The backend-neutral entry point: feed it interleaved periods from any
/// full-duplex audio API.
pub struct DuplexStage {
    playback: PlaybackStage,
    capture: CaptureStage,
    reference: Vec<f32>,
}

impl DuplexStage {
    /// `max_frames` sizes the internal reference buffer; longer periods
    /// are processed in chunks
    pub fn new(playback: PlaybackStage, capture: CaptureStage, max_frames: usize) -> Self {
        Self {
            playback,
            capture,
            reference: vec![0.0; max_frames.max(1)],
        }
    }

    pub fn capture(&self) -> &CaptureStage {
        &self.capture
    }

    /// Render `output` and capture `input` for one period
    ///
    /// Both buffers are interleaved; only the frames present in both are
    /// processed. Rendering is split at slot boundaries so the sweep
    /// restarts on the first sample of every slot.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let in_channels = self.capture.routing().channels();
        let out_channels = self.playback.channels();
        let frames = (input.len() / in_channels).min(output.len() / out_channels);
        let chunk = self.reference.len();

        let mut start = 0;
        while start < frames {
            let mut count = chunk.min(frames - start);

            if let Some(handle) = self.capture.ensure_slot() {
                let offset = self.capture.offset();
                if offset == 0 {
                    self.playback.sync();
                }
                count = count.min(handle.length() - offset);
            }

            let reference = &mut self.reference[..count];
            self.playback.render(
                &mut output[start * out_channels..(start + count) * out_channels],
                reference,
            );
            self.capture.capture(
                &input[start * in_channels..(start + count) * in_channels],
                reference,
            );

            start += count;
        }
    }
}
