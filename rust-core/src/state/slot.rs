//! Analysis slot: one frame's buffers plus the FFT plans bound to them

use super::data::StateData;
use crate::spectrum::averaging::MagnitudeAverager;
use crate::spectrum::fft::FftEngine;
use crate::spectrum::kernels::{self, CoherenceBuffers, DivisionPolicy};
use crate::spectrum::windowing::{apply_window_into, WindowFilter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlotError {
    #[error("FFT failed: {0}")]
    Fft(#[from] realfft::FftError),
}

/// Analysis settings and history shared by every slot of the live capture
///
/// Only the analysis worker runs frames through this, so the magnitude
/// ring sees frames in capture order.
#[derive(Debug, Clone)]
pub struct SharedFilterState {
    /// Window applied to input and reference
    pub window: WindowFilter,

    /// Handling of near-zero reference bins
    pub division: DivisionPolicy,

    /// Cross-frame magnitude average
    pub averager: MagnitudeAverager,
}

impl SharedFilterState {
    pub fn new(window: WindowFilter, average_count: usize, division: DivisionPolicy) -> Self {
        Self {
            window,
            division,
            averager: MagnitudeAverager::new(average_count),
        }
    }
}

impl Default for SharedFilterState {
    fn default() -> Self {
        Self::new(WindowFilter::Blackman, 2, DivisionPolicy::Propagate)
    }
}

/// Pre-allocated frame plus its FFT plans
///
/// Created once at startup; `length` never changes afterwards.
pub struct AnalysisSlot {
    data: StateData,
    engine: FftEngine,
}

impl AnalysisSlot {
    /// Allocate every buffer and plan the transforms for `length` samples
    pub fn new(length: usize) -> Self {
        Self {
            data: StateData::new(length),
            engine: FftEngine::new(length),
        }
    }

    pub fn length(&self) -> usize {
        self.data.length
    }

    /// Read-only view of the frame (copy it to keep it)
    pub fn data(&self) -> &StateData {
        &self.data
    }

    /// Mutable view, used by capture to fill the raw buffers
    pub fn data_mut(&mut self) -> &mut StateData {
        &mut self.data
    }

    /// Store one captured sample pair at `index`
    #[inline]
    pub fn write_sample(&mut self, index: usize, reference: f64, input: f64) {
        self.data.reference[index] = reference;
        self.data.input[index] = input;
    }

    /// Run the full analysis chain over the captured `input`/`reference`
    ///
    /// Window, forward FFT, transfer function, averaged magnitude,
    /// coherence, impulse response, then the display smoothing. Writes only
    /// this slot's buffers and the shared magnitude history.
    pub fn calc(&mut self, shared: &mut SharedFilterState) -> Result<(), SlotError> {
        let data = &mut self.data;
        let engine = &mut self.engine;

        apply_window_into(&mut data.windowed_input, &data.input, shared.window);
        apply_window_into(&mut data.windowed_reference, &data.reference, shared.window);

        engine.forward_normalized(&data.windowed_input, &mut data.spectrum_input)?;
        engine.forward_normalized(&data.windowed_reference, &mut data.spectrum_reference)?;

        kernels::transfer_function(
            &mut data.transfer_function,
            &data.spectrum_input,
            &data.spectrum_reference,
            shared.division,
        );

        kernels::magnitude(&mut data.magnitude, &data.spectrum_input);
        shared.averager.apply(&mut data.magnitude);

        kernels::coherence(
            CoherenceBuffers {
                psd_input: &mut data.psd_input,
                psd_reference: &mut data.psd_reference,
                csd: &mut data.csd,
                coherence: &mut data.coherence,
            },
            &data.spectrum_input,
            &data.spectrum_reference,
            kernels::coherence_depth(data.length),
            shared.division,
        );

        engine.inverse_normalized(&data.transfer_function, &mut data.impulse_response)?;

        kernels::smooth(&mut data.smoothed_magnitude, &data.magnitude);
        kernels::smooth(&mut data.smoothed_transfer_function, &data.transfer_function);
        kernels::smooth(&mut data.smoothed_impulse_response, &data.impulse_response);
        kernels::smooth(&mut data.smoothed_coherence, &data.coherence);

        Ok(())
    }
}
