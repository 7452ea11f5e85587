//! Background analysis worker
//!
//! Polls the pending queue, runs the DSP chain on one slot per cycle and
//! publishes the result as the newest frame.

use crate::state::{Pipeline, SlotError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Sleep between polls of the pending queue
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Minimum gap between two dropped-capture warnings
const DROP_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of one worker step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Nothing was pending
    Idle,
    /// A frame was analysed and is now the newest
    Published,
    /// The frame belonged to a configuration that was reset meanwhile
    Discarded,
}

/// Runs the DSP chain off the real-time thread
pub struct AnalysisWorker {
    pipeline: Arc<Pipeline>,
    reported_drops: u64,
    last_report: Option<Instant>,
}

impl AnalysisWorker {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            reported_drops: 0,
            last_report: None,
        }
    }

    /// Analyse at most one pending slot
    ///
    /// On an FFT failure the slot goes straight back to `unused`.
    pub fn process_one(&mut self) -> Result<WorkOutcome, SlotError> {
        let queues = self.pipeline.queues();
        let Some(handle) = queues.pop_pending() else {
            return Ok(WorkOutcome::Idle);
        };
        let Some(slot) = self.pipeline.pool().slot(handle) else {
            queues.release(handle);
            return Ok(WorkOutcome::Discarded);
        };

        let result = {
            let mut slot = slot.lock();
            let mut filter = self.pipeline.filter().lock();
            if handle.generation() != queues.generation() {
                None
            } else {
                Some(slot.calc(&mut filter))
            }
        };

        match result {
            Some(Ok(())) if queues.swap_done(handle) => Ok(WorkOutcome::Published),
            Some(Ok(())) | None => {
                queues.release(handle);
                Ok(WorkOutcome::Discarded)
            }
            Some(Err(e)) => {
                queues.release(handle);
                Err(e)
            }
        }
    }

    /// Run until `running` clears, then return
    pub fn run(mut self, running: Arc<AtomicBool>) {
        tracing::debug!("analysis worker started");

        while running.load(Ordering::Acquire) {
            std::thread::sleep(POLL_INTERVAL);

            if let Err(e) = self.process_one() {
                tracing::warn!(error = %e, "analysis failed, frame discarded");
            }
            self.report_drops();
        }

        tracing::debug!(frames = self.pipeline.queues().frame_count(), "analysis worker stopped");
    }

    /// Spawn `run` on a named thread
    pub fn spawn(self, running: Arc<AtomicBool>) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("analysis-worker".into())
            .spawn(move || self.run(running))
    }

    fn report_drops(&mut self) {
        let dropped = self.pipeline.queues().dropped_periods();
        if dropped == self.reported_drops {
            return;
        }
        if self
            .last_report
            .is_some_and(|at| at.elapsed() < DROP_REPORT_INTERVAL)
        {
            return;
        }

        tracing::warn!(
            dropped = dropped - self.reported_drops,
            total = dropped,
            "capture periods dropped, analysis is not keeping up"
        );
        self.reported_drops = dropped;
        self.last_report = Some(Instant::now());
    }
}
