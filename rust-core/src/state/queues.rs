//! Slot hand-off between the audio callback, the analysis worker and the
//! snapshot reader
//!
//! A slot handle is always in exactly one place: `unused`, `capturing`,
//! `pending`, `processing` (worker in flight) or `done`. All moves happen
//! inside short critical sections that touch handles only, never sample
//! data. When both locks are needed they are taken in a fixed order:
//! `done` first, then the capture queues.

use super::pool::{PoolError, SlotHandle, SlotPool, POOL_SIZE};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handles shared by the callback and the worker
struct CaptureQueues {
    generation: u64,
    length: usize,
    unused: VecDeque<SlotHandle>,
    pending: VecDeque<SlotHandle>,
    capturing: Option<SlotHandle>,
    processing: Option<SlotHandle>,
}

impl CaptureQueues {
    fn is_current(&self, handle: SlotHandle) -> bool {
        handle.generation == self.generation && handle.length == self.length
    }
}

/// Where the slots of the active bucket currently are
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occupancy {
    pub unused: usize,
    pub pending: usize,
    pub capturing: usize,
    pub processing: usize,
    pub done: usize,
}

impl Occupancy {
    pub fn total(&self) -> usize {
        self.unused + self.pending + self.capturing + self.processing + self.done
    }
}

/// The four-way slot queue with its own locking
pub struct SlotQueues {
    /// Newest fully analysed slot (worker writes, consumer reads)
    done: Mutex<Option<SlotHandle>>,

    /// unused / pending / capturing / processing
    capture: Mutex<CaptureQueues>,

    /// Mirror of the queue generation for lock-free staleness checks
    generation: AtomicU64,

    /// Frames published to `done` so far
    frame_count: AtomicU64,

    /// Capture periods skipped because no slot was free
    dropped_periods: AtomicU64,
}

impl SlotQueues {
    /// Queues populated with every slot of `length`
    pub fn new(pool: &SlotPool, length: usize) -> Result<Self, PoolError> {
        let mut unused = VecDeque::with_capacity(POOL_SIZE);
        unused.extend(pool.handles(length, 0)?);

        Ok(Self {
            done: Mutex::new(None),
            capture: Mutex::new(CaptureQueues {
                generation: 0,
                length,
                unused,
                pending: VecDeque::with_capacity(POOL_SIZE),
                capturing: None,
                processing: None,
            }),
            generation: AtomicU64::new(0),
            frame_count: AtomicU64::new(0),
            dropped_periods: AtomicU64::new(0),
        })
    }

    /// Take a free slot for capture; `None` means drop this capture
    pub fn try_acquire(&self) -> Option<SlotHandle> {
        let mut queues = self.capture.lock();
        if queues.capturing.is_some() {
            return None;
        }
        let handle = queues.unused.pop_front()?;
        queues.capturing = Some(handle);
        Some(handle)
    }

    /// Give a capturing or in-flight slot back without publishing it
    pub fn release(&self, handle: SlotHandle) {
        let mut queues = self.capture.lock();
        if !queues.is_current(handle) {
            return;
        }
        if queues.capturing == Some(handle) {
            queues.capturing = None;
        } else if queues.processing == Some(handle) {
            queues.processing = None;
        } else {
            return;
        }
        queues.unused.push_back(handle);
    }

    /// Hand a full capture slot to the worker
    ///
    /// Returns false (and drops the handle) if the queues were reset since
    /// the slot was acquired.
    pub fn push_pending(&self, handle: SlotHandle) -> bool {
        let mut queues = self.capture.lock();
        if !queues.is_current(handle) || queues.capturing != Some(handle) {
            return false;
        }
        queues.capturing = None;
        queues.pending.push_back(handle);
        true
    }

    /// Oldest slot waiting for analysis
    pub fn pop_pending(&self) -> Option<SlotHandle> {
        let mut queues = self.capture.lock();
        if queues.processing.is_some() {
            return None;
        }
        let handle = queues.pending.pop_front()?;
        queues.processing = Some(handle);
        Some(handle)
    }

    /// Publish an analysed slot as the newest frame
    ///
    /// The previous `done` slot goes back to `unused`. Returns false if the
    /// slot belongs to a population that was reset while it was analysed.
    pub fn swap_done(&self, handle: SlotHandle) -> bool {
        let mut done = self.done.lock();
        let mut queues = self.capture.lock();

        if queues.processing == Some(handle) {
            queues.processing = None;
        }
        if !queues.is_current(handle) {
            return false;
        }

        if let Some(previous) = done.replace(handle) {
            queues.unused.push_back(previous);
        }
        self.frame_count.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Drop every handle and repopulate from the bucket for `length`
    pub fn reset(&self, pool: &SlotPool, length: usize) -> Result<(), PoolError> {
        let mut done = self.done.lock();
        let mut queues = self.capture.lock();

        let generation = queues.generation + 1;
        let handles = pool.handles(length, generation)?;

        *done = None;
        queues.generation = generation;
        queues.length = length;
        queues.capturing = None;
        queues.processing = None;
        queues.pending.clear();
        queues.unused.clear();
        queues.unused.extend(handles);
        self.generation.store(generation, Ordering::Release);

        tracing::debug!(length, generation, "slot queues reset");
        Ok(())
    }

    /// Run `f` on the current `done` handle while it cannot be replaced
    pub fn with_done<R>(&self, f: impl FnOnce(SlotHandle) -> R) -> Option<R> {
        let done = self.done.lock();
        done.map(f)
    }

    /// Snapshot of where every slot is
    pub fn occupancy(&self) -> Occupancy {
        let done = self.done.lock();
        let queues = self.capture.lock();
        Occupancy {
            unused: queues.unused.len(),
            pending: queues.pending.len(),
            capturing: usize::from(queues.capturing.is_some()),
            processing: usize::from(queues.processing.is_some()),
            done: usize::from(done.is_some()),
        }
    }

    /// Analysis length of the active bucket
    pub fn active_length(&self) -> usize {
        self.capture.lock().length
    }

    /// Current population; bumps on every reset
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Frames published so far (poll and compare to detect new data)
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn note_dropped_period(&self) {
        self.dropped_periods.fetch_add(1, Ordering::Relaxed);
    }

    /// Capture periods skipped for lack of a free slot
    pub fn dropped_periods(&self) -> u64 {
        self.dropped_periods.load(Ordering::Relaxed)
    }
}
