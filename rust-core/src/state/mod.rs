//! Analysis slots, the slot pool and the hand-off queues between them

pub mod data;
pub mod pool;
pub mod queues;
pub mod slot;

pub use data::StateData;
pub use pool::{PoolError, SlotHandle, SlotPool, POOL_SIZE};
pub use queues::{Occupancy, SlotQueues};
pub use slot::{AnalysisSlot, SharedFilterState, SlotError};

use crate::spectrum::windowing::WindowFilter;
use parking_lot::Mutex;

/// Everything the callback, the worker and the snapshot reader share
pub struct Pipeline {
    pool: SlotPool,
    queues: SlotQueues,
    filter: Mutex<SharedFilterState>,
}

impl Pipeline {
    /// Wire `pool` up with `length` as the active bucket
    pub fn new(pool: SlotPool, length: usize, filter: SharedFilterState) -> Result<Self, PoolError> {
        let queues = SlotQueues::new(&pool, length)?;
        Ok(Self {
            pool,
            queues,
            filter: Mutex::new(filter),
        })
    }

    pub fn pool(&self) -> &SlotPool {
        &self.pool
    }

    pub fn queues(&self) -> &SlotQueues {
        &self.queues
    }

    /// Window, division policy and magnitude history used by the worker
    pub fn filter(&self) -> &Mutex<SharedFilterState> {
        &self.filter
    }

    /// Switch to `length` and `window`, discarding every frame in flight
    ///
    /// The queue generation is bumped before the filter lock is taken, so a
    /// worker that finishes a stale frame after this returns never feeds it
    /// into the fresh magnitude history.
    pub fn reset(&self, length: usize, window: WindowFilter) -> Result<(), PoolError> {
        self.queues.reset(&self.pool, length)?;

        let mut filter = self.filter.lock();
        filter.window = window;
        filter.averager.reset();
        Ok(())
    }

    /// Deep copy of the newest analysed frame
    ///
    /// The copy runs under the `done` lock and the slot lock. The audio
    /// callback never takes `done` and never holds the published slot, so
    /// only the worker's next `swap_done` can wait on it.
    pub fn snapshot(&self) -> Option<StateData> {
        self.queues
            .with_done(|handle| self.pool.slot(handle).map(|slot| slot.lock().data().clone()))
            .flatten()
    }

    /// Copy the newest analysed frame into `out`, reusing its buffers
    ///
    /// Returns false (leaving `out` untouched) before the first frame.
    pub fn snapshot_into(&self, out: &mut StateData) -> bool {
        self.queues
            .with_done(|handle| match self.pool.slot(handle) {
                Some(slot) => {
                    out.copy_from(slot.lock().data());
                    true
                }
                None => false,
            })
            .unwrap_or(false)
    }
}
