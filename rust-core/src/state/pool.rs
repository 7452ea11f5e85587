//! Fixed arena of analysis slots, one bucket per analysis length
//!
//! Every slot (and its FFT plans) is built once at startup. Nothing in the
//! real-time path ever creates or destroys a slot; it only moves
//! `SlotHandle`s between queues.

use super::slot::AnalysisSlot;
use crate::config::{is_supported_analysis_length, supported_analysis_lengths};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;

/// Number of slots per analysis length
pub const POOL_SIZE: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Slot pool needs at least one analysis length")]
    NoLengths,

    #[error("Analysis length {0} is not supported")]
    UnsupportedLength(usize),

    #[error("No slots were built for analysis length {0}")]
    MissingBucket(usize),
}

/// Stable reference to a slot in the pool
///
/// `generation` ties the handle to one queue population; handles from
/// before a reset are recognised as stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotHandle {
    pub(crate) length: usize,
    pub(crate) index: usize,
    pub(crate) generation: u64,
}

impl SlotHandle {
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owns every analysis slot for the lifetime of the process
pub struct SlotPool {
    buckets: BTreeMap<usize, Box<[Mutex<AnalysisSlot>]>>,
}

impl SlotPool {
    /// Build `POOL_SIZE` slots for each of `lengths`
    ///
    /// Planning the FFTs dominates the cost; call this once at startup.
    pub fn new(lengths: &[usize]) -> Result<Self, PoolError> {
        if lengths.is_empty() {
            return Err(PoolError::NoLengths);
        }

        let started = Instant::now();
        let mut buckets = BTreeMap::new();

        for &length in lengths {
            if !is_supported_analysis_length(length) {
                return Err(PoolError::UnsupportedLength(length));
            }

            let slots: Box<[Mutex<AnalysisSlot>]> = (0..POOL_SIZE)
                .map(|_| Mutex::new(AnalysisSlot::new(length)))
                .collect();
            buckets.insert(length, slots);
            tracing::debug!(length, slots = POOL_SIZE, "slot bucket built");
        }

        tracing::info!(
            buckets = buckets.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "slot pool ready"
        );

        Ok(Self { buckets })
    }

    /// Build buckets for every supported analysis length
    pub fn with_supported_lengths() -> Result<Self, PoolError> {
        Self::new(&supported_analysis_lengths())
    }

    /// Analysis lengths this pool has buckets for, ascending
    pub fn lengths(&self) -> impl Iterator<Item = usize> + '_ {
        self.buckets.keys().copied()
    }

    pub fn contains_length(&self, length: usize) -> bool {
        self.buckets.contains_key(&length)
    }

    /// All slots of one length
    pub fn bucket(&self, length: usize) -> Option<&[Mutex<AnalysisSlot>]> {
        self.buckets.get(&length).map(|slots| &slots[..])
    }

    /// Resolve a handle to its slot
    pub fn slot(&self, handle: SlotHandle) -> Option<&Mutex<AnalysisSlot>> {
        self.buckets
            .get(&handle.length)
            .and_then(|slots| slots.get(handle.index))
    }

    pub(crate) fn handles(&self, length: usize, generation: u64) -> Result<impl Iterator<Item = SlotHandle>, PoolError> {
        let slots = self
            .buckets
            .get(&length)
            .ok_or(PoolError::MissingBucket(length))?;
        Ok((0..slots.len()).map(move |index| SlotHandle {
            length,
            index,
            generation,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_buckets() {
        let pool = SlotPool::new(&[1024, 2048]).unwrap();
        assert_eq!(pool.lengths().collect::<Vec<_>>(), vec![1024, 2048]);

        for length in [1024, 2048] {
            let bucket = pool.bucket(length).unwrap();
            assert_eq!(bucket.len(), POOL_SIZE);
            assert!(bucket.iter().all(|slot| slot.lock().length() == length));
        }
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert_eq!(SlotPool::new(&[]).err(), Some(PoolError::NoLengths));
        assert_eq!(
            SlotPool::new(&[1024, 1000]).err(),
            Some(PoolError::UnsupportedLength(1000))
        );
    }

    #[test]
    fn test_handle_resolution() {
        let pool = SlotPool::new(&[1024]).unwrap();
        let handles: Vec<_> = pool.handles(1024, 0).unwrap().collect();
        assert_eq!(handles.len(), POOL_SIZE);
        assert!(handles.iter().all(|&h| pool.slot(h).is_some()));

        let bogus = SlotHandle {
            length: 4096,
            index: 0,
            generation: 0,
        };
        assert!(pool.slot(bogus).is_none());
        assert_eq!(pool.handles(4096, 0).err(), Some(PoolError::MissingBucket(4096)));
    }
}
