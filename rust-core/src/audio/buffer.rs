//! Lock-free hand-off of generated reference samples
//!
//! When playback and capture run as two separate streams the internal
//! reference has to travel from the output callback to the input callback.
//! A single-producer single-consumer ring does that without locks.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};

/// Ring of mono reference samples, split into its two ends before use
pub struct ReferenceRing {
    producer: HeapProducer<f32>,
    consumer: HeapConsumer<f32>,
}

impl ReferenceRing {
    /// Create a ring holding up to `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        Self { producer, consumer }
    }

    /// Split into the playback (writing) and capture (reading) ends
    pub fn split(self) -> (ReferenceProducer, ReferenceConsumer) {
        (
            ReferenceProducer {
                producer: self.producer,
            },
            ReferenceConsumer {
                consumer: self.consumer,
            },
        )
    }
}

/// Playback end
pub struct ReferenceProducer {
    producer: HeapProducer<f32>,
}

impl ReferenceProducer {
    /// Queue `samples`; returns how many fit (the rest are lost)
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }
}

/// Capture end
pub struct ReferenceConsumer {
    consumer: HeapConsumer<f32>,
}

impl ReferenceConsumer {
    /// Fill `out` with queued samples, padding with silence on underrun
    ///
    /// Returns the number of real samples read.
    pub fn pop_into(&mut self, out: &mut [f32]) -> usize {
        let read = self.consumer.pop_slice(out);
        out[read..].fill(0.0);
        read
    }
}
