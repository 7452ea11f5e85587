//! Cross-frame magnitude averaging
//!
//! Keeps the raw magnitude of the last K frames and replaces each new
//! magnitude vector with the mean over that ring. The ring is bound to one
//! analysis length; a frame of a different length rebinds (and clears) it.

use crate::config::MAX_AVERAGE_COUNT;

/// Ring of past magnitude vectors
#[derive(Debug, Clone, Default)]
pub enum AverageRing {
    /// Nothing seen yet (or explicitly cleared)
    #[default]
    Uninitialized,

    /// Bound to frames of `length` samples
    Bound {
        length: usize,
        /// `MAX_AVERAGE_COUNT` rows of `length` magnitudes
        rows: Vec<Vec<f64>>,
        /// Next row to overwrite
        cursor: usize,
    },
}

/// Averaging state shared by every frame of the live capture
#[derive(Debug, Clone, Default)]
pub struct MagnitudeAverager {
    ring: AverageRing,
    count: usize,
}

impl MagnitudeAverager {
    /// Create an averager over `count` frames (clamped to `MAX_AVERAGE_COUNT`)
    pub fn new(count: usize) -> Self {
        Self {
            ring: AverageRing::Uninitialized,
            count: count.min(MAX_AVERAGE_COUNT),
        }
    }

    /// Number of frames averaged (0 = pass-through)
    pub fn count(&self) -> usize {
        self.count
    }

    /// Change the averaging depth; history is discarded
    pub fn set_count(&mut self, count: usize) {
        let count = count.min(MAX_AVERAGE_COUNT);
        if count != self.count {
            self.count = count;
            self.reset();
        }
    }

    /// Forget all history
    pub fn reset(&mut self) {
        self.ring = AverageRing::Uninitialized;
    }

    /// Length the ring is currently bound to
    pub fn bound_length(&self) -> Option<usize> {
        match &self.ring {
            AverageRing::Uninitialized => None,
            AverageRing::Bound { length, .. } => Some(*length),
        }
    }

    /// True when no history is held (unbound, or every stored value is zero)
    pub fn is_cleared(&self) -> bool {
        match &self.ring {
            AverageRing::Uninitialized => true,
            AverageRing::Bound { rows, .. } => rows.iter().flatten().all(|&v| v == 0.0),
        }
    }

    /// Store `magnitude` as the newest frame and overwrite it with the mean
    /// of the last `count` frames
    ///
    /// Until `count` frames have been seen the missing ones count as zero.
    pub fn apply(&mut self, magnitude: &mut [f64]) {
        if self.count == 0 {
            return;
        }

        let length = magnitude.len();
        let count = self.count;

        let needs_rebind = match &self.ring {
            AverageRing::Bound { length: bound, .. } => *bound != length,
            AverageRing::Uninitialized => true,
        };
        if needs_rebind {
            self.ring = AverageRing::Bound {
                length,
                rows: vec![vec![0.0; length]; MAX_AVERAGE_COUNT],
                cursor: 0,
            };
        }

        let AverageRing::Bound { rows, cursor, .. } = &mut self.ring else {
            return;
        };

        rows[*cursor].copy_from_slice(magnitude);

        let scale = 1.0 / count as f64;
        for (i, m) in magnitude.iter_mut().enumerate() {
            let sum: f64 = rows[..count].iter().map(|row| row[i]).sum();
            *m = sum * scale;
        }

        *cursor = (*cursor + 1) % count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_count_passes_through() {
        let mut avg = MagnitudeAverager::new(0);
        let mut mag = vec![1.0, 2.0, 3.0];
        avg.apply(&mut mag);
        assert_eq!(mag, vec![1.0, 2.0, 3.0]);
        assert!(avg.bound_length().is_none());
    }

    #[test]
    fn test_converges_after_count_frames() {
        let n = 4;
        let mut avg = MagnitudeAverager::new(n);

        for frame in 1..=n {
            let mut mag = vec![2.0; 16];
            avg.apply(&mut mag);
            // Missing frames count as zero until the ring is full
            let expected = 2.0 * frame as f64 / n as f64;
            assert!((mag[5] - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_forgets_frames_older_than_count() {
        let n = 3;
        let mut avg = MagnitudeAverager::new(n);

        let mut spike = vec![1000.0; 8];
        avg.apply(&mut spike);

        let mut mag = vec![1.0; 8];
        for _ in 0..n - 1 {
            mag = vec![1.0; 8];
            avg.apply(&mut mag);
        }
        // Spike still inside the window
        assert!(mag[0] > 300.0);

        let mut mag = vec![1.0; 8];
        avg.apply(&mut mag);
        assert!(mag.iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_length_change_rebinds() {
        let mut avg = MagnitudeAverager::new(2);
        let mut mag = vec![4.0; 32];
        avg.apply(&mut mag);
        assert_eq!(avg.bound_length(), Some(32));

        let mut mag = vec![4.0; 64];
        avg.apply(&mut mag);
        assert_eq!(avg.bound_length(), Some(64));
        // Fresh ring: one real frame, one zero frame
        assert!((mag[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_clears() {
        let mut avg = MagnitudeAverager::new(2);
        let mut mag = vec![1.0; 8];
        avg.apply(&mut mag);
        assert!(!avg.is_cleared());

        avg.reset();
        assert!(avg.is_cleared());
        assert!(avg.bound_length().is_none());
    }

    #[test]
    fn test_set_count_clamps_and_resets() {
        let mut avg = MagnitudeAverager::new(2);
        let mut mag = vec![1.0; 8];
        avg.apply(&mut mag);

        avg.set_count(100);
        assert_eq!(avg.count(), MAX_AVERAGE_COUNT);
        assert!(avg.is_cleared());
    }
}
