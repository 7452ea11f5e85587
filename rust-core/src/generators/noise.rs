//! White and pink noise sources

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform white noise in [-1, 1)
pub struct WhiteNoise {
    rng: StdRng,
}

impl WhiteNoise {
    /// Seed from the OS entropy source
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic sequence, for tests and reproducible measurements
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        self.rng.gen_range(-1.0..1.0)
    }
}

impl Default for WhiteNoise {
    fn default() -> Self {
        Self::new()
    }
}

/// Pink noise from Paul Kellet's refined 7-pole pinking filter
///
/// Coefficients from <http://www.firstpr.com.au/dsp/pink-noise/#Filtering>,
/// scaled down by 0.1 to keep the output roughly within [-1, 1].
pub struct PinkNoise {
    white: WhiteNoise,
    b: [f64; 7],
}

impl PinkNoise {
    const GAIN: f64 = 0.1;

    pub fn new() -> Self {
        Self::from_white(WhiteNoise::new())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::from_white(WhiteNoise::with_seed(seed))
    }

    fn from_white(white: WhiteNoise) -> Self {
        Self { white, b: [0.0; 7] }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f64 {
        let white = self.white.next_sample() * Self::GAIN;
        let b = &mut self.b;

        b[0] = 0.99886 * b[0] + white * 0.0555179;
        b[1] = 0.99332 * b[1] + white * 0.0750759;
        b[2] = 0.96900 * b[2] + white * 0.1538520;
        b[3] = 0.86650 * b[3] + white * 0.3104856;
        b[4] = 0.55000 * b[4] + white * 0.5329522;
        b[5] = -0.7616 * b[5] - white * 0.0168980;
        let pink = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
        b[6] = white * 0.115926;

        pink
    }
}

impl Default for PinkNoise {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_noise_range_and_mean() {
        let mut noise = WhiteNoise::with_seed(7);
        let samples: Vec<f64> = (0..48000).map(|_| noise.next_sample()).collect();

        assert!(samples.iter().all(|&s| (-1.0..1.0).contains(&s)));
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!(mean.abs() < 0.02);
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let mut a = PinkNoise::with_seed(42);
        let mut b = PinkNoise::with_seed(42);
        for _ in 0..1000 {
            assert_eq!(a.next_sample(), b.next_sample());
        }
    }

    #[test]
    fn test_pink_noise_bounded() {
        let mut noise = PinkNoise::with_seed(3);
        let peak = (0..96000)
            .map(|_| noise.next_sample().abs())
            .fold(0.0, f64::max);
        assert!(peak > 0.0 && peak < 1.0);
    }

    #[test]
    fn test_pink_noise_is_low_pass_heavy() {
        // Pink noise has more energy in slow variations than white noise:
        // neighbouring samples are strongly correlated.
        let mut noise = PinkNoise::with_seed(11);
        let samples: Vec<f64> = (0..65536).map(|_| noise.next_sample()).collect();

        let energy: f64 = samples.iter().map(|s| s * s).sum();
        let lag1: f64 = samples.windows(2).map(|w| w[0] * w[1]).sum();
        assert!(lag1 / energy > 0.5);
    }
}
