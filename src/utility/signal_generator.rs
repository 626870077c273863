// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-rtscope project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Test Signal Generator
//!
//! Produces periodic test waveforms with optional gaussian white noise for
//! the simulated process image.
//!
//! ## Examples
//!
//! ```rust
//! use rust_rtscope::utility::signal_generator::{SignalGenerator, Waveform};
//!
//! // 73 Hz sine sampled at 10 kHz, no noise, fixed seed
//! let mut generator = SignalGenerator::new(Waveform::Sine, 73.0, 10_000.0, 1.0, 0.0, 0.0, Some(42));
//! let mut block = [0.0; 10];
//! generator.fill(&mut block);
//! assert_eq!(block[0], 0.0);
//! ```

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Shape of a generated signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    /// `offset + amplitude * n` where `n` is the sample index
    Ramp,
    Constant,
}

/// Sample-by-sample generator of one waveform.
///
/// The generator keeps a running sample index, so consecutive calls to
/// [`SignalGenerator::fill`] continue the same signal without phase jumps.
pub struct SignalGenerator {
    waveform: Waveform,
    frequency_hz: f64,
    sample_rate_hz: f64,
    amplitude: f64,
    offset: f64,
    noise_amplitude: f64,
    sample_index: u64,
    rng: StdRng,
}

impl SignalGenerator {
    /// Creates a generator.
    ///
    /// # Arguments
    ///
    /// * `waveform` - Shape of the signal
    /// * `frequency_hz` - Frequency of periodic waveforms
    /// * `sample_rate_hz` - Rate at which samples are produced
    /// * `amplitude` - Peak amplitude, or the slope per sample for [`Waveform::Ramp`]
    /// * `offset` - Constant added to every sample
    /// * `noise_amplitude` - Standard deviation of the gaussian noise, 0 disables it
    /// * `seed` - Seed of the noise generator, random when `None`
    pub fn new(
        waveform: Waveform,
        frequency_hz: f64,
        sample_rate_hz: f64,
        amplitude: f64,
        offset: f64,
        noise_amplitude: f64,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            waveform,
            frequency_hz,
            sample_rate_hz,
            amplitude,
            offset,
            noise_amplitude,
            sample_index: 0,
            rng,
        }
    }

    /// Index of the next sample to be generated
    pub fn sample_index(&self) -> u64 {
        self.sample_index
    }

    /// Generates a value from a standard normal distribution.
    ///
    /// Uses the Box-Muller transform on two uniform values.
    pub fn random_gaussian(&mut self) -> f64 {
        // Avoid ln(0)
        let u1: f64 = self.rng.random::<f64>().max(f64::MIN_POSITIVE);
        let u2: f64 = self.rng.random::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    fn clean_sample(&self, n: u64) -> f64 {
        let t = n as f64 / self.sample_rate_hz;
        let phase = 2.0 * PI * self.frequency_hz * t;
        let shape = match self.waveform {
            Waveform::Sine => self.amplitude * phase.sin(),
            Waveform::Square => {
                if phase.sin() >= 0.0 {
                    self.amplitude
                } else {
                    -self.amplitude
                }
            }
            Waveform::Ramp => self.amplitude * n as f64,
            Waveform::Constant => 0.0,
        };
        self.offset + shape
    }

    /// Produces the next sample
    pub fn next_sample(&mut self) -> f64 {
        let mut value = self.clean_sample(self.sample_index);
        if self.noise_amplitude > 0.0 {
            value += self.random_gaussian() * self.noise_amplitude;
        }
        self.sample_index += 1;
        value
    }

    /// Fills `out` with consecutive samples
    pub fn fill(&mut self, out: &mut [f64]) {
        for slot in out.iter_mut() {
            *slot = self.next_sample();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_continues_across_blocks() {
        let mut generator = SignalGenerator::new(Waveform::Ramp, 0.0, 1.0, 1.0, 5.0, 0.0, Some(1));
        let mut first = [0.0; 3];
        let mut second = [0.0; 3];
        generator.fill(&mut first);
        generator.fill(&mut second);
        assert_eq!(first, [5.0, 6.0, 7.0]);
        assert_eq!(second, [8.0, 9.0, 10.0]);
        assert_eq!(generator.sample_index(), 6);
    }

    #[test]
    fn test_square_levels() {
        let mut generator = SignalGenerator::new(Waveform::Square, 1.0, 8.0, 3.0, 0.0, 0.0, Some(1));
        let mut block = [0.0; 8];
        generator.fill(&mut block);
        assert!(block[..4].iter().all(|v| *v == 3.0));
        assert!(block[5..].iter().all(|v| *v == -3.0));
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let mut a = SignalGenerator::new(Waveform::Constant, 0.0, 1.0, 0.0, 0.0, 1.0, Some(7));
        let mut b = SignalGenerator::new(Waveform::Constant, 0.0, 1.0, 0.0, 0.0, 1.0, Some(7));
        let mut block_a = [0.0; 64];
        let mut block_b = [0.0; 64];
        a.fill(&mut block_a);
        b.fill(&mut block_b);
        assert_eq!(block_a, block_b);
        assert!(block_a.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_gaussian_statistics() {
        let mut generator =
            SignalGenerator::new(Waveform::Constant, 0.0, 1.0, 0.0, 0.0, 0.0, Some(123));
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| generator.random_gaussian()).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((variance - 1.0).abs() < 0.1, "variance {}", variance);
    }
}
