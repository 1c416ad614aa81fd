//! Test signal synthesis: impulsive pulses and background noise.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::diagnostics::{window, WindowFunction};

/// Number of octave rows summed into pink noise.
const PINK_ROWS: usize = 16;

/// A Hann-windowed pulse of `len` samples with unit peak.
#[must_use]
pub fn hann_pulse(len: usize) -> Vec<f64> {
    window(WindowFunction::Hann, len)
}

/// Adds `pulse * amplitude` into `buffer` starting at `at`.
///
/// Returns `false`, leaving the buffer untouched, if the pulse does not fit.
pub fn inject_pulse(buffer: &mut [f64], pulse: &[f64], at: usize, amplitude: f64) -> bool {
    let Some(end) = at.checked_add(pulse.len()) else {
        return false;
    };
    if end > buffer.len() {
        return false;
    }
    for (dst, &p) in buffer[at..end].iter_mut().zip(pulse) {
        *dst += amplitude * p;
    }
    true
}

/// Seeded source of white and pink background noise.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    rng: StdRng,
}

impl NoiseGenerator {
    /// Creates a generator; the same seed always yields the same noise.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `n` samples of standard normal white noise.
    pub fn white(&mut self, n: usize) -> Vec<f64> {
        (0..n).map(|_| self.rng.sample(StandardNormal)).collect()
    }

    /// `n` samples of pink-like noise.
    ///
    /// Sums [`PINK_ROWS`] independent random walks, row `r` weighted by
    /// `2^-r`, in the manner of the Voss-McCartney generator.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn pink(&mut self, n: usize) -> Vec<f64> {
        let mut walks = [0.0_f64; PINK_ROWS];
        (0..n)
            .map(|_| {
                walks
                    .iter_mut()
                    .enumerate()
                    .map(|(r, walk)| {
                        *walk += self.rng.sample::<f64, _>(StandardNormal);
                        *walk / 2.0_f64.powi(r as i32)
                    })
                    .sum()
            })
            .collect()
    }

    /// `scale * (white + pink)` background for one channel.
    pub fn background(&mut self, n: usize, scale: f64) -> Vec<f64> {
        let white = self.white(n);
        let pink = self.pink(n);
        white
            .into_iter()
            .zip(pink)
            .map(|(w, p)| scale * (w + p))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hann_pulse_shape() {
        let p = hann_pulse(64);
        assert_eq!(p.len(), 64);
        assert!(p[0].abs() < 1e-12 && p[63].abs() < 1e-12);
        assert!(p.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_inject_pulse_bounds() {
        let mut buffer = vec![0.0; 10];
        assert!(inject_pulse(&mut buffer, &[1.0, 2.0], 8, 0.5));
        assert_eq!(&buffer[8..], &[0.5, 1.0]);
        assert!(!inject_pulse(&mut buffer, &[1.0, 2.0], 9, 1.0));
        assert_eq!(buffer[9], 1.0);
    }

    #[test]
    fn test_noise_is_seeded() {
        let a = NoiseGenerator::new(7).background(256, 0.01);
        let b = NoiseGenerator::new(7).background(256, 0.01);
        let c = NoiseGenerator::new(8).background(256, 0.01);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_white_noise_statistics() {
        let x = NoiseGenerator::new(42).white(20_000);
        let mean = sonoloc_core::utils::mean(&x);
        let std = sonoloc_core::utils::population_std(&x);
        assert!(mean.abs() < 0.05);
        assert!((std - 1.0).abs() < 0.05);
    }
}
