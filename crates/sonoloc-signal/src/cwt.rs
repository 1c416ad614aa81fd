//! Continuous wavelet transform.
//!
//! The mother wavelet is integrated once on a `2^precision` grid. For each
//! scale the integrated wavelet is resampled, convolved with the signal via
//! FFT, differentiated, scaled by `-sqrt(a)` and trimmed back to the input
//! length. Differentiating the convolution with the integrated wavelet is
//! equivalent to convolving with the wavelet itself, but stays accurate for
//! short discrete wavelets such as Haar.
//!
//! # References
//! - Torrence & Compo (1998), "A Practical Guide to Wavelet Analysis"

use std::f64::consts::PI;

use ndarray::Array2;
use num_complex::Complex64;
use rustfft::FftPlanner;

use serde::{Deserialize, Serialize};

/// Mother wavelet families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaveletFamily {
    /// Haar step wavelet on [0, 1]
    #[default]
    Haar,
    /// Mexican hat (Ricker) on [-8, 8]
    MexicanHat,
    /// Real Morlet on [-8, 8]
    Morlet,
}

impl WaveletFamily {
    /// Effective support `(lower, upper)`.
    #[must_use]
    pub const fn support(self) -> (f64, f64) {
        match self {
            Self::Haar => (0.0, 1.0),
            Self::MexicanHat | Self::Morlet => (-8.0, 8.0),
        }
    }

    /// Evaluates the mother wavelet at `t`.
    #[must_use]
    pub fn psi(self, t: f64) -> f64 {
        match self {
            Self::Haar => {
                if t < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::MexicanHat => {
                let norm = 2.0 / (3.0_f64.sqrt() * PI.powf(0.25));
                norm * (1.0 - t * t) * (-t * t / 2.0).exp()
            }
            Self::Morlet => (-t * t / 2.0).exp() * (5.0 * t).cos(),
        }
    }
}

/// Scales `base^k` for `k` in `min_exponent..=max_exponent`, with
/// `base = 2^(1/steps_per_octave)`.
#[must_use]
pub fn log_scales(steps_per_octave: u32, min_exponent: u32, max_exponent: u32) -> Vec<f64> {
    let base = 2.0_f64.powf(1.0 / f64::from(steps_per_octave));
    (min_exponent..=max_exponent)
        .map(|k| base.powi(k as i32))
        .collect()
}

/// Running integral of the mother wavelet and its sampling step.
#[allow(clippy::cast_precision_loss)]
fn integrate_wavelet(family: WaveletFamily, precision: u32) -> (Vec<f64>, f64) {
    let points = 1usize << precision;
    let (lb, ub) = family.support();
    let step = (ub - lb) / (points - 1) as f64;

    let mut acc = 0.0;
    let int_psi = (0..points)
        .map(|i| {
            acc += family.psi(lb + i as f64 * step);
            acc * step
        })
        .collect();
    (int_psi, step)
}

/// Precomputed per-scale filters for one wavelet family.
#[derive(Debug, Clone)]
pub struct CwtPlan {
    family: WaveletFamily,
    scales: Vec<f64>,
    filters: Vec<Vec<f64>>,
}

impl CwtPlan {
    /// Builds filters for every scale. Scales must be at least 1.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn new(family: WaveletFamily, scales: &[f64], precision: u32) -> Self {
        let (int_psi, step) = integrate_wavelet(family, precision);
        let (lb, ub) = family.support();

        let filters = scales
            .iter()
            .map(|&a| {
                let taps = (a * (ub - lb) + 1.0).ceil() as usize;
                let mut filter: Vec<f64> = (0..taps)
                    .map(|k| (k as f64 / (a * step)).floor() as usize)
                    .take_while(|&j| j < int_psi.len())
                    .map(|j| int_psi[j])
                    .collect();
                filter.reverse();
                filter
            })
            .collect();

        Self {
            family,
            scales: scales.to_vec(),
            filters,
        }
    }

    /// Wavelet family of this plan.
    #[must_use]
    pub fn family(&self) -> WaveletFamily {
        self.family
    }

    /// Scales of this plan.
    #[must_use]
    pub fn scales(&self) -> &[f64] {
        &self.scales
    }

    /// Full coefficient matrix: rows are scales, columns are samples.
    #[must_use]
    pub fn transform(&self, signal: &[f64]) -> Array2<f64> {
        let mut coefs = Array2::zeros((self.scales.len(), signal.len()));
        self.for_each_scale(signal, |row, values| {
            for (dst, &v) in coefs.row_mut(row).iter_mut().zip(values) {
                *dst = v;
            }
        });
        coefs
    }

    /// Sum of `|coefficient|` across scales, one value per sample.
    #[must_use]
    pub fn energy_curve(&self, signal: &[f64]) -> Vec<f64> {
        let mut curve = vec![0.0; signal.len()];
        self.for_each_scale(signal, |_, values| {
            for (acc, v) in curve.iter_mut().zip(values) {
                *acc += v.abs();
            }
        });
        curve
    }

    #[allow(clippy::cast_precision_loss)]
    fn for_each_scale(&self, signal: &[f64], mut visit: impl FnMut(usize, &[f64])) {
        let n = signal.len();
        let longest = self.filters.iter().map(Vec::len).max().unwrap_or(0);
        if n == 0 || longest == 0 {
            return;
        }

        let size = (n + longest - 1).next_power_of_two();
        let mut planner = FftPlanner::<f64>::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);

        let mut spectrum: Vec<Complex64> = signal
            .iter()
            .map(|&x| Complex64::new(x, 0.0))
            .chain(std::iter::repeat(Complex64::new(0.0, 0.0)))
            .take(size)
            .collect();
        forward.process(&mut spectrum);

        let mut buffer = vec![Complex64::new(0.0, 0.0); size];
        let mut coef = Vec::with_capacity(n + longest);

        for (row, (filter, &a)) in self.filters.iter().zip(&self.scales).enumerate() {
            buffer.fill(Complex64::new(0.0, 0.0));
            for (dst, &h) in buffer.iter_mut().zip(filter) {
                *dst = Complex64::new(h, 0.0);
            }
            forward.process(&mut buffer);
            for (b, s) in buffer.iter_mut().zip(&spectrum) {
                *b *= s;
            }
            inverse.process(&mut buffer);

            // full linear convolution has n + len - 1 points; its first
            // difference has n + len - 2, trimmed centrally down to n
            let conv_len = n + filter.len() - 1;
            let gain = -a.sqrt() / size as f64;
            coef.clear();
            coef.extend(
                buffer[..conv_len]
                    .windows(2)
                    .map(|w| gain * (w[1].re - w[0].re)),
            );

            let excess = coef.len().saturating_sub(n);
            let start = excess / 2;
            visit(row, &coef[start..start + n.min(coef.len())]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Direct-form reference: full convolution with the same filter.
    fn direct_row(plan: &CwtPlan, row: usize, signal: &[f64]) -> Vec<f64> {
        let h = &plan.filters[row];
        let conv_len = signal.len() + h.len() - 1;
        let conv: Vec<f64> = (0..conv_len)
            .map(|i| {
                (0..h.len())
                    .filter(|&k| i >= k && i - k < signal.len())
                    .map(|k| h[k] * signal[i - k])
                    .sum()
            })
            .collect();
        let diff: Vec<f64> = conv
            .windows(2)
            .map(|w| -plan.scales[row].sqrt() * (w[1] - w[0]))
            .collect();
        let start = (diff.len() - signal.len()) / 2;
        diff[start..start + signal.len()].to_vec()
    }

    #[test]
    fn test_log_scales_span_two_to_sixteen() {
        let scales = log_scales(64, 64, 256);
        assert_eq!(scales.len(), 193);
        assert_abs_diff_eq!(scales[0], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(scales[192], 16.0, epsilon = 1e-9);
    }

    #[test]
    fn test_haar_filter_lengths() {
        let plan = CwtPlan::new(WaveletFamily::Haar, &[2.0, 16.0], 10);
        assert_eq!(plan.filters[0].len(), 3);
        assert_eq!(plan.filters[1].len(), 17);
    }

    #[test]
    fn test_fft_matches_direct_convolution() {
        let signal: Vec<f64> = (0..200)
            .map(|i| if (50..70).contains(&i) { 1.0 } else { 0.0 })
            .collect();
        for family in [WaveletFamily::Haar, WaveletFamily::MexicanHat] {
            let plan = CwtPlan::new(family, &[2.0, 5.5], 10);
            let coefs = plan.transform(&signal);
            for row in 0..2 {
                let expected = direct_row(&plan, row, &signal);
                for (a, b) in coefs.row(row).iter().zip(&expected) {
                    assert_abs_diff_eq!(*a, *b, epsilon = 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_energy_curve_shape() {
        let signal: Vec<f64> = (0..300).map(|i| (f64::from(i) * 0.3).sin()).collect();
        let plan = CwtPlan::new(WaveletFamily::Morlet, &log_scales(64, 64, 128), 10);
        let curve = plan.energy_curve(&signal);
        assert_eq!(curve.len(), signal.len());
        assert!(curve.iter().all(|v| v.is_finite() && *v >= 0.0));
    }

    #[test]
    fn test_zero_signal_has_zero_energy() {
        let plan = CwtPlan::new(WaveletFamily::Haar, &[2.0, 4.0], 10);
        let curve = plan.energy_curve(&[0.0; 64]);
        assert!(curve.iter().all(|v| v.abs() < 1e-12));
    }
}
