//! Cross-correlation delay estimation.
//!
//! Each channel is correlated against the reference channel over every lag;
//! the lag with the highest correlation is the channel's delay. This measures
//! pair lags directly, so no per-channel onsets are produced.
//!
//! Short inputs are correlated directly; longer ones go through `rustfft`.
//! Correlation values within [`TIE_TOLERANCE`] of the peak count as tied and
//! the lowest index wins. Since channel `k` is correlated against the
//! reference, the lowest index is the most negative lag: on a tie the
//! earliest candidate arrival of channel `k` is chosen.

use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use sonoloc_core::utils::finite_max;
use sonoloc_core::{
    ConfigError, DelayEstimate, DelayEstimator, DelayVector, DetectionCurve, DetectionStatus,
    SignalFrame, Technique,
};

/// Configuration for the cross-correlation detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Largest lag, in samples, searched in either direction (`None` = all)
    pub max_lag: Option<usize>,
    /// Channels whose peak |sample| does not exceed this are treated as silent
    pub silence_floor: f64,
    /// Return the correlation sequences as diagnostic curves
    pub emit_curves: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_lag: None,
            silence_floor: 0.0,
            emit_curves: false,
        }
    }
}

impl CorrelationConfig {
    /// Checks parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a negative or non-finite
    /// silence floor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.silence_floor.is_finite() || self.silence_floor < 0.0 {
            return Err(ConfigError::invalid_value(
                "correlation.silence_floor",
                format!("must be finite and >= 0, got {}", self.silence_floor),
            ));
        }
        Ok(())
    }
}

/// Relative distance from the peak within which correlation values tie.
pub const TIE_TOLERANCE: f64 = 1e-9;

/// Above this many multiply-adds the FFT path is used.
const DIRECT_LIMIT: usize = 1 << 16;

/// Full linear cross-correlation of `signal` against `reference`.
///
/// Output index `i` corresponds to lag `i - (reference.len() - 1)`; a positive
/// lag means `signal` is a delayed copy of `reference`. The output has
/// `signal.len() + reference.len() - 1` points.
#[must_use]
pub fn cross_correlate(signal: &[f64], reference: &[f64]) -> Vec<f64> {
    if signal.is_empty() || reference.is_empty() {
        return Vec::new();
    }
    if signal.len().saturating_mul(reference.len()) <= DIRECT_LIMIT {
        direct_correlation(signal, reference)
    } else {
        fft_correlation(signal, reference)
    }
}

fn direct_correlation(signal: &[f64], reference: &[f64]) -> Vec<f64> {
    let offset = reference.len() - 1;
    (0..signal.len() + offset)
        .map(|i| {
            // lag = i - offset; sum over n of signal[n + lag] * reference[n]
            let n_start = offset.saturating_sub(i);
            let n_end = reference.len().min(signal.len() + offset - i);
            (n_start..n_end)
                .map(|n| signal[n + i - offset] * reference[n])
                .sum()
        })
        .collect()
}

/// Convolution of `signal` with the time-reversed reference.
#[allow(clippy::cast_precision_loss)]
fn fft_correlation(signal: &[f64], reference: &[f64]) -> Vec<f64> {
    let len = signal.len() + reference.len() - 1;
    let size = len.next_power_of_two();
    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);

    let padded = |values: &mut dyn Iterator<Item = &f64>| -> Vec<Complex64> {
        values
            .map(|&x| Complex64::new(x, 0.0))
            .chain(std::iter::repeat(Complex64::new(0.0, 0.0)))
            .take(size)
            .collect()
    };
    let mut spectrum = padded(&mut signal.iter());
    let mut kernel = padded(&mut reference.iter().rev());
    forward.process(&mut spectrum);
    forward.process(&mut kernel);
    for (s, k) in spectrum.iter_mut().zip(&kernel) {
        *s *= k;
    }
    inverse.process(&mut spectrum);

    let scale = 1.0 / size as f64;
    spectrum[..len].iter().map(|c| c.re * scale).collect()
}

/// Lag of the correlation peak, in samples, optionally limited to
/// `|lag| <= max_lag`.
///
/// Values within [`TIE_TOLERANCE`] (relative) of the peak are tied and the
/// lowest index, i.e. the most negative lag, wins.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn peak_lag(correlation: &[f64], reference_len: usize, max_lag: Option<usize>) -> Option<i64> {
    let offset = reference_len.checked_sub(1)?;
    let (lo, hi) = match max_lag {
        Some(m) => (
            offset.saturating_sub(m),
            (offset + m + 1).min(correlation.len()),
        ),
        None => (0, correlation.len()),
    };
    if lo >= hi {
        return None;
    }
    let window = &correlation[lo..hi];
    let peak = finite_max(window)?;
    let floor = peak - TIE_TOLERANCE * peak.abs().max(f64::MIN_POSITIVE);
    window
        .iter()
        .position(|&v| v >= floor)
        .map(|i| (lo + i) as i64 - offset as i64)
}

/// Cross-correlation detector.
#[derive(Debug, Clone, Default)]
pub struct CorrelationDetector {
    config: CorrelationConfig,
}

impl CorrelationDetector {
    /// Creates a detector with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is out of range.
    pub fn new(config: CorrelationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    fn is_silent(&self, samples: &[f64]) -> bool {
        samples
            .iter()
            .all(|x| x.abs() <= self.config.silence_floor)
    }
}

impl DelayEstimator for CorrelationDetector {
    fn technique(&self) -> Technique {
        Technique::Correlation
    }

    #[allow(clippy::cast_precision_loss)]
    fn estimate_delays(&self, frame: &SignalFrame) -> DelayEstimate {
        let channels = frame.channels();
        let reference = channels[0].samples();
        if self.is_silent(reference) {
            tracing::debug!("reference channel silent, no correlation event");
            return DelayEstimate::no_event(self.technique(), channels.len());
        }

        let mut delays = Vec::with_capacity(channels.len() - 1);
        let mut undetected = Vec::new();
        let mut curves = Vec::new();

        for (k, channel) in channels.iter().enumerate().skip(1) {
            if self.is_silent(channel.samples()) {
                undetected.push(k);
                delays.push(0.0);
                continue;
            }
            let correlation = cross_correlate(channel.samples(), reference);
            match peak_lag(&correlation, reference.len(), self.config.max_lag) {
                Some(lag) => delays.push(lag as f64 / frame.sample_rate()),
                None => {
                    undetected.push(k);
                    delays.push(0.0);
                }
            }
            if self.config.emit_curves {
                curves.push(DetectionCurve {
                    channel: k,
                    values: correlation,
                });
            }
        }

        let status = if undetected.is_empty() {
            DetectionStatus::Complete
        } else {
            DetectionStatus::Partial { undetected }
        };
        tracing::debug!(?delays, ?status, "correlation delays");

        DelayEstimate {
            technique: self.technique(),
            delays: DelayVector::new(delays),
            onsets: None,
            status,
            curves,
        }
    }
}
