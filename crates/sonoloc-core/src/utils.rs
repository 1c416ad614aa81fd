//! Common numeric helpers shared by the detectors and the solver.
//!
//! Every "first index where ..." search here is lowest-index-wins so that
//! results are deterministic on ties.

use crate::error::SignalError;
use crate::types::{DelayVector, DetectionStatus, Onset};

/// Index of the largest value; the lowest index wins on ties.
///
/// NaN values never win. Returns `None` for an empty slice or one holding
/// only NaN.
#[must_use]
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Largest finite value, or `None` if there is none.
#[must_use]
pub fn finite_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

/// First sample where `curve` exceeds `fraction × max(curve)`.
///
/// A curve whose maximum is not strictly positive, or which contains a
/// non-finite value, is undetected.
#[must_use]
pub fn first_crossing(curve: &[f64], fraction: f64) -> Onset {
    if curve.iter().any(|v| !v.is_finite()) {
        return Onset::Undetected;
    }
    match finite_max(curve) {
        Some(max) if max > 0.0 => {
            let level = fraction * max;
            curve
                .iter()
                .position(|&v| v > level)
                .map_or(Onset::Undetected, Onset::Detected)
        }
        _ => Onset::Undetected,
    }
}

/// Pushes `value` away from zero so that `|value| >= epsilon`, keeping sign.
///
/// Exact zero maps to `+epsilon`.
#[must_use]
pub fn clamp_away_from_zero(value: f64, epsilon: f64) -> f64 {
    if value.abs() >= epsilon {
        value
    } else if value < 0.0 {
        -epsilon
    } else {
        epsilon
    }
}

/// Arithmetic mean; zero for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; zero for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Mean of the squared samples.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_power(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|x| x * x).sum::<f64>() / values.len() as f64
}

/// Splits one round-robin series into `num_channels` channels.
///
/// Sample `j` goes to channel `(leading_channel + j) % num_channels`. Samples
/// past the last complete round are dropped.
///
/// # Errors
///
/// Returns [`SignalError::TooFewChannels`] for fewer than two channels and
/// [`SignalError::InsufficientSamples`] if not even one round is available.
pub fn deinterleave(
    raw: &[f64],
    num_channels: usize,
    leading_channel: usize,
) -> Result<Vec<Vec<f64>>, SignalError> {
    if num_channels < 2 {
        return Err(SignalError::TooFewChannels {
            required: 2,
            actual: num_channels,
        });
    }
    let rounds = raw.len() / num_channels;
    if rounds == 0 {
        return Err(SignalError::InsufficientSamples {
            required: num_channels,
            available: raw.len(),
        });
    }

    let mut channels = vec![Vec::with_capacity(rounds); num_channels];
    for (j, &x) in raw[..rounds * num_channels].iter().enumerate() {
        channels[(leading_channel + j) % num_channels].push(x);
    }
    Ok(channels)
}

/// Turns per-channel onsets into delays against channel 0.
///
/// - every channel undetected: zero delays, [`DetectionStatus::NoEvent`]
/// - reference undetected: zero delays, `NoEvent`; no delay can be measured
/// - some other channel undetected: that delay is zero, `Partial`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn aggregate_onsets(onsets: &[Onset], sample_rate: f64) -> (DelayVector, DetectionStatus) {
    let n_delays = onsets.len().saturating_sub(1);
    let undetected: Vec<usize> = onsets
        .iter()
        .enumerate()
        .filter(|(_, o)| !o.is_detected())
        .map(|(i, _)| i)
        .collect();

    let Some(reference) = onsets.first().and_then(|o| o.index()) else {
        return (DelayVector::zeros(n_delays), DetectionStatus::NoEvent);
    };

    let delays = onsets[1..]
        .iter()
        .map(|o| {
            o.index()
                .map_or(0.0, |k| (k as f64 - reference as f64) / sample_rate)
        })
        .collect();

    let status = if undetected.is_empty() {
        DetectionStatus::Complete
    } else {
        DetectionStatus::Partial { undetected }
    };
    (DelayVector::new(delays), status)
}
