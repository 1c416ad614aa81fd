//! Recurrence-plot analysis.
//!
//! Each channel is delay-embedded into phase space. The column sums of the
//! pairwise squared-distance matrix form the detection curve: points far
//! from the rest of the trajectory (the event) have large sums. The onset is
//! the first point exceeding a fraction of the peak.
//!
//! Detection only needs the column sums, which follow from the centroid
//! identity
//!
//! ```text
//! sum_i |x_i - x_j|^2 = sum_i |x_i - c|^2 + M |x_j - c|^2
//! ```
//!
//! so the detector runs in linear memory. [`recurrence_plot`] still builds
//! the full matrices for display.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use sonoloc_core::utils::{aggregate_onsets, first_crossing, population_std};
use sonoloc_core::{
    ConfigError, DelayEstimate, DelayEstimator, DetectionCurve, Onset, SignalError, SignalFrame,
    Technique,
};

use crate::embedding::delay_embed;

/// Configuration for the recurrence-plot detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrenceConfig {
    /// Embedding dimension
    pub embedding_dim: usize,
    /// Embedding delay in samples
    pub lag: usize,
    /// Recurrence radius as a multiple of the channel standard deviation
    pub rp_thresh: f64,
    /// Onset fraction of the peak column sum, in (0, 1)
    pub threshold: f64,
    /// Return the column-sum curves as diagnostics
    pub emit_curves: bool,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            embedding_dim: 3,
            lag: 1,
            rp_thresh: 0.9,
            threshold: 0.4,
            emit_curves: false,
        }
    }
}

impl RecurrenceConfig {
    /// Checks parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding_dim == 0 {
            return Err(ConfigError::invalid_value(
                "rpa.embedding_dim",
                "must be >= 1",
            ));
        }
        if self.lag == 0 {
            return Err(ConfigError::invalid_value("rpa.lag", "must be >= 1"));
        }
        if !self.rp_thresh.is_finite() || self.rp_thresh <= 0.0 {
            return Err(ConfigError::invalid_value(
                "rpa.rp_thresh",
                format!("must be finite and > 0, got {}", self.rp_thresh),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ConfigError::invalid_value(
                "rpa.threshold",
                format!("must be in (0, 1), got {}", self.threshold),
            ));
        }
        Ok(())
    }
}

/// Full recurrence analysis of one channel.
#[derive(Debug, Clone)]
pub struct RecurrencePlot {
    /// Pairwise squared distances between embedded points
    pub distances: Array2<f64>,
    /// Binary recurrence matrix; the diagonal is always 1
    pub recurrence: Array2<u8>,
    /// Squared recurrence radius
    pub radius: f64,
}

impl RecurrencePlot {
    /// Column sums of the distance matrix.
    #[must_use]
    pub fn column_sums(&self) -> Vec<f64> {
        self.distances.sum_axis(Axis(0)).to_vec()
    }

    /// Fraction of recurrent point pairs.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn recurrence_rate(&self) -> f64 {
        let total = self.recurrence.len();
        if total == 0 {
            return 0.0;
        }
        self.recurrence.iter().map(|&r| f64::from(r)).sum::<f64>() / total as f64
    }
}

/// Builds the full distance and recurrence matrices for one channel.
///
/// The radius is `(rp_thresh * std)^2` with the population standard
/// deviation of the raw samples. Memory is quadratic in the signal length.
///
/// # Errors
///
/// Returns [`SignalError::InsufficientSamples`] if the signal is too short
/// to embed.
pub fn recurrence_plot(
    samples: &[f64],
    config: &RecurrenceConfig,
) -> Result<RecurrencePlot, SignalError> {
    let embedded = delay_embed(samples, config.embedding_dim, config.lag)?;
    let m = embedded.nrows();
    let radius = (config.rp_thresh * population_std(samples)).powi(2);

    let distances = Array2::from_shape_fn((m, m), |(i, j)| {
        embedded
            .row(i)
            .iter()
            .zip(embedded.row(j).iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum()
    });
    let recurrence = Array2::from_shape_fn((m, m), |(i, j)| {
        u8::from(i == j || distances[[i, j]] <= radius)
    });

    Ok(RecurrencePlot {
        distances,
        recurrence,
        radius,
    })
}

/// Column sums of the squared-distance matrix of `embedded`, in linear
/// memory.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn distance_column_sums(embedded: ArrayView2<'_, f64>) -> Vec<f64> {
    let m = embedded.nrows();
    let Some(centroid) = embedded.mean_axis(Axis(0)) else {
        return Vec::new();
    };
    let spread: Vec<f64> = embedded
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .zip(centroid.iter())
                .map(|(x, c)| (x - c).powi(2))
                .sum()
        })
        .collect();
    let total: f64 = spread.iter().sum();
    spread
        .iter()
        .map(|s| (total + m as f64 * s).max(0.0))
        .collect()
}

/// Recurrence-plot detector.
#[derive(Debug, Clone, Default)]
pub struct RecurrenceDetector {
    config: RecurrenceConfig,
}

impl RecurrenceDetector {
    /// Creates a detector with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is out of range.
    pub fn new(config: RecurrenceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RecurrenceConfig {
        &self.config
    }

    /// Detection curve of one channel, or `None` if it is too short to embed.
    #[must_use]
    pub fn curve(&self, samples: &[f64]) -> Option<Vec<f64>> {
        delay_embed(samples, self.config.embedding_dim, self.config.lag)
            .ok()
            .map(|embedded| distance_column_sums(embedded.view()))
    }
}

impl DelayEstimator for RecurrenceDetector {
    fn technique(&self) -> Technique {
        Technique::Rpa
    }

    fn estimate_delays(&self, frame: &SignalFrame) -> DelayEstimate {
        let mut onsets = Vec::with_capacity(frame.num_channels());
        let mut curves = Vec::new();

        for (channel, signal) in frame.channels().iter().enumerate() {
            let Some(curve) = self.curve(signal.samples()) else {
                onsets.push(Onset::Undetected);
                continue;
            };
            onsets.push(first_crossing(&curve, self.config.threshold));
            if self.config.emit_curves {
                curves.push(DetectionCurve {
                    channel,
                    values: curve,
                });
            }
        }

        let (delays, status) = aggregate_onsets(&onsets, frame.sample_rate());
        tracing::debug!(
            onsets = ?onsets.iter().map(|o| o.index()).collect::<Vec<_>>(),
            ?status,
            "recurrence onsets"
        );

        DelayEstimate {
            technique: self.technique(),
            delays,
            onsets: Some(onsets),
            status,
            curves,
        }
    }
}
