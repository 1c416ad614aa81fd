//! Amplitude-threshold onset detection.
//!
//! The lab recorder idles at a fixed DC baseline. An onset is the first
//! sample, past a short settling window, whose deviation from that baseline
//! exceeds a level.

use serde::{Deserialize, Serialize};
use sonoloc_core::utils::aggregate_onsets;
use sonoloc_core::{
    ConfigError, DelayEstimate, DelayEstimator, DetectionCurve, Onset, SignalFrame, Technique,
};

/// Configuration for the amplitude-threshold detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmplitudeThresholdConfig {
    /// Idle level of the recorder output
    pub baseline: f64,
    /// Deviation from the baseline that counts as an event
    pub level: f64,
    /// Samples skipped at the start of every channel
    pub start_index: usize,
    /// Return `|x - baseline|` per channel as diagnostics
    pub emit_curves: bool,
}

impl Default for AmplitudeThresholdConfig {
    fn default() -> Self {
        Self {
            baseline: 1.4,
            level: 0.35,
            start_index: 4,
            emit_curves: false,
        }
    }
}

impl AmplitudeThresholdConfig {
    /// Checks parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a non-finite baseline or a
    /// level that is not positive and finite.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.baseline.is_finite() {
            return Err(ConfigError::invalid_value(
                "amplitude_threshold.baseline",
                "must be finite",
            ));
        }
        if !self.level.is_finite() || self.level <= 0.0 {
            return Err(ConfigError::invalid_value(
                "amplitude_threshold.level",
                format!("must be finite and > 0, got {}", self.level),
            ));
        }
        Ok(())
    }
}

/// Amplitude-threshold detector.
#[derive(Debug, Clone, Default)]
pub struct AmplitudeThresholdDetector {
    config: AmplitudeThresholdConfig,
}

impl AmplitudeThresholdDetector {
    /// Creates a detector with a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is out of range.
    pub fn new(config: AmplitudeThresholdConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AmplitudeThresholdConfig {
        &self.config
    }

    /// First sample at or after `start_index` deviating by more than `level`.
    #[must_use]
    pub fn onset(&self, samples: &[f64]) -> Onset {
        samples
            .iter()
            .enumerate()
            .skip(self.config.start_index)
            .find(|&(_, &x)| (x - self.config.baseline).abs() > self.config.level)
            .map_or(Onset::Undetected, |(i, _)| Onset::Detected(i))
    }
}

impl DelayEstimator for AmplitudeThresholdDetector {
    fn technique(&self) -> Technique {
        Technique::AmplitudeThreshold
    }

    fn estimate_delays(&self, frame: &SignalFrame) -> DelayEstimate {
        let onsets: Vec<Onset> = frame
            .channels()
            .iter()
            .map(|c| self.onset(c.samples()))
            .collect();

        let curves = if self.config.emit_curves {
            frame
                .channels()
                .iter()
                .enumerate()
                .map(|(channel, c)| DetectionCurve {
                    channel,
                    values: c
                        .samples()
                        .iter()
                        .map(|x| (x - self.config.baseline).abs())
                        .collect(),
                })
                .collect()
        } else {
            Vec::new()
        };

        let (delays, status) = aggregate_onsets(&onsets, frame.sample_rate());
        tracing::debug!(
            onsets = ?onsets.iter().map(|o| o.index()).collect::<Vec<_>>(),
            ?status,
            "amplitude onsets"
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

#[cfg(test)]
mod tests {
    use super::*;
    use sonoloc_core::{ChannelSignal, DetectionStatus};

    fn channel_with_spike(len: usize, at: usize, value: f64) -> ChannelSignal {
        let mut x = vec![1.4; len];
        x[at] = value;
        ChannelSignal::new(x)
    }

    #[test]
    fn test_silent_input_returns_zero_delays() {
        let frame = SignalFrame::new(vec![ChannelSignal::new(vec![1.4; 200]); 4], 1000.0).unwrap();
        let estimate = AmplitudeThresholdDetector::default().estimate_delays(&frame);
        assert_eq!(estimate.delays.as_slice(), &[0.0, 0.0, 0.0]);
        assert_eq!(estimate.status, DetectionStatus::NoEvent);
    }

    #[test]
    fn test_crossings_become_delays() {
        let frame = SignalFrame::new(
            vec![
                channel_with_spike(100, 20, 2.0),
                channel_with_spike(100, 25, 0.9),
                channel_with_spike(100, 18, 1.9),
            ],
            100.0,
        )
        .unwrap();
        let estimate = AmplitudeThresholdDetector::default().estimate_delays(&frame);
        assert_eq!(estimate.status, DetectionStatus::Complete);
        let d = estimate.delays.as_slice();
        assert!((d[0] - 0.05).abs() < 1e-12);
        assert!((d[1] + 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_settling_window_is_skipped() {
        let detector = AmplitudeThresholdDetector::default();
        let mut x = vec![1.4; 20];
        x[2] = 5.0;
        assert_eq!(detector.onset(&x), Onset::Undetected);
        x[4] = 5.0;
        assert_eq!(detector.onset(&x), Onset::Detected(4));
    }

    #[test]
    fn test_level_is_exclusive() {
        let detector = AmplitudeThresholdDetector::new(AmplitudeThresholdConfig {
            baseline: 1.5,
            level: 0.25,
            ..Default::default()
        })
        .unwrap();
        let mut x = vec![1.5; 20];
        x[10] = 1.75;
        assert_eq!(detector.onset(&x), Onset::Undetected);
        x[11] = 1.875;
        assert_eq!(detector.onset(&x), Onset::Detected(11));
    }

    #[test]
    fn test_rejects_non_positive_level() {
        let config = AmplitudeThresholdConfig {
            level: 0.0,
            ..Default::default()
        };
        assert!(AmplitudeThresholdDetector::new(config).is_err());
    }
}
