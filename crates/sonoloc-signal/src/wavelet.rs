//! Wavelet-energy onset detection.
//!
//! Every channel is transformed over a log-spaced scale set; the absolute
//! coefficients are summed across scales into one energy curve per channel.
//! The onset is the first sample whose energy exceeds a fraction of that
//! channel's peak energy.

use serde::{Deserialize, Serialize};
use sonoloc_core::utils::{aggregate_onsets, first_crossing};
use sonoloc_core::{
    ConfigError, DelayEstimate, DelayEstimator, DetectionCurve, Onset, SignalFrame, Technique,
};

use crate::cwt::{log_scales, CwtPlan, WaveletFamily};

/// Configuration for the wavelet-energy detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveletConfig {
    /// Mother wavelet
    pub family: WaveletFamily,
    /// Scale steps per octave (`a0 = 2^(1/steps)`)
    pub steps_per_octave: u32,
    /// First scale exponent
    pub min_exponent: u32,
    /// Last scale exponent (inclusive)
    pub max_exponent: u32,
    /// Wavelet integration grid is `2^precision` points
    pub precision: u32,
    /// Onset fraction of the peak energy, in (0, 1)
    pub threshold: f64,
    /// Return the energy curves as diagnostics
    pub emit_curves: bool,
}

impl Default for WaveletConfig {
    fn default() -> Self {
        Self {
            family: WaveletFamily::Haar,
            steps_per_octave: 64,
            min_exponent: 64,
            max_exponent: 256,
            precision: 10,
            threshold: 0.6,
            emit_curves: false,
        }
    }
}

impl WaveletConfig {
    /// Checks parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps_per_octave == 0 {
            return Err(ConfigError::invalid_value(
                "wavelet.steps_per_octave",
                "must be > 0",
            ));
        }
        if self.min_exponent < self.steps_per_octave {
            return Err(ConfigError::invalid_value(
                "wavelet.min_exponent",
                "smallest scale must be at least 2 (min_exponent >= steps_per_octave)",
            ));
        }
        if self.max_exponent < self.min_exponent {
            return Err(ConfigError::invalid_value(
                "wavelet.max_exponent",
                "must be >= min_exponent",
            ));
        }
        if !(4..=16).contains(&self.precision) {
            return Err(ConfigError::invalid_value(
                "wavelet.precision",
                format!("must be in 4..=16, got {}", self.precision),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ConfigError::invalid_value(
                "wavelet.threshold",
                format!("must be in (0, 1), got {}", self.threshold),
            ));
        }
        Ok(())
    }

    /// The scale set described by this configuration.
    #[must_use]
    pub fn scales(&self) -> Vec<f64> {
        log_scales(self.steps_per_octave, self.min_exponent, self.max_exponent)
    }
}

/// Wavelet-energy detector.
#[derive(Debug, Clone)]
pub struct WaveletDetector {
    config: WaveletConfig,
    plan: CwtPlan,
}

impl WaveletDetector {
    /// Creates a detector and precomputes its per-scale filters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is out of range.
    pub fn new(config: WaveletConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let plan = CwtPlan::new(config.family, &config.scales(), config.precision);
        Ok(Self { config, plan })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &WaveletConfig {
        &self.config
    }

    /// Energy curve of one channel: `sum |coef|` across scales.
    #[must_use]
    pub fn energy_curve(&self, samples: &[f64]) -> Vec<f64> {
        self.plan.energy_curve(samples)
    }

    /// First sample whose energy exceeds `threshold × max(energy)`.
    #[must_use]
    pub fn onset(&self, samples: &[f64]) -> Onset {
        first_crossing(&self.energy_curve(samples), self.config.threshold)
    }
}

impl Default for WaveletDetector {
    fn default() -> Self {
        let config = WaveletConfig::default();
        let plan = CwtPlan::new(config.family, &config.scales(), config.precision);
        Self { config, plan }
    }
}

impl DelayEstimator for WaveletDetector {
    fn technique(&self) -> Technique {
        Technique::Wavelet
    }

    fn estimate_delays(&self, frame: &SignalFrame) -> DelayEstimate {
        let mut onsets = Vec::with_capacity(frame.num_channels());
        let mut curves = Vec::new();

        for (channel, signal) in frame.channels().iter().enumerate() {
            let curve = self.energy_curve(signal.samples());
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
            family = ?self.config.family,
            "wavelet onsets"
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
    use crate::synth::hann_pulse;
    use sonoloc_core::{ChannelSignal, DetectionStatus};

    fn pulse_at(len: usize, at: usize) -> Vec<f64> {
        let mut x = vec![0.0; len];
        for (i, v) in hann_pulse(32).into_iter().enumerate() {
            x[at + i] = v;
        }
        x
    }

    #[test]
    fn test_default_scale_set() {
        let scales = WaveletConfig::default().scales();
        assert_eq!(scales.len(), 193);
        assert!((scales[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_curve_length_and_sign() {
        let detector = WaveletDetector::default();
        let curve = detector.energy_curve(&pulse_at(400, 150));
        assert_eq!(curve.len(), 400);
        assert!(curve.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_shifted_pulses_shift_onsets() {
        let frame = SignalFrame::new(
            vec![
                ChannelSignal::new(pulse_at(600, 200)),
                ChannelSignal::new(pulse_at(600, 203)),
                ChannelSignal::new(pulse_at(600, 190)),
            ],
            1000.0,
        )
        .unwrap();
        let estimate = WaveletDetector::default().estimate_delays(&frame);
        assert_eq!(estimate.status, DetectionStatus::Complete);
        let samples = estimate.delays.in_samples(1000.0);
        assert!((samples[0] - 3.0).abs() <= 1.0, "got {samples:?}");
        assert!((samples[1] + 10.0).abs() <= 1.0, "got {samples:?}");
    }

    #[test]
    fn test_silence_is_no_event() {
        let frame = SignalFrame::new(vec![ChannelSignal::new(vec![0.0; 128]); 4], 1000.0).unwrap();
        let estimate = WaveletDetector::default().estimate_delays(&frame);
        assert_eq!(estimate.status, DetectionStatus::NoEvent);
        assert!(estimate.delays.is_all_zero());
    }

    #[test]
    fn test_families_detect_pulse_near_its_start() {
        for family in [
            WaveletFamily::Haar,
            WaveletFamily::MexicanHat,
            WaveletFamily::Morlet,
        ] {
            let config = WaveletConfig {
                family,
                ..Default::default()
            };
            let onset = WaveletDetector::new(config).unwrap().onset(&pulse_at(800, 400));
            let index = onset.index().unwrap();
            assert!((350..440).contains(&index), "{family:?} onset {index}");
        }
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = WaveletConfig {
            threshold: 1.0,
            ..Default::default()
        };
        assert!(WaveletDetector::new(config).is_err());
    }
}
