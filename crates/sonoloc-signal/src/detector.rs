//! Technique selection.
//!
//! [`Detector`] is the closed set of delay estimators. It is built from a
//! [`Technique`] plus the matching section of a [`DetectorConfig`] and
//! dispatches [`DelayEstimator::estimate_delays`] to the selected variant.

use serde::{Deserialize, Serialize};
use sonoloc_core::{ConfigError, DelayEstimate, DelayEstimator, SignalFrame, Technique};

use crate::amplitude::{AmplitudeThresholdConfig, AmplitudeThresholdDetector};
use crate::correlation::{CorrelationConfig, CorrelationDetector};
use crate::recurrence::{RecurrenceConfig, RecurrenceDetector};
use crate::wavelet::{WaveletConfig, WaveletDetector};

/// Per-technique detector settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Cross-correlation settings
    pub correlation: CorrelationConfig,
    /// Wavelet-energy settings
    pub wavelet: WaveletConfig,
    /// Recurrence-plot settings
    pub rpa: RecurrenceConfig,
    /// Amplitude-threshold settings
    pub amplitude_threshold: AmplitudeThresholdConfig,
}

impl DetectorConfig {
    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.correlation.validate()?;
        self.wavelet.validate()?;
        self.rpa.validate()?;
        self.amplitude_threshold.validate()
    }

    /// Turns on diagnostic curves for every technique.
    #[must_use]
    pub fn with_curves(mut self) -> Self {
        self.correlation.emit_curves = true;
        self.wavelet.emit_curves = true;
        self.rpa.emit_curves = true;
        self.amplitude_threshold.emit_curves = true;
        self
    }
}

/// One of the four delay detection techniques.
#[derive(Debug, Clone)]
pub enum Detector {
    /// Cross-correlation against the reference channel
    Correlation(CorrelationDetector),
    /// Wavelet-energy onsets
    Wavelet(WaveletDetector),
    /// Recurrence-plot onsets
    Rpa(RecurrenceDetector),
    /// Amplitude-threshold onsets
    AmplitudeThreshold(AmplitudeThresholdDetector),
}

impl Detector {
    /// Builds the detector for `technique` from its configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if that section is out of range.
    pub fn from_technique(technique: Technique, config: &DetectorConfig) -> Result<Self, ConfigError> {
        Ok(match technique {
            Technique::Correlation => {
                Self::Correlation(CorrelationDetector::new(config.correlation.clone())?)
            }
            Technique::Wavelet => Self::Wavelet(WaveletDetector::new(config.wavelet.clone())?),
            Technique::Rpa => Self::Rpa(RecurrenceDetector::new(config.rpa.clone())?),
            Technique::AmplitudeThreshold => Self::AmplitudeThreshold(
                AmplitudeThresholdDetector::new(config.amplitude_threshold.clone())?,
            ),
        })
    }

    /// Builds a detector from a technique name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownTechnique`] for unrecognised names.
    pub fn from_name(name: &str, config: &DetectorConfig) -> Result<Self, ConfigError> {
        Self::from_technique(name.parse()?, config)
    }

    fn inner(&self) -> &dyn DelayEstimator {
        match self {
            Self::Correlation(d) => d,
            Self::Wavelet(d) => d,
            Self::Rpa(d) => d,
            Self::AmplitudeThreshold(d) => d,
        }
    }
}

impl DelayEstimator for Detector {
    fn technique(&self) -> Technique {
        self.inner().technique()
    }

    fn estimate_delays(&self, frame: &SignalFrame) -> DelayEstimate {
        self.inner().estimate_delays(frame)
    }
}

/// One detector per technique, built once.
#[derive(Debug, Clone)]
pub struct DetectorSet {
    detectors: Vec<Detector>,
}

impl DetectorSet {
    /// Builds all four detectors, in [`Technique::ALL`] order.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any section is out of range.
    pub fn new(config: &DetectorConfig) -> Result<Self, ConfigError> {
        let detectors = Technique::ALL
            .into_iter()
            .map(|t| Detector::from_technique(t, config))
            .collect::<Result<_, _>>()?;
        Ok(Self { detectors })
    }

    /// The detector for `technique`.
    #[must_use]
    pub fn get(&self, technique: Technique) -> &Detector {
        let index = match technique {
            Technique::Correlation => 0,
            Technique::Wavelet => 1,
            Technique::Rpa => 2,
            Technique::AmplitudeThreshold => 3,
        };
        &self.detectors[index]
    }

    /// Iterates over all detectors in selector order.
    pub fn iter(&self) -> impl Iterator<Item = &Detector> {
        self.detectors.iter()
    }
}
