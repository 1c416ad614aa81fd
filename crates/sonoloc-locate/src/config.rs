//! Localizer configuration.
//!
//! [`LocatorConfig`] gathers everything a [`crate::Localizer`] needs: the
//! receiver geometry, the default technique, per-technique detector settings,
//! solver parameters and the interleaving layout of raw recordings. It is
//! loaded once per session, typically from JSON.
//!
//! # Example
//!
//! ```rust
//! use sonoloc_locate::LocatorConfig;
//!
//! let cfg = LocatorConfig::default();
//! cfg.validate().expect("default config is valid");
//!
//! assert_eq!(cfg.geometry.len(), 4);
//! assert_eq!(cfg.sample_rate, 1000.0);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use sonoloc_core::{ConfigError, ReceiverGeometry, Technique};
use sonoloc_signal::DetectorConfig;

use crate::solver::SolverConfig;

/// Complete configuration for a localization session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Receiver positions; receiver 0 is the reference
    pub geometry: ReceiverGeometry,
    /// Sample rate of recordings, in Hz
    pub sample_rate: f64,
    /// Technique used when the caller does not name one
    pub technique: Technique,
    /// Per-technique detector settings
    pub detectors: DetectorConfig,
    /// Solver parameters
    pub solver: SolverConfig,
    /// Channel that receives the first sample of an interleaved recording;
    /// `None` means the last channel
    pub leading_channel: Option<usize>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            geometry: ReceiverGeometry::lab_default(),
            sample_rate: 1000.0,
            technique: Technique::Correlation,
            detectors: DetectorConfig::default(),
            solver: SolverConfig::default(),
            leading_channel: None,
        }
    }
}

impl LocatorConfig {
    /// Load a [`LocatorConfig`] from a JSON file at `path`.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the file cannot be opened,
    /// [`ConfigError::Malformed`] if the JSON does not parse (including an
    /// invalid geometry or technique name), and any validation error.
    pub fn from_json(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: LocatorConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize this configuration to pretty-printed JSON and write it to
    /// `path`, creating parent directories if necessary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::FileRead`] if the directory cannot be created or
    /// the file cannot be written.
    pub fn to_json(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::FileRead {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::invalid_value("(serialization)", e.to_string()))?;
        std::fs::write(path, json).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Channel receiving sample 0 of an interleaved recording.
    #[must_use]
    pub fn leading_channel(&self) -> usize {
        self.leading_channel
            .unwrap_or_else(|| self.geometry.len() - 1)
    }

    /// Validate all fields.
    ///
    /// The geometry validates itself on construction and deserialization.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first field found out of
    /// range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(ConfigError::invalid_value(
                "sample_rate",
                format!("must be finite and > 0, got {}", self.sample_rate),
            ));
        }
        if let Some(lead) = self.leading_channel {
            if lead >= self.geometry.len() {
                return Err(ConfigError::invalid_value(
                    "leading_channel",
                    format!("must be < {} receivers, got {lead}", self.geometry.len()),
                ));
            }
        }
        self.detectors.validate()?;
        self.solver.validate()
    }
}
