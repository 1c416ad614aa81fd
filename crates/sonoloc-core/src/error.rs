//! Error types for the sonoloc localization core.
//!
//! This module provides the error taxonomy using [`thiserror`] for automatic
//! `Display` and `Error` trait implementations.
//!
//! # Error Hierarchy
//!
//! - [`CoreError`]: Top-level error type that encompasses all subsystem errors
//! - [`ConfigError`]: Malformed configuration (unknown technique, bad geometry,
//!   out-of-range parameters). Always fatal.
//! - [`SignalError`]: Malformed input frames handed to the detectors
//! - [`SolverError`]: Inputs the multilateration solver cannot accept
//!
//! Numeric degeneracy (near-zero delays) and "no event detected" are *not*
//! errors. They travel as data through [`crate::DetectionStatus`] and
//! [`crate::EstimateValidity`].
//!
//! # Example
//!
//! ```rust
//! use sonoloc_core::error::{ConfigError, CoreError};
//!
//! fn load_geometry(count: usize) -> Result<(), CoreError> {
//!     Err(ConfigError::InsufficientReceivers { required: 4, actual: count }.into())
//! }
//!
//! assert!(load_geometry(3).is_err());
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// A specialized `Result` type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for the localization system.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed signal input
    #[error("Signal error: {0}")]
    Signal(#[from] SignalError),

    /// Multilateration solver error
    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),
}

impl CoreError {
    /// Returns `true` if this error is recoverable.
    ///
    /// Configuration errors never are: retrying with the same configuration
    /// fails the same way. A malformed frame only poisons that frame.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Signal(e) => e.is_recoverable(),
            Self::Solver(e) => e.is_recoverable(),
        }
    }
}

/// Configuration errors. Fatal and surfaced to the caller.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// Technique name not recognised
    #[error("Unknown technique '{name}' (expected one of: {expected})")]
    UnknownTechnique {
        /// Name that was requested
        name: String,
        /// Comma-separated list of accepted names
        expected: &'static str,
    },

    /// Not enough receivers to form a 3-D fix
    #[error("Insufficient receivers: need at least {required}, got {actual}")]
    InsufficientReceivers {
        /// Minimum receiver count
        required: usize,
        /// Receivers supplied
        actual: usize,
    },

    /// Two receivers share a position
    #[error("Receivers {first} and {second} occupy the same position")]
    DuplicateReceiver {
        /// Index of the first receiver
        first: usize,
        /// Index of the duplicate
        second: usize,
    },

    /// A receiver coordinate is NaN or infinite
    #[error("Receiver {index} has a non-finite coordinate")]
    NonFiniteReceiver {
        /// Index of the offending receiver
        index: usize,
    },

    /// A parameter is outside its valid range
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Name of the parameter
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// A configuration file could not be read or written
    #[error("Cannot access config file {path:?}: {source}")]
    FileRead {
        /// Path of the file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration file could not be parsed
    #[error("Malformed config file {path:?}: {message}")]
    Malformed {
        /// Path of the file
        path: PathBuf,
        /// Parser message
        message: String,
    },
}

impl ConfigError {
    /// Creates a new invalid value error.
    #[must_use]
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors for malformed signal input.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SignalError {
    /// Too few channels in a frame
    #[error("Frame needs at least {required} channels, got {actual}")]
    TooFewChannels {
        /// Minimum channel count
        required: usize,
        /// Channels supplied
        actual: usize,
    },

    /// Frame channel count does not match the receiver geometry
    #[error("Channel count mismatch: geometry has {expected} receivers, frame has {actual} channels")]
    ChannelCountMismatch {
        /// Receivers in the geometry
        expected: usize,
        /// Channels in the frame
        actual: usize,
    },

    /// Channels of one frame differ in length
    #[error("Channel {channel} has {actual} samples, expected {expected}")]
    LengthMismatch {
        /// Offending channel index
        channel: usize,
        /// Length of channel 0
        expected: usize,
        /// Length of the offending channel
        actual: usize,
    },

    /// A channel holds no samples
    #[error("Channel {channel} is empty")]
    EmptyChannel {
        /// Offending channel index
        channel: usize,
    },

    /// A sample is NaN or infinite
    #[error("Channel {channel} has a non-finite sample at index {index}")]
    NonFiniteSample {
        /// Offending channel index
        channel: usize,
        /// Sample index
        index: usize,
    },

    /// Sample rate is not a positive finite number
    #[error("Invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),

    /// Interleaved input too short to fill one round per channel
    #[error("Insufficient samples: need at least {required}, got {available}")]
    InsufficientSamples {
        /// Minimum required samples
        required: usize,
        /// Available samples
        available: usize,
    },
}

impl SignalError {
    /// Returns `true` if this error is recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::LengthMismatch { .. }
            | Self::EmptyChannel { .. }
            | Self::NonFiniteSample { .. }
            | Self::InsufficientSamples { .. } => true,
            Self::TooFewChannels { .. }
            | Self::ChannelCountMismatch { .. }
            | Self::InvalidSampleRate(_) => false,
        }
    }
}

/// Errors raised by the multilateration solver.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SolverError {
    /// Delay vector length does not match the geometry
    #[error("Expected {expected} delays for the receiver geometry, got {actual}")]
    DelayCountMismatch {
        /// N − 1 for N receivers
        expected: usize,
        /// Delays supplied
        actual: usize,
    },

    /// A delay is NaN or infinite
    #[error("Delay {index} is not finite")]
    NonFiniteDelay {
        /// Index into the delay vector
        index: usize,
    },

    /// The SVD pseudo-inverse could not be formed
    #[error("Pseudo-inverse failed: {0}")]
    Decomposition(String),

    /// The solution contains NaN or infinity
    #[error("Solver produced a non-finite position")]
    NonFiniteSolution,
}

impl SolverError {
    /// Returns `true` if this error is recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::NonFiniteSolution | Self::NonFiniteDelay { .. } | Self::Decomposition(_) => true,
            Self::DelayCountMismatch { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_technique_display() {
        let err = ConfigError::UnknownTechnique {
            name: "fft".into(),
            expected: "correlation, wavelet",
        };
        let msg = err.to_string();
        assert!(msg.contains("fft"));
        assert!(msg.contains("correlation"));
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let err: CoreError = ConfigError::InsufficientReceivers {
            required: 4,
            actual: 3,
        }
        .into();
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_signal_error_recoverable() {
        assert!(SignalError::EmptyChannel { channel: 2 }.is_recoverable());
        assert!(!SignalError::InvalidSampleRate(0.0).is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let core_err: CoreError = SolverError::NonFiniteSolution.into();
        assert!(matches!(core_err, CoreError::Solver(_)));
        assert!(core_err.is_recoverable());
    }

    #[test]
    fn test_invalid_value_helper() {
        let err = ConfigError::invalid_value("threshold", "must be in (0, 1]");
        assert!(err.to_string().contains("threshold"));
        assert!(err.to_string().contains("(0, 1]"));
    }
}
