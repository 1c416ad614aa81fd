//! # sonoloc core
//!
//! Core types, traits, and utilities for acoustic source localization from
//! time differences of arrival.
//!
//! This crate provides the foundational building blocks shared by the
//! detectors, the solver and the CLI:
//!
//! - **Core Data Types**: [`SignalFrame`], [`ReceiverGeometry`],
//!   [`DelayEstimate`] and [`PositionEstimate`] for representing captured
//!   channels, array layout, detector output and solver output.
//!
//! - **Error Types**: the [`error`] module, with one error type per
//!   subsystem.
//!
//! - **Traits**: [`DelayEstimator`], the contract every detection technique
//!   implements.
//!
//! - **Utilities**: argmax / first-crossing searches, the epsilon clamp,
//!   de-interleaving and onset aggregation.
//!
//! ## Feature Flags
//!
//! - `serde` (default): Enable serialization/deserialization via serde
//!
//! ## Example
//!
//! ```rust
//! use sonoloc_core::{Onset, utils::aggregate_onsets, DetectionStatus};
//!
//! let onsets = [Onset::Detected(100), Onset::Detected(105), Onset::Detected(110)];
//! let (delays, status) = aggregate_onsets(&onsets, 1000.0);
//!
//! assert_eq!(status, DetectionStatus::Complete);
//! assert!((delays.as_slice()[1] - 0.010).abs() < 1e-12);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types at the crate root
pub use error::{ConfigError, CoreError, CoreResult, SignalError, SolverError};
pub use traits::DelayEstimator;
pub use types::{
    // Signal types
    ChannelSignal, SignalFrame,
    // Geometry types
    Point3, ReceiverGeometry,
    // Detection types
    DelayEstimate, DelayVector, DetectionCurve, DetectionStatus, Onset, Technique,
    // Result types
    EstimateValidity, PositionEstimate,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Minimum number of receivers for a 3-D fix
pub const MIN_RECEIVERS: usize = 4;

/// Speed of sound in air at about 20 °C, in m/s
pub const DEFAULT_SPEED_OF_SOUND: f64 = 343.0;

/// Prelude module for convenient imports.
///
/// ```rust
/// use sonoloc_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{ConfigError, CoreError, CoreResult, SignalError, SolverError};
    pub use crate::traits::DelayEstimator;
    pub use crate::types::{
        ChannelSignal, DelayEstimate, DelayVector, DetectionCurve, DetectionStatus,
        EstimateValidity, Onset, Point3, PositionEstimate, ReceiverGeometry, SignalFrame,
        Technique,
    };
}
