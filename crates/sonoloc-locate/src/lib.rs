//! # sonoloc-locate
//!
//! Acoustic source localization from time differences of arrival.
//!
//! This crate sits on top of the detectors in `sonoloc-signal` and turns
//! their delay vectors into 3-D positions.
//!
//! ## Features
//!
//! - **Multilateration**: linearized hyperbolic system solved with an SVD
//!   pseudo-inverse, delays clamped away from zero
//! - **Range closure**: optional exact fix for the four-receiver case
//! - **Pipeline**: frame or interleaved series in, [`PositionEstimate`] out,
//!   with a validity signal
//! - **Simulation**: synthetic events with known ground truth
//! - **Batch mode**: independent frames over rayon with the `parallel`
//!   feature
//!
//! ## Architecture
//!
//! ```text
//! SignalFrame ──► Detector (correlation | wavelet | rpa | amplitude-threshold)
//!                     │ DelayVector + DetectionStatus
//!                     ▼
//!             MultilaterationSolver ──► PositionEstimate
//! ```
//!
//! ## Example
//!
//! ```rust
//! use sonoloc_core::Technique;
//! use sonoloc_locate::{simulate::Scenario, Localizer, LocatorConfig};
//!
//! let config = LocatorConfig::default();
//! let event = Scenario::default().render(&config.geometry).unwrap();
//!
//! let localizer = Localizer::new(config).unwrap();
//! let estimate = localizer.locate(&event.frame, Technique::Correlation).unwrap();
//! assert!(estimate.position().is_finite());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod pipeline;
pub mod simulate;
pub mod solver;

pub use config::LocatorConfig;
pub use pipeline::Localizer;
pub use simulate::{NoiseSpec, Scenario, SimulatedEvent};
pub use solver::{MultilaterationSolver, Solution, SolverConfig};

pub use sonoloc_core::{EstimateValidity, PositionEstimate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{Localizer, LocatorConfig, MultilaterationSolver, Scenario, SolverConfig};
    pub use sonoloc_core::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_localizer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Localizer>();
        assert_send_sync::<MultilaterationSolver>();
    }
}
