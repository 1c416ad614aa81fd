//! sonoloc signal processing library
//!
//! This crate turns synchronized acoustic channels into relative delays. It
//! provides four interchangeable detection techniques plus the numeric
//! scaffolding they share.
//!
//! # Features
//!
//! - **Cross-correlation**: full linear correlation against the reference
//!   channel
//! - **Wavelet energy**: multi-scale CWT energy onsets (Haar, Mexican hat,
//!   Morlet)
//! - **Recurrence plots**: phase-space embedding and distance column sums
//! - **Amplitude threshold**: fixed-baseline crossing onsets
//! - **Diagnostics**: intensity, spectra and spectrograms for display
//! - **Synthesis**: Hann pulses and seeded white/pink noise
//!
//! # Example
//!
//! ```rust
//! use sonoloc_core::{ChannelSignal, DelayEstimator, SignalFrame, Technique};
//! use sonoloc_signal::{synth, Detector, DetectorConfig};
//!
//! let pulse = synth::hann_pulse(32);
//! let channels: Vec<ChannelSignal> = [100, 105, 110, 115]
//!     .iter()
//!     .map(|&at| {
//!         let mut x = vec![0.0; 500];
//!         synth::inject_pulse(&mut x, &pulse, at, 1.0);
//!         ChannelSignal::new(x)
//!     })
//!     .collect();
//! let frame = SignalFrame::new(channels, 1000.0).unwrap();
//!
//! let detector = Detector::from_technique(Technique::Correlation, &DetectorConfig::default()).unwrap();
//! let estimate = detector.estimate_delays(&frame);
//! let samples: Vec<f64> = estimate.delays.in_samples(1000.0).iter().map(|d| d.round()).collect();
//! assert_eq!(samples, vec![5.0, 10.0, 15.0]);
//! ```

#![forbid(unsafe_code)]

pub mod amplitude;
pub mod correlation;
pub mod cwt;
pub mod detector;
pub mod diagnostics;
pub mod embedding;
pub mod recurrence;
pub mod synth;
pub mod wavelet;

// Re-export main types for convenience
pub use amplitude::{AmplitudeThresholdConfig, AmplitudeThresholdDetector};
pub use correlation::{cross_correlate, CorrelationConfig, CorrelationDetector};
pub use cwt::{log_scales, CwtPlan, WaveletFamily};
pub use detector::{Detector, DetectorConfig, DetectorSet};
pub use diagnostics::{
    compute_spectrogram, event_intensity, frame_spectrograms, magnitude_spectrum, Spectrogram,
    SpectrogramConfig, SpectrogramError, WindowFunction,
};
pub use embedding::delay_embed;
pub use recurrence::{recurrence_plot, RecurrenceConfig, RecurrenceDetector, RecurrencePlot};
pub use wavelet::{WaveletConfig, WaveletDetector};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::detector::{Detector, DetectorConfig, DetectorSet};
    pub use crate::{
        AmplitudeThresholdConfig, CorrelationConfig, RecurrenceConfig, WaveletConfig,
        WaveletFamily,
    };
    pub use sonoloc_core::DelayEstimator;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_detectors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Detector>();
        assert_send_sync::<DetectorSet>();
    }
}
