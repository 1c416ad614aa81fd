//! Core trait definitions for the localization system.
//!
//! # Traits
//!
//! - [`DelayEstimator`]: map a synchronized frame to relative delays
//!
//! Detectors are pure: the same frame always yields the same estimate, and no
//! state is carried between calls. Implementations must be `Send + Sync` so a
//! single detector can serve frames on many threads.

use crate::types::{DelayEstimate, SignalFrame, Technique};

/// Extracts per-channel delays against channel 0 from a frame.
///
/// Silence and missed detections are not errors: they come back as a zero
/// delay vector tagged with [`crate::DetectionStatus::NoEvent`] or
/// [`crate::DetectionStatus::Partial`]. A [`SignalFrame`] is validated on
/// construction, so estimation itself cannot fail.
///
/// # Example
///
/// ```rust
/// use sonoloc_core::prelude::*;
///
/// struct Silent;
///
/// impl DelayEstimator for Silent {
///     fn technique(&self) -> Technique {
///         Technique::AmplitudeThreshold
///     }
///
///     fn estimate_delays(&self, frame: &SignalFrame) -> DelayEstimate {
///         DelayEstimate::no_event(self.technique(), frame.num_channels())
///     }
/// }
///
/// let frame = SignalFrame::new(vec![ChannelSignal::new(vec![0.0; 8]); 4], 1000.0).unwrap();
/// let estimate = Silent.estimate_delays(&frame);
/// assert_eq!(estimate.delays.len(), 3);
/// assert_eq!(estimate.status, DetectionStatus::NoEvent);
/// ```
pub trait DelayEstimator: Send + Sync {
    /// Technique implemented by this estimator.
    fn technique(&self) -> Technique;

    /// Estimates delays of channels `1..N` relative to channel 0.
    fn estimate_delays(&self, frame: &SignalFrame) -> DelayEstimate;
}

impl<T: DelayEstimator + ?Sized> DelayEstimator for Box<T> {
    fn technique(&self) -> Technique {
        (**self).technique()
    }

    fn estimate_delays(&self, frame: &SignalFrame) -> DelayEstimate {
        (**self).estimate_delays(frame)
    }
}

impl<T: DelayEstimator + ?Sized> DelayEstimator for &T {
    fn technique(&self) -> Technique {
        (**self).technique()
    }

    fn estimate_delays(&self, frame: &SignalFrame) -> DelayEstimate {
        (**self).estimate_delays(frame)
    }
}
