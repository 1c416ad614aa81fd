//! Core data types for acoustic source localization.
//!
//! This module defines the values that flow through the localization core:
//! raw channel records going in, onsets and delays in the middle, and a
//! position estimate with provenance coming out.
//!
//! # Type Categories
//!
//! - **Signal Types**: [`ChannelSignal`], [`SignalFrame`]
//! - **Geometry Types**: [`Point3`], [`ReceiverGeometry`]
//! - **Detection Types**: [`Technique`], [`Onset`], [`DelayVector`],
//!   [`DetectionStatus`], [`DetectionCurve`], [`DelayEstimate`]
//! - **Result Types**: [`EstimateValidity`], [`PositionEstimate`]
//!
//! # Delay convention
//!
//! Every delay is `(onset_k - onset_ref) / sample_rate`: positive when
//! channel `k` hears the wavefront after the reference channel 0.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SignalError};
use crate::utils;
use crate::MIN_RECEIVERS;

// =============================================================================
// Signal Types
// =============================================================================

/// One receiver's amplitude-over-time record.
///
/// Immutable once captured: the samples can be borrowed but not modified.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ChannelSignal(Vec<f64>);

impl ChannelSignal {
    /// Wraps captured samples.
    #[must_use]
    pub fn new(samples: Vec<f64>) -> Self {
        Self(samples)
    }

    /// Returns the samples.
    #[must_use]
    pub fn samples(&self) -> &[f64] {
        &self.0
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the channel holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the most recent sample.
    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.0.last().copied()
    }

    /// Returns the largest absolute sample value.
    #[must_use]
    pub fn peak_abs(&self) -> f64 {
        self.0.iter().fold(0.0_f64, |acc, &x| acc.max(x.abs()))
    }
}

impl From<Vec<f64>> for ChannelSignal {
    fn from(samples: Vec<f64>) -> Self {
        Self::new(samples)
    }
}

impl AsRef<[f64]> for ChannelSignal {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

/// The synchronized channel records of one acquisition frame.
///
/// Construction validates that there are at least two channels, that every
/// channel is non-empty, finite, and of equal length, and that the sample
/// rate is a positive finite number. Detectors rely on these invariants and
/// therefore never fail on a constructed frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SignalFrame {
    channels: Vec<ChannelSignal>,
    sample_rate: f64,
    captured_at: DateTime<Utc>,
    /// Last raw sample when the frame was de-interleaved from one series
    raw_last: Option<f64>,
}

impl SignalFrame {
    /// Creates a frame stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] if the channels or sample rate are malformed.
    pub fn new(channels: Vec<ChannelSignal>, sample_rate: f64) -> Result<Self, SignalError> {
        Self::with_timestamp(channels, sample_rate, Utc::now())
    }

    /// Creates a frame with an explicit capture timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] if the channels or sample rate are malformed.
    pub fn with_timestamp(
        channels: Vec<ChannelSignal>,
        sample_rate: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, SignalError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(SignalError::InvalidSampleRate(sample_rate));
        }
        if channels.len() < 2 {
            return Err(SignalError::TooFewChannels {
                required: 2,
                actual: channels.len(),
            });
        }

        let expected = channels[0].len();
        for (channel, signal) in channels.iter().enumerate() {
            if signal.is_empty() {
                return Err(SignalError::EmptyChannel { channel });
            }
            if signal.len() != expected {
                return Err(SignalError::LengthMismatch {
                    channel,
                    expected,
                    actual: signal.len(),
                });
            }
            if let Some(index) = signal.samples().iter().position(|x| !x.is_finite()) {
                return Err(SignalError::NonFiniteSample { channel, index });
            }
        }

        Ok(Self {
            channels,
            sample_rate,
            captured_at,
            raw_last: None,
        })
    }

    /// Builds a frame from one interleaved series.
    ///
    /// Sample `j` belongs to channel `(leading_channel + j) % num_channels`.
    /// Trailing samples that do not complete a round are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] if the series cannot fill one round per
    /// channel or if the resulting frame is malformed.
    pub fn from_interleaved(
        raw: &[f64],
        num_channels: usize,
        leading_channel: usize,
        sample_rate: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, SignalError> {
        let channels = utils::deinterleave(raw, num_channels, leading_channel)?
            .into_iter()
            .map(ChannelSignal::new)
            .collect();
        let mut frame = Self::with_timestamp(channels, sample_rate, captured_at)?;
        frame.raw_last = raw.last().copied();
        Ok(frame)
    }

    /// Returns the channel records.
    #[must_use]
    pub fn channels(&self) -> &[ChannelSignal] {
        &self.channels
    }

    /// Returns one channel.
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&ChannelSignal> {
        self.channels.get(index)
    }

    /// Returns the number of channels.
    #[must_use]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Returns the per-channel sample count.
    #[must_use]
    pub fn samples_per_channel(&self) -> usize {
        self.channels[0].len()
    }

    /// Returns the sample rate in Hz.
    #[must_use]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Returns the capture timestamp.
    #[must_use]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// The auxiliary amplitude reading reported with every estimate.
    ///
    /// For de-interleaved frames this is the last raw sample; otherwise the
    /// last sample of the last channel.
    #[must_use]
    pub fn last_amplitude(&self) -> f64 {
        self.raw_last
            .or_else(|| self.channels.last().and_then(ChannelSignal::last))
            .unwrap_or(0.0)
    }
}

// =============================================================================
// Geometry Types
// =============================================================================

/// A point in 3-D space, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "[f64; 3]", into = "[f64; 3]"))]
pub struct Point3 {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Z coordinate
    pub z: f64,
}

impl Point3 {
    /// Creates a point.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The origin.
    #[must_use]
    pub const fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Squared distance from the origin.
    #[must_use]
    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Returns `true` if every coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Coordinates as an array.
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Point3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Point3> for [f64; 3] {
    fn from(p: Point3) -> Self {
        p.to_array()
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Fixed, known positions of the receivers.
///
/// Receiver 0 is the reference. At least [`MIN_RECEIVERS`] distinct, finite
/// positions are required; this is checked once at construction so that the
/// solver never sees an undersized array.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "Vec<Point3>", into = "Vec<Point3>")
)]
pub struct ReceiverGeometry {
    receivers: Vec<Point3>,
}

impl ReceiverGeometry {
    /// Creates a validated geometry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InsufficientReceivers`] for fewer than four
    /// receivers, [`ConfigError::NonFiniteReceiver`] for NaN/infinite
    /// coordinates, and [`ConfigError::DuplicateReceiver`] when two receivers
    /// coincide.
    pub fn new(receivers: Vec<Point3>) -> Result<Self, ConfigError> {
        if receivers.len() < MIN_RECEIVERS {
            return Err(ConfigError::InsufficientReceivers {
                required: MIN_RECEIVERS,
                actual: receivers.len(),
            });
        }
        if let Some(index) = receivers.iter().position(|p| !p.is_finite()) {
            return Err(ConfigError::NonFiniteReceiver { index });
        }
        for (first, a) in receivers.iter().enumerate() {
            for (offset, b) in receivers[first + 1..].iter().enumerate() {
                if a == b {
                    return Err(ConfigError::DuplicateReceiver {
                        first,
                        second: first + 1 + offset,
                    });
                }
            }
        }
        Ok(Self { receivers })
    }

    /// The four-microphone array of the lab rig.
    #[must_use]
    pub fn lab_default() -> Self {
        Self {
            receivers: vec![
                Point3::new(0.0, 0.0, 1.5),
                Point3::new(0.17, 0.0, 1.5),
                Point3::new(0.17, 0.85, 1.5),
                Point3::new(0.72, 0.61, 0.13),
            ],
        }
    }

    /// Returns the reference receiver.
    #[must_use]
    pub fn reference(&self) -> Point3 {
        self.receivers[0]
    }

    /// Returns all receivers.
    #[must_use]
    pub fn receivers(&self) -> &[Point3] {
        &self.receivers
    }

    /// Returns the number of receivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receivers.len()
    }

    /// Always `false`; a geometry holds at least four receivers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty()
    }

    /// Mean receiver position.
    #[must_use]
    pub fn centroid(&self) -> Point3 {
        let n = self.receivers.len() as f64;
        let (x, y, z) = self
            .receivers
            .iter()
            .fold((0.0, 0.0, 0.0), |(x, y, z), p| (x + p.x, y + p.y, z + p.z));
        Point3::new(x / n, y / n, z / n)
    }
}

impl Default for ReceiverGeometry {
    fn default() -> Self {
        Self::lab_default()
    }
}

impl TryFrom<Vec<Point3>> for ReceiverGeometry {
    type Error = ConfigError;

    fn try_from(receivers: Vec<Point3>) -> Result<Self, Self::Error> {
        Self::new(receivers)
    }
}

impl From<ReceiverGeometry> for Vec<Point3> {
    fn from(geometry: ReceiverGeometry) -> Self {
        geometry.receivers
    }
}

// =============================================================================
// Detection Types
// =============================================================================

/// The closed set of delay detection techniques.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Technique {
    /// Full linear cross-correlation against the reference channel
    Correlation,
    /// Multi-scale wavelet energy onset detection
    Wavelet,
    /// Recurrence-plot analysis in embedded phase space
    Rpa,
    /// Fixed-baseline amplitude threshold crossing
    AmplitudeThreshold,
}

impl Technique {
    /// Every technique, in selector order.
    pub const ALL: [Self; 4] = [
        Self::Correlation,
        Self::Wavelet,
        Self::Rpa,
        Self::AmplitudeThreshold,
    ];

    const NAMES: &'static str = "correlation, wavelet, rpa, amplitude-threshold";

    /// The selector name of this technique.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Correlation => "correlation",
            Self::Wavelet => "wavelet",
            Self::Rpa => "rpa",
            Self::AmplitudeThreshold => "amplitude-threshold",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Technique {
    type Err = ConfigError;

    /// Parses a selector name. Unknown names are an error, never a fallback.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| ConfigError::UnknownTechnique {
                name: s.to_string(),
                expected: Self::NAMES,
            })
    }
}

/// Onset of an event in one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Onset {
    /// Event first detectable at this sample index
    Detected(usize),
    /// Nothing crossed the detection threshold
    Undetected,
}

impl Onset {
    /// Sample index, if detected.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Detected(i) => Some(i),
            Self::Undetected => None,
        }
    }

    /// Returns `true` for [`Onset::Detected`].
    #[must_use]
    pub const fn is_detected(self) -> bool {
        matches!(self, Self::Detected(_))
    }
}

/// Relative delays, in seconds, of channels `1..N` against channel 0.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct DelayVector(Vec<f64>);

impl DelayVector {
    /// Wraps delays in seconds.
    #[must_use]
    pub fn new(delays: Vec<f64>) -> Self {
        Self(delays)
    }

    /// The all-zero vector signalling "no event" for `len` delays.
    #[must_use]
    pub fn zeros(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    /// Returns the delays.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Returns the number of delays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when there are no delays.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the delays.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }

    /// Returns `true` if every delay is exactly zero.
    #[must_use]
    pub fn is_all_zero(&self) -> bool {
        self.0.iter().all(|&d| d == 0.0)
    }

    /// Delays expressed in samples at `sample_rate`.
    #[must_use]
    pub fn in_samples(&self, sample_rate: f64) -> Vec<f64> {
        self.0.iter().map(|d| d * sample_rate).collect()
    }

    /// Clamps every delay to at least `epsilon` in magnitude, keeping sign.
    ///
    /// Returns the clamped vector and how many entries changed.
    #[must_use]
    pub fn clamped(&self, epsilon: f64) -> (Self, usize) {
        let mut changed = 0;
        let clamped = self
            .0
            .iter()
            .map(|&d| {
                let c = utils::clamp_away_from_zero(d, epsilon);
                if c != d {
                    changed += 1;
                }
                c
            })
            .collect();
        (Self(clamped), changed)
    }
}

impl From<Vec<f64>> for DelayVector {
    fn from(delays: Vec<f64>) -> Self {
        Self::new(delays)
    }
}

impl fmt::Display for DelayVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{d:.6}")?;
        }
        f.write_str("]")
    }
}

/// How completely a detector found the event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case", tag = "kind"))]
pub enum DetectionStatus {
    /// Every channel has an onset
    Complete,
    /// Some channels have no onset; their delays are zero
    Partial {
        /// Channels without an onset
        undetected: Vec<usize>,
    },
    /// The reference channel has no onset; the delay vector is all zeros
    NoEvent,
}

impl DetectionStatus {
    /// Returns `true` unless this is [`DetectionStatus::NoEvent`].
    #[must_use]
    pub fn is_event(&self) -> bool {
        !matches!(self, Self::NoEvent)
    }

    /// Number of channels without an onset.
    #[must_use]
    pub fn undetected_count(&self, num_channels: usize) -> usize {
        match self {
            Self::Complete => 0,
            Self::Partial { undetected } => undetected.len(),
            Self::NoEvent => num_channels,
        }
    }
}

/// Per-channel diagnostic series produced by a detector.
///
/// For display collaborators only; correctness never depends on it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectionCurve {
    /// Channel the curve belongs to
    pub channel: usize,
    /// Curve values
    pub values: Vec<f64>,
}

/// Output of one detector invocation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DelayEstimate {
    /// Technique that produced the delays
    pub technique: Technique,
    /// Delays of channels `1..N` against channel 0
    pub delays: DelayVector,
    /// Per-channel onsets; `None` for techniques that measure lags directly
    pub onsets: Option<Vec<Onset>>,
    /// Detection completeness
    pub status: DetectionStatus,
    /// Diagnostic curves, empty unless requested
    pub curves: Vec<DetectionCurve>,
}

impl DelayEstimate {
    /// The defined "no event" result for a frame with `num_channels` channels.
    #[must_use]
    pub fn no_event(technique: Technique, num_channels: usize) -> Self {
        Self {
            technique,
            delays: DelayVector::zeros(num_channels.saturating_sub(1)),
            onsets: None,
            status: DetectionStatus::NoEvent,
            curves: Vec::new(),
        }
    }

    /// Attaches diagnostic curves.
    #[must_use]
    pub fn with_curves(mut self, curves: Vec<DetectionCurve>) -> Self {
        self.curves = curves;
        self
    }
}

// =============================================================================
// Result Types
// =============================================================================

/// Confidence signal attached to every position estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case", tag = "kind"))]
pub enum EstimateValidity {
    /// Complete detection, no clamping
    Valid,
    /// A position was computed with reduced confidence
    Degraded {
        /// Delays clamped away from zero before solving
        clamped_delays: usize,
        /// Channels without an onset
        undetected_channels: usize,
    },
    /// Nothing was detected; the position carries no information
    NoEvent,
}

impl EstimateValidity {
    /// Combines detection completeness with solver clamping.
    #[must_use]
    pub fn from_parts(status: &DetectionStatus, num_channels: usize, clamped_delays: usize) -> Self {
        match status {
            DetectionStatus::NoEvent => Self::NoEvent,
            _ => {
                let undetected_channels = status.undetected_count(num_channels);
                if undetected_channels == 0 && clamped_delays == 0 {
                    Self::Valid
                } else {
                    Self::Degraded {
                        clamped_delays,
                        undetected_channels,
                    }
                }
            }
        }
    }

    /// Returns `true` if the position is worth acting on.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        !matches!(self, Self::NoEvent)
    }
}

impl fmt::Display for EstimateValidity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => f.write_str("valid"),
            Self::Degraded {
                clamped_delays,
                undetected_channels,
            } => write!(
                f,
                "degraded ({clamped_delays} clamped, {undetected_channels} undetected)"
            ),
            Self::NoEvent => f.write_str("no event"),
        }
    }
}

/// Estimated source position with provenance.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionEstimate {
    /// X coordinate in meters
    pub x: f64,
    /// Y coordinate in meters
    pub y: f64,
    /// Z coordinate in meters
    pub z: f64,
    /// Technique that produced the delays
    pub technique: Technique,
    /// Delays the position was solved from, before clamping
    pub delays: DelayVector,
    /// Capture time of the frame
    pub timestamp: DateTime<Utc>,
    /// Confidence signal
    pub validity: EstimateValidity,
    /// Last-sample amplitude reading of the frame
    pub amplitude: f64,
    /// Mean power across all channels
    pub intensity: f64,
    /// RMS range-difference residual in meters, when solved
    pub residual: Option<f64>,
}

impl PositionEstimate {
    /// The estimated position as a point.
    #[must_use]
    pub fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}
