//! Synthetic acoustic events.
//!
//! A [`Scenario`] places a point source relative to a receiver geometry and
//! renders the frame each receiver would record: a Hann pulse at the
//! propagation-delayed arrival index over optional background noise.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sonoloc_core::{
    ChannelSignal, ConfigError, CoreError, DelayVector, Point3, ReceiverGeometry, SignalFrame,
};
use sonoloc_signal::synth::{self, NoiseGenerator};

/// Background noise settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseSpec {
    /// Multiplier applied to white + pink noise
    pub scale: f64,
    /// RNG seed; channel `k` uses `seed + k`
    pub seed: u64,
}

/// One simulated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Source position in meters
    pub source: Point3,
    /// Propagation speed in m/s
    pub speed_of_sound: f64,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Samples per channel
    pub samples: usize,
    /// Pulse length in samples
    pub pulse_len: usize,
    /// Silent samples before the earliest possible arrival
    pub pre_roll: usize,
    /// Pulse peak amplitude
    pub amplitude: f64,
    /// Optional background noise
    pub noise: Option<NoiseSpec>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            source: Point3::new(1.0, 2.0, 0.5),
            speed_of_sound: sonoloc_core::DEFAULT_SPEED_OF_SOUND,
            sample_rate: 1000.0,
            samples: 2000,
            pulse_len: 64,
            pre_roll: 100,
            amplitude: 1.0,
            noise: None,
        }
    }
}

/// A rendered event together with its ground truth.
#[derive(Debug, Clone)]
pub struct SimulatedEvent {
    /// The recorded frame
    pub frame: SignalFrame,
    /// Arrival sample index per receiver
    pub arrivals: Vec<usize>,
    /// Receivers whose pulse did not fit in the frame
    pub truncated: Vec<usize>,
}

impl SimulatedEvent {
    /// Delays implied by the quantized arrival indices.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sampled_delays(&self) -> DelayVector {
        let fs = self.frame.sample_rate();
        let first = self.arrivals[0] as f64;
        DelayVector::new(
            self.arrivals[1..]
                .iter()
                .map(|&a| (a as f64 - first) / fs)
                .collect(),
        )
    }
}

impl Scenario {
    /// Checks parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.source.is_finite() {
            return Err(ConfigError::invalid_value("source", "must be finite"));
        }
        for (field, value) in [
            ("speed_of_sound", self.speed_of_sound),
            ("sample_rate", self.sample_rate),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::invalid_value(
                    field,
                    format!("must be finite and > 0, got {value}"),
                ));
            }
        }
        if self.pulse_len == 0 || self.pulse_len > self.samples {
            return Err(ConfigError::invalid_value(
                "pulse_len",
                format!("must be in 1..={}, got {}", self.samples, self.pulse_len),
            ));
        }
        if !self.amplitude.is_finite() {
            return Err(ConfigError::invalid_value("amplitude", "must be finite"));
        }
        if let Some(noise) = &self.noise {
            if !noise.scale.is_finite() || noise.scale < 0.0 {
                return Err(ConfigError::invalid_value(
                    "noise.scale",
                    format!("must be finite and >= 0, got {}", noise.scale),
                ));
            }
        }
        Ok(())
    }

    /// Arrival sample index at every receiver.
    ///
    /// Arrivals beyond the addressable range saturate at `usize::MAX`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn arrivals(&self, geometry: &ReceiverGeometry) -> Vec<usize> {
        geometry
            .receivers()
            .iter()
            .map(|p| {
                let travel = self.source.distance_to(p) / self.speed_of_sound;
                ((travel * self.sample_rate).round() as usize).saturating_add(self.pre_roll)
            })
            .collect()
    }

    /// Continuous delays relative to receiver 0, before sampling.
    #[must_use]
    pub fn exact_delays(&self, geometry: &ReceiverGeometry) -> DelayVector {
        let r0 = self.source.distance_to(&geometry.reference());
        DelayVector::new(
            geometry.receivers()[1..]
                .iter()
                .map(|p| (self.source.distance_to(p) - r0) / self.speed_of_sound)
                .collect(),
        )
    }

    /// Renders the frame recorded by `geometry`.
    ///
    /// A pulse that would run past the end of its channel is left out and
    /// the receiver listed in [`SimulatedEvent::truncated`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] for out-of-range parameters.
    pub fn render(&self, geometry: &ReceiverGeometry) -> Result<SimulatedEvent, CoreError> {
        self.validate()?;

        let pulse = synth::hann_pulse(self.pulse_len);
        let arrivals = self.arrivals(geometry);
        let mut truncated = Vec::new();

        let channels = arrivals
            .iter()
            .enumerate()
            .map(|(k, &at)| {
                let mut x = match &self.noise {
                    Some(noise) => NoiseGenerator::new(noise.seed.wrapping_add(k as u64))
                        .background(self.samples, noise.scale),
                    None => vec![0.0; self.samples],
                };
                if !synth::inject_pulse(&mut x, &pulse, at, self.amplitude) {
                    tracing::warn!(receiver = k, arrival = at, "pulse does not fit in frame");
                    truncated.push(k);
                }
                ChannelSignal::new(x)
            })
            .collect();

        let frame = SignalFrame::new(channels, self.sample_rate)?;
        Ok(SimulatedEvent {
            frame,
            arrivals,
            truncated,
        })
    }
}

/// Draws a source uniformly from the box spanned by `lower` and `upper`.
pub fn random_source<R: Rng + ?Sized>(rng: &mut R, lower: Point3, upper: Point3) -> Point3 {
    let mut axis = |lo: f64, hi: f64| {
        if hi > lo {
            rng.gen_range(lo..hi)
        } else {
            lo
        }
    };
    Point3::new(
        axis(lower.x, upper.x),
        axis(lower.y, upper.y),
        axis(lower.z, upper.z),
    )
}

/// Draws a pulse amplitude in `[0.1, 1.0)`.
pub fn random_amplitude<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(0.1..1.0)
}
