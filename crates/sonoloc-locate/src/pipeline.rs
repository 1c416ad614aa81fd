//! Localization pipeline: frame -> delays -> position.

use chrono::{DateTime, Utc};
use sonoloc_core::{
    CoreError, DelayEstimate, DelayEstimator, EstimateValidity, Point3, PositionEstimate,
    SignalError, SignalFrame, Technique,
};
use sonoloc_signal::{event_intensity, DetectorSet};
use tracing::{debug, instrument, warn};

use crate::config::LocatorConfig;
use crate::solver::MultilaterationSolver;

/// Runs the detectors and the solver against one receiver geometry.
///
/// A `Localizer` is immutable once built; share it by reference across
/// threads and call [`Localizer::locate`] on independent frames.
#[derive(Debug, Clone)]
pub struct Localizer {
    config: LocatorConfig,
    detectors: DetectorSet,
    solver: MultilaterationSolver,
}

impl Localizer {
    /// Validates `config` and builds every detector and the solver.
    ///
    /// # Errors
    ///
    /// Returns [`sonoloc_core::ConfigError`] for any out-of-range setting.
    pub fn new(config: LocatorConfig) -> Result<Self, sonoloc_core::ConfigError> {
        config.validate()?;
        let detectors = DetectorSet::new(&config.detectors)?;
        let solver = MultilaterationSolver::new(config.geometry.clone(), config.solver.clone())?;
        Ok(Self {
            config,
            detectors,
            solver,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    /// Returns the solver.
    #[must_use]
    pub fn solver(&self) -> &MultilaterationSolver {
        &self.solver
    }

    /// Runs only the detection stage.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::ChannelCountMismatch`] if the frame does not
    /// carry one channel per receiver.
    pub fn detect(
        &self,
        frame: &SignalFrame,
        technique: Technique,
    ) -> Result<DelayEstimate, SignalError> {
        self.check_channels(frame)?;
        Ok(self.detectors.get(technique).estimate_delays(frame))
    }

    /// Estimates the source position of the event in `frame`.
    ///
    /// A frame in which nothing is detected yields the origin with
    /// [`EstimateValidity::NoEvent`]; the solver is not run.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Signal`] if the channel count does not match the
    /// geometry and [`CoreError::Solver`] if the solver rejects the delays.
    #[instrument(skip(self, frame), fields(channels = frame.num_channels(), samples = frame.samples_per_channel()))]
    pub fn locate(
        &self,
        frame: &SignalFrame,
        technique: Technique,
    ) -> Result<PositionEstimate, CoreError> {
        let estimate = self.detect(frame, technique)?;
        debug!(delays = %estimate.delays, status = ?estimate.status, "delays estimated");

        let amplitude = frame.last_amplitude();
        let intensity = event_intensity(frame);

        if !estimate.status.is_event() {
            debug!("no event detected, skipping solver");
            let origin = Point3::origin();
            return Ok(PositionEstimate {
                x: origin.x,
                y: origin.y,
                z: origin.z,
                technique,
                delays: estimate.delays,
                timestamp: frame.captured_at(),
                validity: EstimateValidity::NoEvent,
                amplitude,
                intensity,
                residual: None,
            });
        }

        let solution = self.solver.solve(&estimate.delays)?;
        let validity = EstimateValidity::from_parts(
            &estimate.status,
            frame.num_channels(),
            solution.clamped_delays,
        );
        if !matches!(validity, EstimateValidity::Valid) {
            warn!(%validity, "estimate degraded");
        }
        debug!(position = %solution.position, rank = solution.rank, residual = solution.residual, "position solved");

        Ok(PositionEstimate {
            x: solution.position.x,
            y: solution.position.y,
            z: solution.position.z,
            technique,
            delays: estimate.delays,
            timestamp: frame.captured_at(),
            validity,
            amplitude,
            intensity,
            residual: Some(solution.residual),
        })
    }

    /// Like [`Localizer::locate`], selecting the technique by name.
    ///
    /// # Errors
    ///
    /// Returns [`sonoloc_core::ConfigError::UnknownTechnique`] for
    /// unrecognised names, otherwise as [`Localizer::locate`].
    pub fn locate_named(
        &self,
        frame: &SignalFrame,
        technique: &str,
    ) -> Result<PositionEstimate, CoreError> {
        let technique: Technique = technique.parse()?;
        self.locate(frame, technique)
    }

    /// Like [`Localizer::locate`] with the configured default technique.
    ///
    /// # Errors
    ///
    /// As [`Localizer::locate`].
    pub fn locate_default(&self, frame: &SignalFrame) -> Result<PositionEstimate, CoreError> {
        self.locate(frame, self.config.technique)
    }

    /// De-interleaves one round-robin series into one channel per receiver
    /// and locates the event in it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Signal`] if the series is too short or contains
    /// non-finite samples, otherwise as [`Localizer::locate`].
    pub fn locate_interleaved(
        &self,
        raw: &[f64],
        sample_rate: f64,
        captured_at: DateTime<Utc>,
        technique: Technique,
    ) -> Result<PositionEstimate, CoreError> {
        let frame = self.deinterleave(raw, sample_rate, captured_at)?;
        self.locate(&frame, technique)
    }

    /// Builds a frame from a round-robin series using the configured
    /// leading channel.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError`] if the series cannot fill one round per
    /// receiver or the resulting channels are malformed.
    pub fn deinterleave(
        &self,
        raw: &[f64],
        sample_rate: f64,
        captured_at: DateTime<Utc>,
    ) -> Result<SignalFrame, SignalError> {
        SignalFrame::from_interleaved(
            raw,
            self.config.geometry.len(),
            self.config.leading_channel(),
            sample_rate,
            captured_at,
        )
    }

    /// Locates every frame independently.
    ///
    /// With the `parallel` feature the frames are spread over the rayon
    /// pool. Results keep the input order.
    pub fn locate_batch(
        &self,
        frames: &[SignalFrame],
        technique: Technique,
    ) -> Vec<Result<PositionEstimate, CoreError>> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            frames
                .par_iter()
                .map(|frame| self.locate(frame, technique))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            frames
                .iter()
                .map(|frame| self.locate(frame, technique))
                .collect()
        }
    }

    fn check_channels(&self, frame: &SignalFrame) -> Result<(), SignalError> {
        let expected = self.config.geometry.len();
        if frame.num_channels() != expected {
            return Err(SignalError::ChannelCountMismatch {
                expected,
                actual: frame.num_channels(),
            });
        }
        Ok(())
    }
}
