//! Event diagnostics for display collaborators.
//!
//! Event intensity, normalized magnitude spectra and short-time Fourier
//! spectrograms of captured channels. None of this feeds back into delay
//! estimation.

use std::f64::consts::PI;

use ndarray::Array2;
use num_complex::Complex64;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use sonoloc_core::utils::mean_power;
use sonoloc_core::SignalFrame;

/// Configuration for spectrogram generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    /// FFT window size (number of samples per frame)
    pub window_size: usize,
    /// Hop size (step between consecutive frames)
    pub hop_size: usize,
    /// Window function to apply
    pub window_fn: WindowFunction,
    /// Whether to compute power (magnitude squared) or magnitude
    pub power: bool,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            window_size: 128,
            hop_size: 32,
            window_fn: WindowFunction::Hann,
            power: true,
        }
    }
}

/// Window function types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowFunction {
    /// Rectangular (no windowing)
    Rectangular,
    /// Hann window (cosine-squared taper)
    #[default]
    Hann,
    /// Hamming window
    Hamming,
    /// Blackman window (lower sidelobe level)
    Blackman,
}

/// Result of spectrogram computation.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// Power/magnitude values: rows = frequency bins, columns = time frames.
    /// Only positive frequencies (0 to Nyquist), so rows = window_size/2 + 1.
    pub data: Array2<f64>,
    /// Number of frequency bins
    pub n_freq: usize,
    /// Number of time frames
    pub n_time: usize,
    /// Frequency resolution (Hz per bin)
    pub freq_resolution: f64,
    /// Time resolution (seconds per frame)
    pub time_resolution: f64,
}

/// Errors from spectrogram computation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SpectrogramError {
    /// Fewer samples than one window
    #[error("Signal too short ({signal_len} samples) for window size {window_size}")]
    SignalTooShort {
        /// Samples available
        signal_len: usize,
        /// Window size requested
        window_size: usize,
    },

    /// Hop of zero samples
    #[error("Hop size must be > 0")]
    InvalidHopSize,

    /// Window of fewer than two samples
    #[error("Window size must be >= 2")]
    InvalidWindowSize,
}

/// Generates `size` window coefficients.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn window(kind: WindowFunction, size: usize) -> Vec<f64> {
    if size < 2 {
        return vec![1.0; size];
    }
    let n = (size - 1) as f64;
    (0..size)
        .map(|i| {
            let phase = 2.0 * PI * i as f64 / n;
            match kind {
                WindowFunction::Rectangular => 1.0,
                WindowFunction::Hann => 0.5 * (1.0 - phase.cos()),
                WindowFunction::Hamming => 0.54 - 0.46 * phase.cos(),
                WindowFunction::Blackman => 0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos(),
            }
        })
        .collect()
}

/// Computes the spectrogram of one channel.
///
/// # Errors
///
/// Returns [`SpectrogramError`] if the window or hop is invalid or the signal
/// is shorter than one window.
#[allow(clippy::cast_precision_loss)]
pub fn compute_spectrogram(
    signal: &[f64],
    sample_rate: f64,
    config: &SpectrogramConfig,
) -> Result<Spectrogram, SpectrogramError> {
    if config.window_size < 2 {
        return Err(SpectrogramError::InvalidWindowSize);
    }
    if config.hop_size == 0 {
        return Err(SpectrogramError::InvalidHopSize);
    }
    if signal.len() < config.window_size {
        return Err(SpectrogramError::SignalTooShort {
            signal_len: signal.len(),
            window_size: config.window_size,
        });
    }

    let n_frames = (signal.len() - config.window_size) / config.hop_size + 1;
    let n_freq = config.window_size / 2 + 1;
    let taper = window(config.window_fn, config.window_size);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(config.window_size);

    let mut data = Array2::zeros((n_freq, n_frames));
    let mut buffer = vec![Complex64::new(0.0, 0.0); config.window_size];

    for frame in 0..n_frames {
        let start = frame * config.hop_size;
        for ((dst, &s), &w) in buffer
            .iter_mut()
            .zip(&signal[start..start + config.window_size])
            .zip(&taper)
        {
            *dst = Complex64::new(s * w, 0.0);
        }

        fft.process(&mut buffer);

        for bin in 0..n_freq {
            let mag = buffer[bin].norm();
            data[[bin, frame]] = if config.power { mag * mag } else { mag };
        }
    }

    Ok(Spectrogram {
        data,
        n_freq,
        n_time: n_frames,
        freq_resolution: sample_rate / config.window_size as f64,
        time_resolution: config.hop_size as f64 / sample_rate,
    })
}

/// Computes one spectrogram per channel of a frame.
///
/// # Errors
///
/// Returns [`SpectrogramError`] under the same conditions as
/// [`compute_spectrogram`].
pub fn frame_spectrograms(
    frame: &SignalFrame,
    config: &SpectrogramConfig,
) -> Result<Vec<Spectrogram>, SpectrogramError> {
    frame
        .channels()
        .iter()
        .map(|c| compute_spectrogram(c.samples(), frame.sample_rate(), config))
        .collect()
}

/// Mean power across every sample of every channel.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn event_intensity(frame: &SignalFrame) -> f64 {
    let channels = frame.channels();
    if channels.is_empty() {
        return 0.0;
    }
    // equal channel lengths make the mean of means the global mean
    channels.iter().map(|c| mean_power(c.samples())).sum::<f64>() / channels.len() as f64
}

/// Normalized one-sided magnitude spectrum: `n / 2 + 1` bins, peak 1.
///
/// A silent signal yields all zeros.
#[must_use]
pub fn magnitude_spectrum(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let mut buffer: Vec<Complex64> = signal.iter().map(|&x| Complex64::new(x, 0.0)).collect();
    FftPlanner::new()
        .plan_fft_forward(buffer.len())
        .process(&mut buffer);

    let mut spectrum: Vec<f64> = buffer[..signal.len() / 2 + 1]
        .iter()
        .map(|c| c.norm())
        .collect();
    let peak = spectrum.iter().copied().fold(0.0_f64, f64::max);
    if peak > 0.0 {
        for v in &mut spectrum {
            *v /= peak;
        }
    }
    spectrum
}
