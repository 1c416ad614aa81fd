//! `sonoloc locate`: localize the event in a recorded file.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, ValueEnum};
use colored::Colorize;
use sonoloc_core::{ChannelSignal, PositionEstimate, SignalFrame, Technique};
use sonoloc_locate::{Localizer, LocatorConfig};

use crate::replay::{self, TriggerConfig};
use crate::report::{print_estimates, OutputFormat};

/// Layout of the recording on disk
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Layout {
    /// One sample per line, channels round-robin
    #[default]
    Interleaved,
    /// One column per channel
    Columns,
}

/// Arguments for the locate command
#[derive(Args, Debug)]
pub struct LocateArgs {
    /// Recording to process
    pub input: PathBuf,

    /// Detection technique (correlation, wavelet, rpa, amplitude-threshold)
    #[arg(short, long, conflicts_with = "all")]
    pub technique: Option<Technique>,

    /// Run every technique on the same recording
    #[arg(long)]
    pub all: bool,

    /// Sample rate in Hz (overrides the config file)
    #[arg(short = 'r', long)]
    pub sample_rate: Option<f64>,

    /// Layout of the input file
    #[arg(short, long, value_enum, default_value = "interleaved")]
    pub layout: Layout,

    /// Locator configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Level a sample must exceed to start the capture window
    #[arg(long, default_value = "1.75")]
    pub trigger_level: f64,

    /// Samples kept after the trigger
    #[arg(long, default_value = "50")]
    pub post_trigger: usize,

    /// Read the whole interleaved file instead of a triggered window
    #[arg(long)]
    pub no_trigger: bool,

    /// Resolve the four-receiver case with range closure
    #[arg(long)]
    pub range_closure: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Loads the config file, if any, and applies command-line overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or the result is invalid.
pub fn load_config(
    path: Option<&Path>,
    sample_rate: Option<f64>,
    range_closure: bool,
) -> Result<LocatorConfig> {
    let mut config = match path {
        Some(path) => LocatorConfig::from_json(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => LocatorConfig::default(),
    };
    if let Some(fs) = sample_rate {
        config.sample_rate = fs;
    }
    if range_closure {
        config.solver.range_closure = true;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Techniques selected by `--technique` / `--all`.
#[must_use]
pub fn selected_techniques(technique: Option<Technique>, all: bool, default: Technique) -> Vec<Technique> {
    if all {
        Technique::ALL.to_vec()
    } else {
        vec![technique.unwrap_or(default)]
    }
}

/// Reads `args.input` into a frame laid out for `localizer`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not form a valid
/// frame for the configured geometry.
pub fn read_frame(args: &LocateArgs, localizer: &Localizer) -> Result<SignalFrame> {
    let file = File::open(&args.input)
        .with_context(|| format!("failed to open {}", args.input.display()))?;
    let reader = BufReader::new(file);
    let fs = localizer.config().sample_rate;

    match args.layout {
        Layout::Interleaved => {
            let trigger = TriggerConfig {
                level: args.trigger_level,
                post_trigger: args.post_trigger,
            };
            let capture = replay::read_interleaved(reader, (!args.no_trigger).then_some(&trigger))?;
            if capture.skipped_lines > 0 {
                tracing::warn!(skipped = capture.skipped_lines, "skipped unparsable lines");
            }
            match capture.trigger_index {
                Some(index) => tracing::info!(index, samples = capture.samples.len(), "trigger fired"),
                None if !args.no_trigger => {
                    tracing::warn!("trigger level never exceeded, using the whole recording");
                }
                None => {}
            }
            localizer
                .deinterleave(&capture.samples, fs, Utc::now())
                .context("failed to de-interleave recording")
        }
        Layout::Columns => {
            let channels = replay::read_columns(reader)
                .with_context(|| format!("failed to parse {}", args.input.display()))?;
            SignalFrame::new(channels.into_iter().map(ChannelSignal::new).collect(), fs)
                .context("recording is not a valid frame")
        }
    }
}

/// Runs every selected technique on `frame`.
///
/// # Errors
///
/// Returns the first localization error.
pub fn locate_all(
    localizer: &Localizer,
    frame: &SignalFrame,
    techniques: &[Technique],
) -> Result<Vec<PositionEstimate>> {
    techniques
        .iter()
        .map(|&t| {
            localizer
                .locate(frame, t)
                .with_context(|| format!("{t} localization failed"))
        })
        .collect()
}

/// Execute the locate command
pub fn execute(args: LocateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.sample_rate, args.range_closure)?;
    let techniques = selected_techniques(args.technique, args.all, config.technique);
    let localizer = Localizer::new(config)?;

    let frame = read_frame(&args, &localizer)?;
    tracing::info!(
        channels = frame.num_channels(),
        samples = frame.samples_per_channel(),
        sample_rate = frame.sample_rate(),
        "recording loaded"
    );

    let estimates = locate_all(&localizer, &frame, &techniques)?;
    if args.format == OutputFormat::Table {
        println!(
            "{} {}",
            "Recording:".bold(),
            args.input.display().to_string().cyan()
        );
    }
    print_estimates(&estimates, args.format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonoloc_core::EstimateValidity;
    use sonoloc_signal::synth;
    use std::io::Write;
    use tempfile::tempdir;

    fn args(input: PathBuf, layout: Layout) -> LocateArgs {
        LocateArgs {
            input,
            technique: None,
            all: false,
            sample_rate: None,
            layout,
            config: None,
            trigger_level: 1.75,
            post_trigger: 50,
            no_trigger: true,
            range_closure: false,
            format: OutputFormat::Compact,
        }
    }

    fn pulse_channels() -> Vec<Vec<f64>> {
        let pulse = synth::hann_pulse(64);
        [100, 105, 110, 115]
            .iter()
            .map(|&at| {
                let mut x = vec![0.0; 600];
                synth::inject_pulse(&mut x, &pulse, at, 1.0);
                x
            })
            .collect()
    }

    #[test]
    fn test_selected_techniques() {
        assert_eq!(
            selected_techniques(None, false, Technique::Rpa),
            vec![Technique::Rpa]
        );
        assert_eq!(
            selected_techniques(Some(Technique::Wavelet), false, Technique::Rpa),
            vec![Technique::Wavelet]
        );
        assert_eq!(selected_techniques(None, true, Technique::Rpa).len(), 4);
    }

    #[test]
    fn test_load_config_overrides() {
        let config = load_config(None, Some(48_000.0), true).unwrap();
        assert_eq!(config.sample_rate, 48_000.0);
        assert!(config.solver.range_closure);
        assert!(load_config(None, Some(-1.0), false).is_err());
    }

    #[test]
    fn test_columns_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec.csv");
        let channels = pulse_channels();
        let mut file = File::create(&path).unwrap();
        writeln!(file, "m0,m1,m2,m3").unwrap();
        for i in 0..600 {
            let row: Vec<String> = channels.iter().map(|c| c[i].to_string()).collect();
            writeln!(file, "{}", row.join(",")).unwrap();
        }
        drop(file);

        let localizer = Localizer::new(LocatorConfig::default()).unwrap();
        let frame = read_frame(&args(path, Layout::Columns), &localizer).unwrap();
        let estimates = locate_all(&localizer, &frame, &[Technique::Correlation]).unwrap();
        let samples = estimates[0].delays.in_samples(1000.0);
        for (got, want) in samples.iter().zip([5.0, 10.0, 15.0]) {
            assert!((got - want).abs() < 1e-9, "{samples:?}");
        }
        assert_eq!(estimates[0].validity, EstimateValidity::Valid);
    }

    #[test]
    fn test_interleaved_file_uses_leading_channel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rec.txt");
        let channels = pulse_channels();
        let mut file = File::create(&path).unwrap();
        // recorder prints the last channel first
        for i in 0..600 {
            for c in [3, 0, 1, 2] {
                writeln!(file, "{}", channels[c][i]).unwrap();
            }
        }
        drop(file);

        let localizer = Localizer::new(LocatorConfig::default()).unwrap();
        let frame = read_frame(&args(path, Layout::Interleaved), &localizer).unwrap();
        assert_eq!(frame.samples_per_channel(), 600);
        assert_eq!(frame.channel(0).unwrap().samples(), channels[0].as_slice());
        assert_eq!(frame.channel(3).unwrap().samples(), channels[3].as_slice());
    }

    #[test]
    fn test_missing_file_is_error() {
        let localizer = Localizer::new(LocatorConfig::default()).unwrap();
        let err = read_frame(
            &args(PathBuf::from("/nonexistent/rec.txt"), Layout::Interleaved),
            &localizer,
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to open"));
    }
}
