//! `sonoloc simulate`: render a synthetic event and localize it.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sonoloc_core::{Point3, Technique};
use sonoloc_locate::simulate::{random_amplitude, random_source, NoiseSpec, Scenario};
use sonoloc_locate::Localizer;

use crate::locate::{load_config, locate_all, selected_techniques};
use crate::report::{print_estimates, OutputFormat};

/// Arguments for the simulate command
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Source position as x,y,z in meters (random when omitted)
    #[arg(short, long, value_parser = parse_point)]
    pub source: Option<Point3>,

    /// Detection technique (correlation, wavelet, rpa, amplitude-threshold)
    #[arg(short, long, conflicts_with = "all")]
    pub technique: Option<Technique>,

    /// Run every technique on the same event
    #[arg(long)]
    pub all: bool,

    /// Background noise scale (white + pink)
    #[arg(short, long)]
    pub noise: Option<f64>,

    /// Seed for the source position, amplitude and noise
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Sample rate in Hz (overrides the config file)
    #[arg(short = 'r', long)]
    pub sample_rate: Option<f64>,

    /// Samples per channel
    #[arg(long, default_value = "2000")]
    pub samples: usize,

    /// Locator configuration file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Resolve the four-receiver case with range closure
    #[arg(long)]
    pub range_closure: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Parses `x,y,z`.
///
/// # Errors
///
/// Returns an error unless exactly three finite numbers are given.
pub fn parse_point(s: &str) -> Result<Point3> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to parse point coordinates as numbers")?;
    if parts.len() != 3 {
        bail!("Point requires 3 values: x,y,z (got {})", parts.len());
    }
    let point = Point3::new(parts[0], parts[1], parts[2]);
    if !point.is_finite() {
        bail!("Point coordinates must be finite");
    }
    Ok(point)
}

/// Builds the scenario described by `args`.
///
/// Without `--source` the position is drawn from a 10 m square on the floor
/// and the amplitude from `[0.1, 1.0)`, both seeded by `--seed`.
#[must_use]
pub fn build_scenario(args: &SimulateArgs, sample_rate: f64, speed_of_sound: f64) -> Scenario {
    let mut rng = StdRng::seed_from_u64(args.seed);
    let (source, amplitude) = match args.source {
        Some(source) => (source, 1.0),
        None => (
            random_source(
                &mut rng,
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(10.0, 10.0, 0.0),
            ),
            random_amplitude(&mut rng),
        ),
    };
    Scenario {
        source,
        speed_of_sound,
        sample_rate,
        samples: args.samples,
        amplitude,
        noise: args.noise.map(|scale| NoiseSpec {
            scale,
            seed: args.seed,
        }),
        ..Default::default()
    }
}

/// Execute the simulate command
pub fn execute(args: SimulateArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), args.sample_rate, args.range_closure)?;
    let techniques = selected_techniques(args.technique, args.all, config.technique);
    let scenario = build_scenario(&args, config.sample_rate, config.solver.speed_of_sound);

    let event = scenario
        .render(&config.geometry)
        .context("failed to render scenario")?;
    if !event.truncated.is_empty() {
        tracing::warn!(receivers = ?event.truncated, "pulse truncated, increase --samples");
    }
    tracing::info!(source = %scenario.source, amplitude = scenario.amplitude, "event rendered");

    let localizer = Localizer::new(config)?;
    let estimates = locate_all(&localizer, &event.frame, &techniques)?;

    if args.format == OutputFormat::Table {
        println!(
            "{} {}   {} {}",
            "Source:".bold(),
            scenario.source.to_string().cyan(),
            "True delays (ms):".bold(),
            scenario
                .exact_delays(localizer.solver().geometry())
                .iter()
                .map(|d| format!("{:.3}", d * 1e3))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    print_estimates(&estimates, args.format)?;

    if args.format == OutputFormat::Table {
        for e in &estimates {
            println!(
                "  {} {} {:.3} m",
                e.technique.to_string().dimmed(),
                "error:".dimmed(),
                e.position().distance_to(&scenario.source)
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::{Cli, Commands};

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("1, 2.5,-3").unwrap(), Point3::new(1.0, 2.5, -3.0));
        assert!(parse_point("1,2").is_err());
        assert!(parse_point("a,b,c").is_err());
        assert!(parse_point("inf,0,0").is_err());
    }

    #[test]
    fn test_cli_parses_simulate() {
        let cli = Cli::try_parse_from([
            "sonoloc", "simulate", "--source", "1,2,0.5", "--technique", "rpa", "--noise", "0.01",
        ])
        .unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.source, Some(Point3::new(1.0, 2.0, 0.5)));
        assert_eq!(args.technique, Some(Technique::Rpa));
        assert_eq!(args.noise, Some(0.01));
    }

    #[test]
    fn test_cli_rejects_unknown_technique() {
        assert!(Cli::try_parse_from(["sonoloc", "simulate", "--technique", "dpe"]).is_err());
        assert!(
            Cli::try_parse_from(["sonoloc", "simulate", "--technique", "rpa", "--all"]).is_err()
        );
    }

    #[test]
    fn test_random_scenario_is_seeded() {
        let cli = Cli::try_parse_from(["sonoloc", "simulate", "--seed", "9"]).unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let a = build_scenario(&args, 1000.0, 343.0);
        let b = build_scenario(&args, 1000.0, 343.0);
        assert_eq!(a, b);
        assert!((0.0..10.0).contains(&a.source.x));
        assert_eq!(a.source.z, 0.0);
        assert!((0.1..1.0).contains(&a.amplitude));
    }

    #[test]
    fn test_simulated_event_localizes() {
        let cli = Cli::try_parse_from([
            "sonoloc", "simulate", "--source", "1,2,0.5", "--all",
        ])
        .unwrap();
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        let config = load_config(None, None, false).unwrap();
        let scenario = build_scenario(&args, config.sample_rate, config.solver.speed_of_sound);
        let event = scenario.render(&config.geometry).unwrap();
        let techniques = selected_techniques(args.technique, args.all, config.technique);
        let localizer = Localizer::new(config).unwrap();
        let estimates = locate_all(&localizer, &event.frame, &techniques).unwrap();
        assert_eq!(estimates.len(), 4);
        assert!(estimates.iter().all(|e| e.position().is_finite()));
    }
}
