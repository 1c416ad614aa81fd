//! Rendering position estimates for the terminal.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use sonoloc_core::{EstimateValidity, PositionEstimate, Technique};
use sonoloc_signal::DetectorConfig;
use tabled::{settings::Style, Table, Tabled};

/// Output format
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty table output
    #[default]
    Table,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

/// Estimate display row for tables
#[derive(Tabled)]
pub(crate) struct EstimateRow {
    #[tabled(rename = "Technique")]
    technique: String,
    #[tabled(rename = "x (m)")]
    x: String,
    #[tabled(rename = "y (m)")]
    y: String,
    #[tabled(rename = "z (m)")]
    z: String,
    #[tabled(rename = "Delays (ms)")]
    delays: String,
    #[tabled(rename = "Validity")]
    validity: String,
    #[tabled(rename = "Residual (m)")]
    residual: String,
}

impl From<&PositionEstimate> for EstimateRow {
    fn from(e: &PositionEstimate) -> Self {
        let delays = e
            .delays
            .iter()
            .map(|d| format!("{:.3}", d * 1e3))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            technique: e.technique.to_string(),
            x: format!("{:.3}", e.x),
            y: format!("{:.3}", e.y),
            z: format!("{:.3}", e.z),
            delays,
            validity: format_validity(&e.validity),
            residual: e.residual.map_or_else(|| "-".to_string(), |r| format!("{r:.4}")),
        }
    }
}

/// Technique listing row
#[derive(Tabled, Serialize)]
pub(crate) struct TechniqueRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Defaults")]
    defaults: String,
}

/// One row per technique with its configured parameters.
pub(crate) fn technique_rows(config: &DetectorConfig) -> Vec<TechniqueRow> {
    Technique::ALL
        .into_iter()
        .map(|t| {
            let (method, defaults) = match t {
                Technique::Correlation => (
                    "cross-correlation peak against channel 0",
                    format!(
                        "max_lag={}",
                        config
                            .correlation
                            .max_lag
                            .map_or_else(|| "all".to_string(), |m| m.to_string())
                    ),
                ),
                Technique::Wavelet => (
                    "CWT energy threshold crossing",
                    format!(
                        "family={:?} threshold={} scales=2^({}/{})..2^({}/{})",
                        config.wavelet.family,
                        config.wavelet.threshold,
                        config.wavelet.min_exponent,
                        config.wavelet.steps_per_octave,
                        config.wavelet.max_exponent,
                        config.wavelet.steps_per_octave
                    ),
                ),
                Technique::Rpa => (
                    "recurrence-plot column sums",
                    format!(
                        "dim={} lag={} rp_thresh={} threshold={}",
                        config.rpa.embedding_dim,
                        config.rpa.lag,
                        config.rpa.rp_thresh,
                        config.rpa.threshold
                    ),
                ),
                Technique::AmplitudeThreshold => (
                    "fixed-baseline level crossing",
                    format!(
                        "baseline={} level={} start={}",
                        config.amplitude_threshold.baseline,
                        config.amplitude_threshold.level,
                        config.amplitude_threshold.start_index
                    ),
                ),
            };
            TechniqueRow {
                name: t.name().to_string(),
                method: method.to_string(),
                defaults,
            }
        })
        .collect()
}

/// Prints the technique listing.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_techniques(config: &DetectorConfig, format: OutputFormat) -> Result<()> {
    let rows = technique_rows(config);
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Compact => {
            for row in rows {
                println!("{}", row.name);
            }
        }
        OutputFormat::Table => {
            println!("{}", "Detection techniques".bold().cyan());
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }
    Ok(())
}

/// Format validity with color
fn format_validity(validity: &EstimateValidity) -> String {
    match validity {
        EstimateValidity::Valid => validity.to_string().green().to_string(),
        EstimateValidity::Degraded { .. } => validity.to_string().yellow().to_string(),
        _ => validity.to_string().red().to_string(),
    }
}

/// One line per estimate.
#[must_use]
pub fn compact_line(e: &PositionEstimate) -> String {
    format!(
        "{} x={:.3} y={:.3} z={:.3} amp={:.3} intensity={:.3e} {}",
        e.technique, e.x, e.y, e.z, e.amplitude, e.intensity, e.validity
    )
}

/// Prints `estimates` in the requested format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_estimates(estimates: &[PositionEstimate], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(estimates)?);
        }
        OutputFormat::Compact => {
            for e in estimates {
                println!("{}", compact_line(e));
            }
        }
        OutputFormat::Table => {
            let rows: Vec<EstimateRow> = estimates.iter().map(EstimateRow::from).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
            if let Some(first) = estimates.first() {
                println!(
                    "  {} {:.4}   {} {:.4e}",
                    "Last amplitude:".dimmed(),
                    first.amplitude,
                    "Intensity:".dimmed(),
                    first.intensity
                );
            }
        }
    }
    Ok(())
}
