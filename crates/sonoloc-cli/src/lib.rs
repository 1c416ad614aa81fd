//! sonoloc CLI
//!
//! Command-line interface for acoustic source localization from time
//! differences of arrival.
//!
//! # Features
//!
//! - **locate**: localize the event in a recorded file
//! - **simulate**: render a synthetic event and localize it
//! - **techniques**: list detection techniques and their defaults
//! - **version**: Display version information
//!
//! # Usage
//!
//! ```bash
//! # Localize a serial capture with the wavelet detector
//! sonoloc locate capture.txt --technique wavelet
//!
//! # Compare all techniques on a column-per-channel recording
//! sonoloc locate run3.csv --layout columns --all
//!
//! # Simulate a noisy event at a known position
//! sonoloc simulate --source 1,2,0.5 --noise 0.01 --format json
//! ```

use clap::{Parser, Subcommand};

pub mod locate;
pub mod replay;
pub mod report;
pub mod simulate;

/// sonoloc Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "sonoloc")]
#[command(author, version, about = "Acoustic source localization from time differences of arrival")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Localize the event in a recorded file
    Locate(locate::LocateArgs),

    /// Render a synthetic event and localize it
    Simulate(simulate::SimulateArgs),

    /// List detection techniques and their defaults
    Techniques {
        /// Locator configuration file (JSON)
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: report::OutputFormat,
    },

    /// Display version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_locate() {
        let cli = Cli::try_parse_from([
            "sonoloc",
            "locate",
            "rec.csv",
            "--layout",
            "columns",
            "--technique",
            "amplitude-threshold",
            "--format",
            "json",
        ])
        .unwrap();
        let Commands::Locate(args) = cli.command else {
            panic!("expected locate");
        };
        assert_eq!(args.layout, locate::Layout::Columns);
        assert_eq!(args.technique, Some(sonoloc_core::Technique::AmplitudeThreshold));
        assert_eq!(args.format, report::OutputFormat::Json);
        assert_eq!(args.trigger_level, 1.75);
        assert_eq!(args.post_trigger, 50);
    }
}
