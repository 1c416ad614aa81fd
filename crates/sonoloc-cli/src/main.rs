//! sonoloc CLI Entry Point
//!
//! This is the main entry point for the sonoloc command-line tool.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sonoloc_cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Locate(args) => sonoloc_cli::locate::execute(args)?,
        Commands::Simulate(args) => sonoloc_cli::simulate::execute(args)?,
        Commands::Techniques { config, format } => {
            let config = sonoloc_cli::locate::load_config(config.as_deref(), None, false)?;
            sonoloc_cli::report::print_techniques(&config.detectors, format)?;
        }
        Commands::Version => {
            println!("sonoloc {}", env!("CARGO_PKG_VERSION"));
            println!("Signal module version: {}", sonoloc_signal::VERSION);
            println!("Locate module version: {}", sonoloc_locate::VERSION);
        }
    }

    Ok(())
}
