//! RMF Audio Capture L3 suite CLI

use clap::Parser;
use env_logger::Env;
use log::info;

use rmfaudio::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("RMF Audio Capture suite v{}", env!("CARGO_PKG_VERSION"));

    let passed = match cli.command {
        Commands::Run(args) => rmfaudio::cli::commands::run(&args)?,
        Commands::Compare {
            reference,
            captured,
            rack,
        } => rmfaudio::cli::commands::compare(&reference, &captured, rack.as_deref())?,
        Commands::Pitch { file } => {
            rmfaudio::cli::commands::pitch(&file)?;
            true
        }
        Commands::List => {
            rmfaudio::cli::commands::list();
            true
        }
    };

    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
