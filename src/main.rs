//! Landslide susceptibility mapping - command-line entry point

use clap::Parser;
use landslide_susceptibility::cli::{cmd_compare, cmd_inspect, cmd_predict, cmd_run, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "landslide_susceptibility=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            cmd_run(&args)?;
        }
        Commands::Inspect { factors, factor_dir } => {
            cmd_inspect(&factors, factor_dir.as_deref())?;
        }
        Commands::Compare { args, folds } => {
            cmd_compare(&args, folds)?;
        }
        Commands::Predict { model, factors, output, workers } => {
            cmd_predict(&model, &factors, &output, workers)?;
        }
    }

    Ok(())
}
