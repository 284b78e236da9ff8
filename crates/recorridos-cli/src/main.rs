mod config;
mod ingest;
mod pipeline;
mod report;

use crate::config::Config;
use crate::pipeline::Pipeline;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use recorridos_core::AnalysisError;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML run configuration.
    #[arg(long)]
    config: PathBuf,

    /// Override the exclusive end year of the completed series.
    #[arg(long)]
    end_year: Option<i32>,

    /// Override the exclusive end month of the completed series.
    #[arg(long)]
    end_month: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Complete the monthly ride counts and write them as CSV.
    Fill,

    /// Fill, then correlate the counts with the measurement table.
    Analyze,

    /// List the expected range and the missing months.
    Months,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        let cause = analysis_error(&error);
        if cause.is_some_and(AnalysisError::is_consistency_error) {
            log::error!("gaps at the edges of the range need anchors = \"mean\" in [gaps]");
        }
        std::process::exit(cause.map(AnalysisError::to_code).unwrap_or(1));
    }
}

fn run_cli() -> Result<()> {
    let args = Cli::parse();
    log::info!("{args:#?}");

    let cfg = Config::from_file(&args.config).context("failed to construct cfg")?;
    let options = cfg
        .gap_fill_options(args.end_year, args.end_month)
        .context("failed to construct gap fill options")?;
    let pipeline = Pipeline::new(cfg, options);

    match args.command {
        Command::Fill => {
            pipeline.fill()?;
        }
        Command::Analyze => {
            pipeline.analyze()?;
        }
        Command::Months => {
            pipeline.months()?;
        }
    }

    Ok(())
}

fn analysis_error(error: &anyhow::Error) -> Option<&AnalysisError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<AnalysisError>())
}
