//! Suitability CLI
//!
//! Loads an analysis config and its datasets from disk, runs the analysis
//! and writes the composite layer as JSON keyed by H3 cell.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use colored::Colorize;
use hex_suitability::analysis::{AnalysisError, ConfigError};
use hex_suitability::constants::DEFAULT_SUMMARY_TOP_CELLS;
use hex_suitability::dataset::DatasetError;
use hex_suitability::{AnalysisConfig, AnalysisOutput, Dataset, H3Grid, run_analysis};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("source '{source_name}' has no dataset path")]
    MissingPath { source_name: String },

    #[error("failed to load dataset for source '{source_name}': {error}")]
    Dataset {
        source_name: String,
        error: DatasetError,
    },

    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write {path}: {error}")]
    FileWrite { path: PathBuf, error: std::io::Error },
}

impl CliError {
    fn exit(&self) -> ! {
        eprintln!("{} {}", "Error:".red().bold(), self);
        process::exit(1)
    }
}

#[derive(Parser)]
#[command(name = "suitability")]
#[command(about = "Combine weighted hexagon layers into a suitability score", long_about = None)]
struct Args {
    /// Analysis config (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Directory that relative dataset paths are resolved against
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Output file for the composite layer; prints to stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// Override the config's H3 resolution
    #[arg(long)]
    resolution: Option<u8>,

    /// Override a source weight, e.g. --weight crime=0.5
    #[arg(long = "weight", value_parser = parse_weight)]
    weights: Vec<(String, f64)>,

    /// Also write every per-source layer
    #[arg(long)]
    include_layers: bool,

    /// Number of top cells to print in the summary
    #[arg(long, default_value_t = DEFAULT_SUMMARY_TOP_CELLS)]
    top: usize,
}

fn parse_weight(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=WEIGHT, got '{raw}'"))?;
    let weight: f64 = value
        .parse()
        .map_err(|_| format!("weight for '{name}' is not a number: '{value}'"))?;
    if !weight.is_finite() {
        return Err(format!("weight for '{name}' must be finite"));
    }
    Ok((name.to_string(), weight))
}

fn init_logging() -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| CliError::LoggingInit(e.to_string()))
}

fn load_datasets(config: &AnalysisConfig, data_dir: &Path) -> Result<HashMap<String, Dataset>, CliError> {
    let mut datasets = HashMap::new();
    for source in &config.sources {
        let path = source.path.as_ref().ok_or_else(|| CliError::MissingPath {
            source_name: source.name.clone(),
        })?;
        let path = data_dir.join(path);
        let dataset = Dataset::load(&path, &source.format).map_err(|error| CliError::Dataset {
            source_name: source.name.clone(),
            error,
        })?;
        info!(source = %source.name, records = dataset.len(), path = %path.display(), "loaded dataset");
        datasets.insert(source.name.clone(), dataset);
    }
    Ok(datasets)
}

fn write_output(args: &Args, output: &AnalysisOutput) -> Result<(), CliError> {
    let json = if args.include_layers {
        serde_json::to_string_pretty(output)?
    } else {
        serde_json::to_string_pretty(&output.composite)?
    };

    match &args.output {
        Some(path) => fs::write(path, json).map_err(|error| CliError::FileWrite {
            path: path.clone(),
            error,
        }),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn print_summary(output: &AnalysisOutput, top: usize) {
    eprintln!("{}", "Suitability summary".bold());
    for (name, layer) in &output.layers {
        eprintln!("  {:<16} {:>8} cells", name.cyan(), layer.len());
    }
    eprintln!(
        "  {:<16} {:>8} cells, {} suitable",
        "composite".green(),
        output.composite.len(),
        output.suitable_cells.len()
    );
    for (cell, score) in output.composite.top_cells(top) {
        eprintln!("    {cell}  {}", format!("{score:.3}").yellow());
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    let mut config = AnalysisConfig::load(&args.config)?;
    if let Some(resolution) = args.resolution {
        config.resolution = resolution;
    }
    for (name, weight) in &args.weights {
        config.set_weight(name, *weight)?;
    }
    config.validate()?;

    let datasets = load_datasets(&config, &args.data_dir)?;
    let output = run_analysis(&H3Grid::new(), &config, &datasets)?;

    write_output(args, &output)?;
    print_summary(&output, args.top);
    Ok(())
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging().and_then(|_| run(&args)) {
        e.exit();
    }
}
