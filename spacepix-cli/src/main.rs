//! spacepix CLI: cell clusterization and spacepoint formation.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_precision_loss,
    clippy::too_many_lines
)]

mod input;

use clap::{Parser, Subcommand, ValueEnum};

use input::{write_spacepoints, EventInput};
use spacepix_algorithms::{
    check_output, compare_outputs, synthetic_event, ClusterizationConfig, EventStatistics,
    ExecutionModel, Mismatch, SyntheticConfig,
};
use spacepix_core::CellContainer;
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;

/// Tolerance for measurement and spacepoint agreement between models.
const COMPARE_EPSILON: f64 = 1e-9;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] spacepix_core::Error),

    #[error("Clusterization error: {0}")]
    Clusterization(#[from] spacepix_core::ClusterizationError),

    #[error("{model} output is inconsistent: {source}")]
    Invalid {
        model: ExecutionModel,
        source: Mismatch,
    },

    #[error("Models disagree: {0}")]
    Disagreement(Mismatch),
}

/// Execution model selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Model {
    /// Single-threaded reference pipeline
    Sequential,
    /// Data-parallel pipeline on rayon
    Parallel,
}

impl From<Model> for ExecutionModel {
    fn from(model: Model) -> Self {
        match model {
            Model::Sequential => ExecutionModel::Sequential,
            Model::Parallel => ExecutionModel::Parallel,
        }
    }
}

/// Pixel detector cell clusterization.
#[derive(Parser)]
#[command(name = "spacepix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cluster one JSON event and write its spacepoints
    Process {
        /// Input event file
        input: PathBuf,

        /// Output file for spacepoints (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Execution model to use
        #[arg(short, long, value_enum, default_value = "parallel")]
        model: Model,

        /// Tasks per block in parallel launches
        #[arg(long, default_value = "64")]
        block_size: usize,

        /// Worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Run both models on one JSON event and check they agree
    Compare {
        /// Input event file
        input: PathBuf,
    },

    /// Time both models on a synthetic event
    Benchmark {
        /// Number of modules
        #[arg(long, default_value = "1000")]
        modules: usize,

        /// Approximate cells per module
        #[arg(long, default_value = "200")]
        cells: usize,

        /// Generator seed
        #[arg(long, default_value = "12345")]
        seed: u64,

        /// Number of iterations
        #[arg(short, long, default_value = "5")]
        iterations: usize,

        /// Worker threads (default: all cores)
        #[arg(long)]
        threads: Option<usize>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn load_event(path: &Path) -> Result<CellContainer> {
    log::info!("Reading: {}", path.display());
    EventInput::load(path)?.build()
}

fn build_config(block_size: usize, threads: Option<usize>) -> ClusterizationConfig {
    let config = ClusterizationConfig::new().with_block_size(block_size);
    match threads {
        Some(threads) => config.with_num_threads(threads),
        None => config,
    }
}

fn print_statistics(stats: &EventStatistics) {
    println!("Modules: {}", stats.modules);
    println!("Cells: {}", stats.cells);
    println!("Clusters: {}", stats.clusters);
    println!("Measurements: {}", stats.measurements);
    println!("Spacepoints: {}", stats.spacepoints);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Process {
            input,
            output,
            model,
            block_size,
            threads,
        } => {
            let model = ExecutionModel::from(model);
            let config = build_config(block_size, threads);
            let cells = load_event(&input)?;
            let algo = model.build(&config)?;

            let start = Instant::now();
            let result = algo.run(&cells)?;
            let elapsed = start.elapsed();

            println!(
                "Processed {} with {} model in {:.3}ms",
                input.display(),
                model,
                elapsed.as_secs_f64() * 1000.0
            );
            print_statistics(&result.statistics());

            if let Some(output) = output {
                write_spacepoints(&output, &result.spacepoints)?;
                println!("Wrote spacepoints to: {}", output.display());
            }
        }

        Commands::Compare { input } => {
            let cells = load_event(&input)?;
            let config = ClusterizationConfig::default();

            let mut outputs = Vec::with_capacity(ExecutionModel::ALL.len());
            for model in ExecutionModel::ALL {
                let output = model.build(&config)?.run(&cells)?;
                check_output(&cells, &output)
                    .map_err(|source| CliError::Invalid { model, source })?;
                outputs.push(output);
            }

            compare_outputs(&outputs[0], &outputs[1], COMPARE_EPSILON)
                .map_err(CliError::Disagreement)?;

            println!(
                "{} and {} agree on {} clusters",
                ExecutionModel::ALL[0],
                ExecutionModel::ALL[1],
                outputs[0].statistics().clusters
            );
        }

        Commands::Benchmark {
            modules,
            cells,
            seed,
            iterations,
            threads,
        } => {
            let event = synthetic_event(&SyntheticConfig {
                modules,
                cells_per_module: cells,
                seed,
                ..SyntheticConfig::default()
            });
            let config = build_config(ClusterizationConfig::default().block_size, threads);

            println!(
                "Benchmarking with {} modules, {} cells, {} iterations",
                event.len(),
                event.total_size(),
                iterations
            );
            println!(
                "{:<12} | {:<15} | {:<15} | {:<15}",
                "Model", "Mean Time (ms)", "Min Time (ms)", "Max Time (ms)"
            );
            println!("{:-<65}", "");

            let mut outputs = Vec::with_capacity(ExecutionModel::ALL.len());
            for model in ExecutionModel::ALL {
                let algo = model.build(&config)?;

                // Warmup
                let mut output = algo.run(&event)?;

                let mut times = Vec::with_capacity(iterations);
                for _ in 0..iterations {
                    let start = Instant::now();
                    output = algo.run(&event)?;
                    times.push(start.elapsed().as_secs_f64() * 1000.0);
                }

                let min_time = times.iter().fold(f64::INFINITY, |a, &b| a.min(b));
                let max_time = times.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
                let mean_time = times.iter().sum::<f64>() / times.len().max(1) as f64;

                println!(
                    "{:<12} | {:<15.2} | {:<15.2} | {:<15.2}",
                    model.name(),
                    mean_time,
                    min_time,
                    max_time
                );
                outputs.push(output);
            }

            compare_outputs(&outputs[0], &outputs[1], COMPARE_EPSILON)
                .map_err(CliError::Disagreement)?;
            println!(
                "Outputs agree: {} clusters",
                outputs[0].statistics().clusters
            );
        }
    }

    Ok(())
}
