//! tripscore CLI - batch driver trip scoring
//!
//! Usage:
//!   tripscore-cli convert <csv-root> <store>
//!   tripscore-cli generate <store> [--drivers <n>] [--trips <n>] [--seed <n>]
//!   tripscore-cli features <store> --output <file> [--header]
//!   tripscore-cli score <store> --output <file> [--combination <strategy>]
//!
//! All commands accept `--config <file.json>` holding a `pipeline` and a
//! `scoring` section; command-line flags override the file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use serde::{Deserialize, Serialize};
use tripscore::{
    Combination, DriverStore, PcaConfig, PipelineConfig, ProcessLogger, Result, ScoringConfig,
    TripScoreError, export, produce_trip_metrics, score_trips,
    store::convert_csv_tree,
    synthetic::SyntheticScenario,
};

#[derive(Parser)]
#[command(name = "tripscore-cli")]
#[command(about = "Score driver trips against population and driver references", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short, long, global = true)]
    workers: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV tree (<root>/<driver>/<trip>.csv) into a binary store
    Convert {
        /// Root folder of the CSV tree
        csv_root: PathBuf,

        /// Store folder to write <driver>.data files into
        store: PathBuf,
    },

    /// Write a synthetic fleet into a binary store
    Generate {
        /// Store folder
        store: PathBuf,

        #[arg(long, default_value = "10")]
        drivers: usize,

        #[arg(long, default_value = "50")]
        trips: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Extract one feature vector per trip
    Features {
        /// Store folder
        store: PathBuf,

        /// Output text file
        #[arg(short, long)]
        output: PathBuf,

        /// Write a header line naming the features
        #[arg(long)]
        header: bool,
    },

    /// Score every trip against population and driver references
    Score {
        /// Store folder
        store: PathBuf,

        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// How per-feature ratios are combined
        #[arg(long, value_enum)]
        combination: Option<CombinationArg>,

        /// Prior proportion for the prior-weighted combination
        #[arg(long, default_value = "0.5")]
        prior: f64,

        /// Refine the references with principal component histograms
        #[arg(long)]
        pca: bool,

        /// Fail unless every driver has exactly this many trips
        #[arg(long)]
        expected_trips: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum CombinationArg {
    Unweighted,
    StdWeighted,
    Prior,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct CliConfig {
    pipeline: PipelineConfig,
    scoring: ScoringConfig,
}

fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| TripScoreError::io(path, e))?;
    serde_json::from_str(&text)
        .map_err(|e| TripScoreError::invalid_config(format!("{}: {e}", path.display())))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.pipeline.workers = workers;
    }
    let started = Instant::now();

    match cli.command {
        Commands::Convert { csv_root, store } => {
            let count = convert_csv_tree(&csv_root, &DriverStore::new(&store))?;
            info!("converted {} drivers into {}", count, store.display());
        }
        Commands::Generate {
            store,
            drivers,
            trips,
            seed,
        } => {
            let scenario = SyntheticScenario {
                driver_count: drivers,
                trips_per_driver: trips,
                seed,
                ..SyntheticScenario::small_fleet()
            };
            let dataset = scenario.generate();
            let store = DriverStore::new(store);
            for driver in &dataset.drivers {
                store.write(driver)?;
            }
            info!(
                "wrote {} drivers ({} trips, {} foreign) into {}",
                dataset.drivers.len(),
                dataset.trip_count(),
                dataset.foreign_trips.len(),
                store.root().display()
            );
        }
        Commands::Features {
            store,
            output,
            header,
        } => {
            let progress = ProcessLogger::stderr();
            let mut metrics =
                produce_trip_metrics(&DriverStore::new(store), &config.pipeline, &progress)?;
            tripscore::sort_by_driver(&mut metrics);
            export::export_metrics(&output, &metrics, header)?;
            info!("wrote {} feature vectors to {}", metrics.len(), output.display());
        }
        Commands::Score {
            store,
            output,
            combination,
            prior,
            pca,
            expected_trips,
        } => {
            let mut scoring = config.scoring;
            if let Some(combination) = combination {
                scoring.combination = match combination {
                    CombinationArg::Unweighted => Combination::Unweighted,
                    CombinationArg::StdWeighted => Combination::StdWeighted,
                    CombinationArg::Prior => Combination::Prior(prior),
                };
            }
            if pca && scoring.reference.pca.is_none() {
                scoring.reference.pca = Some(PcaConfig::default());
            }
            if expected_trips.is_some() {
                scoring.expected_trips_per_driver = expected_trips;
            }

            let progress = ProcessLogger::stderr();
            let metrics =
                produce_trip_metrics(&DriverStore::new(store), &config.pipeline, &progress)?;
            let scores = score_trips(metrics, &scoring, &progress)?;
            export::export_scores(&output, &scores)?;
            info!(
                "wrote {} scores ({} combination) to {}",
                scores.len(),
                scoring.combination.as_str(),
                output.display()
            );
        }
    }

    info!("done in {:.1}s", started.elapsed().as_secs_f64());
    Ok(())
}
