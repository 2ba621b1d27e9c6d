//! Housing CLI: dataset assembly and model training.
//!
//! Commands:
//! - `build-dataset`: join the raw price and macro sources into the dataset file
//! - `train`: cross-validate, fit, track and publish predictions for a year window

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

use housing_core::data::{build_dataset, TrainingWindow};
use housing_core::logging::{init_logging, LogConfig};
use housing_runner::{build_tracker, train, PipelineConfig, TrackerBackend, TrainingOutcome};

#[derive(Parser)]
#[command(
    name = "housing",
    about = "Quarterly district housing-price predictions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the unified dataset from the raw sources (always rebuilds).
    BuildDataset {
        /// Path to a TOML pipeline config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Train the model, record the run and publish the latest quarter.
    Train {
        /// First year of the training window (inclusive).
        #[arg(long, default_value_t = 2010)]
        from_year: i32,

        /// Last year of the training window (inclusive).
        #[arg(long, default_value_t = 2025)]
        to_year: i32,

        /// Path to a TOML pipeline config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Experiment tracker. Overrides the config file.
        #[arg(long, value_enum)]
        tracker: Option<TrackerArg>,

        /// Run directory for `--tracker file`.
        #[arg(long, default_value = "mlruns")]
        tracker_dir: PathBuf,

        /// Rebuild the dataset even if the file already exists.
        #[arg(long, default_value_t = false)]
        rebuild_dataset: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TrackerArg {
    Mlflow,
    File,
    None,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging(LogConfig::from_env()).context("failed to initialize logging")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::BuildDataset { config } => run_build_dataset(config.as_deref()),
        Commands::Train {
            from_year,
            to_year,
            config,
            tracker,
            tracker_dir,
            rebuild_dataset,
        } => run_train(
            TrainingWindow::new(from_year, to_year),
            config.as_deref(),
            tracker,
            tracker_dir,
            rebuild_dataset,
        ),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.tracking = config.tracking.with_env_overrides();
    Ok(config)
}

fn run_build_dataset(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let paths = &config.paths;
    let table = build_dataset(&paths.prices, &paths.macro_series, &paths.dataset)
        .context("dataset build failed")?;

    println!("Dataset: {}", paths.dataset.display());
    println!("Rows:    {}", table.row_count());
    println!("Columns: {}", table.column_names().join(", "));
    Ok(())
}

fn run_train(
    window: TrainingWindow,
    config_path: Option<&Path>,
    tracker: Option<TrackerArg>,
    tracker_dir: PathBuf,
    rebuild_dataset: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    config.rebuild_dataset |= rebuild_dataset;
    if let Some(choice) = tracker {
        config.tracking.backend = match choice {
            TrackerArg::Mlflow => TrackerBackend::Mlflow,
            TrackerArg::File => TrackerBackend::File { dir: tracker_dir },
            TrackerArg::None => TrackerBackend::Disabled,
        };
    }

    let tracker = build_tracker(&config.tracking).context("failed to set up experiment tracker")?;
    info!(
        from_year = window.from_year,
        to_year = window.to_year,
        tracker = tracker.as_ref().map_or("disabled", |t| t.name()),
        "starting training run"
    );

    let outcome = train(&config, window, tracker.as_deref()).context("training failed")?;
    print_summary(&outcome);
    Ok(())
}

fn print_summary(outcome: &TrainingOutcome) {
    println!();
    println!("=== Training Result ===");
    println!(
        "Window:         {} to {}",
        outcome.window.from_year, outcome.window.to_year
    );
    println!("Rows:           {}", outcome.rows);
    println!("Dataset hash:   {}", outcome.dataset_hash);
    println!();
    println!("--- Cross-validation ({} folds) ---", outcome.folds.len());
    for fold in &outcome.folds {
        println!(
            "Fold {}: train {:>6}  test {:>5}  RMSE {:>10.2}  MAE {:>10.2}  R² {:>7.4}",
            fold.fold_index, fold.train_rows, fold.test_rows, fold.rmse, fold.mae, fold.r2
        );
    }
    println!("RMSE mean:      {:.2}", outcome.metrics.rmse_mean);
    println!("MAE mean:       {:.2}", outcome.metrics.mae_mean);
    println!("R² mean:        {:.4}", outcome.metrics.r2_mean);
    println!();
    println!("Model:          {}", outcome.model_path.display());
    println!("Metrics:        {}", outcome.metrics_path.display());
    if let Some(run_id) = &outcome.tracker_run_id {
        println!("Tracked run:    {run_id}");
    }
    println!(
        "Published:      {} ({} rows, {})",
        outcome.published.path.display(),
        outcome.published.row_count,
        outcome.published.time_key
    );
}
