//! FareLab CLI: dataset setup, validation, training and prediction commands.
//!
//! Commands:
//! - `setup`: install Kaggle credentials from a downloaded `kaggle.json`
//! - `download`: fetch the raw dataset into `data/01-raw/`
//! - `validate` / `summary`: quality checks and an overview of a raw CSV
//! - `preprocess`: write the cleaned dataset into `data/02-preprocessed/`
//! - `train`: fit one model family, optionally with a grid search
//! - `evaluate` / `predict`: use a saved pipeline artifact
//! - `runs`: list recorded training runs
//! - `verify`: check the local environment

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use farelab_core::data::credentials::downloads_key_file;
use farelab_core::data::stages::short_hash;
use farelab_core::data::{
    read_raw, CredentialStore, DataIngestion, IngestStatus, KaggleProvider, Stage,
};
use farelab_core::models::ModelKind;
use farelab_core::summary::{summarize, GroupFare, SummaryReport};
use farelab_core::validation::{validate_file, ValidationReport};
use farelab_runner::history::sort_by_metric;
use farelab_runner::{
    evaluate, predict, preprocess, train_with, verify, FittedPipeline, PipelineConfig,
    RankMetric, RunHistory, TrainingData, TrainingResult, DEFAULT_CONFIG_FILE,
};

#[derive(Parser)]
#[command(
    name = "farelab",
    about = "FareLab CLI — flight fare prediction pipeline"
)]
struct Cli {
    /// Pipeline configuration file. Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install Kaggle credentials (kaggle.json) into ~/.kaggle.
    Setup {
        /// Key file to install. Defaults to kaggle.json in the Downloads folder.
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Download the flight price dataset into data/01-raw/.
    Download {
        /// Run full validation on the file after it is in place.
        #[arg(long, default_value_t = false)]
        force_check: bool,
    },

    /// Validate a raw CSV against the flight dataset schema.
    Validate {
        /// CSV to validate. Defaults to the configured raw dataset.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Also write the full report as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Print an overview of a raw CSV.
    Summary {
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Clean the raw dataset and write it to data/02-preprocessed/.
    Preprocess {
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Train a model and record the run.
    Train {
        /// Model family: linear, random_forest or gradient_boosting.
        #[arg(long)]
        model: ModelKind,

        /// Grid-search hyperparameters with k-fold cross-validation.
        #[arg(long, default_value_t = false)]
        tune: bool,

        /// Train on this many generated flights instead of the dataset.
        #[arg(long, conflicts_with = "input")]
        synthetic: Option<usize>,

        /// Raw CSV to train on. Defaults to the configured raw dataset.
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Score a saved pipeline on its held-out rows.
    Evaluate {
        /// Pipeline artifact written by `train`.
        #[arg(long)]
        artifact: PathBuf,

        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Predict total fares for every row of a CSV.
    Predict {
        #[arg(long)]
        artifact: PathBuf,

        #[arg(long)]
        input: PathBuf,
    },

    /// List recorded training runs, best first.
    Runs {
        /// Show at most this many runs.
        #[arg(long)]
        limit: Option<usize>,

        /// Ranking metric: r2, mae, rmse or mape.
        #[arg(long, default_value = "rmse")]
        rank_by: RankMetric,
    },

    /// Check credentials, directories, config and the raw dataset.
    Verify,
}

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    let load = || {
        PipelineConfig::load_or_default(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))
    };

    match cli.command {
        Commands::Setup { from } => run_setup(from),
        Commands::Download { force_check } => run_download(&load()?, force_check),
        Commands::Validate { input, json } => {
            let config = load()?;
            run_validate(&input_or_raw(&config, input), json.as_deref())
        }
        Commands::Summary { input } => run_summary(&input_or_raw(&load()?, input)),
        Commands::Preprocess { input } => {
            let config = load()?;
            run_preprocess(&config, &input_or_raw(&config, input))
        }
        Commands::Train {
            model,
            tune,
            synthetic,
            input,
        } => {
            let data = match synthetic {
                Some(rows) => TrainingData::Synthetic { rows },
                None => TrainingData::Dataset { input },
            };
            let result = train_with(&load()?, model, tune, &data)?;
            print_training(&result);
            Ok(())
        }
        Commands::Evaluate { artifact, input } => {
            run_evaluate(&artifact, &input_or_raw(&load()?, input))
        }
        Commands::Predict { artifact, input } => run_predict(&load()?, &artifact, &input),
        Commands::Runs { limit, rank_by } => run_runs(&load()?, limit, rank_by),
        Commands::Verify => run_verify(&load()?, &config_path),
    }
}

fn input_or_raw(config: &PipelineConfig, input: Option<PathBuf>) -> PathBuf {
    input.unwrap_or_else(|| config.raw_path())
}

fn run_setup(from: Option<PathBuf>) -> Result<()> {
    let store = CredentialStore::standard();
    let Some(src) = from.or_else(downloads_key_file) else {
        bail!(
            "no key file given and no Downloads folder found; download kaggle.json from \
             https://www.kaggle.com/settings/account and pass it with --from"
        );
    };
    if !src.exists() {
        bail!(
            "{} not found. Download kaggle.json from https://www.kaggle.com/settings/account \
             (Create New Token) and rerun, or pass --from <path>. It will be installed at {}",
            src.display(),
            store.key_path().display()
        );
    }

    let creds = store.install_from(&src)?;
    println!(
        "Installed credentials for '{}' at {}",
        creds.username,
        store.key_path().display()
    );
    Ok(())
}

fn run_download(config: &PipelineConfig, force_check: bool) -> Result<()> {
    let provider = KaggleProvider::new()?;
    let raw_dir = config.layout().dir(Stage::Raw);
    let ingestion = DataIngestion::new(
        &provider,
        config.credential_store(),
        config.dataset_ref()?,
        raw_dir,
    );
    let outcome = match ingestion.run() {
        Ok(outcome) => outcome,
        Err(e) => {
            let steps = e.remediation();
            if !steps.is_empty() {
                eprintln!("Data ingestion failed. Before retrying:");
                for (i, step) in steps.iter().enumerate() {
                    eprintln!("  {}. {step}", i + 1);
                }
            }
            return Err(e.into());
        }
    };

    let status = match outcome.status {
        IngestStatus::Downloaded => "downloaded",
        IngestStatus::AlreadyPresent => "already present",
    };
    let report = &outcome.file_report;
    println!("Dataset {status}: {}", outcome.path.display());
    println!(
        "  {:.2} MB, {} columns, readable: {}",
        report.size_mb, report.columns, report.readable
    );
    if let Some(hash) = &report.blake3 {
        println!("  blake3: {hash}");
    }

    if force_check {
        let validation = validate_file(&outcome.path)?;
        print_validation(&validation);
        if !validation.is_valid {
            bail!("downloaded dataset failed validation");
        }
    }
    Ok(())
}

fn run_validate(input: &Path, json: Option<&Path>) -> Result<()> {
    let report = validate_file(input)?;
    print_validation(&report);
    if let Some(path) = json {
        report.write_json(path)?;
        println!("Report written to: {}", path.display());
    }
    if !report.is_valid {
        std::process::exit(1);
    }
    Ok(())
}

fn run_summary(input: &Path) -> Result<()> {
    let table = read_raw(input)?;
    print_summary(&summarize(&table));
    Ok(())
}

fn run_preprocess(config: &PipelineConfig, input: &Path) -> Result<()> {
    let (report, _) = preprocess(&config.layout(), input)?;
    println!("Input:          {} ({} rows)", report.input.display(), report.input_rows);
    println!("Rejected:       {}", report.rejected);
    println!("Duplicates:     {}", report.duplicates_dropped);
    println!("Aircraft fill:  {}", report.filled_aircraft);
    println!("Rows out:       {}", report.rows_out);
    println!("Output:         {} ({:?})", report.output.display(), report.outcome);
    Ok(())
}

fn run_evaluate(artifact: &Path, input: &Path) -> Result<()> {
    let pipeline = FittedPipeline::load(artifact)?;
    let report = evaluate(&pipeline, input)?;
    println!();
    println!("=== Evaluation ===");
    println!("Run:            {} ({})", short_hash(&report.run_id), pipeline.kind);
    println!("Input:          {} ({} rows)", report.input.display(), report.rows);
    println!("Held-out rows:  {}", report.test_rows);
    print_metrics(&report.metrics);
    if !report.dataset_matches {
        println!();
        println!("WARNING: input differs from the training data");
    }
    println!();
    Ok(())
}

fn run_predict(config: &PipelineConfig, artifact: &Path, input: &Path) -> Result<()> {
    let pipeline = FittedPipeline::load(artifact)?;
    let report = predict(&pipeline, &config.layout(), input)?;
    println!("Predicted {} rows ({} skipped)", report.rows, report.skipped);
    if let Some(metrics) = &report.metrics {
        print_metrics(metrics);
    }
    println!("Predictions saved to: {}", report.output.display());
    Ok(())
}

fn run_runs(config: &PipelineConfig, limit: Option<usize>, rank_by: RankMetric) -> Result<()> {
    let history = RunHistory::new(&config.paths.history_file);
    let mut runs = history.read_all()?;
    if runs.is_empty() {
        println!("No runs recorded in {}", config.paths.history_file.display());
        return Ok(());
    }
    sort_by_metric(&mut runs, rank_by);
    if let Some(n) = limit {
        runs.truncate(n);
    }

    println!(
        "{:<14} {:<18} {:>8} {:>12} {:>12} {:>8} {:<5} {:<20}",
        "Run", "Model", "R²", "MAE", "RMSE", "MAPE%", "Tuned", "When"
    );
    println!("{}", "-".repeat(104));
    for r in &runs {
        println!(
            "{:<14} {:<18} {:>8.4} {:>12.2} {:>12.2} {:>8.2} {:<5} {:<20}",
            short_hash(&r.run_id),
            r.kind.to_string(),
            r.test_metrics.r2,
            r.test_metrics.mae,
            r.test_metrics.rmse,
            r.test_metrics.mape,
            if r.tuned { "yes" } else { "no" },
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

fn run_verify(config: &PipelineConfig, config_path: &Path) -> Result<()> {
    let report = verify(config, config_path, &config.credential_store());
    for check in &report.checks {
        println!("[{}] {:<20} {}", check.status, check.name, check.message);
    }
    if report.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

// ─── Report printing ─────────────────────────────────────────────────

fn print_metrics(m: &farelab_runner::RegressionMetrics) {
    println!("R²:             {:.4}", m.r2);
    println!("MAE:            {:.2} BDT", m.mae);
    println!("RMSE:           {:.2} BDT", m.rmse);
    println!("MAPE:           {:.2}%", m.mape);
}

fn print_training(result: &TrainingResult) {
    println!();
    println!("=== Training Result ===");
    println!("Run:            {}", short_hash(&result.run_id));
    println!("Model:          {} ({})", result.kind, result.params.describe());
    println!(
        "Rows:           {} train / {} test, {} features",
        result.train_rows, result.test_rows, result.feature_count
    );
    if let Some(tuning) = &result.tuning {
        println!(
            "Tuning:         {} candidates, best CV RMSE {:.2}",
            tuning.candidates.len(),
            tuning.best_cv_rmse
        );
    }
    println!();
    println!("--- Train ---");
    print_metrics(&result.train_metrics);
    println!();
    println!("--- Test ---");
    print_metrics(&result.test_metrics);
    println!();
    println!("Duration:       {} ms", result.duration_ms);
    if let Some(path) = &result.artifact_path {
        println!("Artifact:       {}", path.display());
    }
    println!();
}

fn print_validation(report: &ValidationReport) {
    let stats = &report.stats;
    println!();
    println!("=== Validation ===");
    println!(
        "Rows:           {} ({} columns)",
        stats.total_rows, stats.total_columns
    );
    println!("Duplicates:     {}", stats.duplicate_rows);
    if let Some(f) = &stats.fare_stats {
        println!(
            "Total fare:     mean {:.2}, median {:.2}, range {:.2}..{:.2}",
            f.mean, f.median, f.min, f.max
        );
    }
    println!(
        "Result:         {}",
        if report.is_valid { "VALID" } else { "INVALID" }
    );
    for ((column, check), count) in report.error_counts() {
        println!("  ERROR {column}: {check} ({count} rows)");
    }
    for w in &report.warnings {
        println!("  {} {}: {} ({} rows)", w.severity, w.rule, w.message, w.count);
    }
    println!();
}

fn print_groups(title: &str, groups: &[GroupFare]) {
    if groups.is_empty() {
        return;
    }
    println!("--- {title} ---");
    for g in groups {
        println!("{:<32} {:>12.2} {:>8}", g.key, g.mean_fare, g.count);
    }
    println!();
}

fn print_summary(s: &SummaryReport) {
    println!();
    println!("=== Dataset Summary ===");
    println!("Rows:           {}", s.rows);
    println!("Columns:        {}", s.columns.len());
    println!("Missing values: {}", s.missing_total);
    println!(
        "Duplicates:     {} rows, {} flights",
        s.duplicate_rows, s.duplicate_flights
    );
    println!(
        "Quality:        {:.1}% (completeness {:.1}%, uniqueness {:.1}%)",
        s.quality.overall, s.quality.completeness, s.quality.uniqueness
    );
    println!("Fare mismatch:  {}", s.fare_mismatches);
    println!("Fare outliers:  {}", s.fare_outliers);
    println!();

    if !s.numeric.is_empty() {
        println!("--- Numeric columns ---");
        println!(
            "{:<28} {:>12} {:>12} {:>12} {:>12}",
            "Column", "Mean", "Median", "Min", "Max"
        );
        for (name, n) in &s.numeric {
            println!(
                "{:<28} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
                name, n.mean, n.median, n.min, n.max
            );
        }
        println!();
    }

    for c in &s.categorical {
        let top: Vec<String> = c
            .top
            .iter()
            .map(|v| format!("{} ({:.1}%)", v.value, v.percent))
            .collect();
        println!("{} [{} distinct]: {}", c.column, c.distinct, top.join(", "));
    }
    println!();

    print_groups("Mean fare by airline", &s.fare_by_airline);
    print_groups("Busiest routes", &s.top_routes);
    print_groups("Mean fare by season", &s.fare_by_season);
    print_groups("Mean fare by class", &s.fare_by_class);

    println!("--- Recommendations ---");
    for r in &s.recommendations {
        println!("- {r}");
    }
    println!();
}
