//! # pmcast
//!
//! Command-line front end: forecasts, multi-city forecasts and backtests from
//! a CSV measurement export, printed as JSON.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pm_forecast::config::ForecastSettings;
use pm_forecast::models::{Algorithm, Verbosity};
use pm_forecast::utils::parse_timestamp;
use pm_forecast::{
    Backtester, CsvRepository, Forecaster, ModelCache, MultiCityOrchestrator, SeriesRepository,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pmcast")]
#[command(about = "PM2.5 forecasting from hourly measurement history", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Measurement export with columns city,ts,pm25,source
    #[arg(short, long, global = true, default_value = "measurements.csv")]
    data: PathBuf,

    /// JSON settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for model artifacts
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Model family (sarima, additive)
    #[arg(short, long, global = true)]
    algorithm: Option<Algorithm>,

    /// Worker threads for multi-city runs
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Per-fit budget in seconds, 0 disables it
    #[arg(long, global = true)]
    fit_timeout: Option<u64>,

    /// End of every lookback window (defaults to the newest reading)
    #[arg(long, global = true)]
    as_of: Option<String>,

    /// Debug logging and verbose model fitting
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Forecast one city
    Forecast {
        #[arg(long)]
        city: String,

        /// Days ahead to forecast
        #[arg(long, default_value = "7")]
        horizon_days: u32,

        /// Days of history to train on
        #[arg(long, default_value = "30")]
        train_days: u32,

        /// Always retrain instead of reusing a cached model
        #[arg(long)]
        no_cache: bool,
    },

    /// Forecast several cities and rank them
    Multi {
        /// Comma separated city names
        #[arg(long, value_delimiter = ',', required = true)]
        cities: Vec<String>,

        #[arg(long, default_value = "7")]
        horizon_days: u32,

        #[arg(long, default_value = "30")]
        train_days: u32,

        #[arg(long)]
        no_cache: bool,
    },

    /// Rolling-origin backtest of one city
    Backtest {
        #[arg(long)]
        city: String,

        /// Days of history to backtest over
        #[arg(long, default_value = "30")]
        days: u32,

        /// Hours forecast at each checkpoint
        #[arg(long, default_value = "24")]
        horizon_hours: usize,
    },
}

fn load_settings(global: &GlobalArgs) -> Result<ForecastSettings> {
    let mut settings = match &global.config {
        Some(path) => ForecastSettings::from_json_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => ForecastSettings::default(),
    };
    settings
        .apply_overrides(|key| std::env::var(key).ok())
        .context("Invalid PMCAST_* environment override")?;

    if let Some(dir) = &global.model_dir {
        settings.model_dir = dir.clone();
    }
    if let Some(algorithm) = global.algorithm {
        settings.algorithm = algorithm;
    }
    if let Some(workers) = global.workers {
        settings.workers = workers;
    }
    if let Some(secs) = global.fit_timeout {
        settings.fit_timeout_secs = if secs == 0 { None } else { Some(secs) };
    }
    if global.verbose {
        settings.verbosity = Verbosity::Verbose;
    }
    Ok(settings)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to encode result")?;
    println!("{}", json);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.global.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let settings = load_settings(&cli.global)?;
    log::debug!("settings: {:?}", settings);

    let mut repository = CsvRepository::new(&cli.global.data);
    if let Some(raw) = &cli.global.as_of {
        repository = repository.with_as_of(parse_timestamp(raw).context("Invalid --as-of")?);
    }
    let repository: Arc<dyn SeriesRepository> = Arc::new(repository);
    let limits = settings.limits;

    match cli.command {
        Commands::Forecast {
            city,
            horizon_days,
            train_days,
            no_cache,
        } => {
            limits.validate_horizon(horizon_days)?;
            limits.validate_train(train_days)?;
            let cache = Arc::new(
                ModelCache::new(&settings.model_dir)
                    .context("Failed to open model directory")?
                    .with_policy(settings.cache_policy),
            );
            let forecaster = Forecaster::new(repository, cache, settings);
            let result = forecaster
                .forecast_city(&city, horizon_days, train_days, !no_cache)
                .with_context(|| format!("Forecast for {} failed", city))?;
            print_json(&result)
        }
        Commands::Multi {
            cities,
            horizon_days,
            train_days,
            no_cache,
        } => {
            limits.validate_horizon(horizon_days)?;
            limits.validate_train(train_days)?;
            let cache = Arc::new(
                ModelCache::new(&settings.model_dir)
                    .context("Failed to open model directory")?
                    .with_policy(settings.cache_policy),
            );
            let forecaster = Arc::new(Forecaster::new(repository, cache, settings));
            let orchestrator = MultiCityOrchestrator::new(forecaster)?;
            let cities: Vec<String> = cities
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect();
            print_json(&orchestrator.forecast_cities(&cities, horizon_days, train_days, !no_cache))
        }
        Commands::Backtest {
            city,
            days,
            horizon_hours,
        } => {
            limits.validate_train(days)?;
            let backtester = Backtester::new(repository, settings);
            let result = backtester
                .backtest_roll(&city, days, horizon_hours)
                .with_context(|| format!("Backtest for {} failed", city))?;
            print_json(&result)
        }
    }
}
