//! CLI entry point for the air-quality reconciliation pipeline.
//!
//! Provides subcommands for running the full batch, or for replaying a
//! single stage (hourly merge, daily aggregation, PM2.5 hierarchy
//! resolution) over the same on-disk hand-off.

use std::ffi::OsStr;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use aq_reconciler::config::PipelineConfig;
use aq_reconciler::hierarchy;
use aq_reconciler::ingest::{
    discover_sites, read_aqs_rows, read_envista_rows, read_qualifier_map, read_site_metadata,
    read_smoke_labels,
};
use aq_reconciler::merge::MergeMode;
use aq_reconciler::model::{DailyAggregate, SiteMetadata, SmokeLabel};
use aq_reconciler::output::write_records;
use aq_reconciler::pipeline::{self, HourlyResult, PollutantRun, SiteInput};

#[derive(Parser)]
#[command(name = "aq_reconciler")]
#[command(about = "Reconciles AQS and Envista air-quality data into regulatory aggregates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: merge, aggregate, resolve, propagate flags
    Run {
        /// Directory holding `<pollutant>/site=<id>/` raw tables
        #[arg(short, long, default_value = "data")]
        input: String,

        /// Directory to write output CSVs to
        #[arg(short, long, default_value = "out")]
        output: String,

        /// Calendar year being processed
        #[arg(short, long)]
        year: i32,

        /// Comma-separated pollutant directories to process
        #[arg(short, long, default_value = "pm25,ozone")]
        pollutants: String,

        /// Merge mode: both, aqs, or envista
        #[arg(short, long, default_value = "both")]
        mode: String,

        /// Optional JSON config overriding the built-in defaults
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Merge one pollutant's networks into an hourly CSV
    Hourly {
        #[arg(short, long, default_value = "data")]
        input: String,

        #[arg(short, long, default_value = "out")]
        output: String,

        #[arg(short, long)]
        year: i32,

        /// Pollutant directory to process
        #[arg(long)]
        pollutant: String,

        #[arg(short, long, default_value = "both")]
        mode: String,

        #[arg(short, long)]
        config: Option<String>,
    },
    /// Merge and aggregate one pollutant into a daily CSV
    Daily {
        #[arg(short, long, default_value = "data")]
        input: String,

        #[arg(short, long, default_value = "out")]
        output: String,

        #[arg(short, long)]
        year: i32,

        #[arg(long)]
        pollutant: String,

        #[arg(short, long, default_value = "both")]
        mode: String,

        #[arg(short, long)]
        config: Option<String>,
    },
    /// Resolve the PM2.5 instrument hierarchy into one value per site-day
    Resolve {
        #[arg(short, long, default_value = "data")]
        input: String,

        #[arg(short, long, default_value = "out")]
        output: String,

        #[arg(short, long)]
        year: i32,

        #[arg(short, long, default_value = "both")]
        mode: String,

        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/aq_reconciler.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("aq_reconciler.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            output,
            year,
            pollutants,
            mode,
            config,
        } => {
            run_all(&input, &output, year, &pollutants, &mode, config.as_deref())?;
        }
        Commands::Hourly {
            input,
            output,
            year,
            pollutant,
            mode,
            config,
        } => {
            let cfg = load_config(config.as_deref(), Path::new(&input))?;
            let metadata = read_site_metadata(&Path::new(&input).join("monitors.csv"))?;
            let run = pollutant_run(&pollutant, year, &mode)?;

            let hourly = merge_pollutant(&cfg, &run, &metadata, Path::new(&input))?;
            std::fs::create_dir_all(&output)?;
            let path = format!("{}/hourly_{}_{}.csv", output, run.pollutant, year);
            write_records(&path, &hourly.records)?;
            info!(path = %path, rows = hourly.records.len(), "hourly CSV written");
        }
        Commands::Daily {
            input,
            output,
            year,
            pollutant,
            mode,
            config,
        } => {
            let cfg = load_config(config.as_deref(), Path::new(&input))?;
            let metadata = read_site_metadata(&Path::new(&input).join("monitors.csv"))?;
            let smoke = read_smoke_labels(&Path::new(&input).join("smoke_labels.csv"))?;
            let run = pollutant_run(&pollutant, year, &mode)?;

            let hourly = merge_pollutant(&cfg, &run, &metadata, Path::new(&input))?;
            let daily = pipeline::run_daily(&cfg, &run, &hourly.records, &smoke);
            std::fs::create_dir_all(&output)?;
            let path = format!("{}/daily_{}_{}.csv", output, run.pollutant, year);
            write_records(&path, &daily)?;
            info!(path = %path, rows = daily.len(), "daily CSV written");
        }
        Commands::Resolve {
            input,
            output,
            year,
            mode,
            config,
        } => {
            let cfg = load_config(config.as_deref(), Path::new(&input))?;
            let metadata = read_site_metadata(&Path::new(&input).join("monitors.csv"))?;
            let smoke = read_smoke_labels(&Path::new(&input).join("smoke_labels.csv"))?;
            let run = pollutant_run("pm25", year, &mode)?;

            let hourly = merge_pollutant(&cfg, &run, &metadata, Path::new(&input))?;
            let daily = pipeline::run_daily(&cfg, &run, &hourly.records, &smoke);
            let resolved = hierarchy::resolve_pm25(&cfg, &daily, &metadata);
            std::fs::create_dir_all(&output)?;
            let path = format!("{}/pm25_hierarchy_{}.csv", output, year);
            write_records(&path, &resolved)?;
            info!(path = %path, rows = resolved.len(), "hierarchy CSV written");

            // Flags propagate onto the ozone series when its tables exist.
            if Path::new(&input).join("ozone").is_dir() {
                let ozone_run = pollutant_run("ozone", year, &mode)?;
                let ozone_hourly =
                    merge_pollutant(&cfg, &ozone_run, &metadata, Path::new(&input))?;
                let ozone_daily =
                    pipeline::run_daily(&cfg, &ozone_run, &ozone_hourly.records, &smoke);
                let flags = pipeline::run_wildfire(&ozone_daily, &resolved);
                let path = format!("{}/wildfire_flags_ozone_{}.csv", output, year);
                write_records(&path, &flags)?;
                info!(path = %path, rows = flags.len(), "wildfire flag CSV written");
            } else {
                warn!("no ozone tables, skipping flag propagation");
            }
        }
    }

    Ok(())
}

/// Runs every stage for every requested pollutant, then the cross-pollutant
/// resolution passes.
#[tracing::instrument(skip(config), fields(input, output, year, pollutants, mode))]
fn run_all(
    input: &str,
    output: &str,
    year: i32,
    pollutants: &str,
    mode: &str,
    config: Option<&str>,
) -> Result<()> {
    let input_dir = Path::new(input);
    let cfg = load_config(config, input_dir)?;
    let metadata = read_site_metadata(&input_dir.join("monitors.csv"))?;
    let smoke = read_smoke_labels(&input_dir.join("smoke_labels.csv"))?;
    std::fs::create_dir_all(output)?;

    let mut daily_by_pollutant: Vec<(String, Vec<DailyAggregate>)> = Vec::new();

    for pollutant in pollutants.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let run = pollutant_run(pollutant, year, mode)?;
        match run_pollutant(&cfg, &run, &metadata, &smoke, input_dir, output) {
            Ok(daily) => daily_by_pollutant.push((run.pollutant.clone(), daily)),
            Err(e) => {
                error!(pollutant, error = %e, "pollutant run failed, continuing with remaining pollutants");
            }
        }
    }

    // Hierarchy and flag propagation need every pollutant's daily table, so
    // they only start once the per-pollutant loop has finished.
    let pm25_daily = daily_by_pollutant
        .iter()
        .find(|(p, _)| p == "pm25")
        .map(|(_, d)| d.as_slice());

    if let Some(pm25_daily) = pm25_daily {
        let resolved = hierarchy::resolve_pm25(&cfg, pm25_daily, &metadata);
        let path = format!("{output}/pm25_hierarchy_{year}.csv");
        write_records(&path, &resolved)?;
        info!(path = %path, rows = resolved.len(), "hierarchy CSV written");

        for (pollutant, daily) in &daily_by_pollutant {
            if !pipeline::is_ozone(pollutant) {
                continue;
            }
            let flags = pipeline::run_wildfire(daily, &resolved);
            let path = format!("{output}/wildfire_flags_{pollutant}_{year}.csv");
            write_records(&path, &flags)?;
            info!(path = %path, rows = flags.len(), "wildfire flag CSV written");
        }
    } else {
        warn!("no PM2.5 daily table produced, skipping hierarchy and flag propagation");
    }

    info!(output, "pipeline finished");
    Ok(())
}

/// Merges and aggregates one pollutant, writing its hourly and daily CSVs.
fn run_pollutant(
    cfg: &PipelineConfig,
    run: &PollutantRun,
    metadata: &[SiteMetadata],
    smoke: &[SmokeLabel],
    input_dir: &Path,
    output: &str,
) -> Result<Vec<DailyAggregate>> {
    let hourly = merge_pollutant(cfg, run, metadata, input_dir)?;
    let path = format!("{}/hourly_{}_{}.csv", output, run.pollutant, run.year);
    write_records(&path, &hourly.records)?;
    info!(path = %path, rows = hourly.records.len(), "hourly CSV written");

    let daily = pipeline::run_daily(cfg, run, &hourly.records, smoke);
    let path = format!("{}/daily_{}_{}.csv", output, run.pollutant, run.year);
    write_records(&path, &daily)?;
    info!(path = %path, rows = daily.len(), "daily CSV written");

    Ok(daily)
}

/// Loads one pollutant's raw tables and runs the merge stage over them.
fn merge_pollutant(
    cfg: &PipelineConfig,
    run: &PollutantRun,
    metadata: &[SiteMetadata],
    input_dir: &Path,
) -> Result<HourlyResult> {
    let inputs = collect_inputs(input_dir, &run.pollutant)?;
    if inputs.is_empty() {
        warn!(pollutant = %run.pollutant, "no site directories with readable tables");
    }
    let hourly = pipeline::run_hourly(cfg, run, metadata, &inputs)?;
    Ok(hourly)
}

/// Reads the raw tables of every `site=` directory under a pollutant. A
/// site whose tables fail to read is logged and skipped, leaving the rest
/// of the pollutant's sites intact.
fn collect_inputs(input_dir: &Path, pollutant: &str) -> Result<Vec<SiteInput>> {
    let pollutant_dir = input_dir.join(pollutant);
    let sites = discover_sites(&pollutant_dir)
        .with_context(|| format!("listing site directories under {}", pollutant_dir.display()))?;

    let mut inputs = Vec::new();
    for site in sites {
        let site_dir = pollutant_dir.join(format!("site={site}"));
        let aqs = match read_aqs_rows(&site_dir.join("aqs.csv"), &site) {
            Ok(rows) => rows,
            Err(e) => {
                error!(site, error = %e, "AQS table unreadable, skipping site");
                continue;
            }
        };
        let envista = match read_envista_rows(&site_dir.join("envista.csv"), &site) {
            Ok(rows) => rows,
            Err(e) => {
                error!(site, error = %e, "Envista table unreadable, skipping site");
                continue;
            }
        };
        inputs.push(SiteInput { site, aqs, envista });
    }
    Ok(inputs)
}

fn pollutant_run(pollutant: &str, year: i32, mode: &str) -> Result<PollutantRun> {
    let mode = MergeMode::parse(mode)
        .ok_or_else(|| anyhow!("unknown merge mode {mode:?}, expected both, aqs, or envista"))?;
    Ok(PollutantRun {
        pollutant: pollutant.to_lowercase(),
        year,
        mode,
    })
}

/// Builds the run configuration: JSON overrides when given, then the
/// qualifier table next to the raw data. An absent `qualifiers.csv` leaves
/// the JSON-supplied (or compiled) qualifier maps untouched.
fn load_config(path: Option<&str>, input_dir: &Path) -> Result<PipelineConfig> {
    let mut cfg = match path {
        Some(p) => PipelineConfig::load(p)?,
        None => PipelineConfig::default(),
    };
    let qualifier_path = input_dir.join("qualifiers.csv");
    if qualifier_path.exists() {
        cfg.qualifiers = read_qualifier_map(&qualifier_path)?;
    }
    Ok(cfg)
}
