//! Campus dashboard CLI - drive the simulation core from a terminal.

#![allow(
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args,
    clippy::too_many_lines,
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::doc_markdown
)]

use campus_core::series::{SeriesParams, MAX_MATRIX_DIM, MAX_SERIES_LENGTH};
use campus_core::{
    ComposerConfig, CoreError, DashboardComposer, DirectoryExportSink, EntityRecord, FileStorage,
    KpiSnapshot, MemoryExportSink, NoiseSource, RandomNoise, RecordingPlotSink, ReportKind,
    SeededNoise, SeriesKind, SeriesSynthesizer, ThemePreference, View, ViewFilterState,
    MAX_TICK_INTERVAL_MS,
};
use campus_yaml::{DashboardManifest, ParseError};
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Preference directory used when neither flag nor manifest names one.
const DEFAULT_STATE_DIR: &str = ".campus";

#[derive(Parser)]
#[command(name = "campus-dash")]
#[command(about = "Campus data integration dashboard simulator")]
#[command(version)]
struct Cli {
    /// Dashboard manifest (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Noise seed for reproducible output
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tick the overview KPIs
    Live {
        /// Number of tick periods to run
        #[arg(short, long, default_value = "10")]
        ticks: u32,

        /// Tick period in milliseconds (manifest value by default, at most one day)
        #[arg(long, value_parser = clap::value_parser!(u64).range(..=MAX_TICK_INTERVAL_MS))]
        interval_ms: Option<u64>,

        /// Sleep between periods instead of advancing the clock instantly
        #[arg(long)]
        realtime: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Generate one dataset as JSON
    Series {
        /// Dataset kind (hourly, prediction, forecast, solar-angle, features,
        /// matrix, training, analytics, security, anomalies)
        kind: String,

        /// Point count
        #[arg(short, long, value_parser = parse_series_length)]
        length: Option<usize>,

        /// Matrix rows
        #[arg(long, value_parser = parse_matrix_dim)]
        rows: Option<usize>,

        /// Matrix columns
        #[arg(long, value_parser = parse_matrix_dim)]
        cols: Option<usize>,

        /// Analytics accuracy (50-100)
        #[arg(long)]
        accuracy: Option<f64>,
    },

    /// Show the entity resolution table
    Entities {
        /// Number of seeded entities (manifest value by default)
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Status filter (all, active, inactive)
        #[arg(long, default_value = "all")]
        status: String,

        /// Type filter (all, student, staff, visitor)
        #[arg(long = "type", default_value = "all")]
        kind: String,

        /// Sort key (id, confidence)
        #[arg(long, default_value = "id")]
        sort: String,

        /// Entity ids to mark inactive before projecting
        #[arg(long, value_delimiter = ',')]
        deactivate: Vec<u32>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Download the security report
    Export {
        /// Report format (csv, pdf)
        kind: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Show or toggle the persisted theme
    Theme {
        #[arg(value_enum, default_value = "show")]
        action: ThemeAction,

        /// Preference directory
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },

    /// Check YAML manifest validity
    Check {
        /// Path to manifest file
        #[arg(default_value = "campus.yaml")]
        manifest: PathBuf,
    },
}

fn parse_bounded(s: &str, max: usize) -> Result<usize, String> {
    let value: usize = s.parse().map_err(|e: std::num::ParseIntError| e.to_string())?;
    if value > max {
        return Err(format!("{value} exceeds the limit of {max}"));
    }
    Ok(value)
}

fn parse_matrix_dim(s: &str) -> Result<usize, String> {
    parse_bounded(s, MAX_MATRIX_DIM)
}

fn parse_series_length(s: &str) -> Result<usize, String> {
    parse_bounded(s, MAX_SERIES_LENGTH)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ThemeAction {
    Show,
    Toggle,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Manifest(#[from] ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let manifest = match &cli.config {
        Some(path) => DashboardManifest::load(path)?,
        None => DashboardManifest::default(),
    };
    let seed = cli.seed.or(manifest.seed);

    match cli.command {
        Commands::Live {
            ticks,
            interval_ms,
            realtime,
            format,
        } => run_live(&manifest, seed, ticks, interval_ms, realtime, format),
        Commands::Series {
            kind,
            length,
            rows,
            cols,
            accuracy,
        } => {
            let kind: SeriesKind = kind.parse()?;
            let mut params = SeriesParams::default().with_matrix(
                rows.unwrap_or(manifest.matrix.rows),
                cols.unwrap_or(manifest.matrix.cols),
            );
            params = params.with_accuracy(accuracy.unwrap_or(manifest.analytics.accuracy));
            if let Some(length) = length {
                params = params.with_length(length);
            }
            let mut synthesizer = SeriesSynthesizer::new(noise_for(seed));
            let points = synthesizer.generate(kind, &params);
            println!("{}", serde_json::to_string_pretty(&points)?);
            Ok(())
        }
        Commands::Entities {
            count,
            status,
            kind,
            sort,
            deactivate,
            format,
        } => {
            let mut config = manifest.composer_config();
            if let Some(count) = count {
                config.entity_count = count;
            }
            let mut dashboard = DashboardComposer::recording(config, noise_for(seed));
            dashboard.activate(View::Entities);
            for id in deactivate {
                if !dashboard.set_active(id, false) {
                    info!(id, "no such entity");
                }
            }
            dashboard.set_filter(ViewFilterState::from_strs(&status, &kind, &sort));
            let visible = dashboard.visible();
            match format {
                OutputFormat::Text => print!("{}", format_entities(visible)),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(visible)?),
            }
            Ok(())
        }
        Commands::Export { kind, out } => {
            let kind: ReportKind = kind.parse()?;
            let mut dashboard = DashboardComposer::new(
                manifest.composer_config(),
                noise_for(seed),
                RecordingPlotSink::new(),
                DirectoryExportSink::new(&out),
            );
            dashboard.activate(View::Security);
            let file_name = dashboard.export(kind)?;
            println!("{}", out.join(file_name).display());
            Ok(())
        }
        Commands::Theme { action, state_dir } => {
            let dir = resolve_state_dir(state_dir, manifest.state_dir.clone());
            let storage = FileStorage::new(&dir);
            let theme = match action {
                ThemeAction::Show => ThemePreference::load(&storage),
                ThemeAction::Toggle => ThemePreference::toggle(&storage)?,
            };
            println!("{}", theme);
            Ok(())
        }
        Commands::Check { manifest: path } => check_manifest(&path),
    }
}

fn run_live(
    manifest: &DashboardManifest,
    seed: Option<u64>,
    ticks: u32,
    interval_ms: Option<u64>,
    realtime: bool,
    format: OutputFormat,
) -> Result<(), CliError> {
    let mut config: ComposerConfig = manifest.composer_config();
    if let Some(interval) = interval_ms.filter(|ms| *ms > 0) {
        config.tick_interval_ms = interval;
    }
    let period = config.tick_interval_ms;
    let mut dashboard: DashboardComposer<RecordingPlotSink, MemoryExportSink> =
        DashboardComposer::recording(config, noise_for(seed));

    dashboard.activate(View::Overview);
    emit_snapshot(&dashboard.kpis(), format)?;
    for _ in 0..ticks {
        if realtime {
            std::thread::sleep(Duration::from_millis(period));
        }
        let events = dashboard.advance(period);
        debug!(events = events.len(), "period elapsed");
        emit_snapshot(&dashboard.kpis(), format)?;
    }
    dashboard.deactivate();
    Ok(())
}

fn emit_snapshot(snapshot: &KpiSnapshot, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => println!("{}", format_kpis(snapshot)),
        OutputFormat::Json => println!("{}", serde_json::to_string(snapshot)?),
    }
    Ok(())
}

fn check_manifest(path: &Path) -> Result<(), CliError> {
    println!("Checking manifest: {}", path.display());
    let manifest = DashboardManifest::load(path)?;
    let config = manifest.composer_config();
    println!("Manifest valid!");
    println!("  Name: {}", manifest.name);
    println!("  Tick interval: {}ms", config.tick_interval_ms);
    println!("  Entities: {}", config.entity_count);
    println!("  KPIs: {}", config.metrics.len());
    println!("  Matrix: {}x{}", config.matrix_rows, config.matrix_cols);
    Ok(())
}

/// Seeded noise when a seed is known, otherwise `CAMPUS_SEED` or entropy.
fn noise_for(seed: Option<u64>) -> Box<dyn NoiseSource> {
    match seed {
        Some(seed) => Box::new(SeededNoise::new(seed)),
        None if std::env::var_os("CAMPUS_SEED").is_some() => Box::new(SeededNoise::from_env()),
        None => Box::new(RandomNoise::new()),
    }
}

fn resolve_state_dir(flag: Option<PathBuf>, manifest: Option<PathBuf>) -> PathBuf {
    flag.or(manifest)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
}

fn format_kpis(snapshot: &KpiSnapshot) -> String {
    let mut line = format!("[{:>7}ms]", snapshot.at_ms);
    for reading in &snapshot.readings {
        let _ = write!(line, " {}={}", reading.name, reading.value);
    }
    if let Some(mode) = snapshot.mode {
        let _ = write!(line, " mode={}", mode);
    }
    line
}

fn format_entities(records: &[EntityRecord]) -> String {
    let mut out = format!(
        "{:>4}  {:<8} {:<8} {:<22} {:<11} {:<12} {:>4}  {}\n",
        "ID", "TYPE", "STUDENT", "EMAIL", "CARD", "DEVICE", "CONF", "ACTIVE"
    );
    for r in records {
        let _ = writeln!(
            out,
            "{:>4}  {:<8} {:<8} {:<22} {:<11} {:<12} {:>3}%  {}",
            r.id,
            r.kind.name(),
            r.student_id.as_deref().unwrap_or("-"),
            r.email,
            r.card_id,
            r.device_hash,
            r.confidence,
            if r.active { "yes" } else { "no" }
        );
    }
    let _ = writeln!(out, "{} shown", records.len());
    out
}
