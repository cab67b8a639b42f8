//! CLI entry point for the F1 lap analytics tool.
//!
//! Provides subcommands for browsing seasons, events and drivers, building
//! per-driver lap reports, comparing drivers and summarizing sessions.

use anyhow::Result;
use clap::{Parser, Subcommand};
use f1_lap_analytics::analyzers::analyzer::{
    Analyzer, DEFAULT_SUMMARY_LIMIT, driver_report, parse_driver_list,
};
use f1_lap_analytics::config::{AppConfig, CircuitConfig, DEFAULT_HISTOGRAM_BINS, EngineConfig};
use f1_lap_analytics::fetch::{BasicClient, fetch_bytes};
use f1_lap_analytics::output::{append_records, print_json, print_pretty, write_json};
use f1_lap_analytics::parser::parse_lap_source;
use f1_lap_analytics::session::{
    FileSource, HttpSource, SessionCache, SessionKey, SessionSource, SessionType,
};
use std::ffi::OsStr;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "f1_lap_analytics")]
#[command(about = "Lap time statistics and chart data for Formula 1 sessions", long_about = None)]
struct Cli {
    /// Directory holding session files (overrides F1_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Base URL of an HTTP session mirror (overrides F1_DATA_URL)
    #[arg(long, global = true)]
    data_url: Option<String>,

    /// Number of sessions kept in memory (overrides SESSION_CACHE_SIZE)
    #[arg(long, global = true)]
    cache_size: Option<usize>,

    /// JSON file mapping circuit names to track lengths in km (overrides CIRCUITS_FILE)
    #[arg(long, global = true)]
    circuits: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SessionArgs {
    #[arg(short, long)]
    year: i32,

    #[arg(short, long)]
    round: u32,

    /// Session type: FP1, FP2, FP3, Q or R
    #[arg(short, long, default_value = "R")]
    session: SessionType,
}

impl SessionArgs {
    fn key(&self) -> SessionKey {
        SessionKey::new(self.year, self.round, self.session)
    }
}

#[derive(clap::Args)]
struct ReportArgs {
    /// Histogram bin count for the lap time distribution
    #[arg(long, default_value_t = DEFAULT_HISTOGRAM_BINS)]
    bins: NonZeroUsize,

    /// Keep laps outside the 60-300s plausibility window
    #[arg(long, default_value_t = false)]
    no_plausibility_window: bool,

    /// Write the report to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Gzip compress the report file
    #[arg(long, default_value_t = false)]
    gzip: bool,
}

impl ReportArgs {
    fn engine_config(&self) -> EngineConfig {
        let config = EngineConfig::default().with_histogram_bins(self.bins);
        if self.no_plausibility_window {
            config.without_plausibility_window()
        } else {
            config
        }
    }

    fn emit<T: serde::Serialize>(&self, value: &T) -> Result<()> {
        match &self.output {
            Some(path) => write_json(path, value, self.gzip),
            None => print_json(value),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List seasons with lap data
    Seasons,
    /// List the events of a season
    Events {
        #[arg(short, long)]
        year: i32,
    },
    /// List the drivers of a session
    Drivers {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Show name and team of one driver
    DriverInfo {
        #[command(flatten)]
        session: SessionArgs,

        /// Driver number, e.g. 44
        #[arg(short, long)]
        driver: String,
    },
    /// Build the lap report for one driver
    Driver {
        #[command(flatten)]
        session: SessionArgs,

        /// Driver number, e.g. 44
        #[arg(short, long)]
        driver: String,

        #[command(flatten)]
        report: ReportArgs,
    },
    /// Compare up to five drivers
    Compare {
        #[command(flatten)]
        session: SessionArgs,

        /// Comma-separated driver numbers, e.g. 44,1,16
        #[arg(short, long)]
        drivers: String,
    },
    /// Summarize a session
    Summary {
        #[command(flatten)]
        session: SessionArgs,

        /// Number of drivers to include
        #[arg(short, long, default_value_t = DEFAULT_SUMMARY_LIMIT)]
        limit: usize,

        /// CSV file to append per-driver comparison rows to
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Analyze a session JSON or lap CSV from a file or URL
    Analyze {
        /// Path to file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Driver number, e.g. 44
        #[arg(short, long)]
        driver: String,

        #[command(flatten)]
        report: ReportArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/f1_lap_analytics.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("f1_lap_analytics.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let app = AppConfig::from_env()?;

    let circuits = match cli.circuits.clone().or(app.circuits_file.clone()) {
        Some(path) => CircuitConfig::load(&path)?,
        None => CircuitConfig::default(),
    };

    match cli.command {
        Commands::Analyze {
            ref source,
            ref driver,
            ref report,
        } => {
            let bytes = fetcher(source).await?;
            let session = parse_lap_source(&bytes)?;
            let config =
                circuits.engine_config_for(&report.engine_config(), session.circuit.as_deref());
            let result = driver_report(&session, driver, None, &config);
            info!(
                driver = %driver,
                laps = result.analysis.lap_data.len(),
                best = %result.analysis.statistics.best_lap_time_formatted,
                "Analysis complete"
            );
            print_pretty(&result.analysis.statistics);
            report.emit(&result)?;
            return Ok(());
        }
        Commands::Seasons => {
            print_json(&f1_lap_analytics::session::available_seasons())?;
            return Ok(());
        }
        _ => {}
    }

    let source: Arc<dyn SessionSource> = match cli.data_url.clone().or(app.data_url.clone()) {
        Some(url) => {
            info!(url = %url, "Using HTTP session source");
            Arc::new(HttpSource::new(url))
        }
        None => {
            let dir = cli.data_dir.clone().unwrap_or(app.data_dir.clone());
            info!(dir = %dir.display(), "Using file session source");
            Arc::new(FileSource::new(dir))
        }
    };
    let cache_size = cli.cache_size.unwrap_or(app.session_cache_size);
    let cache = SessionCache::new(source, cache_size);

    match cli.command {
        Commands::Events { year } => {
            let analyzer = Analyzer::new(cache, EngineConfig::default(), circuits);
            print_json(&analyzer.events(year).await?)?;
        }
        Commands::Drivers { session } => {
            let analyzer = Analyzer::new(cache, EngineConfig::default(), circuits);
            print_json(&analyzer.drivers(session.key()).await?)?;
        }
        Commands::DriverInfo { session, driver } => {
            let analyzer = Analyzer::new(cache, EngineConfig::default(), circuits);
            print_json(&analyzer.driver_info(session.key(), &driver).await?)?;
        }
        Commands::Driver {
            session,
            driver,
            report,
        } => {
            let analyzer = Analyzer::new(cache, report.engine_config(), circuits);
            let result = analyzer.driver_report(session.key(), &driver).await?;
            report.emit(&result)?;
        }
        Commands::Compare { session, drivers } => {
            let analyzer = Analyzer::new(cache, EngineConfig::default(), circuits);
            let drivers = parse_driver_list(&drivers);
            print_json(&analyzer.compare(session.key(), &drivers).await?)?;
        }
        Commands::Summary {
            session,
            limit,
            csv,
        } => {
            let analyzer = Analyzer::new(cache, EngineConfig::default(), circuits);
            let key = session.key();
            print_json(&analyzer.summary(key, limit).await?)?;

            if let Some(path) = csv {
                let rows = analyzer.all_drivers(key).await?;
                append_records(&path, &rows)?;
                info!(path = %path.display(), rows = rows.len(), "Driver comparison appended");
            }

            let stats = analyzer.cache().stats();
            info!(
                hits = stats.hits,
                misses = stats.misses,
                evictions = stats.evictions,
                "Session cache"
            );
        }
        Commands::Seasons | Commands::Analyze { .. } => {}
    }

    Ok(())
}

/// Loads session data from a local file path or fetches it over HTTP.
#[tracing::instrument(fields(source = %url))]
async fn fetcher(url: &str) -> Result<Vec<u8>> {
    let bytes = if url.starts_with("http") {
        let client = BasicClient::new();
        fetch_bytes(&client, url).await?
    } else {
        std::fs::read(url)?
    };
    Ok(bytes)
}
