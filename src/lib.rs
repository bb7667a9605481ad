//! Smart BI analytics engine.
//!
//! Computes ranked, partitioned and time-windowed report metrics over flat
//! transactional records (departments, employees, products, customers,
//! sales) loaded from a snapshot. The library exposes the window and
//! aggregation primitives plus the report catalog; the `sbi` binary wraps
//! them in a small CLI.

pub mod analytics;
pub mod config;
pub mod model;
pub mod store;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::analytics::format::render_table;
use crate::analytics::{
    AnalyticsError, Param, ReportKind, ReportParams, ReportResult, ValidateConfig,
    ValidationReport, run_validation,
};
use crate::config::{ConfigError, EngineConfig, OutputFormat};
use crate::store::{SnapshotStore, StoreError};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sbi",
    version,
    about = "Analytical window-and-aggregation reports over a BI snapshot"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: $XDG_CONFIG_HOME/sbi/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List the report catalog with columns and accepted parameters
    Reports {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Run one report
    Run {
        /// Report name (see `sbi reports`)
        report: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        months: Option<usize>,
        /// Reference date for recency metrics (YYYY-MM-DD, default today UTC)
        #[arg(long, value_parser = parse_date)]
        as_of: Option<NaiveDate>,
        /// Snapshot JSON (overrides SBI_SNAPSHOT and the config file)
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
        /// Emit the JSON envelope
        #[arg(long, conflicts_with = "table")]
        json: bool,
        /// Emit a formatted text table
        #[arg(long)]
        table: bool,
    },
    /// Run every report in parallel and write `<report>.json` files
    Export {
        /// Output directory (created if missing)
        #[arg(long, value_name = "DIR")]
        out: PathBuf,
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
        #[arg(long, value_parser = parse_date)]
        as_of: Option<NaiveDate>,
    },
    /// Check the snapshot's referential integrity
    Validate {
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

impl Cli {
    /// Whether errors should be emitted as a JSON envelope.
    pub fn wants_json(&self) -> bool {
        match &self.command {
            Commands::Reports { json } | Commands::Validate { json, .. } => *json,
            Commands::Run { json, .. } => *json,
            Commands::Export { .. } => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structured CLI failure. `code` is the process exit code.
#[derive(Debug, Clone, Serialize)]
pub struct CliError {
    pub code: i32,
    pub kind: &'static str,
    pub message: String,
    pub hint: Option<String>,
    pub retryable: bool,
}

impl CliError {
    fn new(code: i32, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
            hint: None,
            retryable: false,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(2, "usage", message)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self })
    }

    /// Print to stderr, as JSON when requested.
    pub fn emit(&self, json: bool) {
        if json {
            eprintln!("{}", self.to_json());
        } else {
            eprintln!("error: {}", self.message);
            if let Some(hint) = &self.hint {
                eprintln!("hint: {hint}");
            }
        }
    }
}

impl From<AnalyticsError> for CliError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::Configuration(_) => Self::new(2, "configuration", err.to_string())
                .with_hint("Run 'sbi reports' for report names and accepted parameters"),
            AnalyticsError::Structural(_) => Self::new(3, "structural", err.to_string())
                .with_hint("Run 'sbi validate' to locate the inconsistent records"),
            AnalyticsError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for CliError {
    fn from(err: StoreError) -> Self {
        let retryable = matches!(err, StoreError::Unavailable(_));
        let mut out = Self::new(4, "store", err.to_string());
        out.retryable = retryable;
        out
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::new(2, "config", err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::new(1, "io", err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(1, "serialization", err.to_string())
    }
}

/// Parse arguments. Help and version requests come back as a code-0 error
/// carrying the rendered text.
pub fn parse_cli<I, T>(args: I) -> Result<Cli, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(|e| match e.kind() {
        clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
            CliError::new(0, "help", e.to_string())
        }
        _ => CliError::usage(e.to_string().trim_end().to_string()),
    })
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Install the stderr subscriber. `RUST_LOG` wins; otherwise `-v` flags,
/// then the configured filter, then `warn`.
pub fn init_logging(verbose: u8, configured: Option<&str>) {
    let fallback = match verbose {
        0 => configured.unwrap_or("warn"),
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn load_config(path: Option<&Path>) -> Result<EngineConfig, CliError> {
    let config = match path {
        Some(p) => EngineConfig::load_from(p)?,
        None => EngineConfig::load()?,
    };
    Ok(config.with_env_overrides())
}

fn open_store(config: &EngineConfig, flag: Option<&Path>) -> Result<(SnapshotStore, PathBuf), CliError> {
    let path = config.resolve_snapshot(flag)?;
    let store = SnapshotStore::open(&path)?;
    Ok((store, path))
}

/// Run a parsed command. Returns the process exit code on success.
pub fn run_cli(cli: Cli) -> Result<i32, CliError> {
    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, config.log_filter.as_deref());
    debug!(command = ?cli.command, "dispatch");

    match cli.command {
        Commands::Reports { json } => {
            print_catalog(json)?;
            Ok(0)
        }
        Commands::Run {
            report,
            limit,
            year,
            months,
            as_of,
            snapshot,
            json,
            table,
        } => {
            let kind: ReportKind = report.parse()?;
            let params = ReportParams {
                limit,
                year,
                months,
                as_of: as_of.or_else(|| kind.accepts(Param::AsOf).then(today)),
            };
            let (store, _) = open_store(&config, snapshot.as_deref())?;
            let result = analytics::run(&store, kind, &params)?;
            let format = if json {
                OutputFormat::Json
            } else if table {
                OutputFormat::Table
            } else {
                config.output
            };
            print_result(&result, format)?;
            Ok(0)
        }
        Commands::Export {
            out,
            snapshot,
            as_of,
        } => {
            let (store, path) = open_store(&config, snapshot.as_deref())?;
            let written = export_all(&store, &out, as_of.unwrap_or_else(today))?;
            info!(snapshot = %path.display(), reports = written.len(), "export complete");
            let summary = serde_json::json!({
                "out": out.display().to_string(),
                "reports": written,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(0)
        }
        Commands::Validate { snapshot, json } => {
            let (store, path) = open_store(&config, snapshot.as_deref())?;
            let report = run_validation(
                store.snapshot(),
                &path.display().to_string(),
                &ValidateConfig::default(),
            );
            print_validation(&report, json || config.output == OutputFormat::Json)?;
            Ok(if report.count_failures(analytics::validate::Severity::Error) > 0 {
                1
            } else {
                0
            })
        }
    }
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

/// Run every report against one store and write `<report>.json` into `out`.
/// Reports that take `as_of` share the same reference date.
pub fn export_all(
    store: &SnapshotStore,
    out: &Path,
    as_of: NaiveDate,
) -> Result<Vec<&'static str>, CliError> {
    std::fs::create_dir_all(out)?;
    let results: Vec<ReportResult> = ReportKind::ALL
        .par_iter()
        .map(|kind| {
            let mut params = ReportParams::default();
            if kind.accepts(Param::AsOf) {
                params.as_of = Some(as_of);
            }
            analytics::run(store, *kind, &params)
        })
        .collect::<Result<_, _>>()?;

    let mut written = Vec::with_capacity(results.len());
    for result in &results {
        let path = out.join(format!("{}.json", result.report));
        std::fs::write(&path, serde_json::to_string_pretty(&result.to_cli_json())?)?;
        debug!(path = %path.display(), rows = result.len(), "wrote report");
        written.push(result.report);
    }
    Ok(written)
}

fn print_catalog(json: bool) -> Result<(), CliError> {
    if json {
        let catalog: Vec<serde_json::Value> = ReportKind::ALL
            .iter()
            .map(|k| {
                serde_json::json!({
                    "name": k.name(),
                    "description": k.description(),
                    "params": k.accepted_params(),
                    "columns": k.columns(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }
    for k in ReportKind::ALL {
        let params: Vec<String> = k.accepted_params().iter().map(ToString::to_string).collect();
        let columns: Vec<&str> = k.columns().iter().map(|c| c.name).collect();
        println!("{}", k.name());
        println!("  {}", k.description());
        println!(
            "  params:  {}",
            if params.is_empty() { "-".to_string() } else { params.join(", ") }
        );
        println!("  columns: {}", columns.join(", "));
    }
    Ok(())
}

fn print_result(result: &ReportResult, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result.to_cli_json())?);
        }
        OutputFormat::Table => {
            println!("{}", render_table(result));
            println!("({} rows, {} ms)", result.len(), result.elapsed_ms);
            for w in &result.warnings {
                eprintln!(
                    "warning: {}: {} row(s) had a zero or missing denominator",
                    w.metric, w.occurrences
                );
            }
        }
    }
    Ok(())
}

fn print_validation(report: &ValidationReport, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
        return Ok(());
    }
    for c in &report.checks {
        let status = if c.ok { "ok" } else { "FAIL" };
        println!("[{status:>4}] {:<28} {}", c.id, c.details);
        if let Some(action) = &c.suggested_action {
            println!("       -> {action}");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
