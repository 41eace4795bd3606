//! studysync - copy recently changed, allow-listed studies to a transfer mount.
//!
//! Usage:
//!   studysync run              Fetch the allow-list (if configured), then copy
//!   studysync run --dry-run    Show what would be copied
//!   studysync scan             Show changed files per allow-listed study
//!   studysync fetch            Only fetch the allow-list
//!   studysync --help           Show help

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use studysync_core::{
    CopyRunResult, FetchConfig, NoWorkReason, OwnershipScope, RunOutcome, ScanReport, SyncConfig,
};
use studysync_ops::SyncRun;

/// Exit code for a run that finished with skipped files.
const EXIT_PARTIAL: u8 = 2;

#[derive(Parser)]
#[command(
    name = "studysync",
    version,
    about = "Copy recently changed, allow-listed XNAT studies to a transfer mount",
    long_about = "studysync selects the studies named by an allow-list, finds the files \
                  changed inside a lookback window and copies them to a target mount, \
                  keeping the per-study directory layout and fixing ownership for the \
                  downstream service account."
)]
struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the allow-list, then copy changed files
    Run {
        #[command(flatten)]
        sync: SyncArgs,

        /// Report what would be copied without copying
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show changed files for allow-listed studies without copying
    Scan {
        #[command(flatten)]
        sync: SyncArgs,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Fetch the allow-list from its repository
    Fetch {
        #[command(flatten)]
        sync: SyncArgs,
    },
}

#[derive(Args)]
struct SyncArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding one subdirectory per study
    #[arg(long)]
    archive_root: Option<PathBuf>,

    /// Allow-list file of `Investigator/StudyName` entries
    #[arg(long)]
    allow_list: Option<PathBuf>,

    /// Mount point to copy into
    #[arg(short, long)]
    target: Option<PathBuf>,

    /// Copy files changed within this window (e.g., "24h", "2d", "90m")
    #[arg(short, long)]
    lookback: Option<String>,

    /// Owner uid for copied files
    #[arg(long)]
    uid: Option<u32>,

    /// Owner gid for copied files
    #[arg(long)]
    gid: Option<u32>,

    /// Which part of the target tree to re-own after copying
    #[arg(long)]
    ownership: Option<OwnershipArg>,

    /// Git repository holding the allow-list
    #[arg(long)]
    repository: Option<String>,

    /// Branch of the allow-list repository
    #[arg(long, requires = "repository")]
    branch: Option<String>,

    /// Directory the fetched allow-list is placed in
    #[arg(long, requires = "repository")]
    fetch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OwnershipArg {
    Tree,
    Study,
    Off,
}

impl From<OwnershipArg> for OwnershipScope {
    fn from(arg: OwnershipArg) -> Self {
        match arg {
            OwnershipArg::Tree => Self::Tree,
            OwnershipArg::Study => Self::Study,
            OwnershipArg::Off => Self::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    match cli.command {
        Command::Run {
            sync,
            dry_run,
            format,
        } => {
            let mut config = sync.into_config()?;
            config.dry_run |= dry_run;
            run_sync(config, format)
        }
        Command::Scan { sync, format } => {
            run_scan(sync.into_config()?, format)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Fetch { sync } => {
            run_fetch(sync.into_config()?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Log to stderr, and to a plain-text file when requested.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("studysync=info,studysync_ops=info,studysync_scan=info")
    });

    let file_layer = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot create log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

impl SyncArgs {
    /// Build the run configuration: file values, then command-line overrides.
    fn into_config(self) -> Result<SyncConfig> {
        let mut config = match &self.config {
            Some(path) => SyncConfig::from_toml_file(path)
                .with_context(|| format!("Cannot load config {}", path.display()))?,
            None => SyncConfig::default(),
        };

        if let Some(path) = self.archive_root {
            config.archive_root = path;
        }
        if let Some(path) = self.allow_list {
            config.allow_list = path;
        }
        if let Some(path) = self.target {
            config.target_root = path;
        }
        if let Some(window) = self.lookback {
            config.lookback_secs = parse_duration(&window)?.as_secs();
        }
        if let Some(uid) = self.uid {
            config.owner_uid = uid;
        }
        if let Some(gid) = self.gid {
            config.owner_gid = gid;
        }
        if let Some(scope) = self.ownership {
            config.ownership_scope = scope.into();
        }
        if let Some(repository) = self.repository {
            let mut fetch = FetchConfig::builder();
            fetch.repository(repository);
            if let Some(branch) = self.branch {
                fetch.branch(branch);
            }
            if let Some(dir) = self.fetch_dir {
                fetch.destination(dir);
            }
            config.fetch = Some(fetch.build()?);
        }

        config.validate()?;
        tracing::debug!(?config, "configuration loaded");
        Ok(config)
    }
}

/// Run a full sync and print the summary.
fn run_sync(config: SyncConfig, format: OutputFormat) -> Result<ExitCode> {
    let run = SyncRun::new(config);
    let text = matches!(format, OutputFormat::Text);

    let outcome = run
        .execute_with_progress(|progress| {
            if text {
                if let Some(dest) = &progress.current_file {
                    eprintln!(
                        "[{}/{} {:>5.1}%] {}",
                        progress.files_completed,
                        progress.files_total,
                        progress.percentage(),
                        dest.display()
                    );
                }
            }
        })
        .context("Sync run failed")?;

    match format {
        OutputFormat::Text => match &outcome {
            RunOutcome::Completed(result) => print_run(result),
            RunOutcome::NoWork(reason) => println!("Nothing to copy: {reason}."),
        },
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
    }

    Ok(match outcome {
        RunOutcome::Completed(result) if !result.is_success() => ExitCode::from(EXIT_PARTIAL),
        _ => ExitCode::SUCCESS,
    })
}

/// Show changed files in allow-listed studies. No matching, no copying.
fn run_scan(config: SyncConfig, format: OutputFormat) -> Result<()> {
    eprintln!("Scanning {}...", config.archive_root.display());

    let (resolved, scan) = SyncRun::new(config).scan().context("Scan failed")?;

    match format {
        OutputFormat::Text if resolved.is_empty() => {
            println!("Nothing to scan: {}.", NoWorkReason::NoMatchingStudies)
        }
        OutputFormat::Text => print_scan(&scan),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&scan)?),
    }

    Ok(())
}

/// Fetch the allow-list only.
fn run_fetch(config: SyncConfig) -> Result<()> {
    if config.fetch.is_none() {
        bail!("No allow-list repository configured (use --repository or [fetch] in the config)");
    }
    let path = SyncRun::new(config).fetch().context("Fetch failed")?;
    eprintln!("Fetched allow-list to {}", path.display());
    Ok(())
}

fn print_scan(scan: &ScanReport) {
    println!();
    println!("{}", "─".repeat(70));
    println!(
        " Found {} file(s) changed, {}",
        scan.total_files,
        format_size(scan.total_bytes)
    );
    println!(" Scanned in {:.2}s", scan.scan_duration.as_secs_f64());
    println!("{}", "─".repeat(70));

    for (study, tasks) in scan.manifest.iter() {
        let bytes: u64 = tasks.iter().map(|t| t.size).sum();
        println!();
        println!(" {} ({} files, {})", study, tasks.len(), format_size(bytes));
        for task in tasks {
            println!("   {}", task.source.display());
        }
    }
    println!();

    if !scan.warnings.is_empty() {
        println!("{} warning(s) during scan", scan.warnings.len());
    }
}

fn print_run(result: &CopyRunResult) {
    let names = |ids: &[studysync_core::StudyId]| {
        ids.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    };

    println!();
    println!("{}", "─".repeat(70));
    println!(" Sync Report{}", if result.dry_run { " (dry run)" } else { "" });
    println!("{}", "─".repeat(70));
    println!();
    println!(
        " We found {} file(s) changed within the window, {} in total",
        result.files_considered,
        format_size(result.total_bytes)
    );
    println!(" Studies in archive: {}", names(&result.studies_resolved));
    println!(" Studies matched:    {}", names(&result.studies_matched));
    println!();

    for path in &result.files_copied {
        println!("   {}", path.display());
    }
    println!();
    println!(
        " {} ({}) in {:.2}s",
        result.summary(),
        format_size(result.bytes_copied),
        result.elapsed.as_secs_f64()
    );
    if result.ownership_changes > 0 {
        println!(" Re-owned {} entries", result.ownership_changes);
    }

    if !result.failures.is_empty() {
        println!();
        println!(" Skipped files:");
        for failure in &result.failures {
            println!("   {} ({})", failure.path.display(), failure.message);
        }
    }
    if !result.scan_warnings.is_empty() {
        println!();
        println!("{} warning(s) during scan", result.scan_warnings.len());
    }
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a duration string (e.g., "24h", "2d", "1w", "90m").
fn parse_duration(s: &str) -> Result<std::time::Duration> {
    let s = s.trim().to_lowercase();

    let (num, multiplier) = if s.ends_with('w') {
        let num: f64 = s.trim_end_matches('w').parse()?;
        (num, 7.0 * 24.0 * 60.0 * 60.0)
    } else if s.ends_with('d') {
        let num: f64 = s.trim_end_matches('d').parse()?;
        (num, 24.0 * 60.0 * 60.0)
    } else if s.ends_with('h') {
        let num: f64 = s.trim_end_matches('h').parse()?;
        (num, 60.0 * 60.0)
    } else if s.ends_with('m') {
        let num: f64 = s.trim_end_matches('m').parse()?;
        (num, 60.0)
    } else if s.ends_with('s') {
        let num: f64 = s.trim_end_matches('s').parse()?;
        (num, 1.0)
    } else {
        let num: f64 = s.parse()?;
        (num, 60.0 * 60.0) // Default to hours
    };

    if !num.is_finite() || num <= 0.0 {
        bail!("Lookback window must be positive: {s}");
    }

    std::time::Duration::try_from_secs_f64(num * multiplier)
        .with_context(|| format!("Lookback window out of range: {s}"))
}
