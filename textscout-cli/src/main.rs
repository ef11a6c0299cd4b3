use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use textscout::{
    report::write_report, scan, CancellationToken, CliOverrides, FileResult, ReportFormat,
    ScanConfig, ScanObserver, ScanSummary, SearchError,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "textscout")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Exact, case-sensitive substring to look for
    #[arg(short, long)]
    target: Option<String>,

    /// Skip files larger than this many bytes
    #[arg(long)]
    max_file_bytes: Option<u64>,

    /// Number of parallel workers (default: min(8, CPU cores))
    #[arg(short = 'j', long)]
    workers: Option<NonZeroUsize>,

    /// Descend into symlinked directories
    #[arg(long)]
    follow_symlinks: bool,

    /// Include dot-prefixed files and directories
    #[arg(long)]
    include_hidden: bool,

    /// Scan these directories instead of every attached drive
    #[arg(long, num_args = 1..)]
    roots: Vec<PathBuf>,

    /// Report file path (default: matches.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report format (csv|json)
    #[arg(long, value_parser = parse_format)]
    format: Option<ReportFormat>,

    /// Strict encodings to try in order, comma separated
    #[arg(long, value_delimiter = ',')]
    encodings: Option<Vec<String>>,

    /// Configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Only print the final summary
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            target: self.target.clone(),
            max_file_bytes: self.max_file_bytes,
            worker_count: self.workers,
            follow_symlinks: self.follow_symlinks,
            include_hidden: self.include_hidden,
            roots: Some(self.roots.clone()),
            output_path: self.output.clone(),
            report_format: self.format,
            encodings: self.encodings.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

fn parse_format(value: &str) -> std::result::Result<ReportFormat, String> {
    value.parse().map_err(|e: SearchError| e.to_string())
}

/// Prints scan events to the terminal
struct ConsoleObserver {
    quiet: bool,
}

impl ScanObserver for ConsoleObserver {
    fn on_roots(&self, roots: &[PathBuf]) {
        if self.quiet {
            return;
        }
        println!("{}", "Roots to scan:".bold());
        for root in roots {
            println!("  - {}", root.display());
        }
    }

    fn on_root_unavailable(&self, root: &Path, error: &SearchError) {
        eprintln!(
            "{} skipping root {}: {}",
            "[WARN]".yellow(),
            root.display(),
            error
        );
    }

    fn on_candidates(&self, count: usize) {
        if !self.quiet {
            println!("Discovered {} text files.", count);
        }
    }

    fn on_progress(&self, completed: usize, total: usize) {
        if !self.quiet {
            println!("...processed {}/{} files", completed, total);
        }
    }

    fn on_hit(&self, result: &FileResult) {
        if self.quiet {
            return;
        }
        let lines = result
            .line_numbers()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{} {}  (encoding={})  lines={}",
            "[HIT]".green().bold(),
            result.path.display().to_string().blue(),
            result.encoding,
            lines
        );
    }

    fn on_file_error(&self, path: &Path, error: &SearchError) {
        eprintln!("{} {}: {}", "[ERROR]".red(), path.display(), error);
    }
}

/// Level used when neither the command line, the config file nor `RUST_LOG` sets one
const DEFAULT_LOG_LEVEL: &str = "warn";

/// An explicit level (`--log-level`, then the config file) wins over `RUST_LOG`
fn log_filter(explicit: Option<&str>) -> Result<EnvFilter> {
    match explicit {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{}'", level))
        }
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))),
    }
}

fn init_logging(explicit: Option<&str>) -> Result<()> {
    let filter = log_filter(explicit)?;
    // A second init (tests, embedding) keeps the existing subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ScanConfig::load_from(cli.config.as_deref())
        .context("Failed to load configuration")?
        .merge_with_cli(cli.overrides());
    config.validate()?;
    init_logging(config.log_level.as_deref())?;

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
    })
    .context("Failed to set Ctrl+C handler")?;

    if !cli.quiet {
        println!(
            "Target length: {} characters | workers: {} | max file size: {} bytes",
            config.target.chars().count(),
            config.worker_count,
            config.max_file_bytes
        );
    }

    let started = Instant::now();
    let observer = ConsoleObserver { quiet: cli.quiet };
    let summary = scan(&config, &cancel, &observer)?;
    let elapsed = started.elapsed();

    write_report(&summary, &config.output_path, config.report_format)?;
    print_summary(&summary, elapsed, &config.output_path);
    Ok(())
}

fn print_summary(summary: &ScanSummary, elapsed: std::time::Duration, output_path: &Path) {
    if summary.cancelled {
        println!(
            "{} after {}/{} files.",
            "Interrupted".yellow().bold(),
            summary.files_processed,
            summary.files_discovered
        );
    }
    if summary.files_failed > 0 {
        println!("{} files could not be scanned.", summary.files_failed);
    }

    // Round to whole milliseconds so humantime prints e.g. "1s 250ms"
    let elapsed = std::time::Duration::from_millis(elapsed.as_millis() as u64);
    println!(
        "Done. Matches: {} lines in {} files. ({})",
        summary.total_hits,
        summary.files_matched,
        humantime::format_duration(elapsed)
    );

    let report_path =
        std::fs::canonicalize(output_path).unwrap_or_else(|_| output_path.to_path_buf());
    println!("Report written to: {}", report_path.display());
}
