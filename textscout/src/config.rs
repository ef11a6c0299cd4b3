use config::{Config as ConfigBuilder, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::decoder::{TextEncoding, DEFAULT_ENCODINGS};
use crate::errors::{SearchError, SearchResult};

/// Substring searched for when none is configured
pub const DEFAULT_TARGET: &str = "סתם טקסט";

/// Files larger than this are skipped unless configured otherwise (50 MiB)
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

/// Upper bound of the default worker count; the work is I/O bound
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// Configuration for a scan.
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations, later ones overriding
/// earlier ones:
/// 1. Global `$CONFIG_DIR/textscout/config.yaml`
/// 2. Local `.textscout.yaml` in the current directory
/// 3. Custom config file specified via `--config`
///
/// Command-line flags override all of them (see [`ScanConfig::merge_with_cli`]).
///
/// # Configuration Format
///
/// ```yaml
/// # Exact, case-sensitive substring to look for
/// target: "TODO"
///
/// # Skip files larger than this many bytes
/// max_file_bytes: 1048576
///
/// # Parallel workers (default: min(8, CPU cores))
/// worker_count: 4
///
/// follow_symlinks: false
/// include_hidden: false
///
/// # Scan these instead of every attached drive
/// roots:
///   - "/home"
///   - "/srv/shared"
///
/// output_path: "matches.csv"
/// report_format: "csv"   # or "json"
///
/// # Strict decodings tried in order before the lossy UTF-8 fallback
/// encodings: ["utf-8", "utf-16", "utf-16-le", "utf-16-be", "windows-1252"]
///
/// log_level: "info"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Substring to search for
    pub target: String,

    /// Per-file size ceiling in bytes
    pub max_file_bytes: u64,

    /// Number of concurrent scan workers
    pub worker_count: NonZeroUsize,

    /// Descend into symlinked directories
    pub follow_symlinks: bool,

    /// Include dot-prefixed files and directories on POSIX-like systems
    pub include_hidden: bool,

    /// Explicit roots; when absent the attached drives are discovered
    pub roots: Option<Vec<PathBuf>>,

    /// Where the report is written
    pub output_path: PathBuf,

    /// Report file format
    pub report_format: ReportFormat,

    /// Labels of the strict encodings to try, in order
    pub encodings: Vec<String>,

    /// Log level (trace, debug, info, warn, error). When unset, `RUST_LOG` applies.
    pub log_level: Option<String>,
}

/// Output format of the report file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            other => Err(SearchError::config_error(format!(
                "Unknown report format '{}' (expected csv or json)",
                other
            ))),
        }
    }
}

fn default_worker_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS)).unwrap_or(NonZeroUsize::MIN)
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            worker_count: default_worker_count(),
            follow_symlinks: false,
            include_hidden: false,
            roots: None,
            output_path: PathBuf::from("matches.csv"),
            report_format: ReportFormat::default(),
            encodings: DEFAULT_ENCODINGS.iter().map(|s| s.to_string()).collect(),
            log_level: None,
        }
    }
}

/// Values given on the command line; `None` leaves the file value in place
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub target: Option<String>,
    pub max_file_bytes: Option<u64>,
    pub worker_count: Option<NonZeroUsize>,
    pub follow_symlinks: bool,
    pub include_hidden: bool,
    pub roots: Option<Vec<PathBuf>>,
    pub output_path: Option<PathBuf>,
    pub report_format: Option<ReportFormat>,
    pub encodings: Option<Vec<String>>,
    pub log_level: Option<String>,
}

impl ScanConfig {
    /// Loads configuration from the default locations
    pub fn load() -> SearchResult<Self> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus a specific file
    pub fn load_from(config_path: Option<&Path>) -> SearchResult<Self> {
        if let Some(path) = config_path {
            if !path.is_file() {
                return Err(SearchError::config_error(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
        }

        let mut builder = ConfigBuilder::builder();

        let config_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("textscout/config.yaml")),
            // Local config
            Some(PathBuf::from(".textscout.yaml")),
            // Custom config
            config_path.map(PathBuf::from),
        ];

        for path in config_files.iter().flatten() {
            if path.is_file() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(target) = cli.target {
            self.target = target;
        }
        if let Some(max_file_bytes) = cli.max_file_bytes {
            self.max_file_bytes = max_file_bytes;
        }
        if let Some(worker_count) = cli.worker_count {
            self.worker_count = worker_count;
        }
        // Flags can only switch these on
        if cli.follow_symlinks {
            self.follow_symlinks = true;
        }
        if cli.include_hidden {
            self.include_hidden = true;
        }
        if let Some(roots) = cli.roots.filter(|roots| !roots.is_empty()) {
            self.roots = Some(roots);
        }
        if let Some(output_path) = cli.output_path {
            self.output_path = output_path;
        }
        if let Some(report_format) = cli.report_format {
            self.report_format = report_format;
        }
        if let Some(encodings) = cli.encodings {
            self.encodings = encodings;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = Some(log_level);
        }
        self
    }

    /// Rejects configurations a scan cannot run with
    pub fn validate(&self) -> SearchResult<()> {
        if self.target.is_empty() {
            return Err(SearchError::invalid_target("target must not be empty"));
        }
        if self.max_file_bytes == 0 {
            return Err(SearchError::config_error(
                "max_file_bytes must be greater than zero",
            ));
        }
        if self.encodings.is_empty() {
            return Err(SearchError::config_error(
                "at least one encoding must be configured",
            ));
        }
        TextEncoding::from_labels(&self.encodings)?;
        Ok(())
    }
}
