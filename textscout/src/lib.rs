pub mod config;
pub mod decoder;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod report;
pub mod results;
pub mod roots;
pub mod search;
pub mod walker;

pub use config::{CliOverrides, ReportFormat, ScanConfig};
pub use errors::{SearchError, SearchResult};
pub use results::{FileResult, MatchHit, ScanSummary};
pub use search::{scan, CancellationToken, LogObserver, ScanObserver};
