//! The scanning pipeline for a single run.
//!
//! [`engine::scan`] ties the pieces together: roots are resolved, walked into a candidate
//! list, and the candidates fanned out to a fixed-size worker pool. Each worker owns one
//! candidate at a time and runs it through [`FileProcessor`] (decode, then
//! [`TargetMatcher::extract`]). Results flow back over a channel to a single aggregating
//! loop, so no result list is ever shared between workers.
//!
//! ```rust,ignore
//! let cancel = CancellationToken::new();
//! let summary = scan(&config, &cancel, &LogObserver)?;
//! for row in summary.rows() {
//!     println!("{}:{}: {}", row.path, row.line_number, row.line_preview);
//! }
//! ```
pub mod engine;
pub mod matcher;
pub mod processor;

pub use engine::{
    build_processor, scan, CancellationToken, LogObserver, ScanCoordinator, ScanObserver,
    PROGRESS_INTERVAL,
};
pub use matcher::TargetMatcher;
pub use processor::FileProcessor;
