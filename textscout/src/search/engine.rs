use crossbeam_channel::RecvTimeoutError;
use rayon::ThreadPoolBuilder;
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::matcher::TargetMatcher;
use super::processor::FileProcessor;
use crate::config::ScanConfig;
use crate::decoder::{TextDecoder, TextEncoding};
use crate::errors::{SearchError, SearchResult};
use crate::results::{FileResult, ScanSummary};
use crate::roots::resolve_roots;
use crate::walker::{collect_candidates, Candidate, WalkOptions};

/// Completed tasks between two progress reports
pub const PROGRESS_INTERVAL: usize = 500;

/// How often the coordinator re-checks for cancellation while waiting on results
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Cooperative stop signal shared between the caller and a running scan
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Receives the observable side effects of a scan. Every method defaults to doing nothing.
pub trait ScanObserver: Send + Sync {
    fn on_roots(&self, _roots: &[PathBuf]) {}
    fn on_root_unavailable(&self, _root: &Path, _error: &SearchError) {}
    fn on_candidates(&self, _count: usize) {}
    fn on_progress(&self, _completed: usize, _total: usize) {}
    fn on_hit(&self, _result: &FileResult) {}
    fn on_file_error(&self, _path: &Path, _error: &SearchError) {}
}

/// Reports scan events through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl ScanObserver for LogObserver {
    fn on_roots(&self, roots: &[PathBuf]) {
        for root in roots {
            info!("Scanning root {}", root.display());
        }
    }

    fn on_root_unavailable(&self, root: &Path, error: &SearchError) {
        warn!("Skipping root {}: {}", root.display(), error);
    }

    fn on_candidates(&self, count: usize) {
        info!("Discovered {} text files", count);
    }

    fn on_progress(&self, completed: usize, total: usize) {
        info!("Processed {}/{} files", completed, total);
    }

    fn on_hit(&self, result: &FileResult) {
        info!(
            "Hit in {} (encoding={}) lines={:?}",
            result.path.display(),
            result.encoding,
            result.line_numbers().collect::<Vec<_>>()
        );
    }

    fn on_file_error(&self, path: &Path, error: &SearchError) {
        warn!("Failed to scan {}: {}", path.display(), error);
    }
}

/// What a worker sends back for one candidate
struct TaskOutcome {
    candidate: Candidate,
    result: SearchResult<Option<FileResult>>,
}

/// Runs decode and extraction for a candidate list on a fixed-size worker pool
#[derive(Debug)]
pub struct ScanCoordinator {
    processor: Arc<FileProcessor>,
    worker_count: NonZeroUsize,
    cancel: CancellationToken,
}

impl ScanCoordinator {
    pub fn new(
        processor: FileProcessor,
        worker_count: NonZeroUsize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            processor: Arc::new(processor),
            worker_count,
            cancel,
        }
    }

    pub fn processor(&self) -> &FileProcessor {
        &self.processor
    }

    /// Scans every candidate and collects the results in completion order.
    ///
    /// On cancellation no new task starts, results that already reached the coordinator
    /// are kept, and tasks still running are left to finish on their own.
    pub fn run(
        &self,
        candidates: Vec<Candidate>,
        observer: &dyn ScanObserver,
    ) -> SearchResult<ScanSummary> {
        let total = candidates.len();
        let mut summary = ScanSummary::new(total);
        if total == 0 {
            return Ok(summary);
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.worker_count.get())
            .thread_name(|index| format!("textscout-worker-{}", index))
            .build()
            .map_err(|e| SearchError::WorkerPool(e.to_string()))?;
        debug!(
            "Dispatching {} candidates to {} workers",
            total, self.worker_count
        );

        let (tx, rx) = crossbeam_channel::unbounded::<TaskOutcome>();
        for candidate in candidates {
            let tx = tx.clone();
            let processor = Arc::clone(&self.processor);
            let cancel = self.cancel.clone();
            pool.spawn(move || {
                if cancel.is_cancelled() {
                    return;
                }
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    processor.process_file(candidate.path())
                }))
                .unwrap_or_else(|payload| {
                    Err(SearchError::task_panicked(
                        candidate.path(),
                        panic_message(payload.as_ref()),
                    ))
                });
                // The receiver is gone once the coordinator has finalized
                let _ = tx.send(TaskOutcome { candidate, result });
            });
        }
        drop(tx);

        loop {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                for outcome in rx.try_iter() {
                    record_outcome(&mut summary, outcome, observer);
                }
                info!(
                    "Scan cancelled after {}/{} files",
                    summary.files_processed, total
                );
                break;
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(outcome) => {
                    record_outcome(&mut summary, outcome, observer);
                    if summary.files_processed % PROGRESS_INTERVAL == 0 {
                        observer.on_progress(summary.files_processed, total);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.processor.metrics().log_stats();
        info!(
            "Scan complete. Found {} hit lines in {} files",
            summary.total_hits, summary.files_matched
        );
        Ok(summary)
    }
}

fn record_outcome(summary: &mut ScanSummary, outcome: TaskOutcome, observer: &dyn ScanObserver) {
    summary.files_processed += 1;
    match outcome.result {
        Ok(Some(file_result)) => {
            observer.on_hit(&file_result);
            summary.add_file_result(file_result);
        }
        Ok(None) => {}
        Err(e) => {
            summary.files_failed += 1;
            observer.on_file_error(outcome.candidate.path(), &e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builds the processor a configuration describes
pub fn build_processor(config: &ScanConfig) -> SearchResult<FileProcessor> {
    let encodings = TextEncoding::from_labels(&config.encodings)?;
    let decoder = TextDecoder::new(encodings, config.max_file_bytes);
    let matcher = TargetMatcher::new(config.target.clone())?;
    Ok(FileProcessor::new(decoder, matcher))
}

/// Performs a full scan: resolve roots, walk them, then scan every candidate
pub fn scan(
    config: &ScanConfig,
    cancel: &CancellationToken,
    observer: &dyn ScanObserver,
) -> SearchResult<ScanSummary> {
    config.validate()?;
    let processor = build_processor(config)?;
    info!(
        "Starting scan for a {} character target",
        config.target.chars().count()
    );

    let roots = resolve_roots(config.roots.as_deref());
    observer.on_roots(&roots);

    let options = WalkOptions {
        follow_symlinks: config.follow_symlinks,
        include_hidden: config.include_hidden,
    };
    let candidates = collect_candidates(&roots, options, cancel, observer);
    let walk_cancelled = cancel.is_cancelled();
    observer.on_candidates(candidates.len());

    let coordinator = ScanCoordinator::new(processor, config.worker_count, cancel.clone());
    let mut summary = coordinator.run(candidates, observer)?;
    summary.cancelled |= walk_cancelled;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ScanMetrics;
    use std::fs;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Instant;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<(usize, usize)>>,
        errors: Mutex<Vec<PathBuf>>,
    }

    impl ScanObserver for Recorder {
        fn on_progress(&self, completed: usize, total: usize) {
            self.progress.lock().unwrap().push((completed, total));
        }

        fn on_file_error(&self, path: &Path, _error: &SearchError) {
            self.errors.lock().unwrap().push(path.to_path_buf());
        }
    }

    fn coordinator(target: &str, workers: usize, cancel: CancellationToken) -> ScanCoordinator {
        let processor = FileProcessor::new(
            TextDecoder::with_default_encodings(1024 * 1024),
            TargetMatcher::new(target).unwrap(),
        );
        ScanCoordinator::new(processor, NonZeroUsize::new(workers).unwrap(), cancel)
    }

    #[test]
    fn test_run_collects_matching_files() {
        let dir = tempdir().unwrap();
        let mut candidates = Vec::new();
        for i in 0..40 {
            let path = dir.path().join(format!("f{}.txt", i));
            let content = if i % 4 == 0 { "a\nneedle\n" } else { "a\nb\n" };
            fs::write(&path, content).unwrap();
            candidates.push(Candidate::new(path));
        }

        let summary = coordinator("needle", 4, CancellationToken::new())
            .run(candidates, &LogObserver)
            .unwrap();
        assert_eq!(summary.files_discovered, 40);
        assert_eq!(summary.files_processed, 40);
        assert_eq!(summary.files_matched, 10);
        assert_eq!(summary.total_hits, 10);
        assert!(!summary.cancelled);
        assert!(summary.file_results.iter().all(|r| r.hits[0].line_number == 2));
    }

    #[test]
    fn test_run_reports_progress_every_interval() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("one.txt");
        fs::write(&path, "nothing\n").unwrap();
        let candidates = vec![Candidate::new(path); 1100];

        let recorder = Recorder::default();
        coordinator("needle", 2, CancellationToken::new())
            .run(candidates, &recorder)
            .unwrap();
        assert_eq!(
            *recorder.progress.lock().unwrap(),
            vec![(500, 1100), (1000, 1100)]
        );
    }

    #[test]
    fn test_missing_candidate_is_not_an_error() {
        let dir = tempdir().unwrap();
        let recorder = Recorder::default();
        let summary = coordinator("needle", 1, CancellationToken::new())
            .run(vec![Candidate::new(dir.path().join("gone.txt"))], &recorder)
            .unwrap();
        assert_eq!(summary.files_processed, 1);
        assert_eq!(summary.files_failed, 0);
        assert!(recorder.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "needle\n").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = coordinator("needle", 2, cancel)
            .run(vec![Candidate::new(path); 10], &LogObserver)
            .unwrap();
        assert!(summary.cancelled);
        assert!(summary.files_processed <= 10);
    }

    #[test]
    fn test_empty_candidate_list() {
        let summary = coordinator("needle", 2, CancellationToken::new())
            .run(Vec::new(), &LogObserver)
            .unwrap();
        assert_eq!(summary.files_discovered, 0);
        assert!(summary.file_results.is_empty());
    }

    #[test]
    fn test_cancellation_keeps_queued_results() {
        struct CancelOnceAllQueued {
            cancel: CancellationToken,
            metrics: ScanMetrics,
            total: u64,
            hits: AtomicUsize,
        }

        impl ScanObserver for CancelOnceAllQueued {
            fn on_hit(&self, _result: &FileResult) {
                if self.hits.fetch_add(1, Ordering::SeqCst) > 0 {
                    return;
                }
                // Hold the coordinator until every task has finished and sent its outcome
                let deadline = Instant::now() + Duration::from_secs(10);
                while self.metrics.get_stats().files_decoded < self.total
                    && Instant::now() < deadline
                {
                    thread::sleep(Duration::from_millis(1));
                }
                thread::sleep(Duration::from_millis(50));
                self.cancel.cancel();
            }
        }

        let dir = tempdir().unwrap();
        let mut candidates = Vec::new();
        for i in 0..30 {
            let path = dir.path().join(format!("f{}.txt", i));
            fs::write(&path, "needle\n").unwrap();
            candidates.push(Candidate::new(path));
        }

        let cancel = CancellationToken::new();
        let coordinator = coordinator("needle", 1, cancel.clone());
        let observer = CancelOnceAllQueued {
            cancel,
            metrics: coordinator.processor().metrics().clone(),
            total: 30,
            hits: AtomicUsize::new(0),
        };
        let summary = coordinator.run(candidates, &observer).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.files_processed, 30);
        assert_eq!(summary.files_matched, 30);
        assert_eq!(observer.hits.load(Ordering::SeqCst), 30);
    }

    #[test]
    fn test_cancel_after_run_is_not_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "needle\n").unwrap();

        let cancel = CancellationToken::new();
        let summary = coordinator("needle", 1, cancel.clone())
            .run(vec![Candidate::new(path)], &LogObserver)
            .unwrap();
        cancel.cancel();
        assert!(!summary.cancelled);
        assert_eq!(summary.files_matched, 1);
    }

    #[test]
    fn test_cancel_during_walk_is_reported() {
        struct CancelOnMissingRoot(CancellationToken);
        impl ScanObserver for CancelOnMissingRoot {
            fn on_root_unavailable(&self, _root: &Path, _error: &SearchError) {
                self.0.cancel();
            }
        }

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "needle\n").unwrap();
        let config = ScanConfig {
            target: "needle".to_string(),
            roots: Some(vec![dir.path().join("missing"), dir.path().to_path_buf()]),
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let summary = scan(&config, &cancel, &CancelOnMissingRoot(cancel.clone())).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.files_discovered, 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_read_is_reported_and_scan_continues() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.txt");
        fs::write(&good, "needle\n").unwrap();
        // Reading /proc/self/mem from offset 0 fails with EIO
        let broken = PathBuf::from("/proc/self/mem");

        let recorder = Recorder::default();
        let summary = coordinator("needle", 2, CancellationToken::new())
            .run(
                vec![Candidate::new(broken.clone()), Candidate::new(good.clone())],
                &recorder,
            )
            .unwrap();
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.files_failed, 1);
        assert_eq!(*recorder.errors.lock().unwrap(), vec![broken]);
        assert!(summary.result_for(&good).is_some());
    }

    #[test]
    fn test_panicked_task_counts_as_failed_file() {
        let recorder = Recorder::default();
        let mut summary = ScanSummary::new(2);
        let path = PathBuf::from("boom.txt");
        record_outcome(
            &mut summary,
            TaskOutcome {
                candidate: Candidate::new(path.clone()),
                result: Err(SearchError::task_panicked(&path, "index out of bounds")),
            },
            &recorder,
        );
        record_outcome(
            &mut summary,
            TaskOutcome {
                candidate: Candidate::new("quiet.txt"),
                result: Ok(None),
            },
            &recorder,
        );
        assert_eq!(summary.files_processed, 2);
        assert_eq!(summary.files_failed, 1);
        assert!(summary.file_results.is_empty());
        assert_eq!(*recorder.errors.lock().unwrap(), vec![path]);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(payload.as_ref()), "static message");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
