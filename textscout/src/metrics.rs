use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use crate::decoder::{DecodedDocument, SkipReason};

/// Counters shared by all workers of a scan
#[derive(Debug, Clone)]
pub struct ScanMetrics {
    files_decoded: Arc<AtomicU64>,
    bytes_decoded: Arc<AtomicU64>,
    lossy_decodes: Arc<AtomicU64>,
    skipped_too_large: Arc<AtomicU64>,
    skipped_unreadable: Arc<AtomicU64>,
    encodings: Arc<DashMap<&'static str, u64>>,
}

impl ScanMetrics {
    /// Creates a new ScanMetrics instance
    pub fn new() -> Self {
        Self {
            files_decoded: Arc::new(AtomicU64::new(0)),
            bytes_decoded: Arc::new(AtomicU64::new(0)),
            lossy_decodes: Arc::new(AtomicU64::new(0)),
            skipped_too_large: Arc::new(AtomicU64::new(0)),
            skipped_unreadable: Arc::new(AtomicU64::new(0)),
            encodings: Arc::new(DashMap::new()),
        }
    }

    /// Records a successfully decoded document
    pub fn record_decoded(&self, document: &DecodedDocument) {
        self.files_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_decoded
            .fetch_add(document.text.len() as u64, Ordering::Relaxed);
        if document.is_lossy() {
            self.lossy_decodes.fetch_add(1, Ordering::Relaxed);
        }
        *self.encodings.entry(document.encoding).or_insert(0) += 1;
    }

    /// Records a candidate the decoder passed over
    pub fn record_skipped(&self, reason: SkipReason) {
        match reason {
            SkipReason::TooLarge { .. } => {
                self.skipped_too_large.fetch_add(1, Ordering::Relaxed);
            }
            SkipReason::NotAFile | SkipReason::Unreadable(_) => {
                self.skipped_unreadable.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!("Skipped candidate: {:?}", reason);
    }

    /// Gets the current counters
    pub fn get_stats(&self) -> ScanStats {
        let mut encodings: Vec<(&'static str, u64)> = self
            .encodings
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        encodings.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        ScanStats {
            files_decoded: self.files_decoded.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
            lossy_decodes: self.lossy_decodes.load(Ordering::Relaxed),
            skipped_too_large: self.skipped_too_large.load(Ordering::Relaxed),
            skipped_unreadable: self.skipped_unreadable.load(Ordering::Relaxed),
            encodings,
        }
    }

    /// Logs the current counters
    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            "Decode stats:\n\
             Files decoded: {} ({} bytes of text)\n\
             Lossy decodes: {}\n\
             Skipped (too large/unreadable): {}/{}\n\
             Encodings: {:?}",
            stats.files_decoded,
            stats.bytes_decoded,
            stats.lossy_decodes,
            stats.skipped_too_large,
            stats.skipped_unreadable,
            stats.encodings
        );
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`ScanMetrics`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub files_decoded: u64,
    pub bytes_decoded: u64,
    pub lossy_decodes: u64,
    pub skipped_too_large: u64,
    pub skipped_unreadable: u64,
    /// Documents per encoding label, most frequent first
    pub encodings: Vec<(&'static str, u64)>,
}
