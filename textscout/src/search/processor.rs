use std::path::Path;
use tracing::{debug, trace};

use super::matcher::TargetMatcher;
use crate::decoder::{Decoded, TextDecoder};
use crate::errors::SearchResult;
use crate::metrics::ScanMetrics;
use crate::results::FileResult;

/// Decodes one candidate and extracts its hits
#[derive(Debug)]
pub struct FileProcessor {
    decoder: TextDecoder,
    matcher: TargetMatcher,
    metrics: ScanMetrics,
}

impl FileProcessor {
    /// Creates a new FileProcessor from a decoder and a matcher
    pub fn new(decoder: TextDecoder, matcher: TargetMatcher) -> Self {
        Self {
            decoder,
            matcher,
            metrics: ScanMetrics::new(),
        }
    }

    /// Gets the decode metrics collected so far
    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    pub fn matcher(&self) -> &TargetMatcher {
        &self.matcher
    }

    /// Processes a file and returns its result, or `None` when it was skipped or has no hits
    pub fn process_file(&self, path: &Path) -> SearchResult<Option<FileResult>> {
        trace!("Processing file: {}", path.display());

        let document = match self.decoder.decode(path)? {
            Decoded::Text(document) => document,
            Decoded::Skipped(reason) => {
                self.metrics.record_skipped(reason);
                return Ok(None);
            }
        };
        self.metrics.record_decoded(&document);

        let hits = self.matcher.extract(&document.text);
        if hits.is_empty() {
            return Ok(None);
        }

        debug!(
            "Found {} hits in {} ({})",
            hits.len(),
            path.display(),
            document.encoding
        );
        Ok(Some(FileResult {
            path: path.to_path_buf(),
            encoding: document.encoding.to_string(),
            hits,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn processor(target: &str, max_bytes: u64) -> FileProcessor {
        FileProcessor::new(
            TextDecoder::with_default_encodings(max_bytes),
            TargetMatcher::new(target).unwrap(),
        )
    }

    #[test]
    fn test_process_matching_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "AAA\nסתם טקסט\nBBB\n").unwrap();

        let result = processor("סתם טקסט", 1024)
            .process_file(&path)
            .unwrap()
            .expect("file should match");
        assert_eq!(result.path, path);
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].line_number, 2);
        assert_eq!(result.hits[0].preview, "סתם טקסט");
    }

    #[test]
    fn test_process_non_matching_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "nothing to see\n").unwrap();

        let processor = processor("needle", 1024);
        assert!(processor.process_file(&path).unwrap().is_none());
        assert_eq!(processor.metrics().get_stats().files_decoded, 1);
    }

    #[test]
    fn test_process_oversized_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("big.txt");
        fs::write(&path, format!("needle{}", " ".repeat(100))).unwrap();

        let processor = processor("needle", 16);
        assert!(processor.process_file(&path).unwrap().is_none());
        assert_eq!(processor.metrics().get_stats().skipped_too_large, 1);
    }

    #[test]
    fn test_process_legacy_encoded_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.txt");
        // "x\nשלום\n" in windows-1255
        fs::write(&path, [b'x', b'\n', 0xF9, 0xEC, 0xE5, 0xED, b'\n']).unwrap();

        let result = processor("שלום", 1024)
            .process_file(&path)
            .unwrap()
            .expect("file should match");
        assert_eq!(result.encoding, "windows-1255");
        assert_eq!(result.hits[0].line_number, 2);
    }
}
