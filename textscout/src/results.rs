//! Scan result types and the aggregation of per-file results into a summary.
//!
//! A [`FileResult`] only exists for a file with at least one hit. The summary keeps file
//! results in the order workers finished them, which varies between runs; compare two
//! summaries with [`ScanSummary::sorted_results`] when order does not matter.
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A line of a file that contains the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchHit {
    /// 1-based line number in the decoded text
    pub line_number: usize,
    /// The line, trimmed and cut to at most 200 characters
    pub preview: String,
    /// Whether the preview was cut (and ends with the truncation marker)
    pub truncated: bool,
}

/// All hits found in a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    /// The path to the file
    pub path: PathBuf,
    /// Label of the encoding the file was decoded with
    pub encoding: String,
    /// Hits in ascending line order
    pub hits: Vec<MatchHit>,
}

impl FileResult {
    pub fn line_numbers(&self) -> impl Iterator<Item = usize> + '_ {
        self.hits.iter().map(|hit| hit.line_number)
    }
}

/// One row of the tabular report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow<'a> {
    pub path: String,
    pub encoding: &'a str,
    pub line_number: usize,
    pub line_preview: &'a str,
}

/// The complete outcome of a scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanSummary {
    /// Candidates handed to the coordinator
    pub files_discovered: usize,
    /// Candidates whose task finished, with or without hits
    pub files_processed: usize,
    /// Files with at least one hit
    pub files_matched: usize,
    /// Total hit lines across all files
    pub total_hits: usize,
    /// Tasks that ended in an error
    pub files_failed: usize,
    /// Whether the run stopped early
    pub cancelled: bool,
    /// Results per matching file, in completion order
    pub file_results: Vec<FileResult>,
}

impl ScanSummary {
    /// Creates an empty summary for a run over `files_discovered` candidates
    pub fn new(files_discovered: usize) -> Self {
        Self {
            files_discovered,
            ..Default::default()
        }
    }

    /// Adds a file result to the summary
    pub fn add_file_result(&mut self, file_result: FileResult) {
        if file_result.hits.is_empty() {
            return;
        }
        self.files_matched += 1;
        self.total_hits += file_result.hits.len();
        self.file_results.push(file_result);
    }

    /// Looks up the result for a file
    pub fn result_for(&self, path: &Path) -> Option<&FileResult> {
        self.file_results.iter().find(|r| r.path == path)
    }

    /// File results ordered by path
    pub fn sorted_results(&self) -> Vec<&FileResult> {
        let mut results: Vec<&FileResult> = self.file_results.iter().collect();
        results.sort_by(|a, b| a.path.cmp(&b.path));
        results
    }

    /// Report rows, one per hit, grouped by file in summary order
    pub fn rows(&self) -> impl Iterator<Item = ReportRow<'_>> + '_ {
        self.file_results.iter().flat_map(|file| {
            let path = file.path.display().to_string();
            file.hits.iter().map(move |hit| ReportRow {
                path: path.clone(),
                encoding: &file.encoding,
                line_number: hit.line_number,
                line_preview: &hit.preview,
            })
        })
    }
}
