use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::debug;

use crate::config::ReportFormat;
use crate::errors::{SearchError, SearchResult};
use crate::results::{MatchHit, ScanSummary};

/// Column names of the CSV report, in order
pub const CSV_HEADER: [&str; 4] = ["path", "encoding", "line_number", "line_preview"];

#[derive(Serialize)]
struct JsonFile<'a> {
    path: String,
    encoding: &'a str,
    matches: &'a [MatchHit],
}

/// Writes the summary's hits to `path`
pub fn write_report(summary: &ScanSummary, path: &Path, format: ReportFormat) -> SearchResult<()> {
    let file = File::create(path).map_err(|e| SearchError::report(path, e.to_string()))?;
    let writer = BufWriter::new(file);
    match format {
        ReportFormat::Csv => write_csv(summary, writer)?,
        ReportFormat::Json => write_json(summary, writer)?,
    }

    debug!(
        "Wrote {} rows to {}",
        summary.total_hits,
        path.display()
    );
    Ok(())
}

/// One row per hit, grouped by file, preceded by [`CSV_HEADER`]
pub fn write_csv<W: Write>(summary: &ScanSummary, writer: W) -> SearchResult<()> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(CSV_HEADER)?;
    for row in summary.rows() {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

/// An array of `{path, encoding, matches}` objects in summary order
pub fn write_json<W: Write>(summary: &ScanSummary, mut writer: W) -> SearchResult<()> {
    let files: Vec<JsonFile<'_>> = summary
        .file_results
        .iter()
        .map(|file| JsonFile {
            path: file.path.display().to_string(),
            encoding: &file.encoding,
            matches: &file.hits,
        })
        .collect();
    serde_json::to_writer_pretty(&mut writer, &files)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
