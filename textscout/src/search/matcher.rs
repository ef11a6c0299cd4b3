use crate::errors::{SearchError, SearchResult};
use crate::results::MatchHit;

/// Longest preview kept for a hit line, in characters
pub const PREVIEW_LIMIT: usize = 200;

/// Appended to previews cut at [`PREVIEW_LIMIT`]
pub const TRUNCATION_MARKER: char = '…';

/// Finds the lines of a decoded document that contain the target
#[derive(Debug, Clone)]
pub struct TargetMatcher {
    target: String,
}

impl TargetMatcher {
    /// Creates a matcher for an exact, case-sensitive substring. The target cannot be empty.
    pub fn new(target: impl Into<String>) -> SearchResult<Self> {
        let target = target.into();
        if target.is_empty() {
            return Err(SearchError::invalid_target("target must not be empty"));
        }
        Ok(Self { target })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns one hit per line containing the target, in line order
    pub fn extract(&self, text: &str) -> Vec<MatchHit> {
        // Most documents do not match at all; skip line splitting for them
        if !text.contains(self.target.as_str()) {
            return Vec::new();
        }

        UniversalLines::new(text)
            .enumerate()
            .filter(|(_, line)| line.contains(self.target.as_str()))
            .map(|(index, line)| {
                let (preview, truncated) = make_preview(line);
                MatchHit {
                    line_number: index + 1,
                    preview,
                    truncated,
                }
            })
            .collect()
    }
}

/// Trims a line and cuts it to [`PREVIEW_LIMIT`] characters plus a marker
pub fn make_preview(line: &str) -> (String, bool) {
    let trimmed = line.trim();
    match trimmed.char_indices().nth(PREVIEW_LIMIT) {
        Some((cut, _)) => {
            let mut preview = String::with_capacity(cut + TRUNCATION_MARKER.len_utf8());
            preview.push_str(&trimmed[..cut]);
            preview.push(TRUNCATION_MARKER);
            (preview, true)
        }
        None => (trimmed.to_string(), false),
    }
}

/// Splits text on `\n`, `\r\n` and `\r`. A trailing terminator does not start an extra line.
#[derive(Debug, Clone)]
pub struct UniversalLines<'a> {
    rest: &'a str,
}

impl<'a> UniversalLines<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { rest: text }
    }
}

impl<'a> Iterator for UniversalLines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }
        match self.rest.find(['\n', '\r']) {
            Some(end) => {
                let line = &self.rest[..end];
                let terminator = if self.rest[end..].starts_with("\r\n") { 2 } else { 1 };
                self.rest = &self.rest[end + terminator..];
                Some(line)
            }
            None => {
                let line = self.rest;
                self.rest = "";
                Some(line)
            }
        }
    }
}
