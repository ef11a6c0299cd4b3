//! Best-effort decoding of candidate files into text.
//!
//! A file is read at most once and only when it fits under the size ceiling. The bytes are
//! then tried against an ordered list of strict encodings; the first one that decodes the
//! whole buffer without a single invalid sequence wins. When none do, the bytes are decoded
//! as UTF-8 with invalid sequences dropped and labelled [`LOSSY_LABEL`].
//!
//! Decoding failure is data: a skipped file comes back as [`Decoded::Skipped`] with the
//! reason. Only read failures of an unexpected kind and failure to allocate the read buffer
//! are returned as errors.
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, WINDOWS_1255};
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::{debug, trace};

use crate::errors::{SearchError, SearchResult};

/// Label reported when no strict encoding accepted the file
pub const LOSSY_LABEL: &str = "utf-8-ignore";

/// Strict encodings tried by default, in order
pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "utf-16", "utf-16-le", "utf-16-be", "windows-1255"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// One strict decoding attempt in the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// UTF-16 with byte order taken from the BOM, native order without one
    Utf16,
    Utf16Le,
    Utf16Be,
    /// A single-byte legacy code page
    Legacy(&'static Encoding),
}

impl TextEncoding {
    /// Resolves a label such as `utf-16-le` or `windows-1255`
    pub fn from_label(label: &str) -> SearchResult<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "utf-16" | "utf16" => Ok(TextEncoding::Utf16),
            "utf-16-le" | "utf-16le" | "utf16le" => Ok(TextEncoding::Utf16Le),
            "utf-16-be" | "utf-16be" | "utf16be" => Ok(TextEncoding::Utf16Be),
            _ => match Encoding::for_label(normalized.as_bytes()) {
                Some(encoding) if encoding.is_single_byte() => Ok(TextEncoding::Legacy(encoding)),
                _ => Err(SearchError::unknown_encoding(label)),
            },
        }
    }

    /// Resolves an ordered list of labels
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> SearchResult<Vec<Self>> {
        labels
            .iter()
            .map(|label| Self::from_label(label.as_ref()))
            .collect()
    }

    /// The label reported alongside text decoded with this encoding
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16 => "utf-16",
            TextEncoding::Utf16Le => "utf-16-le",
            TextEncoding::Utf16Be => "utf-16-be",
            TextEncoding::Legacy(encoding) => legacy_label(encoding),
        }
    }

    /// Decodes the whole buffer, or returns `None` at the first invalid sequence
    pub fn decode_strict(&self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(bytes).ok().map(str::to_owned)
            }
            TextEncoding::Utf16 => {
                let (encoding, body) = match bytes {
                    [0xFF, 0xFE, rest @ ..] => (UTF_16LE, rest),
                    [0xFE, 0xFF, rest @ ..] => (UTF_16BE, rest),
                    _ if cfg!(target_endian = "big") => (UTF_16BE, bytes),
                    _ => (UTF_16LE, bytes),
                };
                decode_without_replacement(encoding, body)
            }
            TextEncoding::Utf16Le => decode_without_replacement(UTF_16LE, bytes),
            TextEncoding::Utf16Be => decode_without_replacement(UTF_16BE, bytes),
            TextEncoding::Legacy(encoding) => decode_without_replacement(encoding, bytes)
                .filter(|text| !has_unassigned_code_points(encoding, text)),
        }
    }
}

/// The WHATWG tables fill the holes of the Windows code pages: 0x80..=0x9F decode to C1
/// controls and windows-1255 gains U+05BA at 0xCA. Those bytes are unassigned in the code
/// pages themselves, so text containing them is not a strict decode.
fn has_unassigned_code_points(encoding: &'static Encoding, text: &str) -> bool {
    if !encoding.name().starts_with("windows-") {
        return false;
    }
    text.chars().any(|c| {
        ('\u{80}'..='\u{9F}').contains(&c) || (encoding == WINDOWS_1255 && c == '\u{05BA}')
    })
}

fn decode_without_replacement(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

/// encoding_rs names are canonical mixed-case (`windows-1255`, `ISO-8859-8`)
fn legacy_label(encoding: &'static Encoding) -> &'static str {
    encoding.name()
}

/// Text produced from a candidate, with the label of the encoding that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDocument {
    pub text: String,
    pub encoding: &'static str,
}

impl DecodedDocument {
    pub fn is_lossy(&self) -> bool {
        self.encoding == LOSSY_LABEL
    }
}

/// Why a candidate produced no text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    TooLarge { size: u64, limit: u64 },
    NotAFile,
    Unreadable(io::ErrorKind),
}

/// Outcome of decoding one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Text(DecodedDocument),
    Skipped(SkipReason),
}

/// Reads candidates and decodes them with an ordered encoding fallback
#[derive(Debug, Clone)]
pub struct TextDecoder {
    encodings: Vec<TextEncoding>,
    max_bytes: u64,
}

impl TextDecoder {
    pub fn new(encodings: Vec<TextEncoding>, max_bytes: u64) -> Self {
        Self {
            encodings,
            max_bytes,
        }
    }

    /// A decoder using [`DEFAULT_ENCODINGS`]
    pub fn with_default_encodings(max_bytes: u64) -> Self {
        let encodings = DEFAULT_ENCODINGS
            .iter()
            .filter_map(|label| TextEncoding::from_label(label).ok())
            .collect();
        Self::new(encodings, max_bytes)
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn encodings(&self) -> &[TextEncoding] {
        &self.encodings
    }

    /// Reads and decodes a file.
    ///
    /// Files over the size ceiling are rejected from their metadata alone, without
    /// opening them.
    pub fn decode(&self, path: &Path) -> SearchResult<Decoded> {
        let metadata = match path.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                trace!("Cannot stat {}: {}", path.display(), e);
                return Ok(Decoded::Skipped(SkipReason::Unreadable(e.kind())));
            }
        };
        if !metadata.is_file() {
            return Ok(Decoded::Skipped(SkipReason::NotAFile));
        }
        if metadata.len() > self.max_bytes {
            trace!(
                "Skipping {} ({} bytes > {} byte limit)",
                path.display(),
                metadata.len(),
                self.max_bytes
            );
            return Ok(Decoded::Skipped(SkipReason::TooLarge {
                size: metadata.len(),
                limit: self.max_bytes,
            }));
        }

        let bytes = match self.read_bounded(path, metadata.len())? {
            Ok(bytes) => bytes,
            Err(reason) => return Ok(Decoded::Skipped(reason)),
        };
        Ok(Decoded::Text(self.decode_bytes(bytes)))
    }

    /// Decodes an in-memory buffer; never fails
    pub fn decode_bytes(&self, bytes: Vec<u8>) -> DecodedDocument {
        for encoding in &self.encodings {
            if let Some(text) = encoding.decode_strict(&bytes) {
                trace!("Decoded {} bytes as {}", bytes.len(), encoding.label());
                return DecodedDocument {
                    text,
                    encoding: encoding.label(),
                };
            }
        }
        debug!("No strict encoding accepted {} bytes, decoding lossily", bytes.len());
        let text = bytes
            .utf8_chunks()
            .map(|chunk| chunk.valid())
            .collect::<String>();
        DecodedDocument {
            text,
            encoding: LOSSY_LABEL,
        }
    }

    /// Reads up to the size ceiling. The outer error is for failures the caller must hear
    /// about; the inner one is an ordinary skip.
    fn read_bounded(
        &self,
        path: &Path,
        expected_len: u64,
    ) -> SearchResult<Result<Vec<u8>, SkipReason>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => return classify_read_error(path, e),
        };

        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(expected_len as usize)
            .map_err(|_| SearchError::resource_exhausted(path, expected_len))?;

        // The file may have grown since it was stat'ed
        let mut reader = file.take(self.max_bytes.saturating_add(1));
        if let Err(e) = reader.read_to_end(&mut bytes) {
            return classify_read_error(path, e);
        }
        if bytes.len() as u64 > self.max_bytes {
            return Ok(Err(SkipReason::TooLarge {
                size: bytes.len() as u64,
                limit: self.max_bytes,
            }));
        }
        Ok(Ok(bytes))
    }
}

fn classify_read_error(
    path: &Path,
    e: io::Error,
) -> SearchResult<Result<Vec<u8>, SkipReason>> {
    match e.kind() {
        io::ErrorKind::NotFound
        | io::ErrorKind::PermissionDenied
        | io::ErrorKind::InvalidInput
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => {
            trace!("Skipping unreadable {}: {}", path.display(), e);
            Ok(Err(SkipReason::Unreadable(e.kind())))
        }
        _ => Err(SearchError::io(path, e)),
    }
}
