//! Name-based rules deciding which directories are descended into and which files become
//! scan candidates.
//!
//! All checks work on a single path component (the entry's basename), never on the full
//! path, so they give the same answer no matter where in the tree an entry sits.
//!
//! ```rust,ignore
//! if filters.prunes_dir(entry.file_name()) {
//!     // never descend
//! }
//! if filters.accepts_file(entry.file_name()) {
//!     // yield as a candidate
//! }
//! ```
use glob::{MatchOptions, Pattern};
use once_cell::sync::Lazy;
use std::ffi::OsStr;

/// Directory names that are never descended into, compared case-insensitively
pub const SKIPPED_DIR_NAMES: &[&str] = &[
    "$recycle.bin",
    "system volume information",
    "proc",
    "dev",
    "sys",
    "run",
    "lost+found",
];

/// Glob every candidate file name must match, compared case-insensitively
pub const TEXT_FILE_GLOB: &str = "*.txt";

static TEXT_FILE_PATTERN: Lazy<Pattern> =
    Lazy::new(|| Pattern::new(TEXT_FILE_GLOB).expect("TEXT_FILE_GLOB is a valid glob"));

const CASE_INSENSITIVE: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Checks if a directory name is in the deny-set
pub fn is_skipped_dir_name(name: &OsStr) -> bool {
    let name = name.to_string_lossy().to_lowercase();
    SKIPPED_DIR_NAMES.iter().any(|skipped| *skipped == name)
}

/// Checks if a name is hidden by the POSIX leading-dot convention
pub fn is_hidden_name(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Checks if a file name matches [`TEXT_FILE_GLOB`]
pub fn is_text_file_name(name: &OsStr) -> bool {
    TEXT_FILE_PATTERN.matches_with(&name.to_string_lossy(), CASE_INSENSITIVE)
}

/// The pruning and selection policy applied by the directory walker
#[derive(Debug, Clone, Copy)]
pub struct EntryFilter {
    hide_dotted: bool,
}

impl EntryFilter {
    /// Creates a filter for the running platform. Leading-dot names are only treated as
    /// hidden on POSIX-like systems.
    pub fn new(include_hidden: bool) -> Self {
        Self::for_platform(include_hidden, cfg!(windows))
    }

    /// Creates a filter as it would behave on the given platform family
    pub fn for_platform(include_hidden: bool, windows: bool) -> Self {
        Self {
            hide_dotted: !include_hidden && !windows,
        }
    }

    /// Whether a directory with this basename must not be descended into
    pub fn prunes_dir(&self, name: &OsStr) -> bool {
        is_skipped_dir_name(name) || (self.hide_dotted && is_hidden_name(name))
    }

    /// Whether a file with this basename is a scan candidate
    pub fn accepts_file(&self, name: &OsStr) -> bool {
        !(self.hide_dotted && is_hidden_name(name)) && is_text_file_name(name)
    }
}
