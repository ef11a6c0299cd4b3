//! Recursive discovery of scan candidates under a root.
//!
//! [`walk`] returns a lazy [`CandidateWalk`] built on `ignore`'s walker with every
//! ignore-file filter switched off. Directory pruning happens in the walker's entry
//! filter, before a directory is opened, so denied and hidden subtrees are never read.
//!
//! Errors inside a subtree (permission denied, a directory vanishing mid-walk, a symlink
//! loop when following links) skip that subtree only. A root that cannot be opened at all
//! is reported by [`walk`] itself so the caller can warn and move on to the next root.
use ignore::{DirEntry, WalkBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

use crate::errors::{SearchError, SearchResult};
use crate::filters::EntryFilter;
use crate::search::engine::{CancellationToken, ScanObserver};

/// A file eligible for scanning
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    path: PathBuf,
}

impl Candidate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Traversal policy for a walk
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkOptions {
    /// Descend into symlinked directories (and junctions)
    pub follow_symlinks: bool,
    /// Include dot-prefixed files and directories on POSIX-like systems
    pub include_hidden: bool,
}

/// Lazily yields the candidates below one root
pub struct CandidateWalk {
    inner: ignore::Walk,
    filter: EntryFilter,
    cancel: Option<CancellationToken>,
}

impl std::fmt::Debug for CandidateWalk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateWalk")
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Starts a walk below `root`.
///
/// Fails only when the root itself cannot be stat'ed or, for a directory, listed. The walk
/// may be dropped at any point; directory handles are owned by the iterator and closed
/// with it.
pub fn walk(root: &Path, options: WalkOptions) -> SearchResult<CandidateWalk> {
    let metadata = fs::metadata(root).map_err(|e| SearchError::root_unavailable(root, e))?;
    if metadata.is_dir() {
        fs::read_dir(root).map_err(|e| SearchError::root_unavailable(root, e))?;
    }

    let filter = EntryFilter::new(options.include_hidden);
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .hidden(false)
        .follow_links(options.follow_symlinks)
        .filter_entry(move |entry| {
            // The root is always walked, whatever it is called
            entry.depth() == 0 || !is_dir(entry) || !filter.prunes_dir(entry.file_name())
        });

    debug!(
        "Walking {} (follow_symlinks={}, include_hidden={})",
        root.display(),
        options.follow_symlinks,
        options.include_hidden
    );

    Ok(CandidateWalk {
        inner: builder.build(),
        filter,
        cancel: None,
    })
}

impl CandidateWalk {
    /// Ends the walk as soon as `cancel` fires, even between candidates
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

fn is_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_some_and(|ft| ft.is_dir())
}

/// Regular files, including symlinks that resolve to one
fn is_file(entry: &DirEntry) -> bool {
    match entry.file_type() {
        Some(ft) if ft.is_file() => true,
        Some(ft) if ft.is_symlink() => entry.path().metadata().is_ok_and(|m| m.is_file()),
        _ => false,
    }
}

impl Iterator for CandidateWalk {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            if self.is_cancelled() {
                return None;
            }
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    trace!("Skipping subtree: {}", err);
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            if is_file(&entry) && self.filter.accepts_file(entry.file_name()) {
                return Some(Candidate::new(entry.into_path()));
            }
        }
    }
}

/// Drains the walks of every root into one candidate list.
///
/// Roots that cannot be walked are reported to the observer and contribute nothing.
/// Stops early, keeping what was found so far, once `cancel` is triggered.
pub fn collect_candidates(
    roots: &[PathBuf],
    options: WalkOptions,
    cancel: &CancellationToken,
    observer: &dyn ScanObserver,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for root in roots {
        if cancel.is_cancelled() {
            break;
        }
        match walk(root, options) {
            Ok(walk) => {
                let before = candidates.len();
                candidates.extend(walk.with_cancel(cancel.clone()));
                debug!(
                    "Found {} candidates under {}",
                    candidates.len() - before,
                    root.display()
                );
            }
            Err(e) => {
                debug!("Could not walk {}: {}", root.display(), e);
                observer.on_root_unavailable(root, &e);
            }
        }
    }
    info!("Discovered {} candidate files", candidates.len());
    candidates
}
