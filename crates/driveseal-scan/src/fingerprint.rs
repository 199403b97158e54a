//! Per-entry fingerprints and the tree walk that produces them.
//!
//! A fingerprint is `relative_path ++ corrected_mtime ++ size` with no
//! separators. The path keeps the raw bytes of every name; the two numbers
//! are decimal text. Directories always report [`DIRECTORY_SIZE`];
//! symlinks, devices, sockets and the like are never fingerprinted.

use std::fmt;
use std::path::Path;

use driveseal_config::{log_walk_debug, log_walk_trace};
use walkdir::WalkDir;

use crate::clock::{FsClock, TimeCorrection};
use crate::control::is_reserved;
use crate::{Result, ScanError};

/// Size recorded for every directory, independent of its contents.
pub const DIRECTORY_SIZE: u64 = 0x1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

impl EntryKind {
    fn of(file_type: std::fs::FileType) -> Option<Self> {
        if file_type.is_dir() {
            Some(EntryKind::Directory)
        } else if file_type.is_file() {
            Some(EntryKind::File)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(Vec<u8>);

impl Fingerprint {
    pub fn new(relative_path: &[u8], corrected_mtime: i64, kind: EntryKind, len: u64) -> Self {
        let size = match kind {
            EntryKind::Directory => DIRECTORY_SIZE,
            EntryKind::File => len,
        };
        let mut bytes = Vec::with_capacity(relative_path.len() + 32);
        bytes.extend_from_slice(relative_path);
        bytes.extend_from_slice(corrected_mtime.to_string().as_bytes());
        bytes.extend_from_slice(size.to_string().as_bytes());
        Fingerprint(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Raw bytes of `path` relative to `root`, with `/` separators and no
/// leading slash. Names that are not valid UTF-8 are kept byte for byte.
pub fn relative_path_bytes(root: &Path, path: &Path) -> Vec<u8> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let mut out = Vec::new();
    for (i, component) in rel.components().enumerate() {
        if i > 0 {
            out.push(b'/');
        }
        out.extend_from_slice(component.as_os_str().as_encoded_bytes());
    }
    out
}

/// Walk `root` in pre-order and hand every fingerprint to `visit`.
///
/// The root itself and the control paths are skipped; entries inside the
/// control directory other than the two control files are still visited.
/// The walk stops at the first error from the filesystem or from `visit`.
/// Returns the number of fingerprints visited.
pub fn walk_fingerprints<C, F>(
    root: &Path,
    clock: &C,
    correction: TimeCorrection,
    sorted: bool,
    mut visit: F,
) -> Result<u64>
where
    C: FsClock + ?Sized,
    F: FnMut(&str, &Fingerprint) -> Result<()>,
{
    let mut walker = WalkDir::new(root).min_depth(1).follow_links(false);
    if sorted {
        walker = walker.sort_by_file_name();
    }

    let mut visited = 0u64;
    for entry in walker {
        let entry = entry?;
        let rel_bytes = relative_path_bytes(root, entry.path());
        let rel = String::from_utf8_lossy(&rel_bytes);
        if is_reserved(&rel) {
            continue;
        }
        let Some(kind) = EntryKind::of(entry.file_type()) else {
            log_walk_trace!("Skipping special entry", path = &*rel);
            continue;
        };

        let metadata = entry.metadata()?;
        let modified = metadata
            .modified()
            .map_err(|e| ScanError::io(entry.path(), e))?;
        let mtime = correction.apply(clock.file_seconds(modified));
        let fingerprint = Fingerprint::new(&rel_bytes, mtime, kind, metadata.len());

        log_walk_trace!("Fingerprint", fingerprint = tracing::field::display(&fingerprint));
        visit(&*rel, &fingerprint)?;
        visited += 1;
    }

    log_walk_debug!(
        "Walk complete",
        root = tracing::field::display(root.display()),
        entries = visited,
    );
    Ok(visited)
}
