//! Control directory layout under a volume root.
//!
//! ```text
//! <root>/
//! └── .usb/
//!     ├── bf.bin   # fingerprint filter
//!     └── tm.mk    # calibration anchor
//! ```
//!
//! None of the three control paths is ever fingerprinted.

use std::path::{Path, PathBuf};

pub const CONTROL_DIR: &str = ".usb";
pub const FILTER_PATH: &str = ".usb/bf.bin";
pub const ANCHOR_PATH: &str = ".usb/tm.mk";

/// Relative paths excluded from every walk.
pub const RESERVED_PATHS: [&str; 3] = [CONTROL_DIR, FILTER_PATH, ANCHOR_PATH];

/// Absolute control paths for one volume root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlPaths {
    pub dir: PathBuf,
    pub filter: PathBuf,
    pub anchor: PathBuf,
}

impl ControlPaths {
    pub fn new(root: &Path) -> Self {
        Self {
            dir: root.join(CONTROL_DIR),
            filter: root.join(FILTER_PATH),
            anchor: root.join(ANCHOR_PATH),
        }
    }
}

/// Whether `relative` (slash-separated, relative to the root) is a control path.
pub fn is_reserved(relative: &str) -> bool {
    RESERVED_PATHS.contains(&relative)
}

/// True when both control files exist under `root`.
pub fn is_sealed(root: &Path) -> bool {
    let paths = ControlPaths::new(root);
    paths.filter.is_file() && paths.anchor.is_file()
}
