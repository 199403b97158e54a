//! # driveseal-scan
//!
//! Fingerprinting, clock calibration and the authorize/verify passes over a
//! removable volume.
//!
//! ## Flow
//!
//! - **Authorize**: measure clock skew, walk the root adding one fingerprint
//!   per directory and regular file to a fresh filter, save the filter, then
//!   write the calibration anchor from the saved filter's timestamp.
//! - **Verify**: read the anchor to get the time difference between the two
//!   hosts, load the filter, walk the root again and stop at the first
//!   fingerprint the filter does not contain.

pub mod anchor;
pub mod clock;
pub mod control;
pub mod fingerprint;
pub mod seal;

pub use anchor::{read_anchor, write_anchor, CalibrationAnchor, ANCHOR_LEN, ANCHOR_MAGIC};
pub use clock::{ClockSkew, FsClock, SimulatedClock, SystemFsClock, TimeCorrection};
pub use control::{is_reserved, is_sealed, ControlPaths};
pub use fingerprint::{walk_fingerprints, EntryKind, Fingerprint, DIRECTORY_SIZE};
pub use seal::{authorize_root, verify_root, AuthorizeReport, Sealer, VerifyReport};

use std::io;
use std::path::{Path, PathBuf};

use driveseal_bloom::BloomError;
use thiserror::Error;

/// Errors that can occur while sealing or verifying a volume
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Control file missing: {}", .0.display())]
    MissingControlFile(PathBuf),

    #[error("Signature mismatch in {}: expected {expected:#018x}, found {found:#018x}", .path.display())]
    SignatureMismatch {
        path: PathBuf,
        expected: u64,
        found: u64,
    },

    #[error("Malformed control file {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("Invalid filter configuration: {0}")]
    InvalidConfig(String),

    #[error("Verification failed: no recorded fingerprint for {path}")]
    VerificationFailed { path: String },
}

pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        ScanError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Like [`ScanError::io`], but a missing file is a missing control file.
    pub(crate) fn control_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => ScanError::MissingControlFile(path.to_path_buf()),
            _ => Self::io(path, source),
        }
    }

    pub(crate) fn from_bloom(err: BloomError, path: &Path) -> Self {
        match err {
            BloomError::Io(source) => Self::control_io(path, source),
            BloomError::NotFound(p) => ScanError::MissingControlFile(p),
            BloomError::SignatureMismatch { expected, found } => ScanError::SignatureMismatch {
                path: path.to_path_buf(),
                expected,
                found,
            },
            BloomError::MalformedHeader(reason) => ScanError::Malformed {
                path: path.to_path_buf(),
                reason,
            },
            BloomError::InvalidParameters(reason) => ScanError::InvalidConfig(reason),
        }
    }

    /// Status code reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ScanError::Io { .. } | ScanError::Walk(_) => StatusCode::IoFailure,
            ScanError::MissingControlFile(_)
            | ScanError::SignatureMismatch { .. }
            | ScanError::Malformed { .. } => StatusCode::SignatureMismatch,
            ScanError::InvalidConfig(_) => StatusCode::OptionError,
            ScanError::VerificationFailed { .. } => StatusCode::VerificationFailed,
        }
    }
}

/// Outcome of an operation as seen by callers that only want a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum StatusCode {
    IoFailure = -1,
    Success = 0,
    OptionError = 1,
    DeviceError = 2,
    SignatureMismatch = 3,
    VerificationFailed = 4,
}

impl StatusCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Process exit status; `IoFailure` becomes 255.
    pub fn exit_code(self) -> u8 {
        self.code() as u8
    }

    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => StatusCode::Success,
            Err(e) => e.status(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StatusCode::IoFailure.code(), -1);
        assert_eq!(StatusCode::Success.code(), 0);
        assert_eq!(StatusCode::SignatureMismatch.code(), 3);
        assert_eq!(StatusCode::VerificationFailed.code(), 4);
        assert_eq!(StatusCode::IoFailure.exit_code(), 255);
    }

    #[test]
    fn test_error_status_mapping() {
        let missing = ScanError::MissingControlFile(PathBuf::from("/r/.usb/tm.mk"));
        assert_eq!(missing.status(), StatusCode::SignatureMismatch);

        let io = ScanError::io(Path::new("/r"), io::Error::other("boom"));
        assert_eq!(io.status(), StatusCode::IoFailure);

        let failed = ScanError::VerificationFailed {
            path: "docs/readme.txt".into(),
        };
        assert_eq!(failed.status(), StatusCode::VerificationFailed);
    }

    #[test]
    fn test_control_io_not_found() {
        let err = ScanError::control_io(
            Path::new("/r/.usb/bf.bin"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(matches!(err, ScanError::MissingControlFile(_)));

        let err = ScanError::control_io(
            Path::new("/r/.usb/bf.bin"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.status(), StatusCode::IoFailure);
    }

    #[test]
    fn test_bloom_error_mapping() {
        let path = Path::new("/r/.usb/bf.bin");
        let err = ScanError::from_bloom(
            BloomError::SignatureMismatch {
                expected: 1,
                found: 2,
            },
            path,
        );
        assert_eq!(err.status(), StatusCode::SignatureMismatch);

        let err = ScanError::from_bloom(BloomError::MalformedHeader("short".into()), path);
        assert_eq!(err.status(), StatusCode::SignatureMismatch);

        let err = ScanError::from_bloom(BloomError::InvalidParameters("zero".into()), path);
        assert_eq!(err.status(), StatusCode::OptionError);
    }

    #[test]
    fn test_status_of_result() {
        let ok: Result<()> = Ok(());
        assert_eq!(StatusCode::of(&ok), StatusCode::Success);
    }
}
