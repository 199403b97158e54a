//! Calibration anchor: the filter file's own timestamp as a shared reference.
//!
//! At the end of Authorize the filter file's filesystem time, minus that
//! host's skew, is stored as `base_time`. At Verify the same file is stat'ed
//! again on the current host, and `base_time - observed` is the correction to
//! add to every raw timestamp of the walk. As long as nothing rewrites the
//! filter file in between, both passes see the same real instant for it.
//!
//! File layout (16 bytes, big-endian):
//!
//! ```text
//! offset  size  field
//! 0       8     magic
//! 8       8     base_time (i64 seconds)
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use driveseal_bloom::control_tempfile_in;
use driveseal_config::{log_calib_debug, log_calib_info};

use crate::clock::{ClockSkew, FsClock};
use crate::control::ControlPaths;
use crate::{Result, ScanError};

/// Format tag at offset 0 of the anchor file.
pub const ANCHOR_MAGIC: u64 = 0x5245_544C_4946_4D43;

/// Encoded anchor length in bytes.
pub const ANCHOR_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationAnchor {
    pub base_time: i64,
}

impl CalibrationAnchor {
    pub fn encode(&self) -> [u8; ANCHOR_LEN] {
        let mut buf = [0u8; ANCHOR_LEN];
        buf[..8].copy_from_slice(&ANCHOR_MAGIC.to_be_bytes());
        buf[8..].copy_from_slice(&self.base_time.to_be_bytes());
        buf
    }

    /// Parse an anchor image; `path` is only used for error context.
    pub fn decode(bytes: &[u8], path: &Path) -> Result<Self> {
        if bytes.len() < ANCHOR_LEN {
            return Err(ScanError::Malformed {
                path: path.to_path_buf(),
                reason: format!("need {} bytes, found {}", ANCHOR_LEN, bytes.len()),
            });
        }
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[..8]);
        let magic = u64::from_be_bytes(magic);
        if magic != ANCHOR_MAGIC {
            return Err(ScanError::SignatureMismatch {
                path: path.to_path_buf(),
                expected: ANCHOR_MAGIC,
                found: magic,
            });
        }
        let mut base = [0u8; 8];
        base.copy_from_slice(&bytes[8..ANCHOR_LEN]);
        Ok(Self {
            base_time: i64::from_be_bytes(base),
        })
    }
}

/// Filesystem-clock seconds of the saved filter file on this host.
fn filter_seconds<C: FsClock + ?Sized>(paths: &ControlPaths, clock: &C) -> Result<i64> {
    let modified = fs::metadata(&paths.filter)
        .and_then(|m| m.modified())
        .map_err(|e| ScanError::control_io(&paths.filter, e))?;
    Ok(clock.file_seconds(modified))
}

/// Record the anchor for a filter that has just been saved.
pub fn write_anchor<C: FsClock + ?Sized>(
    paths: &ControlPaths,
    clock: &C,
    skew: ClockSkew,
) -> Result<CalibrationAnchor> {
    let filter_time = filter_seconds(paths, clock)?;
    let anchor = CalibrationAnchor {
        base_time: filter_time.wrapping_sub(skew.seconds()),
    };

    fs::create_dir_all(&paths.dir).map_err(|e| ScanError::io(&paths.dir, e))?;
    let mut tmp = control_tempfile_in(&paths.dir).map_err(|e| ScanError::io(&paths.dir, e))?;
    tmp.write_all(&anchor.encode())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| ScanError::io(&paths.anchor, e))?;
    tmp.persist(&paths.anchor)
        .map_err(|e| ScanError::io(&paths.anchor, e.error))?;

    log_calib_info!(
        "Wrote calibration anchor",
        filter_time = filter_time,
        skew = skew.seconds(),
        base_time = anchor.base_time,
    );
    Ok(anchor)
}

/// Read the anchor and return the `time_diff` to add to raw timestamps.
pub fn read_anchor<C: FsClock + ?Sized>(paths: &ControlPaths, clock: &C) -> Result<i64> {
    let bytes = fs::read(&paths.anchor).map_err(|e| ScanError::control_io(&paths.anchor, e))?;
    let anchor = CalibrationAnchor::decode(&bytes, &paths.anchor)?;
    let filter_time = filter_seconds(paths, clock)?;
    let time_diff = anchor.base_time.wrapping_sub(filter_time);

    log_calib_debug!(
        "Read calibration anchor",
        base_time = anchor.base_time,
        filter_time = filter_time,
        time_diff = time_diff,
    );
    Ok(time_diff)
}
