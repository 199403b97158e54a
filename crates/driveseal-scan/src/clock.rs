//! Filesystem clock model and timestamp correction.
//!
//! A host reads file timestamps through its filesystem clock, whose epoch and
//! representation need not match the wall clock. The per-run skew between the
//! two is measured once and threaded into the walk as a [`TimeCorrection`].

use std::time::{SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// Seconds since the Unix epoch, truncated toward zero.
pub fn unix_seconds(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        Err(e) => -i64::try_from(e.duration().as_secs()).unwrap_or(i64::MAX),
    }
}

fn unix_nanos(t: SystemTime) -> i128 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i128,
        Err(e) => -(e.duration().as_nanos() as i128),
    }
}

/// How one host turns time into filesystem-clock seconds.
pub trait FsClock {
    /// Whole seconds on the filesystem clock for a timestamp read from metadata.
    fn file_seconds(&self, modified: SystemTime) -> i64;

    /// Current filesystem-clock reading, in nanoseconds since its epoch.
    fn filesystem_now_nanos(&self) -> i128;

    /// Current wall-clock reading, in nanoseconds since the Unix epoch.
    fn wall_now_nanos(&self) -> i128;
}

/// The running host. Both clocks are `SystemTime`, so the skew is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemFsClock;

impl FsClock for SystemFsClock {
    fn file_seconds(&self, modified: SystemTime) -> i64 {
        unix_seconds(modified)
    }

    fn filesystem_now_nanos(&self) -> i128 {
        unix_nanos(SystemTime::now())
    }

    fn wall_now_nanos(&self) -> i128 {
        unix_nanos(SystemTime::now())
    }
}

/// A host with foreign clock conventions.
///
/// `epoch_offset` moves the filesystem clock's epoch relative to the Unix
/// epoch (for instance `11_644_473_600` for a 1601-based clock) and shows up
/// as skew. `mtime_shift` is added only to timestamps read from metadata, the
/// way a FAT volume's local-time stamps read back under another time zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatedClock {
    pub epoch_offset: i64,
    pub mtime_shift: i64,
}

impl SimulatedClock {
    pub fn new(epoch_offset: i64, mtime_shift: i64) -> Self {
        Self {
            epoch_offset,
            mtime_shift,
        }
    }
}

impl FsClock for SimulatedClock {
    fn file_seconds(&self, modified: SystemTime) -> i64 {
        unix_seconds(modified) + self.epoch_offset + self.mtime_shift
    }

    fn filesystem_now_nanos(&self) -> i128 {
        unix_nanos(SystemTime::now()) + i128::from(self.epoch_offset) * NANOS_PER_SEC
    }

    fn wall_now_nanos(&self) -> i128 {
        unix_nanos(SystemTime::now())
    }
}

/// Filesystem clock minus wall clock, in whole seconds, for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockSkew(i64);

impl ClockSkew {
    /// Sample both clocks once. The difference is taken at nanosecond
    /// precision and rounded to the nearest second, so the few nanoseconds
    /// between the two samples never tip the result across a boundary.
    pub fn measure<C: FsClock + ?Sized>(clock: &C) -> Self {
        let fs_now = clock.filesystem_now_nanos();
        let wall_now = clock.wall_now_nanos();
        let secs = (fs_now - wall_now + NANOS_PER_SEC / 2).div_euclid(NANOS_PER_SEC);
        Self(i64::try_from(secs).unwrap_or(if secs < 0 { i64::MIN } else { i64::MAX }))
    }

    pub const fn from_seconds(seconds: i64) -> Self {
        Self(seconds)
    }

    pub fn seconds(self) -> i64 {
        self.0
    }
}

/// Mapping from raw filesystem seconds to the value placed in a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeCorrection {
    /// `raw - skew`, the host-independent basis recorded at authorization.
    Authorize { skew: ClockSkew },
    /// `raw + time_diff`, where `time_diff` comes from the calibration anchor.
    Verify { time_diff: i64 },
}

impl TimeCorrection {
    pub fn apply(&self, raw_seconds: i64) -> i64 {
        match *self {
            TimeCorrection::Authorize { skew } => raw_seconds.wrapping_sub(skew.seconds()),
            TimeCorrection::Verify { time_diff } => raw_seconds.wrapping_add(time_diff),
        }
    }
}
