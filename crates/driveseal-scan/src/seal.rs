//! Authorize and Verify passes over a volume root.

use std::path::Path;

use driveseal_bloom::BloomFilter;
use driveseal_config::{log_calib_debug, log_seal_info, log_seal_warn, Config};

use crate::anchor::{read_anchor, write_anchor};
use crate::clock::{ClockSkew, FsClock, SystemFsClock, TimeCorrection};
use crate::control::ControlPaths;
use crate::fingerprint::walk_fingerprints;
use crate::{Result, ScanError, StatusCode};

/// Summary of a successful Authorize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeReport {
    /// Fingerprints added to the filter
    pub entries: u64,
    pub bit_count: u32,
    pub hash_rounds: u32,
    /// Value stored in the calibration anchor
    pub base_time: i64,
}

/// Summary of a successful Verify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Fingerprints found in the filter
    pub entries: u64,
    /// Correction applied to raw timestamps on this host
    pub time_diff: i64,
}

/// Runs Authorize/Verify with a fixed configuration and host clock.
#[derive(Debug, Clone)]
pub struct Sealer<C: FsClock = SystemFsClock> {
    config: Config,
    clock: C,
}

impl Sealer<SystemFsClock> {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            clock: SystemFsClock,
        }
    }
}

impl<C: FsClock> Sealer<C> {
    pub fn with_clock(config: Config, clock: C) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fingerprint every entry under `root` into a fresh filter and persist
    /// it with its calibration anchor. Existing control files are only
    /// replaced once the walk has completed.
    pub fn authorize(&self, root: &Path) -> Result<AuthorizeReport> {
        let paths = ControlPaths::new(root);
        let skew = ClockSkew::measure(&self.clock);
        log_calib_debug!("Measured clock skew", skew = skew.seconds());

        let sizing = &self.config.filter;
        let mut filter = BloomFilter::new(sizing.capacity_hint, sizing.target_rate, sizing.layout)
            .map_err(|e| ScanError::from_bloom(e, &paths.filter))?;

        let entries = walk_fingerprints(
            root,
            &self.clock,
            TimeCorrection::Authorize { skew },
            self.config.walk.sorted,
            |_, fingerprint| {
                filter.add(fingerprint.as_bytes());
                Ok(())
            },
        )?;

        filter
            .save(&paths.filter)
            .map_err(|e| ScanError::from_bloom(e, &paths.filter))?;
        let anchor = write_anchor(&paths, &self.clock, skew)?;

        if u64::from(sizing.capacity_hint) < entries {
            log_seal_warn!(
                "More entries than the filter was sized for; false-positive rate exceeds target",
                entries = entries,
                capacity_hint = sizing.capacity_hint,
            );
        }
        log_seal_info!(
            "Authorized volume",
            root = tracing::field::display(root.display()),
            entries = entries,
        );

        Ok(AuthorizeReport {
            entries,
            bit_count: filter.bit_count(),
            hash_rounds: filter.hash_rounds(),
            base_time: anchor.base_time,
        })
    }

    /// Re-walk `root` and check every fingerprint against the stored filter,
    /// failing on the first one that is absent.
    pub fn verify(&self, root: &Path) -> Result<VerifyReport> {
        let paths = ControlPaths::new(root);
        let time_diff = read_anchor(&paths, &self.clock)?;
        let filter =
            BloomFilter::load(&paths.filter).map_err(|e| ScanError::from_bloom(e, &paths.filter))?;

        let entries = walk_fingerprints(
            root,
            &self.clock,
            TimeCorrection::Verify { time_diff },
            self.config.walk.sorted,
            |rel, fingerprint| {
                if filter.check(fingerprint.as_bytes()) {
                    Ok(())
                } else {
                    log_seal_warn!("Fingerprint not recorded", path = rel);
                    Err(ScanError::VerificationFailed {
                        path: rel.to_string(),
                    })
                }
            },
        )?;

        log_seal_info!(
            "Verified volume",
            root = tracing::field::display(root.display()),
            entries = entries,
        );
        Ok(VerifyReport { entries, time_diff })
    }
}

/// Authorize `root` with the default configuration on this host.
pub fn authorize_root(root: &Path) -> StatusCode {
    StatusCode::of(&Sealer::new(Config::default()).authorize(root))
}

/// Verify `root` with the default configuration on this host.
pub fn verify_root(root: &Path) -> StatusCode {
    StatusCode::of(&Sealer::new(Config::default()).verify(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use std::fs;
    use tempfile::TempDir;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.filter.capacity_hint = 1_000;
        config.filter.target_rate = 0.000_001;
        config
    }

    fn tree() -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), vec![0u8; 10]).unwrap();
        fs::write(temp.path().join("b"), vec![0u8; 20]).unwrap();
        temp
    }

    #[test]
    fn test_authorize_reports_counts() {
        let temp = tree();
        let report = Sealer::new(small_config()).authorize(temp.path()).unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(report.bit_count % 32, 0);
        assert!(report.hash_rounds >= 1);
        assert!(ControlPaths::new(temp.path()).filter.is_file());
        assert!(ControlPaths::new(temp.path()).anchor.is_file());
    }

    #[test]
    fn test_verify_untouched_tree() {
        let temp = tree();
        let sealer = Sealer::new(small_config());
        sealer.authorize(temp.path()).unwrap();
        let report = sealer.verify(temp.path()).unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(report.time_diff, 0);
    }

    #[test]
    fn test_tamper_detection() {
        let temp = tree();
        let sealer = Sealer::new(small_config());
        sealer.authorize(temp.path()).unwrap();

        fs::write(temp.path().join("b"), vec![0u8; 21]).unwrap();
        let err = sealer.verify(temp.path()).unwrap_err();
        assert_eq!(err.status(), StatusCode::VerificationFailed);
        assert!(matches!(err, ScanError::VerificationFailed { path } if path == "b"));
    }

    #[test]
    fn test_verify_across_hosts() {
        let temp = tree();
        let host_a = SimulatedClock::new(0, 0);
        let host_b = SimulatedClock::new(11_644_473_600, 3600);

        Sealer::with_clock(small_config(), host_a)
            .authorize(temp.path())
            .unwrap();
        let report = Sealer::with_clock(small_config(), host_b)
            .verify(temp.path())
            .unwrap();
        assert_eq!(report.entries, 2);
    }

    #[test]
    fn test_zero_capacity_is_config_error() {
        let temp = tree();
        let mut config = small_config();
        config.filter.capacity_hint = 0;
        let err = Sealer::new(config).authorize(temp.path()).unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
        assert!(!ControlPaths::new(temp.path()).dir.exists());
    }

    #[test]
    fn test_verify_unsealed_root() {
        let temp = tree();
        assert_eq!(verify_root(temp.path()), StatusCode::SignatureMismatch);
    }
}
