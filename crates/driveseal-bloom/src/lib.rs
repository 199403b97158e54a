//! # driveseal-bloom
//!
//! Persistent Bloom filter used to record per-entry fingerprints of a volume
//! without storing them individually.
//!
//! ## File Format
//!
//! ```text
//! [28-byte header, big-endian fields]  see `header`
//! [bit buffer, raw bytes]              bit_count/8 (packed) or bit_count (byte-per-bit)
//! ```
//!
//! The bit buffer is addressed byte-wise only, so it is written as-is.

pub mod hash;
pub mod header;

pub use hash::{fnv1a, seeded_fnv1a};
pub use header::{FilterHeader, FILTER_MAGIC, HEADER_LEN};

use std::f64::consts::LN_2;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mode requested for control files before the umask, as a plain
/// `create` would give them.
pub const CONTROL_FILE_MODE: u32 = 0o666;

/// Temporary file in `dir` that can later be persisted as a control file.
///
/// Unlike `NamedTempFile::new_in`, the file is not created owner-only.
pub fn control_tempfile_in(dir: &Path) -> io::Result<tempfile::NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(CONTROL_FILE_MODE));
    }
    builder.tempfile_in(dir)
}

/// Items a default-sized filter is built for.
pub const DEFAULT_CAPACITY_HINT: u32 = 1_000_000;

/// Default design false-positive rate.
pub const DEFAULT_TARGET_RATE: f64 = 0.00001;

/// Errors that can occur during filter operations
#[derive(Error, Debug)]
pub enum BloomError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Filter file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Filter signature mismatch: expected {expected:#018x}, found {found:#018x}")]
    SignatureMismatch { expected: u64, found: u64 },

    #[error("Malformed filter header: {0}")]
    MalformedHeader(String),

    #[error("Invalid filter parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, BloomError>;

/// How bits are stored in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BitLayout {
    /// Eight bits per byte
    #[default]
    Packed,
    /// One byte per bit, `0x01` when set
    BytePerBit,
}

impl BitLayout {
    /// Buffer length in bytes for `bit_count` bits.
    pub fn buffer_len(self, bit_count: u32) -> usize {
        match self {
            BitLayout::Packed => bit_count as usize / 8,
            BitLayout::BytePerBit => bit_count as usize,
        }
    }

    /// Recover the layout from the length of a stored buffer.
    fn infer(bit_count: u32, buffer_len: usize) -> Option<Self> {
        [BitLayout::Packed, BitLayout::BytePerBit]
            .into_iter()
            .find(|layout| layout.buffer_len(bit_count) == buffer_len)
    }
}

/// Bits needed for `capacity_hint` items at `target_rate`, rounded up to a
/// multiple of 32. `None` if the result does not fit the header's `u32`.
pub fn optimal_bit_count(capacity_hint: u32, target_rate: f64) -> Option<u32> {
    let raw = (-f64::from(capacity_hint) * target_rate.ln() / (LN_2 * LN_2)).ceil();
    if !raw.is_finite() || raw > f64::from(u32::MAX) {
        return None;
    }
    let aligned = (raw as u64).div_ceil(32) * 32;
    u32::try_from(aligned).ok()
}

/// `floor(ln 2 * bit_count / capacity_hint)`, never less than one round.
pub fn optimal_hash_rounds(bit_count: u32, capacity_hint: u32) -> u32 {
    let rounds = (LN_2 * f64::from(bit_count) / f64::from(capacity_hint)).floor();
    (rounds as u32).max(1)
}

/// Approximate membership filter with an owned bit buffer.
#[derive(Debug, Clone)]
pub struct BloomFilter {
    header: FilterHeader,
    layout: BitLayout,
    bits: Vec<u8>,
}

impl BloomFilter {
    /// Build an empty filter sized for `capacity_hint` items at `target_rate`.
    pub fn new(capacity_hint: u32, target_rate: f64, layout: BitLayout) -> Result<Self> {
        if capacity_hint == 0 {
            return Err(BloomError::InvalidParameters(
                "capacity_hint must be greater than zero".into(),
            ));
        }
        if !(target_rate > 0.0 && target_rate < 1.0) {
            return Err(BloomError::InvalidParameters(format!(
                "target_rate {} is outside (0, 1)",
                target_rate
            )));
        }
        let bit_count = optimal_bit_count(capacity_hint, target_rate).ok_or_else(|| {
            BloomError::InvalidParameters(format!(
                "{} items at rate {} need more than {} bits",
                capacity_hint,
                target_rate,
                u32::MAX
            ))
        })?;
        let hash_rounds = optimal_hash_rounds(bit_count, capacity_hint);

        tracing::debug!(
            component = "FILTER",
            capacity_hint,
            target_rate,
            bit_count,
            hash_rounds,
            ?layout,
            "Sized new filter"
        );

        Ok(Self {
            header: FilterHeader::new(capacity_hint, target_rate, bit_count, hash_rounds),
            layout,
            bits: vec![0u8; layout.buffer_len(bit_count)],
        })
    }

    pub fn header(&self) -> &FilterHeader {
        &self.header
    }

    pub fn layout(&self) -> BitLayout {
        self.layout
    }

    pub fn bit_count(&self) -> u32 {
        self.header.bit_count
    }

    pub fn hash_rounds(&self) -> u32 {
        self.header.hash_rounds
    }

    /// Bytes occupied on disk: header plus bit buffer.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.bits.len()
    }

    #[inline]
    fn index(&self, item: &[u8], round: u32) -> usize {
        (seeded_fnv1a(item, round) % u64::from(self.header.bit_count)) as usize
    }

    #[inline]
    fn set(&mut self, i: usize) {
        match self.layout {
            BitLayout::Packed => self.bits[i / 8] |= 1 << (i % 8),
            BitLayout::BytePerBit => self.bits[i] = 0x01,
        }
    }

    #[inline]
    fn get(&self, i: usize) -> bool {
        match self.layout {
            BitLayout::Packed => self.bits[i / 8] & (1 << (i % 8)) != 0,
            BitLayout::BytePerBit => self.bits[i] != 0,
        }
    }

    /// Record `item`.
    pub fn add(&mut self, item: &[u8]) {
        for round in 0..self.header.hash_rounds {
            let i = self.index(item, round);
            self.set(i);
        }
    }

    /// `false` means `item` was never added; `true` means it probably was.
    pub fn check(&self, item: &[u8]) -> bool {
        (0..self.header.hash_rounds).all(|round| self.get(self.index(item, round)))
    }

    /// Write header and bit buffer to `writer`.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.header.encode())?;
        writer.write_all(&self.bits)?;
        Ok(())
    }

    /// Parse a complete filter image.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FilterHeader::decode(bytes)?;
        let body = &bytes[HEADER_LEN..];
        let layout = BitLayout::infer(header.bit_count, body.len()).ok_or_else(|| {
            BloomError::MalformedHeader(format!(
                "bit buffer of {} bytes fits no layout for {} bits",
                body.len(),
                header.bit_count
            ))
        })?;
        Ok(Self {
            header,
            layout,
            bits: body.to_vec(),
        })
    }

    /// Persist to `path`, creating the parent directory if needed.
    ///
    /// The image is written to a temporary file next to `path` and renamed
    /// over it, so a failed write leaves any previous filter in place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let mut tmp = control_tempfile_in(parent)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            self.write_to(&mut writer)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| BloomError::Io(e.error))?;

        tracing::debug!(
            component = "FILTER",
            path = %path.display(),
            bytes = self.encoded_len(),
            "Saved filter"
        );
        Ok(())
    }

    /// Load a filter previously written by [`BloomFilter::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BloomError::NotFound(path.to_path_buf()),
            _ => BloomError::Io(e),
        })?;
        let filter = Self::decode(&bytes)?;

        tracing::debug!(
            component = "FILTER",
            path = %path.display(),
            bit_count = filter.header.bit_count,
            hash_rounds = filter.header.hash_rounds,
            layout = ?filter.layout,
            "Loaded filter"
        );
        Ok(filter)
    }
}
