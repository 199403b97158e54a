//! Filter file header codec.
//!
//! Layout (28 bytes, packed, every field big-endian):
//!
//! ```text
//! offset  size  field
//! 0       8     magic
//! 8       4     capacity_hint (u32)
//! 12      8     target rate (f64 bit pattern)
//! 20      4     bit_count (u32)
//! 24      4     hash_rounds (u32)
//! ```
//!
//! Fields are read and written one at a time at fixed offsets, so the host's
//! own byte order and struct layout never leak into the file.

use crate::{BloomError, Result};

/// Format tag at offset 0 of every filter file.
pub const FILTER_MAGIC: u64 = 0x5245_544C_4946_4D42;

/// Encoded header length in bytes.
pub const HEADER_LEN: usize = 28;

const OFF_MAGIC: usize = 0;
const OFF_CAPACITY: usize = 8;
const OFF_RATE: usize = 12;
const OFF_BIT_COUNT: usize = 20;
const OFF_HASH_ROUNDS: usize = 24;

/// In-memory form of the filter header, always in host order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterHeader {
    pub magic: u64,
    /// Number of distinct items the filter was sized for.
    pub capacity_hint: u32,
    /// Raw 8-byte slot. Holds the bit pattern of the `f64` design rate when
    /// the filter was built by `BloomFilter::new`; loaders never interpret it.
    pub rate_bits: u64,
    /// Total addressable bits, a non-zero multiple of 32.
    pub bit_count: u32,
    pub hash_rounds: u32,
}

impl FilterHeader {
    pub fn new(capacity_hint: u32, target_rate: f64, bit_count: u32, hash_rounds: u32) -> Self {
        Self {
            magic: FILTER_MAGIC,
            capacity_hint,
            rate_bits: target_rate.to_bits(),
            bit_count,
            hash_rounds,
        }
    }

    /// The design false-positive rate stored in the raw slot.
    pub fn target_rate(&self) -> f64 {
        f64::from_bits(self.rate_bits)
    }

    /// Serialize into the canonical 28-byte form.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        put(&mut buf, OFF_MAGIC, &self.magic.to_be_bytes());
        put(&mut buf, OFF_CAPACITY, &self.capacity_hint.to_be_bytes());
        put(&mut buf, OFF_RATE, &self.rate_bits.to_be_bytes());
        put(&mut buf, OFF_BIT_COUNT, &self.bit_count.to_be_bytes());
        put(&mut buf, OFF_HASH_ROUNDS, &self.hash_rounds.to_be_bytes());
        buf
    }

    /// Parse and validate a header from the start of `bytes`.
    ///
    /// The magic is checked before any geometry so that a foreign file is
    /// reported as a signature mismatch rather than as a malformed header.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(BloomError::MalformedHeader(format!(
                "need {} header bytes, found {}",
                HEADER_LEN,
                bytes.len()
            )));
        }

        let magic = u64::from_be_bytes(take(bytes, OFF_MAGIC));
        if magic != FILTER_MAGIC {
            return Err(BloomError::SignatureMismatch {
                expected: FILTER_MAGIC,
                found: magic,
            });
        }

        let header = Self {
            magic,
            capacity_hint: u32::from_be_bytes(take(bytes, OFF_CAPACITY)),
            rate_bits: u64::from_be_bytes(take(bytes, OFF_RATE)),
            bit_count: u32::from_be_bytes(take(bytes, OFF_BIT_COUNT)),
            hash_rounds: u32::from_be_bytes(take(bytes, OFF_HASH_ROUNDS)),
        };

        if header.bit_count == 0 || header.bit_count % 32 != 0 {
            return Err(BloomError::MalformedHeader(format!(
                "bit_count {} is not a positive multiple of 32",
                header.bit_count
            )));
        }
        if header.hash_rounds == 0 {
            return Err(BloomError::MalformedHeader("hash_rounds is zero".into()));
        }

        Ok(header)
    }
}

fn put(buf: &mut [u8; HEADER_LEN], offset: usize, field: &[u8]) {
    buf[offset..offset + field.len()].copy_from_slice(field);
}

fn take<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut field = [0u8; N];
    field.copy_from_slice(&bytes[offset..offset + N]);
    field
}
