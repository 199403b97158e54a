//! Seeded FNV-1a used to derive the filter's hash rounds.
//!
//! A single 64-bit FNV-1a pass runs over the item bytes, then keeps mixing in
//! the ASCII decimal digits of the round index. Round `r` of item `x` is thus
//! exactly `fnv1a(x ++ r.to_string())`, which gives `hash_rounds` loosely
//! correlated functions out of one primitive.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Longest decimal rendering of a `u32`.
const MAX_U32_DIGITS: usize = 10;

#[inline]
fn mix(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Plain 64-bit FNV-1a.
#[inline]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    mix(FNV_OFFSET_BASIS, bytes)
}

/// FNV-1a over `item` followed by the decimal digits of `round`.
pub fn seeded_fnv1a(item: &[u8], round: u32) -> u64 {
    let mut digits = [0u8; MAX_U32_DIGITS];
    mix(fnv1a(item), decimal_digits(round, &mut digits))
}

/// Render `n` as ASCII decimal into the tail of `buf` without allocating.
fn decimal_digits(mut n: u32, buf: &mut [u8; MAX_U32_DIGITS]) -> &[u8] {
    let mut start = MAX_U32_DIGITS;
    loop {
        start -= 1;
        buf[start] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    &buf[start..]
}
