//! Morton (Z-order) bit interleaving
//!
//! Bit `p` of dimension `d` lands at output bit `p * dims + d`, so the
//! lowest bit of every dimension comes first and the highest last.

/// Interleave the low `bits_per_dim` bits of each value into one key.
///
/// Output positions at or beyond 64 are dropped; configurations are
/// validated so that never happens for accepted column counts.
pub fn interleave_bits(values: &[u64], bits_per_dim: u32) -> u64 {
    let dims = values.len();
    let mut z = 0u64;

    for p in 0..bits_per_dim as usize {
        for (d, value) in values.iter().enumerate() {
            let out = p * dims + d;
            if out >= 64 {
                return z;
            }
            z |= ((value >> p) & 1) << out;
        }
    }

    z
}

/// Inverse of [`interleave_bits`] for `dims` dimensions
pub fn deinterleave_bits(z: u64, dims: usize, bits_per_dim: u32) -> Vec<u64> {
    let mut values = vec![0u64; dims];

    for p in 0..bits_per_dim as usize {
        for (d, value) in values.iter_mut().enumerate() {
            let out = p * dims + d;
            if out >= 64 {
                return values;
            }
            *value |= ((z >> out) & 1) << p;
        }
    }

    values
}
