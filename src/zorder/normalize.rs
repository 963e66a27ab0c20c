//! Per-dimension normalization
//!
//! Maps raw column values onto `bits_per_dim`-wide unsigned integers. The
//! mappings are coarse on purpose and not order-preserving everywhere:
//!
//! | Column type  | Mapping                                                    |
//! |--------------|------------------------------------------------------------|
//! | integers     | raw two's-complement bits `>> (64 - bits)`                 |
//! | floats       | `value * 2^bits`, truncated, low `bits` kept (wraps)       |
//! | timestamps   | seconds `% SECONDS_PER_YEAR`, then the integer mapping     |
//! | strings      | FNV-1a 64-bit hash, low `bits` kept                        |
//! | null / other | 0                                                          |

use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::kernels::cast::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, UInt64Type};

use crate::error::Result;

/// One (non-leap) year in seconds
pub const SECONDS_PER_YEAR: i64 = 365 * 24 * 60 * 60;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Mask of the low `bits` bits
pub fn low_bits_mask(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Keep the top `bits` bits of the raw bit pattern
pub fn normalize_int(value: i64, bits: u32) -> u64 {
    (value as u64).checked_shr(64 - bits.min(64)).unwrap_or(0)
}

/// Scale by `2^bits` and truncate; out-of-range values wrap
pub fn normalize_float(value: f64, bits: u32) -> u64 {
    let scaled = value * (1u64 << bits.min(63)) as f64;
    // `as i64` saturates and maps NaN to 0; the mask does the wrapping
    (scaled as i64 as u64) & low_bits_mask(bits)
}

/// Time-of-year bucketing of a timestamp in seconds
pub fn normalize_timestamp(seconds: i64, bits: u32) -> u64 {
    normalize_int(seconds % SECONDS_PER_YEAR, bits)
}

pub fn normalize_str(value: &str, bits: u32) -> u64 {
    fnv1a_64(value.as_bytes()) & low_bits_mask(bits)
}

/// 64-bit FNV-1a
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, b| {
        (hash ^ *b as u64).wrapping_mul(FNV_PRIME)
    })
}

/// Normalize every value of `array`; nulls become 0
pub fn normalize_column(array: &ArrayRef, bits: u32) -> Result<Vec<u64>> {
    let values: Vec<u64> = match array.data_type() {
        DataType::Utf8 => array
            .as_string::<i32>()
            .iter()
            .map(|v| v.map_or(0, |s| normalize_str(s, bits)))
            .collect(),
        DataType::LargeUtf8 => array
            .as_string::<i64>()
            .iter()
            .map(|v| v.map_or(0, |s| normalize_str(s, bits)))
            .collect(),
        DataType::UInt64 => array
            .as_primitive::<UInt64Type>()
            .iter()
            .map(|v| v.map_or(0, |x| normalize_int(x as i64, bits)))
            .collect(),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::Date32
        | DataType::Date64 => {
            let ints = cast(array, &DataType::Int64)?;
            ints.as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map_or(0, |x| normalize_int(x, bits)))
                .collect()
        }
        DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let floats = cast(array, &DataType::Float64)?;
            floats
                .as_primitive::<Float64Type>()
                .iter()
                .map(|v| v.map_or(0, |x| normalize_float(x, bits)))
                .collect()
        }
        DataType::Timestamp(unit, _) => {
            let per_second: i64 = match unit {
                TimeUnit::Second => 1,
                TimeUnit::Millisecond => 1_000,
                TimeUnit::Microsecond => 1_000_000,
                TimeUnit::Nanosecond => 1_000_000_000,
            };
            let raw = cast(array, &DataType::Int64)?;
            raw.as_primitive::<Int64Type>()
                .iter()
                .map(|v| v.map_or(0, |x| normalize_timestamp(x / per_second, bits)))
                .collect()
        }
        other => {
            tracing::debug!(data_type = %other, "Unsupported z-order column type, using 0");
            vec![0; array.len()]
        }
    };
    Ok(values)
}
