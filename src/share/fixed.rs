//! Fixed-point encoding of reals into [Z64].
//!
//! A real `x` is represented by `round(x * 2^FRACTIONAL_BITS)` in two's complement. Products of
//! two encodings carry `2 * FRACTIONAL_BITS` fractional bits and must be truncated.
use thiserror::Error;

use super::z64::Z64;

/// Number of fractional bits of all secret values of a session.
pub const FRACTIONAL_BITS: u32 = 16;

/// Encoded values must be strictly smaller than this in absolute value.
pub const MAX_ABS_VALUE: f64 = (1u64 << 30) as f64;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum FixedPointError {
    #[error("{0} is not a finite number")]
    NotFinite(f64),
    #[error("{0} is out of the representable range (-2^30, 2^30)")]
    OutOfRange(f64),
}

/// Encodes `x` with `fractional_bits` of precision.
pub fn encode_with(x: f64, fractional_bits: u32) -> Result<Z64, FixedPointError> {
    if !x.is_finite() {
        return Err(FixedPointError::NotFinite(x));
    }
    if x.abs() >= MAX_ABS_VALUE {
        return Err(FixedPointError::OutOfRange(x));
    }
    let scaled = (x * (1u64 << fractional_bits) as f64).round();
    Ok(Z64(scaled as i64 as u64))
}

/// Encodes `x` with [FRACTIONAL_BITS] of precision.
pub fn encode(x: f64) -> Result<Z64, FixedPointError> {
    encode_with(x, FRACTIONAL_BITS)
}

pub fn decode_with(z: Z64, fractional_bits: u32) -> f64 {
    z.as_signed() as f64 / (1u64 << fractional_bits) as f64
}

pub fn decode(z: Z64) -> f64 {
    decode_with(z, FRACTIONAL_BITS)
}

/// Encodes an integer without fractional part, e.g. a count.
pub fn encode_integer(n: u64) -> Z64 {
    Z64(n)
}
