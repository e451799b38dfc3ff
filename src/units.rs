//! Unit Normalizer
//!
//! Converts raw fixed-point contract values into floating point domain values.
//!
//! Most token amounts are 18-decimal (wei). Debt-ledger values use 27-decimal
//! "precise" units. Mixing the two up silently corrupts every downstream ratio,
//! so callers always pass the exponent explicitly.
//!
//! Display-grade only: anything above 2^53 significant units loses precision.

use alloy_primitives::U256;
use eyre::{eyre, Result};
#[cfg(test)]
use std::str::FromStr;

// ============================================
// CONSTANTS
// ============================================

/// Standard ERC-20 / wei precision
pub const WEI_DECIMALS: u8 = 18;

/// Precise unit used by the debt ledger
pub const PRECISE_DECIMALS: u8 = 27;

/// U256 can hold at most 10^77
const MAX_DECIMALS: u8 = 77;

// ============================================
// NORMALIZATION
// ============================================

/// 10^decimals as U256
fn scale(decimals: u8) -> Result<U256> {
    if decimals > MAX_DECIMALS {
        return Err(eyre!("decimal exponent {} out of range", decimals));
    }
    Ok(U256::from(10u8).pow(U256::from(decimals)))
}

/// raw / 10^decimals
///
/// The integer and fractional parts are split exactly before a single
/// decimal-to-float conversion, so the result is correctly rounded.
pub fn normalize(raw: U256, decimals: u8) -> Result<f64> {
    let unit = scale(decimals)?;
    let whole = raw / unit;
    let frac = raw % unit;

    let text = if decimals == 0 {
        whole.to_string()
    } else {
        format!("{}.{:0>width$}", whole, frac.to_string(), width = decimals as usize)
    };

    text.parse::<f64>()
        .map_err(|e| eyre!("failed to convert {} to f64: {}", text, e))
}

/// Same as [`normalize`] but for a decimal (or 0x-hex) string.
/// A leading `-` is allowed; subgraphs return signed BigInts for deltas.
#[cfg(test)]
pub fn normalize_str(raw: &str, decimals: u8) -> Result<f64> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };

    if digits.is_empty() {
        return Err(eyre!("empty fixed-point value"));
    }

    let value = U256::from_str(digits)
        .map_err(|e| eyre!("malformed fixed-point value {:?}: {}", raw, e))?;
    let normalized = normalize(value, decimals)?;

    Ok(if negative { -normalized } else { normalized })
}

/// 18-decimal shorthand
pub fn from_wei(raw: U256) -> f64 {
    // 18 < MAX_DECIMALS, and any U256 renders as a valid decimal literal
    normalize(raw, WEI_DECIMALS).unwrap_or(f64::NAN)
}

/// 27-decimal shorthand
pub fn from_precise(raw: U256) -> f64 {
    normalize(raw, PRECISE_DECIMALS).unwrap_or(f64::NAN)
}

/// Inverse of [`normalize`] for building fixtures and call arguments.
/// Rounds to the nearest representable unit; not for transaction construction.
#[cfg(test)]
pub fn to_fixed(value: f64, decimals: u8) -> Result<U256> {
    if !value.is_finite() || value < 0.0 {
        return Err(eyre!("cannot encode {} as unsigned fixed point", value));
    }
    if decimals > MAX_DECIMALS {
        return Err(eyre!("decimal exponent {} out of range", decimals));
    }

    let text = format!("{:.*}", decimals as usize, value);
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let digits = format!("{}{}", whole, frac);

    U256::from_str(&digits).map_err(|e| eyre!("failed to encode {}: {}", value, e))
}
