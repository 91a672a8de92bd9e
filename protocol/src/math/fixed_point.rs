//! # 18-Decimal Fixed-Point Arithmetic
//!
//! All values are `u128` interpreted against [`ONE`]. Products are taken in
//! 256 bits (`ethnum::U256`) so `a * b` never overflows before the divide;
//! only the final narrowing back to `u128` can fail, and it reports
//! [`VaultError::Overflow`] instead of truncating.
//!
//! Nothing here panics. Division by zero is an error, not a trap.

use ethnum::U256;

use super::Rounding;
use crate::config::ONE;
use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Core
// ---------------------------------------------------------------------------

fn narrow(value: U256, what: &'static str) -> Result<u128, VaultError> {
    let (high, low) = value.into_words();
    if high != 0 {
        return Err(VaultError::Overflow(what));
    }
    Ok(low)
}

/// `a * b / c` with a 256-bit intermediate and explicit rounding.
pub fn mul_div(a: u128, b: u128, c: u128, rounding: Rounding) -> Result<u128, VaultError> {
    if c == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    let divisor = U256::from(c);
    let mut quotient = product / divisor;
    if rounding.is_up() && product % divisor != U256::ZERO {
        quotient += U256::ONE;
    }
    narrow(quotient, "mul_div")
}

/// `a * b / ONE`, rounded down.
pub fn mul_down(a: u128, b: u128) -> Result<u128, VaultError> {
    mul_div(a, b, ONE, Rounding::Down)
}

/// `a * b / ONE`, rounded up.
pub fn mul_up(a: u128, b: u128) -> Result<u128, VaultError> {
    mul_div(a, b, ONE, Rounding::Up)
}

/// `a * ONE / b`, rounded down.
pub fn div_down(a: u128, b: u128) -> Result<u128, VaultError> {
    mul_div(a, ONE, b, Rounding::Down)
}

/// `a * ONE / b`, rounded up.
pub fn div_up(a: u128, b: u128) -> Result<u128, VaultError> {
    mul_div(a, ONE, b, Rounding::Up)
}

/// `ONE - x`, clamped at zero.
pub fn complement(x: u128) -> u128 {
    ONE.saturating_sub(x)
}

// ---------------------------------------------------------------------------
// Checked helpers
// ---------------------------------------------------------------------------

/// Checked addition tagged with what was being added.
pub fn add(a: u128, b: u128, what: &'static str) -> Result<u128, VaultError> {
    a.checked_add(b).ok_or(VaultError::Overflow(what))
}

/// Checked subtraction tagged with what was being subtracted.
pub fn sub(a: u128, b: u128, what: &'static str) -> Result<u128, VaultError> {
    a.checked_sub(b).ok_or(VaultError::Underflow(what))
}

/// Converts an unsigned amount to a ledger delta.
pub fn to_delta(amount: u128) -> Result<i128, VaultError> {
    i128::try_from(amount).map_err(|_| VaultError::Overflow("delta"))
}
