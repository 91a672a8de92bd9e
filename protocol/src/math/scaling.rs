//! # Raw ↔ Live Conversions
//!
//! A token's *raw* balance is in its native decimals. Its *live* balance is
//! normalized to 18 decimals and multiplied by the token's current rate:
//!
//! ```text
//! live = raw × scaling_factor × rate / ONE
//! raw  = live × ONE / (scaling_factor × rate)
//! ```
//!
//! `scaling_factor = 10^(18 − decimals)` is an integer, so the only lossy
//! step is the rate. Each conversion comes in an explicit rounding flavour.

use super::fixed_point::{div_down, div_up, mul_down, mul_up};
use super::Rounding;
use crate::config::{MAX_TOKEN_DECIMALS, ONE};
use crate::error::VaultError;

/// `10^(18 − decimals)`.
pub fn scaling_factor(decimals: u8) -> Result<u128, VaultError> {
    if decimals > MAX_TOKEN_DECIMALS {
        return Err(VaultError::InvalidRegistration(format!(
            "token decimals {decimals} exceed {MAX_TOKEN_DECIMALS}"
        )));
    }
    Ok(10u128.pow(u32::from(MAX_TOKEN_DECIMALS - decimals)))
}

fn scale(amount: u128, scaling_factor: u128) -> Result<u128, VaultError> {
    amount
        .checked_mul(scaling_factor)
        .ok_or(VaultError::Overflow("scaled amount"))
}

/// Raw → live, rounding as asked.
pub fn to_scaled18_apply_rate(
    amount: u128,
    scaling_factor: u128,
    rate: u128,
    rounding: Rounding,
) -> Result<u128, VaultError> {
    let scaled = scale(amount, scaling_factor)?;
    match rounding {
        Rounding::Up => mul_up(scaled, rate),
        Rounding::Down => mul_down(scaled, rate),
    }
}

/// Live → raw, rounding as asked.
pub fn to_raw_undo_rate(
    amount: u128,
    scaling_factor: u128,
    rate: u128,
    rounding: Rounding,
) -> Result<u128, VaultError> {
    let divisor = scale(rate, scaling_factor)?;
    match rounding {
        Rounding::Up => div_up(amount, divisor),
        Rounding::Down => div_down(amount, divisor),
    }
}

/// Bumps a rate by one unit unless it is a whole multiple of [`ONE`].
///
/// Used when converting an amount the caller must pay back to raw: a rate
/// that was itself rounded down by its provider must not shave the payment.
pub fn compute_rate_round_up(rate: u128) -> u128 {
    let rounded = (rate / ONE) * ONE;
    if rounded == rate {
        rate
    } else {
        rate.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_decimal_token_scales_by_1e12() {
        assert_eq!(scaling_factor(6).unwrap(), 1_000_000_000_000);
        assert_eq!(scaling_factor(18).unwrap(), 1);
        assert!(scaling_factor(19).is_err());
    }

    #[test]
    fn apply_and_undo_rate() {
        let sf = scaling_factor(6).unwrap();
        let rate = ONE + ONE / 2;
        let live = to_scaled18_apply_rate(2_000_000, sf, rate, Rounding::Down).unwrap();
        assert_eq!(live, 3 * ONE);
        let raw = to_raw_undo_rate(live, sf, rate, Rounding::Down).unwrap();
        assert_eq!(raw, 2_000_000);
    }

    #[test]
    fn rounding_direction_brackets_the_exact_value() {
        let rate = ONE / 3;
        let down = to_scaled18_apply_rate(10, 1, rate, Rounding::Down).unwrap();
        let up = to_scaled18_apply_rate(10, 1, rate, Rounding::Up).unwrap();
        assert_eq!(up, down + 1);

        let raw_down = to_raw_undo_rate(10, 1, rate, Rounding::Down).unwrap();
        let raw_up = to_raw_undo_rate(10, 1, rate, Rounding::Up).unwrap();
        assert_eq!(raw_down, 30);
        assert_eq!(raw_up, 31);
    }

    #[test]
    fn whole_rates_are_not_bumped() {
        assert_eq!(compute_rate_round_up(ONE), ONE);
        assert_eq!(compute_rate_round_up(ONE + 1), ONE + 2);
    }
}
