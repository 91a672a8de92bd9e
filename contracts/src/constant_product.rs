//! # Constant-Product Pricing
//!
//! The classic two-token curve `x · y = k`. The invariant reported to the
//! vault is `sqrt(x · y)` so it scales linearly with liquidity, which is
//! what the vault's BPT math expects.
//!
//! All balances arrive live-scaled (18 decimals, rates applied); nothing
//! here knows about raw units.

use ethnum::U256;
use tidal_vault::config::ONE;
use tidal_vault::external::{PoolPricing, PoolSwapParams, SwapKind};
use tidal_vault::math::fixed_point::{add, mul_div, mul_up, sub};
use tidal_vault::math::Rounding;
use tidal_vault::VaultError;

/// Smallest invariant ratio a single-token exit may leave (70%).
pub const MIN_INVARIANT_RATIO: u128 = ONE / 100 * 70;

/// Largest invariant ratio an unbalanced join may produce (300%).
pub const MAX_INVARIANT_RATIO: u128 = ONE * 3;

/// Two-token `x · y = k` curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstantProductPricing;

impl ConstantProductPricing {
    pub fn new() -> Self {
        Self
    }
}

fn two_balances(balances: &[u128]) -> Result<(u128, u128), VaultError> {
    match balances {
        [x, y] => Ok((*x, *y)),
        _ => Err(VaultError::PricingFailed(format!(
            "constant product needs 2 balances, got {}",
            balances.len()
        ))),
    }
}

/// Integer square root of a 256-bit value, floor or ceiling.
pub fn sqrt(value: U256, rounding: Rounding) -> U256 {
    if value < U256::from(2u8) {
        return value;
    }
    // Newton from an upper bound: 2^(ceil(bits / 2)).
    let bits = 256 - value.leading_zeros();
    let mut x = U256::ONE << bits.div_ceil(2);
    loop {
        let next = (x + value / x) >> 1;
        if next >= x {
            break;
        }
        x = next;
    }
    if rounding.is_up() && x * x < value {
        x += U256::ONE;
    }
    x
}

impl PoolPricing for ConstantProductPricing {
    fn compute_swap(&self, params: &PoolSwapParams<'_>) -> Result<u128, VaultError> {
        let balance_in = params.balances_scaled18[params.index_in];
        let balance_out = params.balances_scaled18[params.index_out];
        let given = params.amount_given_scaled18;
        match params.kind {
            // out = y · in / (x + in)
            SwapKind::ExactIn => {
                let denominator = add(balance_in, given, "constant product balance in")?;
                mul_div(balance_out, given, denominator, Rounding::Down)
            }
            // in = x · out / (y − out)
            SwapKind::ExactOut => {
                if given >= balance_out {
                    return Err(VaultError::PricingFailed(format!(
                        "cannot take {given} out of a balance of {balance_out}"
                    )));
                }
                let denominator = sub(balance_out, given, "constant product balance out")?;
                mul_div(balance_in, given, denominator, Rounding::Up)
            }
        }
    }

    fn compute_invariant(&self, balances_scaled18: &[u128], rounding: Rounding) -> Result<u128, VaultError> {
        let (x, y) = two_balances(balances_scaled18)?;
        let root = sqrt(U256::from(x) * U256::from(y), rounding);
        let (high, low) = root.into_words();
        if high != 0 {
            return Err(VaultError::Overflow("constant product invariant"));
        }
        Ok(low)
    }

    fn compute_balance(
        &self,
        balances_scaled18: &[u128],
        token_index: usize,
        invariant_ratio: u128,
    ) -> Result<u128, VaultError> {
        two_balances(balances_scaled18)?;
        // sqrt(b_i' · b_j) = r · sqrt(b_i · b_j)  ⇒  b_i' = b_i · r²
        let balance = balances_scaled18[token_index];
        mul_up(mul_up(balance, invariant_ratio)?, invariant_ratio)
    }

    fn minimum_invariant_ratio(&self) -> u128 {
        MIN_INVARIANT_RATIO
    }

    fn maximum_invariant_ratio(&self) -> u128 {
        MAX_INVARIANT_RATIO
    }
}
