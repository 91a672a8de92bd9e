//! # Constant-Sum Pricing
//!
//! `Σ balances = k`. Every token trades 1:1 against every other in live
//! units, so a pool of rate-bearing tokens quotes at the rate ratio. Works
//! for any pool size the vault accepts.

use tidal_vault::external::{PoolPricing, PoolSwapParams};
use tidal_vault::math::fixed_point::{add, mul_up, sub};
use tidal_vault::math::Rounding;
use tidal_vault::VaultError;

/// n-token linear curve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstantSumPricing;

impl ConstantSumPricing {
    pub fn new() -> Self {
        Self
    }
}

impl PoolPricing for ConstantSumPricing {
    fn compute_swap(&self, params: &PoolSwapParams<'_>) -> Result<u128, VaultError> {
        Ok(params.amount_given_scaled18)
    }

    fn compute_invariant(&self, balances_scaled18: &[u128], _rounding: Rounding) -> Result<u128, VaultError> {
        balances_scaled18
            .iter()
            .try_fold(0u128, |sum, balance| add(sum, *balance, "constant sum invariant"))
    }

    fn compute_balance(
        &self,
        balances_scaled18: &[u128],
        token_index: usize,
        invariant_ratio: u128,
    ) -> Result<u128, VaultError> {
        let invariant = self.compute_invariant(balances_scaled18, Rounding::Up)?;
        let others = sub(invariant, balances_scaled18[token_index], "constant sum others")?;
        sub(mul_up(invariant, invariant_ratio)?, others, "constant sum balance")
    }
}
