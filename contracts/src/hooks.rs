//! # Pool Hooks
//!
//! Three reference hooks:
//!
//! - [`SwapCapHook`] vetoes any swap whose given amount exceeds a cap.
//! - [`SwapSurchargeHook`] skims a percentage of every swap's calculated
//!   amount in the pool's favour through `after_swap`: less out for
//!   exact-in, more in for exact-out. The skim stays in the pool.
//! - [`LiquiditySurchargeHook`] does the same for liquidity: joins pay a
//!   percentage more of each token, exits receive that much less.

use serde::{Deserialize, Serialize};
use tidal_vault::config::ONE;
use tidal_vault::external::{AfterSwapParams, PoolHooks, PoolSwapParams, SwapKind};
use tidal_vault::math::fixed_point::mul_up;
use tidal_vault::TokenId;
use tracing::debug;

/// Refuses swaps whose live given amount is above the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapCapHook {
    max_amount_given_scaled18: u128,
}

impl SwapCapHook {
    pub fn new(max_amount_given_scaled18: u128) -> Self {
        Self {
            max_amount_given_scaled18,
        }
    }
}

impl PoolHooks for SwapCapHook {
    fn before_swap(&self, pool: TokenId, params: &PoolSwapParams<'_>) -> bool {
        let allowed = params.amount_given_scaled18 <= self.max_amount_given_scaled18;
        if !allowed {
            debug!(
                %pool,
                amount = params.amount_given_scaled18,
                cap = self.max_amount_given_scaled18,
                "swap above cap"
            );
        }
        allowed
    }
}

/// Takes `surcharge_percentage` (18 decimals) of every calculated amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapSurchargeHook {
    surcharge_percentage: u128,
}

impl SwapSurchargeHook {
    /// Percentages above 100% are clamped.
    pub fn new(surcharge_percentage: u128) -> Self {
        Self {
            surcharge_percentage: surcharge_percentage.min(ONE),
        }
    }

    pub fn surcharge_percentage(&self) -> u128 {
        self.surcharge_percentage
    }
}

impl PoolHooks for SwapSurchargeHook {
    fn after_swap(&self, params: &AfterSwapParams<'_>) -> (bool, u128) {
        let calculated = params.amount_calculated_raw;
        let Ok(surcharge) = mul_up(calculated, self.surcharge_percentage) else {
            return (false, calculated);
        };
        let adjusted = match params.kind {
            SwapKind::ExactIn => calculated.saturating_sub(surcharge),
            SwapKind::ExactOut => match calculated.checked_add(surcharge) {
                Some(total) => total,
                None => return (false, calculated),
            },
        };
        debug!(pool = %params.pool, calculated, adjusted, "swap surcharged");
        (true, adjusted)
    }
}

/// Charges `surcharge_percentage` (18 decimals) on every token of a join or
/// exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquiditySurchargeHook {
    surcharge_percentage: u128,
}

impl LiquiditySurchargeHook {
    /// Percentages above 100% are clamped.
    pub fn new(surcharge_percentage: u128) -> Self {
        Self {
            surcharge_percentage: surcharge_percentage.min(ONE),
        }
    }

    pub fn surcharge_percentage(&self) -> u128 {
        self.surcharge_percentage
    }

    fn surcharges(&self, amounts: &[u128]) -> Option<Vec<u128>> {
        amounts
            .iter()
            .map(|amount| mul_up(*amount, self.surcharge_percentage).ok())
            .collect()
    }
}

impl PoolHooks for LiquiditySurchargeHook {
    fn after_add_liquidity(&self, pool: TokenId, amounts_in_raw: &[u128], _bpt_amount_out: u128) -> (bool, Vec<u128>) {
        let adjusted: Option<Vec<u128>> = self.surcharges(amounts_in_raw).and_then(|fees| {
            amounts_in_raw
                .iter()
                .zip(fees)
                .map(|(amount, fee)| amount.checked_add(fee))
                .collect()
        });
        match adjusted {
            Some(adjusted) => {
                debug!(%pool, ?adjusted, "join surcharged");
                (true, adjusted)
            }
            None => (false, amounts_in_raw.to_vec()),
        }
    }

    fn after_remove_liquidity(
        &self,
        pool: TokenId,
        amounts_out_raw: &[u128],
        _bpt_amount_in: u128,
    ) -> (bool, Vec<u128>) {
        let Some(fees) = self.surcharges(amounts_out_raw) else {
            return (false, amounts_out_raw.to_vec());
        };
        let adjusted: Vec<u128> = amounts_out_raw
            .iter()
            .zip(fees)
            .map(|(amount, fee)| amount.saturating_sub(fee))
            .collect();
        debug!(%pool, ?adjusted, "exit surcharged");
        (true, adjusted)
    }
}
