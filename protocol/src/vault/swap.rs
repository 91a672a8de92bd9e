//! The swap primitive.
//!
//! Pricing happens on freshly loaded live balances; everything that leaves
//! or enters the pool is converted back to raw with the rounding that keeps
//! dust in the pool. Swap fees are taken from the given amount (exact-in)
//! or grossed up onto the calculated amount (exact-out). The aggregate
//! share of each fee is set aside for the protocol and excluded from the
//! pool balance.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::engine::{Scope, Vault};
use crate::error::VaultError;
use crate::external::{AfterSwapParams, PoolSwapParams, SwapKind, TokenLedger};
use crate::math::fixed_point::{add, complement, mul_div, mul_down, mul_up, sub};
use crate::math::scaling::{compute_rate_round_up, to_raw_undo_rate, to_scaled18_apply_rate};
use crate::math::Rounding;
use crate::token::{AccountId, TokenId};

/// Arguments of [`Vault::swap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSwapParams {
    /// Exact-in or exact-out.
    pub kind: SwapKind,
    /// Pool to trade against.
    pub pool: TokenId,
    /// Token going in.
    pub token_in: TokenId,
    /// Token coming out.
    pub token_out: TokenId,
    /// Raw given amount.
    pub amount_given_raw: u128,
    /// Minimum out (exact-in) or maximum in (exact-out), raw.
    pub limit_raw: u128,
    /// Account driving the swap, reported to hooks.
    pub router: AccountId,
}

/// What a swap did, in raw units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    /// The non-given side.
    pub amount_calculated_raw: u128,
    /// Token in.
    pub amount_in_raw: u128,
    /// Token out.
    pub amount_out_raw: u128,
    /// Total swap fee charged, in token-in raw units.
    pub swap_fee_raw: u128,
    /// Portion of the fee set aside for the protocol.
    pub aggregate_fee_raw: u128,
}

impl<L: TokenLedger + Clone> Vault<L> {
    /// Swaps within one pool. Unlock-scoped.
    ///
    /// Records `−amount_in` for `token_in` and `+amount_out` for
    /// `token_out` in the session ledger.
    ///
    /// # Errors
    ///
    /// Locked or paused vault, unknown or uninitialized pool, zero amount,
    /// same-token swap, limit violations, hook vetoes and pricing errors.
    pub fn swap(&mut self, params: &VaultSwapParams) -> Result<SwapOutcome, VaultError> {
        self.ensure_unlocked()?;
        self.ensure_not_paused()?;
        if params.amount_given_raw == 0 {
            return Err(VaultError::AmountGivenZero);
        }
        if params.token_in == params.token_out {
            return Err(VaultError::CannotSwapSameToken(params.token_in));
        }
        self.atomic(Scope::pool(params.pool), |vault| vault.swap_unchecked(params))
    }

    fn swap_unchecked(&mut self, params: &VaultSwapParams) -> Result<SwapOutcome, VaultError> {
        let pool = self.pool(params.pool)?;
        if !pool.is_initialized() {
            return Err(VaultError::PoolNotInitialized(params.pool));
        }
        if pool.is_paused() {
            return Err(VaultError::PoolPaused(params.pool));
        }
        let index_in = pool.token_index(params.token_in)?;
        let index_out = pool.token_index(params.token_out)?;
        let hooks = pool.hooks();
        let mut data = pool.load_pool_data(Rounding::Down)?;

        let amount_given_scaled18 = match params.kind {
            SwapKind::ExactIn => to_scaled18_apply_rate(
                params.amount_given_raw,
                data.scaling_factors[index_in],
                data.token_rates[index_in],
                Rounding::Down,
            )?,
            SwapKind::ExactOut => to_scaled18_apply_rate(
                params.amount_given_raw,
                data.scaling_factors[index_out],
                data.token_rates[index_out],
                Rounding::Up,
            )?,
        };

        let mut request = PoolSwapParams {
            kind: params.kind,
            amount_given_scaled18,
            tokens: &data.tokens,
            balances_scaled18: &data.balances_live_scaled18,
            index_in,
            index_out,
        };
        if let Some(hooks) = &hooks {
            if !hooks.before_swap(params.pool, &request) {
                return Err(VaultError::HookVeto {
                    pool: params.pool,
                    stage: "before_swap",
                });
            }
        }

        let fee_percentage = data.swap_fee_percentage;
        let mut swap_fee_scaled18 = 0;
        if params.kind == SwapKind::ExactIn {
            swap_fee_scaled18 = mul_up(amount_given_scaled18, fee_percentage)?;
            request.amount_given_scaled18 = sub(amount_given_scaled18, swap_fee_scaled18, "swap fee")?;
        }

        let mut amount_calculated_scaled18 = pool.pricing().compute_swap(&request)?;

        let (amount_calculated_raw, amount_in_scaled18, amount_out_scaled18) = match params.kind {
            SwapKind::ExactIn => {
                let raw = to_raw_undo_rate(
                    amount_calculated_scaled18,
                    data.scaling_factors[index_out],
                    data.token_rates[index_out],
                    Rounding::Down,
                )?;
                (raw, amount_given_scaled18, amount_calculated_scaled18)
            }
            SwapKind::ExactOut => {
                swap_fee_scaled18 = mul_div(
                    amount_calculated_scaled18,
                    fee_percentage,
                    complement(fee_percentage),
                    Rounding::Up,
                )?;
                amount_calculated_scaled18 = add(amount_calculated_scaled18, swap_fee_scaled18, "amount in")?;
                let raw = to_raw_undo_rate(
                    amount_calculated_scaled18,
                    data.scaling_factors[index_in],
                    compute_rate_round_up(data.token_rates[index_in]),
                    Rounding::Up,
                )?;
                (raw, amount_calculated_scaled18, amount_given_scaled18)
            }
        };

        // Hook adjustment: only ever in the pool's favour.
        let mut amount_calculated_raw = amount_calculated_raw;
        if let Some(hooks) = &hooks {
            let (ok, adjusted) = hooks.after_swap(&AfterSwapParams {
                pool: params.pool,
                kind: params.kind,
                token_in: params.token_in,
                token_out: params.token_out,
                amount_in_scaled18,
                amount_out_scaled18,
                amount_calculated_raw,
                router: &params.router,
            });
            if !ok {
                return Err(VaultError::HookVeto {
                    pool: params.pool,
                    stage: "after_swap",
                });
            }
            let favours_pool = match params.kind {
                SwapKind::ExactIn => adjusted <= amount_calculated_raw,
                SwapKind::ExactOut => adjusted >= amount_calculated_raw,
            };
            if !favours_pool {
                return Err(VaultError::HookAdjustedAmountInvalid {
                    adjusted,
                    calculated: amount_calculated_raw,
                });
            }
            amount_calculated_raw = adjusted;
        }

        let (amount_in_raw, amount_out_raw) = match params.kind {
            SwapKind::ExactIn => {
                if amount_calculated_raw < params.limit_raw {
                    return Err(VaultError::SwapLimit {
                        amount: amount_calculated_raw,
                        limit: params.limit_raw,
                    });
                }
                (params.amount_given_raw, amount_calculated_raw)
            }
            SwapKind::ExactOut => {
                if amount_calculated_raw > params.limit_raw {
                    return Err(VaultError::SwapLimit {
                        amount: amount_calculated_raw,
                        limit: params.limit_raw,
                    });
                }
                (amount_calculated_raw, params.amount_given_raw)
            }
        };

        // Fees are denominated in token in.
        let swap_fee_raw = to_raw_undo_rate(
            swap_fee_scaled18,
            data.scaling_factors[index_in],
            data.token_rates[index_in],
            Rounding::Down,
        )?;
        let aggregate_fee_raw = mul_down(swap_fee_raw, data.aggregate_swap_fee_percentage)?;

        let new_in = sub(
            add(data.balances_raw[index_in], amount_in_raw, "pool balance in")?,
            aggregate_fee_raw,
            "aggregate fee",
        )?;
        let available_out = data.balances_raw[index_out];
        if available_out < amount_out_raw {
            return Err(VaultError::InsufficientPoolBalance {
                pool: params.pool,
                token: params.token_out,
                available: available_out,
                requested: amount_out_raw,
            });
        }
        data.update_raw_and_live(index_in, new_in, Rounding::Down)?;
        data.update_raw_and_live(index_out, available_out - amount_out_raw, Rounding::Down)?;

        self.take_debt(params.token_in, amount_in_raw)?;
        self.supply_credit(params.token_out, amount_out_raw)?;
        let pool = self.pool_mut(params.pool)?;
        pool.accrue_aggregate_fee(index_in, aggregate_fee_raw)?;
        pool.write_pool_data(&data);

        debug!(
            pool = %params.pool,
            kind = ?params.kind,
            amount_in = amount_in_raw,
            amount_out = amount_out_raw,
            fee = swap_fee_raw,
            "swap"
        );

        Ok(SwapOutcome {
            amount_calculated_raw,
            amount_in_raw,
            amount_out_raw,
            swap_fee_raw,
            aggregate_fee_raw,
        })
    }
}
