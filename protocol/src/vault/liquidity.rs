//! # Pool Liquidity Primitives
//!
//! Initialize, add and remove. Adds price against live balances rounded
//! *up* (the pool looks bigger, the caller pays more); removes against live
//! balances rounded *down*. Amounts in are converted back to raw rounding
//! up, amounts out rounding down.
//!
//! Single-token kinds name their token by the one nonzero entry of the
//! amounts vector, so the same params struct serves every kind.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::engine::{Scope, Vault};
use super::pool::PoolData;
use crate::error::VaultError;
use crate::external::TokenLedger;
use crate::math::base_pool::{
    compute_add_liquidity_single_token_exact_out, compute_add_liquidity_unbalanced,
    compute_proportional_amounts_in, compute_proportional_amounts_out,
    compute_remove_liquidity_single_token_exact_in, compute_remove_liquidity_single_token_exact_out,
};
use crate::math::fixed_point::{add, mul_down, sub};
use crate::math::scaling::{compute_rate_round_up, to_raw_undo_rate, to_scaled18_apply_rate};
use crate::math::Rounding;
use crate::token::{AccountId, TokenId};

/// How liquidity is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddLiquidityKind {
    /// Exact BPT out (`min_bpt_amount_out`), proportional amounts in.
    Proportional,
    /// Exact amounts in (`max_amounts_in`), BPT out at least the minimum.
    Unbalanced,
    /// Exact BPT out, paid in the single token with a nonzero max.
    SingleTokenExactOut,
}

/// How liquidity is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoveLiquidityKind {
    /// Exact BPT in (`max_bpt_amount_in`), proportional amounts out.
    Proportional,
    /// Exact BPT in, paid out in the single token with a nonzero min.
    SingleTokenExactIn,
    /// Exact amount out of the single token with a nonzero min, BPT in at
    /// most the maximum.
    SingleTokenExactOut,
}

/// Arguments of [`Vault::add_liquidity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityParams {
    /// Target pool.
    pub pool: TokenId,
    /// Receiver of the BPT.
    pub to: AccountId,
    /// Raw maximum (or exact, for unbalanced) amounts in canonical order.
    pub max_amounts_in: Vec<u128>,
    /// Minimum (or exact) BPT out.
    pub min_bpt_amount_out: u128,
    /// Kind.
    pub kind: AddLiquidityKind,
}

/// Result of an add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityOutcome {
    /// Raw amounts taken, canonical order.
    pub amounts_in: Vec<u128>,
    /// BPT minted.
    pub bpt_amount_out: u128,
}

/// Arguments of [`Vault::remove_liquidity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityParams {
    /// Target pool.
    pub pool: TokenId,
    /// Holder whose BPT is burned.
    pub from: AccountId,
    /// Maximum (or exact) BPT in.
    pub max_bpt_amount_in: u128,
    /// Raw minimum (or exact, for single-token exact-out) amounts out.
    pub min_amounts_out: Vec<u128>,
    /// Kind.
    pub kind: RemoveLiquidityKind,
}

/// Result of a remove.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityOutcome {
    /// BPT burned.
    pub bpt_amount_in: u128,
    /// Raw amounts paid out, canonical order.
    pub amounts_out: Vec<u128>,
}

fn single_index(amounts: &[u128]) -> Result<usize, VaultError> {
    let mut found = None;
    for (i, amount) in amounts.iter().enumerate() {
        if *amount != 0 {
            if found.is_some() {
                return Err(VaultError::InvalidAmounts(
                    "single-token operation needs exactly one nonzero amount".into(),
                ));
            }
            found = Some(i);
        }
    }
    found.ok_or_else(|| {
        VaultError::InvalidAmounts("single-token operation needs exactly one nonzero amount".into())
    })
}

fn scale_all(amounts: &[u128], data: &PoolData, rounding: Rounding) -> Result<Vec<u128>, VaultError> {
    amounts
        .iter()
        .enumerate()
        .map(|(i, amount)| {
            to_scaled18_apply_rate(*amount, data.scaling_factors[i], data.token_rates[i], rounding)
        })
        .collect()
}

impl<L: TokenLedger + Clone> Vault<L> {
    fn check_length(&self, pool: TokenId, got: usize) -> Result<(), VaultError> {
        let expected = self.pool(pool)?.tokens().len();
        if expected != got {
            return Err(VaultError::InputLengthMismatch { expected, got });
        }
        Ok(())
    }

    fn ensure_pool_live(&self, pool: TokenId) -> Result<(), VaultError> {
        let state = self.pool(pool)?;
        if !state.is_initialized() {
            return Err(VaultError::PoolNotInitialized(pool));
        }
        if state.is_paused() {
            return Err(VaultError::PoolPaused(pool));
        }
        Ok(())
    }

    fn charge_aggregate_fee(
        &mut self,
        pool: TokenId,
        data: &PoolData,
        index: usize,
        swap_fee_scaled18: u128,
    ) -> Result<u128, VaultError> {
        if swap_fee_scaled18 == 0 || data.aggregate_swap_fee_percentage == 0 {
            return Ok(0);
        }
        let fee_raw = to_raw_undo_rate(
            swap_fee_scaled18,
            data.scaling_factors[index],
            data.token_rates[index],
            Rounding::Down,
        )?;
        let aggregate = mul_down(fee_raw, data.aggregate_swap_fee_percentage)?;
        self.pool_mut(pool)?.accrue_aggregate_fee(index, aggregate)?;
        Ok(aggregate)
    }

    // -----------------------------------------------------------------------
    // Initialize
    // -----------------------------------------------------------------------

    /// Adds the first liquidity to a pool. BPT minted equals the invariant;
    /// the configured minimum supply is minted to nobody and the rest to
    /// `to`. Returns the BPT credited to `to`.
    pub fn initialize(
        &mut self,
        pool: TokenId,
        to: &AccountId,
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
    ) -> Result<u128, VaultError> {
        self.ensure_unlocked()?;
        self.ensure_not_paused()?;
        let state = self.pool(pool)?;
        if state.is_initialized() {
            return Err(VaultError::PoolAlreadyInitialized(pool));
        }
        self.check_length(pool, exact_amounts_in.len())?;

        self.atomic(Scope::pool(pool), |vault| {
            let state = vault.pool(pool)?;
            let tokens = state.tokens().to_vec();
            let hooks = state.hooks();
            let mut data = state.load_pool_data(Rounding::Down)?;
            let amounts_scaled18 = scale_all(exact_amounts_in, &data, Rounding::Down)?;

            if let Some(hooks) = &hooks {
                if !hooks.before_initialize(pool, &amounts_scaled18) {
                    return Err(VaultError::HookVeto {
                        pool,
                        stage: "before_initialize",
                    });
                }
            }

            let bpt_amount_out = state
                .pricing()
                .compute_invariant(&amounts_scaled18, Rounding::Down)?;
            let minimum = vault.config.minimum_pool_supply;
            if bpt_amount_out < minimum {
                return Err(VaultError::PoolTotalSupplyTooLow {
                    supply: bpt_amount_out,
                    min: minimum,
                });
            }
            let credited = bpt_amount_out - minimum;
            if credited < min_bpt_amount_out {
                return Err(VaultError::BptAmountOutBelowMin {
                    amount: credited,
                    min: min_bpt_amount_out,
                });
            }

            for (i, amount) in exact_amounts_in.iter().enumerate() {
                vault.take_debt(tokens[i], *amount)?;
                data.update_raw_and_live(i, *amount, Rounding::Down)?;
            }

            let state = vault.pool_mut(pool)?;
            state.write_pool_data(&data);
            state.mint_shares(None, minimum)?;
            state.mint_shares(Some(to), credited)?;
            state.mark_initialized();

            if let Some(hooks) = &hooks {
                if !hooks.after_initialize(pool, bpt_amount_out) {
                    return Err(VaultError::HookVeto {
                        pool,
                        stage: "after_initialize",
                    });
                }
            }
            info!(%pool, bpt = bpt_amount_out, "pool initialized");
            Ok(credited)
        })
    }

    // -----------------------------------------------------------------------
    // Add
    // -----------------------------------------------------------------------

    /// Adds liquidity. Unlock-scoped; records `−amount_in` per token.
    pub fn add_liquidity(&mut self, params: &AddLiquidityParams) -> Result<AddLiquidityOutcome, VaultError> {
        self.ensure_unlocked()?;
        self.ensure_not_paused()?;
        self.ensure_pool_live(params.pool)?;
        self.check_length(params.pool, params.max_amounts_in.len())?;
        self.atomic(Scope::pool(params.pool), |vault| vault.add_liquidity_unchecked(params))
    }

    fn add_liquidity_unchecked(&mut self, params: &AddLiquidityParams) -> Result<AddLiquidityOutcome, VaultError> {
        let pool = params.pool;
        let state = self.pool(pool)?;
        let tokens = state.tokens().to_vec();
        let hooks = state.hooks();
        let total_supply = state.total_supply();
        let mut data = state.load_pool_data(Rounding::Up)?;
        let max_in_scaled18 = scale_all(&params.max_amounts_in, &data, Rounding::Down)?;

        if let Some(hooks) = &hooks {
            if !hooks.before_add_liquidity(
                pool,
                params.kind,
                &max_in_scaled18,
                params.min_bpt_amount_out,
                &data.balances_live_scaled18,
            ) {
                return Err(VaultError::HookVeto {
                    pool,
                    stage: "before_add_liquidity",
                });
            }
        }

        let n = tokens.len();
        let (amounts_in_scaled18, bpt_amount_out, swap_fees) = match params.kind {
            AddLiquidityKind::Proportional => {
                let bpt = params.min_bpt_amount_out;
                let amounts = compute_proportional_amounts_in(&data.balances_live_scaled18, total_supply, bpt)?;
                (amounts, bpt, vec![0; n])
            }
            AddLiquidityKind::Unbalanced => {
                let outcome = compute_add_liquidity_unbalanced(
                    &data.balances_live_scaled18,
                    &max_in_scaled18,
                    total_supply,
                    data.swap_fee_percentage,
                    state.pricing(),
                )?;
                (max_in_scaled18.clone(), outcome.amount, outcome.swap_fee_amounts)
            }
            AddLiquidityKind::SingleTokenExactOut => {
                let index = single_index(&params.max_amounts_in)?;
                let bpt = params.min_bpt_amount_out;
                let outcome = compute_add_liquidity_single_token_exact_out(
                    &data.balances_live_scaled18,
                    index,
                    bpt,
                    total_supply,
                    data.swap_fee_percentage,
                    state.pricing(),
                )?;
                let mut amounts = vec![0; n];
                amounts[index] = outcome.amount;
                (amounts, bpt, outcome.swap_fee_amounts)
            }
        };

        let mut amounts_in: Vec<u128> = Vec::with_capacity(n);
        for i in 0..n {
            let amount_in = to_raw_undo_rate(
                amounts_in_scaled18[i],
                data.scaling_factors[i],
                compute_rate_round_up(data.token_rates[i]),
                Rounding::Up,
            )?;
            if amount_in > params.max_amounts_in[i] {
                return Err(VaultError::AmountInAboveMax {
                    token: tokens[i],
                    amount: amount_in,
                    max: params.max_amounts_in[i],
                });
            }
            self.take_debt(tokens[i], amount_in)?;
            let aggregate = self.charge_aggregate_fee(pool, &data, i, swap_fees[i])?;
            let new_raw = sub(add(data.balances_raw[i], amount_in, "pool balance")?, aggregate, "aggregate fee")?;
            data.update_raw_and_live(i, new_raw, Rounding::Down)?;
            amounts_in.push(amount_in);
        }

        if bpt_amount_out < params.min_bpt_amount_out {
            return Err(VaultError::BptAmountOutBelowMin {
                amount: bpt_amount_out,
                min: params.min_bpt_amount_out,
            });
        }

        let state = self.pool_mut(pool)?;
        state.write_pool_data(&data);
        state.mint_shares(Some(&params.to), bpt_amount_out)?;

        if let Some(hooks) = &hooks {
            let (ok, adjusted) = hooks.after_add_liquidity(pool, &amounts_in, bpt_amount_out);
            if !ok {
                return Err(VaultError::HookVeto {
                    pool,
                    stage: "after_add_liquidity",
                });
            }
            if adjusted.len() != n {
                return Err(VaultError::InputLengthMismatch {
                    expected: n,
                    got: adjusted.len(),
                });
            }
            // Anything charged above the computed amount stays in the pool.
            for (i, adjusted) in adjusted.into_iter().enumerate() {
                let computed = amounts_in[i];
                if adjusted < computed {
                    return Err(VaultError::HookAdjustedAmountInvalid {
                        adjusted,
                        calculated: computed,
                    });
                }
                if adjusted > params.max_amounts_in[i] {
                    return Err(VaultError::AmountInAboveMax {
                        token: tokens[i],
                        amount: adjusted,
                        max: params.max_amounts_in[i],
                    });
                }
                let extra = adjusted - computed;
                if extra > 0 {
                    self.take_debt(tokens[i], extra)?;
                    let new_raw = add(data.balances_raw[i], extra, "pool balance")?;
                    data.update_raw_and_live(i, new_raw, Rounding::Down)?;
                    amounts_in[i] = adjusted;
                }
            }
            self.pool_mut(pool)?.write_pool_data(&data);
        }
        debug!(%pool, kind = ?params.kind, bpt = bpt_amount_out, "liquidity added");
        Ok(AddLiquidityOutcome {
            amounts_in,
            bpt_amount_out,
        })
    }

    // -----------------------------------------------------------------------
    // Remove
    // -----------------------------------------------------------------------

    /// Removes liquidity. Unlock-scoped; records `+amount_out` per token.
    pub fn remove_liquidity(
        &mut self,
        params: &RemoveLiquidityParams,
    ) -> Result<RemoveLiquidityOutcome, VaultError> {
        self.ensure_unlocked()?;
        self.ensure_not_paused()?;
        self.ensure_pool_live(params.pool)?;
        self.check_length(params.pool, params.min_amounts_out.len())?;
        self.atomic(Scope::pool(params.pool), |vault| vault.remove_liquidity_unchecked(params))
    }

    fn remove_liquidity_unchecked(
        &mut self,
        params: &RemoveLiquidityParams,
    ) -> Result<RemoveLiquidityOutcome, VaultError> {
        let pool = params.pool;
        let state = self.pool(pool)?;
        let tokens = state.tokens().to_vec();
        let hooks = state.hooks();
        let total_supply = state.total_supply();
        let mut data = state.load_pool_data(Rounding::Down)?;
        let min_out_scaled18 = scale_all(&params.min_amounts_out, &data, Rounding::Up)?;

        if let Some(hooks) = &hooks {
            if !hooks.before_remove_liquidity(
                pool,
                params.kind,
                params.max_bpt_amount_in,
                &min_out_scaled18,
                &data.balances_live_scaled18,
            ) {
                return Err(VaultError::HookVeto {
                    pool,
                    stage: "before_remove_liquidity",
                });
            }
        }

        let n = tokens.len();
        let (bpt_amount_in, mut amounts_out, swap_fees) = match params.kind {
            RemoveLiquidityKind::Proportional => {
                let bpt = params.max_bpt_amount_in;
                // Proportional exits are priced on raw balances: no rate
                // rounding to lose.
                let amounts = compute_proportional_amounts_out(&data.balances_raw, total_supply, bpt)?;
                (bpt, amounts, vec![0; n])
            }
            RemoveLiquidityKind::SingleTokenExactIn => {
                let index = single_index(&params.min_amounts_out)?;
                let bpt = params.max_bpt_amount_in;
                let outcome = compute_remove_liquidity_single_token_exact_in(
                    &data.balances_live_scaled18,
                    index,
                    bpt,
                    total_supply,
                    data.swap_fee_percentage,
                    state.pricing(),
                )?;
                let mut amounts = vec![0; n];
                amounts[index] = to_raw_undo_rate(
                    outcome.amount,
                    data.scaling_factors[index],
                    data.token_rates[index],
                    Rounding::Down,
                )?;
                (bpt, amounts, outcome.swap_fee_amounts)
            }
            RemoveLiquidityKind::SingleTokenExactOut => {
                let index = single_index(&params.min_amounts_out)?;
                let outcome = compute_remove_liquidity_single_token_exact_out(
                    &data.balances_live_scaled18,
                    index,
                    min_out_scaled18[index],
                    total_supply,
                    data.swap_fee_percentage,
                    state.pricing(),
                )?;
                let mut amounts = vec![0; n];
                amounts[index] = params.min_amounts_out[index];
                (outcome.amount, amounts, outcome.swap_fee_amounts)
            }
        };

        if bpt_amount_in > params.max_bpt_amount_in {
            return Err(VaultError::BptAmountInAboveMax {
                amount: bpt_amount_in,
                max: params.max_bpt_amount_in,
            });
        }

        for i in 0..n {
            let amount_out = amounts_out[i];
            if amount_out < params.min_amounts_out[i] {
                return Err(VaultError::AmountOutBelowMin {
                    token: tokens[i],
                    amount: amount_out,
                    min: params.min_amounts_out[i],
                });
            }
            self.supply_credit(tokens[i], amount_out)?;
            let aggregate = self.charge_aggregate_fee(pool, &data, i, swap_fees[i])?;
            let debit = add(amount_out, aggregate, "amount out with fee")?;
            if data.balances_raw[i] < debit {
                return Err(VaultError::InsufficientPoolBalance {
                    pool,
                    token: tokens[i],
                    available: data.balances_raw[i],
                    requested: debit,
                });
            }
            let new_raw = data.balances_raw[i] - debit;
            data.update_raw_and_live(i, new_raw, Rounding::Down)?;
        }

        let minimum = self.config.minimum_pool_supply;
        let state = self.pool_mut(pool)?;
        state.write_pool_data(&data);
        state.burn_shares(&params.from, bpt_amount_in)?;
        if state.total_supply() < minimum {
            return Err(VaultError::PoolTotalSupplyTooLow {
                supply: state.total_supply(),
                min: minimum,
            });
        }

        if let Some(hooks) = &hooks {
            let (ok, adjusted) = hooks.after_remove_liquidity(pool, &amounts_out, bpt_amount_in);
            if !ok {
                return Err(VaultError::HookVeto {
                    pool,
                    stage: "after_remove_liquidity",
                });
            }
            if adjusted.len() != n {
                return Err(VaultError::InputLengthMismatch {
                    expected: n,
                    got: adjusted.len(),
                });
            }
            // Anything withheld from the computed amount stays in the pool.
            for (i, adjusted) in adjusted.into_iter().enumerate() {
                let computed = amounts_out[i];
                if adjusted > computed {
                    return Err(VaultError::HookAdjustedAmountInvalid {
                        adjusted,
                        calculated: computed,
                    });
                }
                if adjusted < params.min_amounts_out[i] {
                    return Err(VaultError::AmountOutBelowMin {
                        token: tokens[i],
                        amount: adjusted,
                        min: params.min_amounts_out[i],
                    });
                }
                let withheld = computed - adjusted;
                if withheld > 0 {
                    self.take_debt(tokens[i], withheld)?;
                    let new_raw = add(data.balances_raw[i], withheld, "pool balance")?;
                    data.update_raw_and_live(i, new_raw, Rounding::Down)?;
                    amounts_out[i] = adjusted;
                }
            }
            self.pool_mut(pool)?.write_pool_data(&data);
        }
        debug!(%pool, kind = ?params.kind, bpt = bpt_amount_in, "liquidity removed");
        Ok(RemoveLiquidityOutcome {
            bpt_amount_in,
            amounts_out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ONE;
    use crate::test_utils::{account, empty_vault, seeded_pool, settle_all, ALICE, LP};

    #[test]
    fn initialize_burns_the_minimum_supply() {
        let mut vault = empty_vault();
        let (pool, _) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let minimum = vault.config().minimum_pool_supply;
        assert_eq!(vault.total_supply(pool).unwrap(), 200 * ONE);
        assert_eq!(vault.share_balance_of(pool, &account(LP)).unwrap(), 200 * ONE - minimum);

        let err = vault
            .quote(|v| v.initialize(pool, &account(LP), &[ONE, ONE], 0))
            .unwrap_err();
        assert_eq!(err, VaultError::PoolAlreadyInitialized(pool));
    }

    #[test]
    fn proportional_add_rounds_amounts_up() {
        let mut vault = empty_vault();
        let (pool, _) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE + 1], 0);
        let outcome = vault
            .quote(|v| {
                v.add_liquidity(&AddLiquidityParams {
                    pool,
                    to: account(ALICE),
                    max_amounts_in: vec![u128::MAX, u128::MAX],
                    min_bpt_amount_out: 3,
                    kind: AddLiquidityKind::Proportional,
                })
            })
            .unwrap();
        // Exact shares are 1.5 units of each token; both round up.
        assert!(outcome.amounts_in.iter().all(|amount| *amount == 2));
    }

    #[test]
    fn unbalanced_add_mints_for_value_added() {
        let mut vault = empty_vault();
        let (pool, [a, _]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let alice = account(ALICE);
        vault.bank_mut().mint(a, &alice, 10 * ONE).unwrap();
        let bpt = vault
            .unlock(|v| {
                let outcome = v.add_liquidity(&AddLiquidityParams {
                    pool,
                    to: alice.clone(),
                    max_amounts_in: vec![10 * ONE, 0],
                    min_bpt_amount_out: 0,
                    kind: AddLiquidityKind::Unbalanced,
                })?;
                settle_all(v, &alice, &alice)?;
                Ok(outcome.bpt_amount_out)
            })
            .unwrap();
        assert!(bpt <= 10 * ONE && bpt + 10 >= 10 * ONE);
        assert_eq!(vault.share_balance_of(pool, &alice).unwrap(), bpt);
    }

    #[test]
    fn single_token_exit_pays_one_token() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let lp = account(LP);
        let outcome = vault
            .unlock(|v| {
                let outcome = v.remove_liquidity(&RemoveLiquidityParams {
                    pool,
                    from: lp.clone(),
                    max_bpt_amount_in: 10 * ONE,
                    min_amounts_out: vec![0, 1],
                    kind: RemoveLiquidityKind::SingleTokenExactIn,
                })?;
                settle_all(v, &lp, &lp)?;
                Ok(outcome)
            })
            .unwrap();
        assert_eq!(outcome.amounts_out[0], 0);
        assert!(outcome.amounts_out[1] <= 10 * ONE);
        assert_eq!(vault.bank().balance_of(b, &lp), outcome.amounts_out[1]);
        assert_eq!(vault.bank().balance_of(a, &lp), 0);
    }

    #[test]
    fn exits_need_shares_and_one_target_token() {
        let mut vault = empty_vault();
        let (pool, _) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let exit = |from: &str, min_amounts_out: Vec<u128>, kind| RemoveLiquidityParams {
            pool,
            from: account(from),
            max_bpt_amount_in: ONE,
            min_amounts_out,
            kind,
        };

        let err = vault
            .quote(|v| v.remove_liquidity(&exit(ALICE, vec![0, 0], RemoveLiquidityKind::Proportional)))
            .unwrap_err();
        assert!(matches!(err, VaultError::InsufficientShares { .. }));

        let err = vault
            .quote(|v| v.remove_liquidity(&exit(LP, vec![1, 1], RemoveLiquidityKind::SingleTokenExactIn)))
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidAmounts(_)));

        let err = vault
            .quote(|v| v.remove_liquidity(&exit(LP, vec![0, 0, 0], RemoveLiquidityKind::Proportional)))
            .unwrap_err();
        assert_eq!(err, VaultError::InputLengthMismatch { expected: 2, got: 3 });
    }

    #[test]
    fn exit_cannot_dip_below_minimum_supply() {
        let mut vault = empty_vault();
        let (pool, _) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let lp = account(LP);
        let all = vault.share_balance_of(pool, &lp).unwrap();
        let outcome = vault
            .quote(|v| {
                v.remove_liquidity(&RemoveLiquidityParams {
                    pool,
                    from: lp.clone(),
                    max_bpt_amount_in: all,
                    min_amounts_out: vec![0, 0],
                    kind: RemoveLiquidityKind::Proportional,
                })
            })
            .unwrap();
        // The burned minimum keeps a sliver of each token in the pool.
        assert!(outcome.amounts_out.iter().all(|amount| *amount < 100 * ONE));
    }

    /// Tries to hand one unit back to the caller on every join and exit.
    #[derive(Debug)]
    struct GenerousHook;

    impl crate::external::PoolHooks for GenerousHook {
        fn after_add_liquidity(&self, _pool: TokenId, amounts_in_raw: &[u128], _bpt: u128) -> (bool, Vec<u128>) {
            (true, amounts_in_raw.iter().map(|a| a.saturating_sub(1)).collect())
        }

        fn after_remove_liquidity(&self, _pool: TokenId, amounts_out_raw: &[u128], _bpt: u128) -> (bool, Vec<u128>) {
            (true, amounts_out_raw.iter().map(|a| a + 1).collect())
        }
    }

    #[test]
    fn hook_adjustments_against_the_pool_are_refused() {
        use std::sync::Arc;

        use crate::test_utils::LinearPricing;
        use crate::vault::{PoolRegistration, TokenConfig};

        let mut vault = empty_vault();
        let pool = TokenId::from_symbol("GENEROUS");
        let mut tokens = [TokenId::from_symbol("A"), TokenId::from_symbol("B")];
        tokens.sort();
        vault
            .register_pool(PoolRegistration {
                pool,
                tokens: tokens.iter().map(|t| TokenConfig::standard(*t, 18)).collect(),
                swap_fee_percentage: 0,
                aggregate_swap_fee_percentage: 0,
                pricing: Arc::new(LinearPricing),
                hooks: Some(Arc::new(GenerousHook)),
            })
            .unwrap();
        let lp = account(LP);
        for token in tokens {
            vault.bank_mut().mint(token, &lp, 100 * ONE).unwrap();
        }
        vault
            .unlock(|v| {
                v.initialize(pool, &lp, &[100 * ONE, 100 * ONE], 0)?;
                settle_all(v, &lp, &lp)
            })
            .unwrap();
        let balances = vault.get_raw_balances(pool).unwrap();

        let err = vault
            .quote(|v| {
                v.add_liquidity(&AddLiquidityParams {
                    pool,
                    to: lp.clone(),
                    max_amounts_in: vec![ONE, ONE],
                    min_bpt_amount_out: 0,
                    kind: AddLiquidityKind::Unbalanced,
                })
            })
            .unwrap_err();
        assert_eq!(
            err,
            VaultError::HookAdjustedAmountInvalid {
                adjusted: ONE - 1,
                calculated: ONE,
            }
        );

        let err = vault
            .quote(|v| {
                v.remove_liquidity(&RemoveLiquidityParams {
                    pool,
                    from: lp.clone(),
                    max_bpt_amount_in: ONE,
                    min_amounts_out: vec![0, 0],
                    kind: RemoveLiquidityKind::Proportional,
                })
            })
            .unwrap_err();
        assert!(matches!(err, VaultError::HookAdjustedAmountInvalid { .. }));
        assert_eq!(vault.get_raw_balances(pool).unwrap(), balances);
    }
}
