//! # Router
//!
//! Single-operation entry points: each call unlocks the vault, runs one
//! primitive, settles whatever the session owes or is owed with the
//! sender, and locks. Every operation has a `query_*` twin that runs the
//! same primitive against a throwaway copy.

use std::sync::Arc;

use tracing::info;

use super::clock::{Clock, SystemClock};
use super::batch::preview_buffer_input;
use super::settlement::{pay_in, settle_flows, NetFlows, SettlementMode};
use crate::error::VaultError;
use crate::external::{SwapKind, TokenLedger};
use crate::token::{AccountId, TokenId};
use crate::vault::{
    AddLiquidityKind, AddLiquidityParams, BufferOutcome, BufferWrapOrUnwrapParams, RebalanceOutcome,
    RemoveLiquidityKind, RemoveLiquidityParams, SwapOutcome, Vault, VaultSwapParams, WrappingDirection,
};

/// Default ledger account of the router.
pub const ROUTER_ACCOUNT: &str = "router";

/// Arguments of a single-pool swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleSwap {
    /// Pool to trade against.
    pub pool: TokenId,
    /// Token paid.
    pub token_in: TokenId,
    /// Token received.
    pub token_out: TokenId,
    /// Exact amount in (exact-in) or out (exact-out).
    pub amount_given: u128,
    /// Minimum out (exact-in) or maximum in (exact-out).
    pub limit: u128,
}

/// Single-operation router.
#[derive(Debug, Clone)]
pub struct Router {
    account: AccountId,
    clock: Arc<dyn Clock>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(AccountId::new(ROUTER_ACCOUNT), Arc::new(SystemClock))
    }
}

impl Router {
    /// A router acting as `account`, reading time from `clock`.
    pub fn new(account: AccountId, clock: Arc<dyn Clock>) -> Self {
        Self { account, clock }
    }

    /// The router's ledger account. Senders approve this for `Pull`.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Unlocks, runs `f`, settles every outstanding delta with `sender`.
    fn run<L, T, F>(&self, vault: &mut Vault<L>, sender: &AccountId, mode: SettlementMode, f: F) -> Result<T, VaultError>
    where
        L: TokenLedger + Clone,
        F: FnOnce(&mut Vault<L>) -> Result<T, VaultError>,
    {
        vault.unlock(|vault| {
            let value = f(vault)?;
            let flows = NetFlows::outstanding(vault);
            settle_flows(vault, &self.account, sender, &flows, mode)?;
            Ok(value)
        })
    }

    // -----------------------------------------------------------------------
    // Pool liquidity
    // -----------------------------------------------------------------------

    /// Seeds an empty pool. Returns the BPT credited to `sender`.
    pub fn initialize<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        pool: TokenId,
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
        mode: SettlementMode,
    ) -> Result<u128, VaultError> {
        let bpt = self.run(vault, sender, mode, |vault| {
            vault.initialize(pool, sender, exact_amounts_in, min_bpt_amount_out)
        })?;
        info!(%sender, %pool, bpt, "pool seeded");
        Ok(bpt)
    }

    /// Mints exactly `exact_bpt_amount_out`, paying proportionally.
    pub fn add_liquidity_proportional<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        pool: TokenId,
        max_amounts_in: &[u128],
        exact_bpt_amount_out: u128,
        mode: SettlementMode,
    ) -> Result<Vec<u128>, VaultError> {
        let params = add_params(sender, pool, max_amounts_in, exact_bpt_amount_out, AddLiquidityKind::Proportional);
        Ok(self.run(vault, sender, mode, |vault| vault.add_liquidity(&params))?.amounts_in)
    }

    /// Pays exactly `exact_amounts_in`. Returns BPT minted.
    pub fn add_liquidity_unbalanced<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        pool: TokenId,
        exact_amounts_in: &[u128],
        min_bpt_amount_out: u128,
        mode: SettlementMode,
    ) -> Result<u128, VaultError> {
        let params = add_params(sender, pool, exact_amounts_in, min_bpt_amount_out, AddLiquidityKind::Unbalanced);
        Ok(self.run(vault, sender, mode, |vault| vault.add_liquidity(&params))?.bpt_amount_out)
    }

    /// Mints exactly `exact_bpt_amount_out`, paying in `token_in` only.
    /// Returns the amount paid.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity_single_token_exact_out<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        pool: TokenId,
        token_in: TokenId,
        max_amount_in: u128,
        exact_bpt_amount_out: u128,
        mode: SettlementMode,
    ) -> Result<u128, VaultError> {
        let max_amounts_in = single(vault, pool, token_in, max_amount_in)?;
        let params = add_params(
            sender,
            pool,
            &max_amounts_in,
            exact_bpt_amount_out,
            AddLiquidityKind::SingleTokenExactOut,
        );
        let outcome = self.run(vault, sender, mode, |vault| vault.add_liquidity(&params))?;
        Ok(outcome.amounts_in.iter().sum())
    }

    /// Burns exactly `exact_bpt_amount_in` for proportional amounts out.
    pub fn remove_liquidity_proportional<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        pool: TokenId,
        exact_bpt_amount_in: u128,
        min_amounts_out: &[u128],
    ) -> Result<Vec<u128>, VaultError> {
        let params = remove_params(sender, pool, exact_bpt_amount_in, min_amounts_out, RemoveLiquidityKind::Proportional);
        Ok(self
            .run(vault, sender, SettlementMode::Pull, |vault| vault.remove_liquidity(&params))?
            .amounts_out)
    }

    /// Burns exactly `exact_bpt_amount_in` for `token_out` only.
    pub fn remove_liquidity_single_token_exact_in<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        pool: TokenId,
        exact_bpt_amount_in: u128,
        token_out: TokenId,
        min_amount_out: u128,
    ) -> Result<u128, VaultError> {
        let min_amounts_out = single(vault, pool, token_out, min_amount_out.max(1))?;
        let params = remove_params(
            sender,
            pool,
            exact_bpt_amount_in,
            &min_amounts_out,
            RemoveLiquidityKind::SingleTokenExactIn,
        );
        let outcome = self.run(vault, sender, SettlementMode::Pull, |vault| vault.remove_liquidity(&params))?;
        Ok(outcome.amounts_out.iter().sum())
    }

    /// Withdraws exactly `exact_amount_out` of `token_out`. Returns BPT
    /// burned.
    pub fn remove_liquidity_single_token_exact_out<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        pool: TokenId,
        max_bpt_amount_in: u128,
        token_out: TokenId,
        exact_amount_out: u128,
    ) -> Result<u128, VaultError> {
        let exact_amounts_out = single(vault, pool, token_out, exact_amount_out)?;
        let params = remove_params(
            sender,
            pool,
            max_bpt_amount_in,
            &exact_amounts_out,
            RemoveLiquidityKind::SingleTokenExactOut,
        );
        Ok(self
            .run(vault, sender, SettlementMode::Pull, |vault| vault.remove_liquidity(&params))?
            .bpt_amount_in)
    }

    // -----------------------------------------------------------------------
    // Swaps
    // -----------------------------------------------------------------------

    /// Swaps within one pool.
    ///
    /// # Errors
    ///
    /// [`VaultError::DeadlineExceeded`] plus anything [`Vault::swap`]
    /// returns.
    pub fn swap_single_token<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        kind: SwapKind,
        swap: &SingleSwap,
        deadline: u64,
        mode: SettlementMode,
    ) -> Result<SwapOutcome, VaultError> {
        let now = self.clock.now();
        if now > deadline {
            return Err(VaultError::DeadlineExceeded { deadline, now });
        }
        let params = self.swap_params(kind, swap);
        self.run(vault, sender, mode, |vault| vault.swap(&params))
    }

    /// Prices a single-pool swap without persisting anything.
    pub fn query_swap_single_token<L: TokenLedger + Clone>(
        &self,
        vault: &Vault<L>,
        kind: SwapKind,
        swap: &SingleSwap,
    ) -> Result<SwapOutcome, VaultError> {
        let params = self.swap_params(kind, swap);
        vault.quote(|vault| vault.swap(&params))
    }

    fn swap_params(&self, kind: SwapKind, swap: &SingleSwap) -> VaultSwapParams {
        VaultSwapParams {
            kind,
            pool: swap.pool,
            token_in: swap.token_in,
            token_out: swap.token_out,
            amount_given_raw: swap.amount_given,
            limit_raw: swap.limit,
            router: self.account.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Buffers
    // -----------------------------------------------------------------------

    /// Seeds a buffer. Returns the shares credited to `sender`.
    #[allow(clippy::too_many_arguments)]
    pub fn initialize_buffer<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        wrapped: TokenId,
        underlying_in: u128,
        wrapped_in: u128,
        min_issued_shares: u128,
        mode: SettlementMode,
    ) -> Result<u128, VaultError> {
        self.run(vault, sender, mode, |vault| {
            vault.initialize_buffer(wrapped, underlying_in, wrapped_in, min_issued_shares, sender)
        })
    }

    /// Mints exactly `exact_shares_out` buffer shares.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity_to_buffer<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        wrapped: TokenId,
        max_underlying_in: u128,
        max_wrapped_in: u128,
        exact_shares_out: u128,
        mode: SettlementMode,
    ) -> Result<(u128, u128), VaultError> {
        self.run(vault, sender, mode, |vault| {
            vault.add_liquidity_to_buffer(wrapped, max_underlying_in, max_wrapped_in, exact_shares_out, sender)
        })
    }

    /// Burns `shares_in` buffer shares.
    pub fn remove_liquidity_from_buffer<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        wrapped: TokenId,
        shares_in: u128,
        min_underlying_out: u128,
        min_wrapped_out: u128,
    ) -> Result<(u128, u128), VaultError> {
        self.run(vault, sender, SettlementMode::Pull, |vault| {
            vault.remove_liquidity_from_buffer(wrapped, shares_in, min_underlying_out, min_wrapped_out, sender)
        })
    }

    /// Wraps or unwraps through a buffer.
    ///
    /// The input is paid in before the conversion runs, so a buffer short
    /// on the output side can route through the wrapper with the sender's
    /// tokens. Exact-out pays the wrapper's preview, capped at the limit;
    /// any rounding difference settles with the rest of the session.
    pub fn wrap_or_unwrap<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        params: &BufferWrapOrUnwrapParams,
        mode: SettlementMode,
    ) -> Result<BufferOutcome, VaultError> {
        self.run(vault, sender, mode, |vault| {
            let token_in = match params.direction {
                WrappingDirection::Wrap => vault.wrapper(params.wrapped)?.asset(),
                WrappingDirection::Unwrap => params.wrapped,
            };
            let amount_in = match params.kind {
                SwapKind::ExactIn => params.amount_given_raw,
                SwapKind::ExactOut => {
                    preview_buffer_input(vault, params.wrapped, params.direction, params.amount_given_raw)?
                        .min(params.limit_raw)
                }
            };
            pay_in(vault, &self.account, sender, token_in, amount_in, mode)?;
            vault.erc4626_buffer_wrap_or_unwrap(params)
        })
    }

    /// Rebalances a buffer. Governed.
    pub fn rebalance_buffer<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        caller: &AccountId,
        wrapped: TokenId,
    ) -> Result<RebalanceOutcome, VaultError> {
        vault.unlock(|vault| vault.rebalance_buffer(caller, wrapped))
    }

    /// Sends the accrued protocol fees of `pool` to `caller`. Governed.
    pub fn collect_aggregate_fees<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        caller: &AccountId,
        pool: TokenId,
    ) -> Result<Vec<(TokenId, u128)>, VaultError> {
        self.run(vault, caller, SettlementMode::Pull, |vault| vault.collect_aggregate_fees(caller, pool))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Amounts a proportional add would take.
    pub fn query_add_liquidity_proportional<L: TokenLedger + Clone>(
        &self,
        vault: &Vault<L>,
        pool: TokenId,
        exact_bpt_amount_out: u128,
    ) -> Result<Vec<u128>, VaultError> {
        let n = vault.pool(pool)?.tokens().len();
        let params = add_params(&self.account, pool, &vec![u128::MAX; n], exact_bpt_amount_out, AddLiquidityKind::Proportional);
        vault.quote(|vault| Ok(vault.add_liquidity(&params)?.amounts_in))
    }

    /// BPT an unbalanced add would mint.
    pub fn query_add_liquidity_unbalanced<L: TokenLedger + Clone>(
        &self,
        vault: &Vault<L>,
        pool: TokenId,
        exact_amounts_in: &[u128],
    ) -> Result<u128, VaultError> {
        let params = add_params(&self.account, pool, exact_amounts_in, 0, AddLiquidityKind::Unbalanced);
        vault.quote(|vault| Ok(vault.add_liquidity(&params)?.bpt_amount_out))
    }

    /// Amounts a proportional remove would pay. Prices as if `sender`
    /// burned the BPT.
    pub fn query_remove_liquidity_proportional<L: TokenLedger + Clone>(
        &self,
        vault: &Vault<L>,
        sender: &AccountId,
        pool: TokenId,
        exact_bpt_amount_in: u128,
    ) -> Result<Vec<u128>, VaultError> {
        let n = vault.pool(pool)?.tokens().len();
        let params = remove_params(sender, pool, exact_bpt_amount_in, &vec![0; n], RemoveLiquidityKind::Proportional);
        vault.quote(|vault| Ok(vault.remove_liquidity(&params)?.amounts_out))
    }

    /// Amount of `token_out` a single-token exit would pay.
    pub fn query_remove_liquidity_single_token_exact_in<L: TokenLedger + Clone>(
        &self,
        vault: &Vault<L>,
        sender: &AccountId,
        pool: TokenId,
        exact_bpt_amount_in: u128,
        token_out: TokenId,
    ) -> Result<u128, VaultError> {
        let min_amounts_out = single(vault, pool, token_out, 1)?;
        let params = remove_params(
            sender,
            pool,
            exact_bpt_amount_in,
            &min_amounts_out,
            RemoveLiquidityKind::SingleTokenExactIn,
        );
        vault.quote(|vault| Ok(vault.remove_liquidity(&params)?.amounts_out.iter().sum()))
    }

    /// Amounts an add to a buffer would take.
    pub fn query_add_liquidity_to_buffer<L: TokenLedger + Clone>(
        &self,
        vault: &Vault<L>,
        wrapped: TokenId,
        exact_shares_out: u128,
    ) -> Result<(u128, u128), VaultError> {
        vault.quote(|vault| {
            vault.add_liquidity_to_buffer(wrapped, u128::MAX, u128::MAX, exact_shares_out, &self.account)
        })
    }

    /// Amounts a remove from a buffer would pay. Prices as if `sender`
    /// burned the shares.
    pub fn query_remove_liquidity_from_buffer<L: TokenLedger + Clone>(
        &self,
        vault: &Vault<L>,
        sender: &AccountId,
        wrapped: TokenId,
        shares_in: u128,
    ) -> Result<(u128, u128), VaultError> {
        vault.quote(|vault| vault.remove_liquidity_from_buffer(wrapped, shares_in, 0, 0, sender))
    }

    /// Prices a wrap or unwrap.
    pub fn query_wrap_or_unwrap<L: TokenLedger + Clone>(
        &self,
        vault: &Vault<L>,
        params: &BufferWrapOrUnwrapParams,
    ) -> Result<BufferOutcome, VaultError> {
        vault.quote(|vault| vault.erc4626_buffer_wrap_or_unwrap(params))
    }
}

fn add_params(
    to: &AccountId,
    pool: TokenId,
    max_amounts_in: &[u128],
    bpt: u128,
    kind: AddLiquidityKind,
) -> AddLiquidityParams {
    AddLiquidityParams {
        pool,
        to: to.clone(),
        max_amounts_in: max_amounts_in.to_vec(),
        min_bpt_amount_out: bpt,
        kind,
    }
}

fn remove_params(
    from: &AccountId,
    pool: TokenId,
    bpt: u128,
    min_amounts_out: &[u128],
    kind: RemoveLiquidityKind,
) -> RemoveLiquidityParams {
    RemoveLiquidityParams {
        pool,
        from: from.clone(),
        max_bpt_amount_in: bpt,
        min_amounts_out: min_amounts_out.to_vec(),
        kind,
    }
}

fn single<L: TokenLedger + Clone>(vault: &Vault<L>, pool: TokenId, token: TokenId, amount: u128) -> Result<Vec<u128>, VaultError> {
    let state = vault.pool(pool)?;
    let index = state.token_index(token)?;
    let mut amounts = vec![0; state.tokens().len()];
    amounts[index] = amount;
    Ok(amounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ONE;
    use crate::router::clock::FixedClock;
    use crate::external::Erc4626;
    use crate::test_utils::{account, empty_vault, seeded_buffer, seeded_pool, ADMIN, ALICE};

    fn router() -> Router {
        Router::new(AccountId::new(ROUTER_ACCOUNT), Arc::new(FixedClock(100)))
    }

    #[test]
    fn swap_settles_both_sides() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let router = router();
        let alice = account(ALICE);
        vault.bank_mut().mint(a, &alice, ONE).unwrap();
        vault.bank_mut().approve(a, &alice, router.account(), ONE);

        let swap = SingleSwap {
            pool,
            token_in: a,
            token_out: b,
            amount_given: ONE,
            limit: 0,
        };
        let outcome = router
            .swap_single_token(&mut vault, &alice, SwapKind::ExactIn, &swap, 100, SettlementMode::Pull)
            .unwrap();
        assert_eq!(outcome.amount_out_raw, ONE);
        assert_eq!(vault.bank().balance_of(b, &alice), ONE);
        assert_eq!(vault.reserves_of(a), 101 * ONE);
    }

    #[test]
    fn missing_allowance_reverts_everything() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let before = vault.get_raw_balances(pool).unwrap();
        let alice = account(ALICE);
        vault.bank_mut().mint(a, &alice, ONE).unwrap();

        let swap = SingleSwap {
            pool,
            token_in: a,
            token_out: b,
            amount_given: ONE,
            limit: 0,
        };
        assert!(router()
            .swap_single_token(&mut vault, &alice, SwapKind::ExactIn, &swap, 100, SettlementMode::Pull)
            .is_err());
        assert_eq!(vault.get_raw_balances(pool).unwrap(), before);
        assert!(!vault.is_unlocked());
    }

    #[test]
    fn proportional_round_trip_never_pays_out_more() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let router = router();
        let alice = account(ALICE);
        for token in [a, b] {
            vault.bank_mut().mint(token, &alice, 10 * ONE).unwrap();
            vault.bank_mut().approve(token, &alice, router.account(), u128::MAX);
        }
        let paid = router
            .add_liquidity_proportional(&mut vault, &alice, pool, &[10 * ONE, 10 * ONE], 7 * ONE, SettlementMode::Pull)
            .unwrap();
        let got = router
            .remove_liquidity_proportional(&mut vault, &alice, pool, 7 * ONE, &[0, 0])
            .unwrap();
        assert!(got[0] <= paid[0] && got[1] <= paid[1]);
    }

    #[test]
    fn buffer_wrap_through_router() {
        let (mut vault, wrapper) = seeded_buffer(100 * ONE, 100 * ONE);
        let router = router();
        let alice = account(ALICE);
        vault.bank_mut().mint(wrapper.asset(), &alice, 5 * ONE).unwrap();
        vault
            .bank_mut()
            .approve(wrapper.asset(), &alice, router.account(), u128::MAX);
        let params = BufferWrapOrUnwrapParams {
            kind: SwapKind::ExactIn,
            direction: WrappingDirection::Wrap,
            wrapped: wrapper.wrapped_token(),
            amount_given_raw: 5 * ONE,
            limit_raw: 5 * ONE,
        };
        let quoted = router.query_wrap_or_unwrap(&vault, &params).unwrap();
        let outcome = router
            .wrap_or_unwrap(&mut vault, &alice, &params, SettlementMode::Pull)
            .unwrap();
        assert_eq!(quoted, outcome);
        assert!(!outcome.used_wrapper);
        assert_eq!(vault.bank().balance_of(wrapper.wrapped_token(), &alice), 5 * ONE);
        assert_eq!(vault.buffer_balances(wrapper.wrapped_token()).unwrap(), (105 * ONE, 95 * ONE));
    }

    #[test]
    fn rebalance_needs_a_session() {
        let (mut vault, wrapper) = seeded_buffer(100 * ONE, 100 * ONE);
        assert!(matches!(
            vault.rebalance_buffer(&account(ADMIN), wrapper.wrapped_token()),
            Err(VaultError::VaultLocked)
        ));
        router()
            .rebalance_buffer(&mut vault, &account(ADMIN), wrapper.wrapped_token())
            .unwrap();
    }

    #[test]
    fn thin_buffer_wrap_pays_before_calling_the_wrapper() {
        let (mut vault, wrapper) = seeded_buffer(10 * ONE, 10 * ONE);
        let router = router();
        let alice = account(ALICE);
        vault.bank_mut().mint(wrapper.asset(), &alice, 50 * ONE).unwrap();
        vault
            .bank_mut()
            .approve(wrapper.asset(), &alice, router.account(), u128::MAX);
        let params = BufferWrapOrUnwrapParams {
            kind: SwapKind::ExactIn,
            direction: WrappingDirection::Wrap,
            wrapped: wrapper.wrapped_token(),
            amount_given_raw: 50 * ONE,
            limit_raw: 0,
        };
        let quoted = router.query_wrap_or_unwrap(&vault, &params).unwrap();
        let outcome = router
            .wrap_or_unwrap(&mut vault, &alice, &params, SettlementMode::Pull)
            .unwrap();

        assert_eq!(quoted, outcome);
        assert!(outcome.used_wrapper);
        assert_eq!(vault.bank().balance_of(wrapper.asset(), &alice), 0);
        assert_eq!(vault.bank().balance_of(wrapper.wrapped_token(), &alice), 50 * ONE);
        for token in [wrapper.asset(), wrapper.wrapped_token()] {
            assert_eq!(vault.reserves_of(token), vault.bank().balance_of(token, vault.account()));
        }
    }

    #[test]
    fn thin_buffer_unwrap_exact_out_pays_the_preview() {
        let (mut vault, wrapper) = seeded_buffer(10 * ONE, 10 * ONE);
        let router = router();
        let alice = account(ALICE);
        vault.bank_mut().mint(wrapper.asset(), &alice, 40 * ONE).unwrap();
        wrapper.deposit(vault.bank_mut(), &alice, 40 * ONE).unwrap();
        vault
            .bank_mut()
            .approve(wrapper.wrapped_token(), &alice, router.account(), u128::MAX);
        let params = BufferWrapOrUnwrapParams {
            kind: SwapKind::ExactOut,
            direction: WrappingDirection::Unwrap,
            wrapped: wrapper.wrapped_token(),
            amount_given_raw: 30 * ONE,
            limit_raw: 40 * ONE,
        };
        let outcome = router
            .wrap_or_unwrap(&mut vault, &alice, &params, SettlementMode::Pull)
            .unwrap();

        assert!(outcome.used_wrapper);
        assert_eq!(outcome.amount_in_raw, 30 * ONE);
        assert_eq!(vault.bank().balance_of(wrapper.wrapped_token(), &alice), 10 * ONE);
        assert_eq!(vault.bank().balance_of(wrapper.asset(), &alice), 30 * ONE);
        assert!(!vault.is_unlocked());
    }
}
