//! # Settlement Engine
//!
//! [`Vault`] owns every pool, buffer and reserve, and is the only thing
//! allowed to write them. Value moves in three phases:
//!
//! ```text
//!   unlock ──► primitives (swap, add/remove, buffer ops) ──► settle / send_to ──► lock
//!                    │                                            │
//!                    └──── push signed deltas ───► ledger ◄───────┘
//! ```
//!
//! `lock` happens automatically when the top-level [`Vault::unlock`]
//! closure returns, and fails with [`VaultError::BalanceNotSettled`] unless
//! every delta netted to zero. Any error, including that one, restores the
//! vault (state *and* token ledger) to the snapshot taken at unlock.
//!
//! Nested `unlock` calls join the open session instead of locking, so a
//! router can call another router. Depth is bounded by the config. They
//! take no snapshot of their own: the top-level one covers them.
//!
//! Each primitive runs under [`Vault::atomic`] with a [`Scope`] naming the
//! pool or buffer it writes, and restores only that (plus the session and
//! reserves) if it fails. The token ledger is saved only for primitives
//! that may call a wrapper.
//!
//! ## Reserves
//!
//! The vault records how much of each token it believes it holds. `settle`
//! compares that record against the real ledger balance and treats the
//! increase as payment. `send_to` is the only way tokens leave.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use super::buffer::BufferState;
use super::pool::{PoolRegistration, PoolState};
use super::session::Session;
use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::external::{Action, Authorizer, Erc4626, InMemoryLedger, TokenLedger};
use crate::math::fixed_point::to_delta;
use crate::math::Rounding;
use crate::token::{AccountId, TokenId};

/// Ledger account the vault holds its reserves under.
pub const VAULT_ACCOUNT: &str = "vault";

/// What a primitive may write, and so what [`Vault::atomic`] restores if
/// it fails. Session deltas and reserves are always covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Scope {
    pool: Option<TokenId>,
    buffer: Option<TokenId>,
    bank: bool,
}

impl Scope {
    /// Session deltas and reserves only.
    pub(crate) const SESSION: Self = Self {
        pool: None,
        buffer: None,
        bank: false,
    };

    pub(crate) fn pool(pool: TokenId) -> Self {
        Self {
            pool: Some(pool),
            ..Self::SESSION
        }
    }

    pub(crate) fn buffer(wrapped: TokenId) -> Self {
        Self {
            buffer: Some(wrapped),
            ..Self::SESSION
        }
    }

    /// A buffer plus the token ledger, for anything that may call the
    /// wrapper.
    pub(crate) fn wrapping(wrapped: TokenId) -> Self {
        Self {
            buffer: Some(wrapped),
            bank: true,
            ..Self::SESSION
        }
    }
}

/// State saved by [`Vault::atomic`]. `None` inside a slot means the entry
/// did not exist and is removed on restore.
struct Checkpoint<L> {
    session: Option<Session>,
    reserves: HashMap<TokenId, u128>,
    pool: Option<(TokenId, Option<PoolState>)>,
    buffer: Option<(TokenId, Option<BufferState>)>,
    bank: Option<L>,
}

/// The multi-pool vault.
#[derive(Debug, Clone)]
pub struct Vault<L = InMemoryLedger> {
    pub(crate) config: VaultConfig,
    pub(crate) account: AccountId,
    pub(crate) bank: L,
    pub(crate) authorizer: Arc<dyn Authorizer>,
    pub(crate) pools: HashMap<TokenId, PoolState>,
    pub(crate) buffers: HashMap<TokenId, BufferState>,
    pub(crate) wrappers: HashMap<TokenId, Arc<dyn Erc4626>>,
    pub(crate) reserves: HashMap<TokenId, u128>,
    pub(crate) paused: bool,
    pub(crate) session: Option<Session>,
}

impl<L: TokenLedger + Clone> Vault<L> {
    /// Creates an empty vault over `bank`.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidConfig`] if `config` does not validate.
    pub fn new(config: VaultConfig, authorizer: Arc<dyn Authorizer>, bank: L) -> Result<Self, VaultError> {
        config.validate()?;
        Ok(Self {
            config,
            account: AccountId::new(VAULT_ACCOUNT),
            bank,
            authorizer,
            pools: HashMap::new(),
            buffers: HashMap::new(),
            wrappers: HashMap::new(),
            reserves: HashMap::new(),
            paused: false,
            session: None,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// The vault's own ledger account.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// The token ledger.
    pub fn bank(&self) -> &L {
        &self.bank
    }

    /// Mutable access to the token ledger, for funding accounts and for
    /// callers that pay the vault directly before calling `settle`.
    pub fn bank_mut(&mut self) -> &mut L {
        &mut self.bank
    }

    // -----------------------------------------------------------------------
    // Unlock / lock
    // -----------------------------------------------------------------------

    /// Runs `f` inside an unlocked session.
    ///
    /// At the top level, the session is locked after `f` returns; if any
    /// delta is still open the whole operation fails and is rolled back.
    /// Nested calls run inside the already-open session and never lock.
    ///
    /// # Errors
    ///
    /// Whatever `f` returns, [`VaultError::BalanceNotSettled`] on an
    /// unbalanced top-level exit, or [`VaultError::ReentrancyLimit`].
    pub fn unlock<T, F>(&mut self, f: F) -> Result<T, VaultError>
    where
        F: FnOnce(&mut Self) -> Result<T, VaultError>,
    {
        if let Some(session) = &self.session {
            let depth = session.depth() + 1;
            let max = self.config.max_unlock_depth;
            if depth > max {
                return Err(VaultError::ReentrancyLimit { depth, max });
            }
            if let Some(session) = self.session.as_mut() {
                session.enter();
            }
            let result = f(self);
            if let Some(session) = self.session.as_mut() {
                session.exit();
            }
            return result;
        }

        let snapshot = self.clone();
        let session = Session::open(false);
        let span = info_span!("unlock", session = %session.id());
        let _guard = span.enter();
        info!("session opened");
        self.session = Some(session);

        match f(self).and_then(|value| self.lock().map(|()| value)) {
            Ok(value) => {
                info!("session settled");
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, kind = %err.kind(), "operation reverted");
                *self = snapshot;
                Err(err)
            }
        }
    }

    fn lock(&mut self) -> Result<(), VaultError> {
        let session = self.session.as_ref().ok_or(VaultError::VaultLocked)?;
        if let Some((token, delta)) = session.deltas.first_outstanding() {
            return Err(VaultError::BalanceNotSettled {
                outstanding: session.deltas.non_zero_count(),
                token,
                delta,
            });
        }
        self.session = None;
        Ok(())
    }

    /// Runs `f` against a throwaway copy of the vault in query mode and
    /// returns its result. Nothing persists, and outstanding deltas are
    /// simply dropped.
    pub fn quote<T, F>(&self, f: F) -> Result<T, VaultError>
    where
        F: FnOnce(&mut Self) -> Result<T, VaultError>,
    {
        let mut sandbox = self.clone();
        sandbox.session = Some(Session::open(true));
        f(&mut sandbox)
    }

    /// Runs `f`, restoring what `scope` covers if it fails. Primitives use
    /// this so a caller that recovers from an error never sees half an
    /// operation.
    pub(crate) fn atomic<T, F>(&mut self, scope: Scope, f: F) -> Result<T, VaultError>
    where
        F: FnOnce(&mut Self) -> Result<T, VaultError>,
    {
        let checkpoint = self.checkpoint(scope);
        let result = f(self);
        if result.is_err() {
            self.restore(checkpoint);
        }
        result
    }

    fn checkpoint(&self, scope: Scope) -> Checkpoint<L> {
        Checkpoint {
            session: self.session.clone(),
            reserves: self.reserves.clone(),
            pool: scope.pool.map(|id| (id, self.pools.get(&id).cloned())),
            buffer: scope.buffer.map(|id| (id, self.buffers.get(&id).cloned())),
            bank: scope.bank.then(|| self.bank.clone()),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint<L>) {
        self.session = checkpoint.session;
        self.reserves = checkpoint.reserves;
        if let Some((id, state)) = checkpoint.pool {
            match state {
                Some(state) => self.pools.insert(id, state),
                None => self.pools.remove(&id),
            };
        }
        if let Some((id, state)) = checkpoint.buffer {
            match state {
                Some(state) => self.buffers.insert(id, state),
                None => self.buffers.remove(&id),
            };
        }
        if let Some(bank) = checkpoint.bank {
            self.bank = bank;
        }
    }

    /// `true` while a session is open.
    pub fn is_unlocked(&self) -> bool {
        self.session.is_some()
    }

    /// `true` inside [`Vault::quote`].
    pub fn is_query(&self) -> bool {
        self.session.as_ref().is_some_and(Session::is_query)
    }

    /// The open session, if any.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Outstanding delta of `token` in the open session (zero when locked).
    pub fn get_delta(&self, token: TokenId) -> i128 {
        self.session
            .as_ref()
            .map_or(0, |session| session.deltas.get_delta(token))
    }

    pub(crate) fn ensure_unlocked(&self) -> Result<(), VaultError> {
        if self.session.is_none() {
            return Err(VaultError::VaultLocked);
        }
        Ok(())
    }

    pub(crate) fn ensure_not_paused(&self) -> Result<(), VaultError> {
        if self.paused {
            return Err(VaultError::VaultPaused);
        }
        Ok(())
    }

    fn account_delta(&mut self, token: TokenId, delta: i128) -> Result<(), VaultError> {
        let session = self.session.as_mut().ok_or(VaultError::VaultLocked)?;
        session.deltas.account_delta(token, delta)
    }

    /// Records that the vault must receive `amount` of `token`.
    pub(crate) fn take_debt(&mut self, token: TokenId, amount: u128) -> Result<(), VaultError> {
        self.account_delta(token, -to_delta(amount)?)
    }

    /// Records that the vault owes `amount` of `token`.
    pub(crate) fn supply_credit(&mut self, token: TokenId, amount: u128) -> Result<(), VaultError> {
        self.account_delta(token, to_delta(amount)?)
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Recorded reserves of `token`.
    pub fn reserves_of(&self, token: TokenId) -> u128 {
        self.reserves.get(&token).copied().unwrap_or(0)
    }

    /// Credits tokens paid into the vault since the last reserve update.
    ///
    /// The credit is `min(balance − reserves, amount_hint)`; any excess
    /// stays in reserves as a donation.
    ///
    /// # Errors
    ///
    /// [`VaultError::VaultLocked`], or [`VaultError::ReservesDecreased`] if
    /// the vault's real balance fell below its record.
    pub fn settle(&mut self, token: TokenId, amount_hint: u128) -> Result<u128, VaultError> {
        self.ensure_unlocked()?;
        let recorded = self.reserves_of(token);
        let actual = self.bank.balance_of(token, &self.account);
        if actual < recorded {
            return Err(VaultError::ReservesDecreased {
                token,
                recorded,
                actual,
            });
        }
        let credit = (actual - recorded).min(amount_hint);
        self.supply_credit(token, credit)?;
        self.reserves.insert(token, actual);
        debug!(%token, credit, reserves = actual, "settled");
        Ok(credit)
    }

    /// Pays `amount` of `token` out of reserves to `to`, drawing down the
    /// session's credit for that token.
    ///
    /// # Errors
    ///
    /// [`VaultError::VaultLocked`], [`VaultError::InsufficientReserves`], or
    /// a ledger transfer failure.
    pub fn send_to(&mut self, token: TokenId, to: &AccountId, amount: u128) -> Result<(), VaultError> {
        self.ensure_unlocked()?;
        if amount == 0 {
            return Ok(());
        }
        let available = self.reserves_of(token);
        if available < amount {
            return Err(VaultError::InsufficientReserves {
                token,
                available,
                requested: amount,
            });
        }
        self.atomic(Scope::SESSION, |vault| {
            vault.take_debt(token, amount)?;
            vault.reserves.insert(token, available - amount);
            let from = vault.account.clone();
            vault.bank.transfer(token, &from, to, amount)?;
            debug!(%token, %to, amount, "sent");
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Pools: registration and reads
    // -----------------------------------------------------------------------

    /// Registers a pool. Tokens are sorted canonically here, once.
    ///
    /// # Errors
    ///
    /// [`VaultError::PoolAlreadyRegistered`], a fee above its cap, or any
    /// registration validation error.
    pub fn register_pool(&mut self, registration: PoolRegistration) -> Result<(), VaultError> {
        if self.pools.contains_key(&registration.pool) {
            return Err(VaultError::PoolAlreadyRegistered(registration.pool));
        }
        self.check_swap_fee(registration.swap_fee_percentage)?;
        self.check_aggregate_fee(registration.aggregate_swap_fee_percentage)?;
        let pool = PoolState::from_registration(registration)?;
        info!(pool = %pool.id(), tokens = pool.tokens().len(), "pool registered");
        self.pools.insert(pool.id(), pool);
        Ok(())
    }

    fn check_swap_fee(&self, fee: u128) -> Result<(), VaultError> {
        if fee > self.config.max_swap_fee_percentage {
            return Err(VaultError::SwapFeeTooHigh {
                fee,
                max: self.config.max_swap_fee_percentage,
            });
        }
        Ok(())
    }

    fn check_aggregate_fee(&self, fee: u128) -> Result<(), VaultError> {
        if fee > self.config.max_aggregate_fee_percentage {
            return Err(VaultError::AggregateFeeTooHigh {
                fee,
                max: self.config.max_aggregate_fee_percentage,
            });
        }
        Ok(())
    }

    /// `true` if `pool` is registered.
    pub fn is_pool_registered(&self, pool: TokenId) -> bool {
        self.pools.contains_key(&pool)
    }

    /// Read access to a pool.
    pub fn pool(&self, pool: TokenId) -> Result<&PoolState, VaultError> {
        self.pools
            .get(&pool)
            .ok_or(VaultError::PoolNotRegistered(pool))
    }

    pub(crate) fn pool_mut(&mut self, pool: TokenId) -> Result<&mut PoolState, VaultError> {
        self.pools
            .get_mut(&pool)
            .ok_or(VaultError::PoolNotRegistered(pool))
    }

    /// Pool tokens in canonical order.
    pub fn get_pool_tokens(&self, pool: TokenId) -> Result<Vec<TokenId>, VaultError> {
        Ok(self.pool(pool)?.tokens().to_vec())
    }

    /// Raw balances in canonical order.
    pub fn get_raw_balances(&self, pool: TokenId) -> Result<Vec<u128>, VaultError> {
        Ok(self.pool(pool)?.raw_balances())
    }

    /// Live balances recomputed with current rates.
    pub fn load_live_balances(&self, pool: TokenId, rounding: Rounding) -> Result<Vec<u128>, VaultError> {
        self.pool(pool)?.load_live_balances(rounding)
    }

    /// BPT supply of `pool`.
    pub fn total_supply(&self, pool: TokenId) -> Result<u128, VaultError> {
        Ok(self.pool(pool)?.total_supply())
    }

    /// BPT held by `owner`.
    pub fn share_balance_of(&self, pool: TokenId, owner: &AccountId) -> Result<u128, VaultError> {
        Ok(self.pool(pool)?.share_balance_of(owner))
    }

    /// Moves BPT between holders. Routers use this to stage intermediate
    /// pool tokens on their own account.
    pub fn transfer_shares(
        &mut self,
        pool: TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), VaultError> {
        self.pool_mut(pool)?.transfer_shares(from, to, amount)
    }

    /// Ids of all registered pools.
    pub fn pool_ids(&self) -> Vec<TokenId> {
        let mut ids: Vec<TokenId> = self.pools.keys().copied().collect();
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Governance
    // -----------------------------------------------------------------------

    pub(crate) fn ensure_authorized(&self, action: Action, caller: &AccountId) -> Result<(), VaultError> {
        if !self.authorizer.can_perform(action, caller) {
            warn!(%caller, %action, "unauthorized call");
            return Err(VaultError::Unauthorized {
                caller: caller.clone(),
                action: action.to_string(),
            });
        }
        Ok(())
    }

    /// `true` while the vault is paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pauses every mutating primitive.
    pub fn pause_vault(&mut self, caller: &AccountId) -> Result<(), VaultError> {
        self.ensure_authorized(Action::PauseVault, caller)?;
        self.paused = true;
        info!(%caller, "vault paused");
        Ok(())
    }

    /// Lifts a vault pause.
    pub fn unpause_vault(&mut self, caller: &AccountId) -> Result<(), VaultError> {
        self.ensure_authorized(Action::UnpauseVault, caller)?;
        self.paused = false;
        info!(%caller, "vault unpaused");
        Ok(())
    }

    /// Pauses one pool.
    pub fn pause_pool(&mut self, caller: &AccountId, pool: TokenId) -> Result<(), VaultError> {
        self.ensure_authorized(Action::PausePool, caller)?;
        self.pool_mut(pool)?.set_paused(true);
        info!(%caller, %pool, "pool paused");
        Ok(())
    }

    /// Lifts a pool pause.
    pub fn unpause_pool(&mut self, caller: &AccountId, pool: TokenId) -> Result<(), VaultError> {
        self.ensure_authorized(Action::UnpausePool, caller)?;
        self.pool_mut(pool)?.set_paused(false);
        info!(%caller, %pool, "pool unpaused");
        Ok(())
    }

    /// Changes a pool's static swap fee.
    pub fn set_static_swap_fee_percentage(
        &mut self,
        caller: &AccountId,
        pool: TokenId,
        fee: u128,
    ) -> Result<(), VaultError> {
        self.ensure_authorized(Action::SetSwapFee, caller)?;
        self.check_swap_fee(fee)?;
        self.pool_mut(pool)?.set_swap_fee_percentage(fee);
        info!(%caller, %pool, fee, "swap fee changed");
        Ok(())
    }

    /// Changes a pool's aggregate (protocol) fee share.
    pub fn set_aggregate_swap_fee_percentage(
        &mut self,
        caller: &AccountId,
        pool: TokenId,
        fee: u128,
    ) -> Result<(), VaultError> {
        self.ensure_authorized(Action::SetAggregateFee, caller)?;
        self.check_aggregate_fee(fee)?;
        self.pool_mut(pool)?.set_aggregate_swap_fee_percentage(fee);
        info!(%caller, %pool, fee, "aggregate fee changed");
        Ok(())
    }

    /// Credits all accrued protocol fees of `pool` to the session so the
    /// caller can `send_to` them. Unlock-scoped.
    pub fn collect_aggregate_fees(
        &mut self,
        caller: &AccountId,
        pool: TokenId,
    ) -> Result<Vec<(TokenId, u128)>, VaultError> {
        self.ensure_unlocked()?;
        self.ensure_authorized(Action::CollectAggregateFees, caller)?;
        self.atomic(Scope::pool(pool), |vault| {
            let state = vault.pool_mut(pool)?;
            let tokens = state.tokens().to_vec();
            let fees = state.take_aggregate_fees();
            let mut collected = Vec::with_capacity(tokens.len());
            for (token, amount) in tokens.into_iter().zip(fees) {
                vault.supply_credit(token, amount)?;
                collected.push((token, amount));
            }
            info!(%caller, %pool, "aggregate fees collected");
            Ok(collected)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ONE;
    use crate::external::SwapKind;
    use crate::test_utils::{account, empty_vault, pay_in, seeded_pool, DenyAll, ALICE};
    use crate::vault::VaultSwapParams;

    fn swap_params(pool: TokenId, token_in: TokenId, token_out: TokenId, amount: u128) -> VaultSwapParams {
        VaultSwapParams {
            kind: SwapKind::ExactIn,
            pool,
            token_in,
            token_out,
            amount_given_raw: amount,
            limit_raw: 0,
            router: AccountId::new("router"),
        }
    }

    #[test]
    fn primitives_refuse_to_run_locked() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let err = vault.swap(&swap_params(pool, a, b, ONE)).unwrap_err();
        assert_eq!(err, VaultError::VaultLocked);
        assert!(matches!(vault.settle(a, 1), Err(VaultError::VaultLocked)));
    }

    #[test]
    fn unsettled_session_rolls_back() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let before = vault.get_raw_balances(pool).unwrap();

        let err = vault
            .unlock(|v| v.swap(&swap_params(pool, a, b, ONE)).map(|_| ()))
            .unwrap_err();
        assert!(matches!(err, VaultError::BalanceNotSettled { outstanding: 2, .. }));
        assert_eq!(vault.get_raw_balances(pool).unwrap(), before);
        assert!(!vault.is_unlocked());
    }

    #[test]
    fn settled_session_locks() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let alice = account(ALICE);
        vault.bank_mut().mint(a, &alice, ONE).unwrap();

        vault
            .unlock(|v| {
                let out = v.swap(&swap_params(pool, a, b, ONE))?;
                assert_eq!(v.get_delta(a), -(ONE as i128));
                pay_in(v, &alice, a, ONE)?;
                v.send_to(b, &alice, out.amount_out_raw)
            })
            .unwrap();
        assert_eq!(vault.bank().balance_of(b, &alice), ONE);
        assert_eq!(vault.get_delta(a), 0);
    }

    #[test]
    fn nested_unlock_joins_the_session() {
        let mut vault = empty_vault();
        vault
            .unlock(|outer| {
                let id = outer.session().map(Session::id);
                outer.unlock(|inner| {
                    assert_eq!(inner.session().map(Session::id), id);
                    assert_eq!(inner.session().map(Session::depth), Some(2));
                    Ok(())
                })?;
                assert!(outer.is_unlocked());
                Ok(())
            })
            .unwrap();
        assert!(!vault.is_unlocked());
    }

    #[test]
    fn failed_primitive_leaves_earlier_work_in_place() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let alice = account(ALICE);
        vault.bank_mut().mint(a, &alice, ONE).unwrap();

        vault
            .unlock(|v| {
                let out = v.swap(&swap_params(pool, a, b, ONE))?;
                let after_first = v.get_raw_balances(pool)?;

                let mut greedy = swap_params(pool, a, b, ONE);
                greedy.limit_raw = 2 * ONE;
                assert!(matches!(v.swap(&greedy), Err(VaultError::SwapLimit { .. })));
                assert_eq!(v.get_raw_balances(pool)?, after_first);
                assert_eq!(v.get_delta(a), -(ONE as i128));
                assert_eq!(v.get_delta(b), out.amount_out_raw as i128);

                pay_in(v, &alice, a, ONE)?;
                v.send_to(b, &alice, out.amount_out_raw)
            })
            .unwrap();
        assert_eq!(vault.bank().balance_of(b, &alice), ONE);
    }

    #[test]
    fn failed_nested_unlock_restores_depth_only() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let before = vault.get_raw_balances(pool).unwrap();

        let err = vault
            .unlock(|outer| {
                let nested = outer.unlock(|inner| {
                    inner.swap(&swap_params(pool, a, b, ONE))?;
                    Err::<(), _>(VaultError::VaultLocked)
                });
                assert!(nested.is_err());
                assert_eq!(outer.session().map(Session::depth), Some(1));
                // The nested swap stands until the top level settles or reverts.
                assert_eq!(outer.get_delta(a), -(ONE as i128));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, VaultError::BalanceNotSettled { .. }));
        assert_eq!(vault.get_raw_balances(pool).unwrap(), before);
    }

    #[test]
    fn nesting_depth_is_bounded() {
        let config = VaultConfig {
            max_unlock_depth: 2,
            ..VaultConfig::default()
        };
        let mut vault = Vault::new(config, Arc::new(DenyAll), InMemoryLedger::new()).unwrap();
        let err = vault
            .unlock(|a| a.unlock(|b| b.unlock(|_| Ok(()))))
            .unwrap_err();
        assert_eq!(err, VaultError::ReentrancyLimit { depth: 3, max: 2 });
    }

    #[test]
    fn settle_keeps_excess_as_donation() {
        let mut vault = empty_vault();
        let token = TokenId::from_symbol("DAI");
        let alice = account(ALICE);
        vault.bank_mut().mint(token, &alice, 10).unwrap();
        vault
            .bank_mut()
            .transfer(token, &alice, &AccountId::new(VAULT_ACCOUNT), 10)
            .unwrap();
        let err = vault
            .unlock(|v| {
                let credit = v.settle(token, 4)?;
                assert_eq!(credit, 4);
                assert_eq!(v.reserves_of(token), 10);
                Ok(())
            })
            .unwrap_err();
        // Four units of credit were never claimed.
        assert!(matches!(err, VaultError::BalanceNotSettled { delta: 4, .. }));
    }

    #[test]
    fn send_to_respects_reserves() {
        let mut vault = empty_vault();
        let token = TokenId::from_symbol("DAI");
        let err = vault
            .unlock(|v| v.send_to(token, &account(ALICE), 1))
            .unwrap_err();
        assert!(matches!(err, VaultError::InsufficientReserves { available: 0, .. }));
    }

    #[test]
    fn quote_never_persists() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        let before = vault.get_raw_balances(pool).unwrap();
        for _ in 0..3 {
            let out = vault.quote(|v| v.swap(&swap_params(pool, a, b, ONE))).unwrap();
            assert_eq!(out.amount_out_raw, ONE);
        }
        assert_eq!(vault.get_raw_balances(pool).unwrap(), before);
        assert_eq!(vault.total_supply(pool).unwrap(), 200 * ONE);
    }

    #[test]
    fn governance_goes_through_the_authorizer() {
        let mut vault = Vault::new(VaultConfig::default(), Arc::new(DenyAll), InMemoryLedger::new()).unwrap();
        let err = vault.pause_vault(&account(ALICE)).unwrap_err();
        assert!(matches!(err, VaultError::Unauthorized { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::Authorization);
        assert!(!vault.is_paused());
    }

    #[test]
    fn paused_vault_rejects_primitives() {
        let mut vault = empty_vault();
        let (pool, [a, b]) = seeded_pool(&mut vault, "POOL", [100 * ONE, 100 * ONE], 0);
        vault.pause_vault(&account("admin")).unwrap();
        let err = vault
            .unlock(|v| v.swap(&swap_params(pool, a, b, ONE)).map(|_| ()))
            .unwrap_err();
        assert_eq!(err, VaultError::VaultPaused);

        vault.unpause_vault(&account("admin")).unwrap();
        vault.pause_pool(&account("admin"), pool).unwrap();
        let err = vault
            .unlock(|v| v.swap(&swap_params(pool, a, b, ONE)).map(|_| ()))
            .unwrap_err();
        assert_eq!(err, VaultError::PoolPaused(pool));
    }
}
