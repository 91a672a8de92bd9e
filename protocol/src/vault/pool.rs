//! # Pool Balance Store
//!
//! Per-pool state: the canonically ordered token list, one
//! [`PackedBalance`] per token, scaling factors, rate providers, fees, and
//! the pool's share-token (BPT) book.
//!
//! Token order is fixed once, at registration, by sorting on [`TokenId`].
//! Every later array is indexed positionally against it and is never
//! re-sorted.
//!
//! Live balances are recomputed from raw on demand, with an explicit
//! rounding direction, whenever something prices against them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::packed_balance::PackedBalance;
use crate::config::{MAX_POOL_TOKENS, MIN_POOL_TOKENS, ONE};
use crate::error::VaultError;
use crate::external::{PoolHooks, PoolPricing, RateProvider};
use crate::math::fixed_point::to_delta;
use crate::math::scaling::{scaling_factor, to_scaled18_apply_rate};
use crate::math::Rounding;
use crate::token::{AccountId, TokenId};

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// How a token's rate is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Rate is always `ONE`.
    Standard,
    /// Rate comes from the token's rate provider.
    WithRate,
}

/// Per-token registration data.
#[derive(Clone)]
pub struct TokenConfig {
    /// Token id.
    pub token: TokenId,
    /// Native decimals, at most 18.
    pub decimals: u8,
    /// Standard or rate-bearing.
    pub token_type: TokenType,
    /// Required for [`TokenType::WithRate`], ignored otherwise.
    pub rate_provider: Option<Arc<dyn RateProvider>>,
}

impl TokenConfig {
    /// A standard token.
    pub fn standard(token: TokenId, decimals: u8) -> Self {
        Self {
            token,
            decimals,
            token_type: TokenType::Standard,
            rate_provider: None,
        }
    }

    /// A rate-bearing token.
    pub fn with_rate(token: TokenId, decimals: u8, provider: Arc<dyn RateProvider>) -> Self {
        Self {
            token,
            decimals,
            token_type: TokenType::WithRate,
            rate_provider: Some(provider),
        }
    }

    fn rate(&self) -> Result<u128, VaultError> {
        match (&self.token_type, &self.rate_provider) {
            (TokenType::Standard, _) => Ok(ONE),
            (TokenType::WithRate, Some(provider)) => {
                let rate = provider.get_rate()?;
                if rate == 0 {
                    return Err(VaultError::ZeroRate { token: self.token });
                }
                Ok(rate)
            }
            (TokenType::WithRate, None) => Err(VaultError::InvalidRegistration(format!(
                "token {} has no rate provider",
                self.token
            ))),
        }
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("token", &self.token)
            .field("decimals", &self.decimals)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Everything needed to register a pool.
#[derive(Clone)]
pub struct PoolRegistration {
    /// Pool id, which is also its share token.
    pub pool: TokenId,
    /// Tokens in any order; sorted on registration.
    pub tokens: Vec<TokenConfig>,
    /// Static swap fee, 18 decimals.
    pub swap_fee_percentage: u128,
    /// Share of each swap fee kept as protocol fee, 18 decimals.
    pub aggregate_swap_fee_percentage: u128,
    /// The pool's invariant math.
    pub pricing: Arc<dyn PoolPricing>,
    /// Optional lifecycle hooks.
    pub hooks: Option<Arc<dyn PoolHooks>>,
}

impl fmt::Debug for PoolRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistration")
            .field("pool", &self.pool)
            .field("tokens", &self.tokens)
            .field("swap_fee_percentage", &self.swap_fee_percentage)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// PoolData
// ---------------------------------------------------------------------------

/// A pool's balances as loaded for one computation: raw, live (with the
/// requested rounding), and the rates used.
#[derive(Debug, Clone)]
pub struct PoolData {
    /// Canonical token order.
    pub tokens: Vec<TokenId>,
    /// Raw balances.
    pub balances_raw: Vec<u128>,
    /// Live balances, freshly computed.
    pub balances_live_scaled18: Vec<u128>,
    /// `10^(18 − decimals)` per token.
    pub scaling_factors: Vec<u128>,
    /// Rates used for this load.
    pub token_rates: Vec<u128>,
    /// Static swap fee.
    pub swap_fee_percentage: u128,
    /// Protocol share of swap fees.
    pub aggregate_swap_fee_percentage: u128,
}

impl PoolData {
    /// Sets token `index`'s raw balance and recomputes its live balance.
    pub fn update_raw_and_live(
        &mut self,
        index: usize,
        new_raw: u128,
        rounding: Rounding,
    ) -> Result<(), VaultError> {
        self.balances_raw[index] = new_raw;
        self.balances_live_scaled18[index] = to_scaled18_apply_rate(
            new_raw,
            self.scaling_factors[index],
            self.token_rates[index],
            rounding,
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PoolState
// ---------------------------------------------------------------------------

/// Persistent state of one registered pool.
#[derive(Clone)]
pub struct PoolState {
    id: TokenId,
    tokens: Vec<TokenId>,
    configs: Vec<TokenConfig>,
    scaling_factors: Vec<u128>,
    balances: Vec<PackedBalance>,
    aggregate_fees_raw: Vec<u128>,
    swap_fee_percentage: u128,
    aggregate_swap_fee_percentage: u128,
    pricing: Arc<dyn PoolPricing>,
    hooks: Option<Arc<dyn PoolHooks>>,
    total_supply: u128,
    shares: HashMap<AccountId, u128>,
    initialized: bool,
    paused: bool,
}

impl PoolState {
    /// Validates a registration and builds the pool with zero balances.
    ///
    /// Fee caps are checked by the vault, which owns the config.
    pub fn from_registration(registration: PoolRegistration) -> Result<Self, VaultError> {
        let mut configs = registration.tokens;
        if configs.len() < MIN_POOL_TOKENS || configs.len() > MAX_POOL_TOKENS {
            return Err(VaultError::InvalidRegistration(format!(
                "pool needs {MIN_POOL_TOKENS}..={MAX_POOL_TOKENS} tokens, got {}",
                configs.len()
            )));
        }

        configs.sort_by_key(|config| config.token);
        for pair in configs.windows(2) {
            if pair[0].token == pair[1].token {
                return Err(VaultError::InvalidRegistration(format!(
                    "duplicate token {}",
                    pair[0].token
                )));
            }
        }

        let mut scaling_factors = Vec::with_capacity(configs.len());
        for config in &configs {
            if config.token == registration.pool {
                return Err(VaultError::InvalidRegistration(
                    "pool cannot contain its own share token".into(),
                ));
            }
            if config.token_type == TokenType::WithRate && config.rate_provider.is_none() {
                return Err(VaultError::InvalidRegistration(format!(
                    "token {} is rate-bearing but has no rate provider",
                    config.token
                )));
            }
            scaling_factors.push(scaling_factor(config.decimals)?);
        }

        let n = configs.len();
        Ok(Self {
            id: registration.pool,
            tokens: configs.iter().map(|config| config.token).collect(),
            configs,
            scaling_factors,
            balances: vec![PackedBalance::ZERO; n],
            aggregate_fees_raw: vec![0; n],
            swap_fee_percentage: registration.swap_fee_percentage,
            aggregate_swap_fee_percentage: registration.aggregate_swap_fee_percentage,
            pricing: registration.pricing,
            hooks: registration.hooks,
            total_supply: 0,
            shares: HashMap::new(),
            initialized: false,
            paused: false,
        })
    }

    /// Pool id.
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Tokens in canonical order.
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    /// Position of `token`, or [`VaultError::TokenNotRegistered`].
    pub fn token_index(&self, token: TokenId) -> Result<usize, VaultError> {
        self.tokens
            .iter()
            .position(|t| *t == token)
            .ok_or(VaultError::TokenNotRegistered {
                pool: self.id,
                token,
            })
    }

    /// Current rates, failing on a zero rate.
    pub fn token_rates(&self) -> Result<Vec<u128>, VaultError> {
        self.configs.iter().map(TokenConfig::rate).collect()
    }

    /// Loads raw and live balances with fresh rates.
    pub fn load_pool_data(&self, rounding: Rounding) -> Result<PoolData, VaultError> {
        let token_rates = self.token_rates()?;
        let balances_raw = self.raw_balances();
        let mut balances_live_scaled18 = Vec::with_capacity(self.tokens.len());
        for i in 0..self.tokens.len() {
            balances_live_scaled18.push(to_scaled18_apply_rate(
                balances_raw[i],
                self.scaling_factors[i],
                token_rates[i],
                rounding,
            )?);
        }
        Ok(PoolData {
            tokens: self.tokens.clone(),
            balances_raw,
            balances_live_scaled18,
            scaling_factors: self.scaling_factors.clone(),
            token_rates,
            swap_fee_percentage: self.swap_fee_percentage,
            aggregate_swap_fee_percentage: self.aggregate_swap_fee_percentage,
        })
    }

    /// Live balances recomputed now, rounding as asked.
    pub fn load_live_balances(&self, rounding: Rounding) -> Result<Vec<u128>, VaultError> {
        Ok(self.load_pool_data(rounding)?.balances_live_scaled18)
    }

    /// Persists the balances of a [`PoolData`] computed against this pool.
    pub fn write_pool_data(&mut self, data: &PoolData) {
        for (i, balance) in self.balances.iter_mut().enumerate() {
            *balance = PackedBalance::pack(data.balances_raw[i], data.balances_live_scaled18[i]);
        }
    }

    /// Writes new raw balances, refreshes the live cache, and returns the
    /// per-token change `new − old`.
    pub fn update_balances(&mut self, new_raw_amounts: &[u128]) -> Result<Vec<i128>, VaultError> {
        if new_raw_amounts.len() != self.tokens.len() {
            return Err(VaultError::InputLengthMismatch {
                expected: self.tokens.len(),
                got: new_raw_amounts.len(),
            });
        }
        let rates = self.token_rates()?;
        let mut changes = Vec::with_capacity(self.tokens.len());
        let mut updated = Vec::with_capacity(self.tokens.len());
        for (i, &new_raw) in new_raw_amounts.iter().enumerate() {
            let old_raw = self.balances[i].raw();
            let live = to_scaled18_apply_rate(new_raw, self.scaling_factors[i], rates[i], Rounding::Down)?;
            changes.push(to_delta(new_raw)? - to_delta(old_raw)?);
            updated.push(self.balances[i].set_raw(new_raw).set_live(live));
        }
        self.balances = updated;
        Ok(changes)
    }

    /// Raw balances in canonical order.
    pub fn raw_balances(&self) -> Vec<u128> {
        self.balances.iter().map(|b| b.raw()).collect()
    }

    /// Cached live balances as of the last write. May be stale.
    pub fn cached_live_balances(&self) -> Vec<u128> {
        self.balances.iter().map(|b| b.live_scaled18()).collect()
    }

    /// The packed words themselves.
    pub fn packed_balances(&self) -> &[PackedBalance] {
        &self.balances
    }

    /// Scaling factors in canonical order.
    pub fn scaling_factors(&self) -> &[u128] {
        &self.scaling_factors
    }

    pub(crate) fn pricing(&self) -> &dyn PoolPricing {
        self.pricing.as_ref()
    }

    pub(crate) fn hooks(&self) -> Option<Arc<dyn PoolHooks>> {
        self.hooks.clone()
    }

    /// Static swap fee.
    pub fn swap_fee_percentage(&self) -> u128 {
        self.swap_fee_percentage
    }

    pub(crate) fn set_swap_fee_percentage(&mut self, fee: u128) {
        self.swap_fee_percentage = fee;
    }

    /// Protocol share of swap fees.
    pub fn aggregate_swap_fee_percentage(&self) -> u128 {
        self.aggregate_swap_fee_percentage
    }

    pub(crate) fn set_aggregate_swap_fee_percentage(&mut self, fee: u128) {
        self.aggregate_swap_fee_percentage = fee;
    }

    /// Accrued protocol fees per token, raw.
    pub fn aggregate_fees(&self) -> &[u128] {
        &self.aggregate_fees_raw
    }

    pub(crate) fn accrue_aggregate_fee(&mut self, index: usize, amount: u128) -> Result<(), VaultError> {
        self.aggregate_fees_raw[index] = self.aggregate_fees_raw[index]
            .checked_add(amount)
            .ok_or(VaultError::Overflow("aggregate fees"))?;
        Ok(())
    }

    pub(crate) fn take_aggregate_fees(&mut self) -> Vec<u128> {
        std::mem::replace(&mut self.aggregate_fees_raw, vec![0; self.tokens.len()])
    }

    // -- share token --------------------------------------------------------

    /// Total BPT supply, burned minimum included.
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// BPT held by `owner`.
    pub fn share_balance_of(&self, owner: &AccountId) -> u128 {
        self.shares.get(owner).copied().unwrap_or(0)
    }

    /// Mints BPT. `None` mints to nobody (the burned minimum).
    pub(crate) fn mint_shares(&mut self, to: Option<&AccountId>, amount: u128) -> Result<(), VaultError> {
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(VaultError::Overflow("bpt supply"))?;
        if let Some(owner) = to {
            *self.shares.entry(owner.clone()).or_insert(0) += amount;
        }
        Ok(())
    }

    pub(crate) fn burn_shares(&mut self, from: &AccountId, amount: u128) -> Result<(), VaultError> {
        let held = self.share_balance_of(from);
        if held < amount {
            return Err(VaultError::InsufficientShares {
                token: self.id,
                owner: from.clone(),
                available: held,
                requested: amount,
            });
        }
        if held == amount {
            self.shares.remove(from);
        } else {
            self.shares.insert(from.clone(), held - amount);
        }
        self.total_supply -= amount;
        Ok(())
    }

    /// Moves BPT between holders inside the vault.
    pub(crate) fn transfer_shares(&mut self, from: &AccountId, to: &AccountId, amount: u128) -> Result<(), VaultError> {
        self.burn_shares(from, amount)?;
        self.mint_shares(Some(to), amount)
    }

    // -- lifecycle ----------------------------------------------------------

    /// `true` once initial liquidity has been added.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// `true` while paused.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }
}

impl fmt::Debug for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolState")
            .field("id", &self.id)
            .field("tokens", &self.tokens)
            .field("balances", &self.balances)
            .field("total_supply", &self.total_supply)
            .field("initialized", &self.initialized)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FixedRate, LinearPricing};

    fn registration(tokens: Vec<TokenConfig>) -> PoolRegistration {
        PoolRegistration {
            pool: TokenId::from_symbol("POOL"),
            tokens,
            swap_fee_percentage: 0,
            aggregate_swap_fee_percentage: 0,
            pricing: Arc::new(LinearPricing),
            hooks: None,
        }
    }

    #[test]
    fn tokens_sorted_once_at_registration() {
        let a = TokenId::from_symbol("A");
        let b = TokenId::from_symbol("B");
        let pool = PoolState::from_registration(registration(vec![
            TokenConfig::standard(a, 18),
            TokenConfig::standard(b, 18),
        ]))
        .unwrap();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(pool.tokens(), expected.as_slice());
    }

    #[test]
    fn duplicate_and_single_token_pools_rejected() {
        let a = TokenId::from_symbol("A");
        assert!(PoolState::from_registration(registration(vec![
            TokenConfig::standard(a, 18),
            TokenConfig::standard(a, 18),
        ]))
        .is_err());
        assert!(PoolState::from_registration(registration(vec![TokenConfig::standard(a, 18)])).is_err());
    }

    #[test]
    fn live_balances_apply_decimals_and_rate() {
        let a = TokenId::from_symbol("A");
        let b = TokenId::from_symbol("B");
        let mut pool = PoolState::from_registration(registration(vec![
            TokenConfig::standard(a, 6),
            TokenConfig::with_rate(b, 18, Arc::new(FixedRate(2 * ONE))),
        ]))
        .unwrap();
        let ia = pool.token_index(a).unwrap();
        let ib = pool.token_index(b).unwrap();
        let mut raw = vec![0; 2];
        raw[ia] = 5_000_000;
        raw[ib] = 3 * ONE;
        let changes = pool.update_balances(&raw).unwrap();
        assert_eq!(changes[ia], 5_000_000);

        let live = pool.load_live_balances(Rounding::Down).unwrap();
        assert_eq!(live[ia], 5 * ONE);
        assert_eq!(live[ib], 6 * ONE);
        assert_eq!(pool.cached_live_balances(), live);
    }

    #[test]
    fn zero_rate_fails_the_load() {
        let a = TokenId::from_symbol("A");
        let b = TokenId::from_symbol("B");
        let pool = PoolState::from_registration(registration(vec![
            TokenConfig::standard(a, 18),
            TokenConfig::with_rate(b, 18, Arc::new(FixedRate(0))),
        ]))
        .unwrap();
        assert_eq!(
            pool.load_live_balances(Rounding::Up).unwrap_err(),
            VaultError::ZeroRate { token: b }
        );
    }

    #[test]
    fn update_balances_reports_signed_changes() {
        let a = TokenId::from_symbol("A");
        let b = TokenId::from_symbol("B");
        let mut pool = PoolState::from_registration(registration(vec![
            TokenConfig::standard(a, 18),
            TokenConfig::standard(b, 18),
        ]))
        .unwrap();
        pool.update_balances(&[100, 100]).unwrap();
        let changes = pool.update_balances(&[150, 40]).unwrap();
        assert_eq!(changes, vec![50, -60]);
        assert_eq!(pool.raw_balances(), vec![150, 40]);
        assert!(pool.update_balances(&[1]).is_err());
    }

    #[test]
    fn share_book_tracks_supply() {
        let a = TokenId::from_symbol("A");
        let b = TokenId::from_symbol("B");
        let mut pool = PoolState::from_registration(registration(vec![
            TokenConfig::standard(a, 18),
            TokenConfig::standard(b, 18),
        ]))
        .unwrap();
        let alice = AccountId::new("alice");
        pool.mint_shares(None, 1_000).unwrap();
        pool.mint_shares(Some(&alice), 500).unwrap();
        assert_eq!(pool.total_supply(), 1_500);
        assert!(pool.burn_shares(&alice, 501).is_err());
        pool.burn_shares(&alice, 500).unwrap();
        assert_eq!(pool.total_supply(), 1_000);
    }
}
