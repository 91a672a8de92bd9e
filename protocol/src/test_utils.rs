//! Shared fixtures for unit tests.

use std::sync::Arc;

use crate::config::VaultConfig;
use crate::error::VaultError;
use crate::external::{Action, Authorizer, Erc4626, InMemoryLedger, PoolPricing, PoolSwapParams, RateProvider, TokenLedger};
use crate::math::fixed_point::{mul_up, sub};
use crate::math::Rounding;
use crate::token::{AccountId, TokenId};
use crate::vault::{PoolRegistration, TokenConfig, Vault, VAULT_ACCOUNT};

pub const ADMIN: &str = "admin";
pub const ALICE: &str = "alice";
pub const LP: &str = "lp";

/// 1:1 constant-sum curve. Swaps return the given amount.
#[derive(Debug, Clone, Copy)]
pub struct LinearPricing;

impl PoolPricing for LinearPricing {
    fn compute_swap(&self, params: &PoolSwapParams<'_>) -> Result<u128, VaultError> {
        Ok(params.amount_given_scaled18)
    }

    fn compute_invariant(&self, balances_scaled18: &[u128], _rounding: Rounding) -> Result<u128, VaultError> {
        balances_scaled18
            .iter()
            .try_fold(0u128, |acc, b| acc.checked_add(*b).ok_or(VaultError::Overflow("invariant")))
    }

    fn compute_balance(
        &self,
        balances_scaled18: &[u128],
        token_index: usize,
        invariant_ratio: u128,
    ) -> Result<u128, VaultError> {
        let sum = self.compute_invariant(balances_scaled18, Rounding::Up)?;
        let others = sub(sum, balances_scaled18[token_index], "others")?;
        sub(mul_up(sum, invariant_ratio)?, others, "new balance")
    }
}

/// Constant rate.
#[derive(Debug, Clone, Copy)]
pub struct FixedRate(pub u128);

impl RateProvider for FixedRate {
    fn get_rate(&self) -> Result<u128, VaultError> {
        Ok(self.0)
    }
}

/// Authorizes everything.
#[derive(Debug, Clone, Copy)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn can_perform(&self, _action: Action, _caller: &AccountId) -> bool {
        true
    }
}

/// Authorizes nothing.
#[derive(Debug, Clone, Copy)]
pub struct DenyAll;

impl Authorizer for DenyAll {
    fn can_perform(&self, _action: Action, _caller: &AccountId) -> bool {
        false
    }
}

/// Wrapper of `U` into `W` at exactly 1:1.
#[derive(Debug, Clone)]
pub struct OneToOneWrapper {
    wrapped: TokenId,
    underlying: TokenId,
    account: AccountId,
}

impl OneToOneWrapper {
    pub fn new() -> Self {
        Self {
            wrapped: TokenId::from_symbol("W"),
            underlying: TokenId::from_symbol("U"),
            account: AccountId::new("wrapper"),
        }
    }
}

impl Erc4626 for OneToOneWrapper {
    fn wrapped_token(&self) -> TokenId {
        self.wrapped
    }

    fn asset(&self) -> TokenId {
        self.underlying
    }

    fn preview_deposit(&self, _ledger: &dyn TokenLedger, assets: u128) -> Result<u128, VaultError> {
        Ok(assets)
    }

    fn preview_mint(&self, _ledger: &dyn TokenLedger, shares: u128) -> Result<u128, VaultError> {
        Ok(shares)
    }

    fn preview_redeem(&self, _ledger: &dyn TokenLedger, shares: u128) -> Result<u128, VaultError> {
        Ok(shares)
    }

    fn preview_withdraw(&self, _ledger: &dyn TokenLedger, assets: u128) -> Result<u128, VaultError> {
        Ok(assets)
    }

    fn deposit(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, assets: u128) -> Result<u128, VaultError> {
        ledger.transfer(self.underlying, owner, &self.account, assets)?;
        ledger.mint(self.wrapped, owner, assets)?;
        Ok(assets)
    }

    fn mint(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, shares: u128) -> Result<u128, VaultError> {
        self.deposit(ledger, owner, shares)
    }

    fn redeem(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, shares: u128) -> Result<u128, VaultError> {
        ledger.burn(self.wrapped, owner, shares)?;
        ledger.transfer(self.underlying, &self.account, owner, shares)?;
        Ok(shares)
    }

    fn withdraw(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, assets: u128) -> Result<u128, VaultError> {
        self.redeem(ledger, owner, assets)
    }
}

pub fn wrapper_world() -> (OneToOneWrapper, InMemoryLedger) {
    (OneToOneWrapper::new(), InMemoryLedger::new())
}

pub fn account(name: &str) -> AccountId {
    AccountId::new(name)
}

pub fn vault_account() -> AccountId {
    AccountId::new(VAULT_ACCOUNT)
}

pub fn empty_vault() -> Vault {
    Vault::new(VaultConfig::default(), Arc::new(AllowAll), InMemoryLedger::new()).unwrap()
}

/// Moves `amount` from `from` into the vault and settles it.
pub fn pay_in(vault: &mut Vault, from: &AccountId, token: TokenId, amount: u128) -> Result<u128, VaultError> {
    vault.bank_mut().transfer(token, from, &vault_account(), amount)?;
    vault.settle(token, amount)
}

/// Pays every outstanding positive delta to `to` and every negative one
/// from `from`.
pub fn settle_all(vault: &mut Vault, from: &AccountId, to: &AccountId) -> Result<(), VaultError> {
    let mut deltas: Vec<(TokenId, i128)> = vault
        .session()
        .map(|s| s.deltas.iter().collect())
        .unwrap_or_default();
    deltas.sort_by_key(|(_, delta)| *delta);
    for (token, delta) in deltas {
        if delta < 0 {
            pay_in(vault, from, token, delta.unsigned_abs())?;
        } else {
            vault.send_to(token, to, delta.unsigned_abs())?;
        }
    }
    Ok(())
}

/// Registers a two-token linear pool and seeds it with `amounts` from `LP`.
/// Returns the pool id and its tokens in canonical order.
pub fn seeded_pool(vault: &mut Vault, symbol: &str, amounts: [u128; 2], swap_fee: u128) -> (TokenId, [TokenId; 2]) {
    let pool = TokenId::from_symbol(symbol);
    let mut tokens = [TokenId::from_symbol("A"), TokenId::from_symbol("B")];
    tokens.sort();
    vault
        .register_pool(PoolRegistration {
            pool,
            tokens: tokens.iter().map(|t| TokenConfig::standard(*t, 18)).collect(),
            swap_fee_percentage: swap_fee,
            aggregate_swap_fee_percentage: 0,
            pricing: Arc::new(LinearPricing),
            hooks: None,
        })
        .unwrap();
    let lp = account(LP);
    for (token, amount) in tokens.iter().zip(amounts) {
        vault.bank_mut().mint(*token, &lp, amount).unwrap();
    }
    vault
        .unlock(|v| {
            v.initialize(pool, &lp, &amounts, 0)?;
            settle_all(v, &lp, &lp)
        })
        .unwrap();
    (pool, tokens)
}

/// A vault with the 1:1 wrapper registered and its buffer seeded by `LP`.
pub fn seeded_buffer(underlying: u128, wrapped: u128) -> (Vault, OneToOneWrapper) {
    let mut vault = empty_vault();
    let wrapper = OneToOneWrapper::new();
    vault
        .register_wrapper(&account(ADMIN), Arc::new(wrapper.clone()))
        .unwrap();
    let lp = account(LP);
    vault
        .bank_mut()
        .mint(wrapper.asset(), &lp, underlying + wrapped)
        .unwrap();
    wrapper.deposit(vault.bank_mut(), &lp, wrapped).unwrap();
    vault
        .unlock(|v| {
            v.initialize_buffer(wrapper.wrapped_token(), underlying, wrapped, 0, &lp)?;
            settle_all(v, &lp, &lp)
        })
        .unwrap();
    (vault, wrapper)
}
