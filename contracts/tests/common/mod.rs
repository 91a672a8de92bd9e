//! Shared world-building for the cross-crate scenario tests.

#![allow(dead_code)]

use std::sync::Arc;

use tidal_contracts::{ConstantProductPricing, ConstantSumPricing, RoleAuthorizer, YieldWrapper};
use tidal_vault::config::ONE;
use tidal_vault::external::{Erc4626, InMemoryLedger, PoolHooks, PoolPricing, TokenLedger};
use tidal_vault::router::FixedClock;
use tidal_vault::vault::{PoolRegistration, TokenConfig, VAULT_ACCOUNT};
use tidal_vault::{AccountId, BatchRouter, Router, SettlementMode, TokenId, Vault, VaultConfig};

pub const NOW: u64 = 1_700_000_000;
pub const DEADLINE: u64 = NOW + 60;

pub const ADMIN: &str = "admin";
pub const LP: &str = "lp";
pub const ALICE: &str = "alice";

/// A vault, both routers and the authorizer they share.
pub struct World {
    pub vault: Vault,
    pub router: Router,
    pub batch: BatchRouter,
    pub roles: Arc<RoleAuthorizer>,
}

pub fn token(symbol: &str) -> TokenId {
    TokenId::from_symbol(symbol)
}

pub fn account(name: &str) -> AccountId {
    AccountId::new(name)
}

pub fn vault_account() -> AccountId {
    AccountId::new(VAULT_ACCOUNT)
}

impl World {
    pub fn new() -> Self {
        let roles = Arc::new(RoleAuthorizer::with_admin(&account(ADMIN)));
        let vault = Vault::new(VaultConfig::default(), roles.clone(), InMemoryLedger::new()).unwrap();
        let clock = Arc::new(FixedClock(NOW));
        Self {
            vault,
            router: Router::new(account("router"), clock.clone()),
            batch: BatchRouter::new(account("batch-router"), clock),
            roles,
        }
    }

    /// Mints `amount` of `token` to `who` and approves both routers.
    pub fn fund(&mut self, who: &str, token: TokenId, amount: u128) {
        let who = account(who);
        let router = self.router.account().clone();
        let batch = self.batch.account().clone();
        let bank = self.vault.bank_mut();
        bank.mint(token, &who, amount).unwrap();
        bank.approve(token, &who, &router, u128::MAX);
        bank.approve(token, &who, &batch, u128::MAX);
    }

    pub fn balance(&self, who: &str, token: TokenId) -> u128 {
        self.vault.bank().balance_of(token, &account(who))
    }

    /// Registers a pool over 18-decimal standard tokens.
    pub fn register(
        &mut self,
        pool: &str,
        tokens: &[TokenId],
        swap_fee: u128,
        pricing: Arc<dyn PoolPricing>,
        hooks: Option<Arc<dyn PoolHooks>>,
    ) -> TokenId {
        let id = token(pool);
        self.vault
            .register_pool(PoolRegistration {
                pool: id,
                tokens: tokens.iter().map(|t| TokenConfig::standard(*t, 18)).collect(),
                swap_fee_percentage: swap_fee,
                aggregate_swap_fee_percentage: 0,
                pricing,
                hooks,
            })
            .unwrap();
        id
    }

    /// Amounts in the pool's canonical token order.
    pub fn ordered(&self, pool: TokenId, amounts: &[(TokenId, u128)]) -> Vec<u128> {
        self.vault
            .get_pool_tokens(pool)
            .unwrap()
            .iter()
            .map(|t| {
                amounts
                    .iter()
                    .find(|(token, _)| token == t)
                    .map(|(_, amount)| *amount)
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Funds `LP` and seeds `pool` through the router.
    pub fn seed(&mut self, pool: TokenId, amounts: &[(TokenId, u128)]) -> u128 {
        for (t, amount) in amounts {
            self.fund(LP, *t, *amount);
        }
        let exact = self.ordered(pool, amounts);
        self.router
            .initialize(&mut self.vault, &account(LP), pool, &exact, 0, SettlementMode::Pull)
            .unwrap()
    }

    /// A two-token constant-product pool seeded with `amount` of each.
    pub fn product_pool(&mut self, pool: &str, a: TokenId, b: TokenId, amount: u128, swap_fee: u128) -> TokenId {
        let id = self.register(pool, &[a, b], swap_fee, Arc::new(ConstantProductPricing), None);
        self.seed(id, &[(a, amount), (b, amount)]);
        id
    }

    /// A constant-sum pool seeded with `amount` of each token.
    pub fn sum_pool(&mut self, pool: &str, tokens: &[TokenId], amount: u128) -> TokenId {
        let id = self.register(pool, tokens, 0, Arc::new(ConstantSumPricing), None);
        let amounts: Vec<(TokenId, u128)> = tokens.iter().map(|t| (*t, amount)).collect();
        self.seed(id, &amounts);
        id
    }

    /// Registers a yield wrapper of `underlying` and returns it.
    pub fn wrapper(&mut self, wrapped: &str, underlying: TokenId) -> Arc<YieldWrapper> {
        let wrapper = Arc::new(YieldWrapper::new(token(wrapped), underlying, account(wrapped)));
        self.vault
            .register_wrapper(&account(ADMIN), wrapper.clone())
            .unwrap();
        wrapper
    }

    /// Gives `who` exactly `shares` of the wrapped token by depositing
    /// underlying at the current rate.
    pub fn fund_wrapped(&mut self, who: &str, wrapper: &YieldWrapper, shares: u128) {
        let holder = account(who);
        let assets = wrapper.preview_mint(self.vault.bank(), shares).unwrap();
        self.vault.bank_mut().mint(wrapper.asset(), &holder, assets).unwrap();
        wrapper.mint(self.vault.bank_mut(), &holder, shares).unwrap();
        let router = self.router.account().clone();
        let batch = self.batch.account().clone();
        let bank = self.vault.bank_mut();
        bank.approve(wrapper.wrapped_token(), &holder, &router, u128::MAX);
        bank.approve(wrapper.wrapped_token(), &holder, &batch, u128::MAX);
    }

    /// Seeds the buffer of `wrapper` from `LP`. Returns shares issued.
    pub fn seed_buffer(&mut self, wrapper: &YieldWrapper, underlying: u128, wrapped: u128) -> u128 {
        self.fund(LP, wrapper.asset(), underlying);
        self.fund_wrapped(LP, wrapper, wrapped);
        self.router
            .initialize_buffer(
                &mut self.vault,
                &account(LP),
                wrapper.wrapped_token(),
                underlying,
                wrapped,
                0,
                SettlementMode::Pull,
            )
            .unwrap()
    }

    /// Vault ledger balance equals recorded reserves for every token given.
    pub fn assert_reserves_match_ledger(&self, tokens: &[TokenId]) {
        for t in tokens {
            assert_eq!(
                self.vault.bank().balance_of(*t, &vault_account()),
                self.vault.reserves_of(*t),
                "reserves drifted for {t}"
            );
        }
    }
}

pub fn units(n: u128) -> u128 {
    n * ONE
}
