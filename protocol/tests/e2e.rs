//! End-to-end tests for the Tidal vault.
//!
//! These drive the public API only: pool registration, seeding through the
//! router, swaps settled by the router or by hand inside `unlock`, and a
//! batch path that crosses a pool and an ERC4626 buffer. After every
//! operation the vault's ledger balance of each token must equal its
//! recorded reserves.
//!
//! Each test builds its own vault. No shared state.

use std::sync::Arc;

use tidal_vault::config::ONE;
use tidal_vault::external::{
    Action, Authorizer, Erc4626, InMemoryLedger, PoolPricing, PoolSwapParams, SwapKind, TokenLedger,
};
use tidal_vault::math::fixed_point::{mul_up, sub};
use tidal_vault::math::Rounding;
use tidal_vault::router::{FixedClock, SingleSwap, SwapPathExactAmountIn, SwapPathStep};
use tidal_vault::vault::{PoolRegistration, TokenConfig, VaultSwapParams, VAULT_ACCOUNT};
use tidal_vault::{AccountId, BatchRouter, Router, SettlementMode, TokenId, Vault, VaultConfig, VaultError};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const NOW: u64 = 1_700_000_000;
const DEADLINE: u64 = NOW + 60;

#[derive(Debug)]
struct Open;

impl Authorizer for Open {
    fn can_perform(&self, _action: Action, _caller: &AccountId) -> bool {
        true
    }
}

#[derive(Debug)]
struct Linear;

impl PoolPricing for Linear {
    fn compute_swap(&self, params: &PoolSwapParams<'_>) -> Result<u128, VaultError> {
        Ok(params.amount_given_scaled18)
    }

    fn compute_invariant(&self, balances: &[u128], _rounding: Rounding) -> Result<u128, VaultError> {
        balances
            .iter()
            .try_fold(0u128, |acc, b| acc.checked_add(*b).ok_or(VaultError::Overflow("invariant")))
    }

    fn compute_balance(&self, balances: &[u128], index: usize, ratio: u128) -> Result<u128, VaultError> {
        let sum = self.compute_invariant(balances, Rounding::Up)?;
        let others = sub(sum, balances[index], "others")?;
        sub(mul_up(sum, ratio)?, others, "new balance")
    }
}

/// Wraps `U` into `W` one for one.
#[derive(Debug)]
struct Par {
    account: AccountId,
}

impl Erc4626 for Par {
    fn wrapped_token(&self) -> TokenId {
        token("W")
    }

    fn asset(&self) -> TokenId {
        token("U")
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
        ledger.transfer(token("U"), owner, &self.account, assets)?;
        ledger.mint(token("W"), owner, assets)?;
        Ok(assets)
    }

    fn mint(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, shares: u128) -> Result<u128, VaultError> {
        self.deposit(ledger, owner, shares)
    }

    fn redeem(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, shares: u128) -> Result<u128, VaultError> {
        ledger.burn(token("W"), owner, shares)?;
        ledger.transfer(token("U"), &self.account, owner, shares)?;
        Ok(shares)
    }

    fn withdraw(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, assets: u128) -> Result<u128, VaultError> {
        self.redeem(ledger, owner, assets)
    }
}

fn token(symbol: &str) -> TokenId {
    TokenId::from_symbol(symbol)
}

fn account(name: &str) -> AccountId {
    AccountId::new(name)
}

struct Harness {
    vault: Vault,
    router: Router,
    batch: BatchRouter,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(FixedClock(NOW));
        Self {
            vault: Vault::new(VaultConfig::default(), Arc::new(Open), InMemoryLedger::new()).expect("vault"),
            router: Router::new(account("router"), clock.clone()),
            batch: BatchRouter::new(account("batch-router"), clock),
        }
    }

    /// Mints to `who` and approves both routers.
    fn fund(&mut self, who: &str, token: TokenId, amount: u128) {
        let who = account(who);
        let bank = self.vault.bank_mut();
        bank.mint(token, &who, amount).expect("mint");
        bank.approve(token, &who, self.router.account(), u128::MAX);
        bank.approve(token, &who, self.batch.account(), u128::MAX);
    }

    fn balance(&self, who: &str, token: TokenId) -> u128 {
        self.vault.bank().balance_of(token, &account(who))
    }

    /// A linear pool over `a` and `b` seeded by `lp` with 1000 of each.
    fn pool(&mut self, a: TokenId, b: TokenId) -> TokenId {
        let pool = TokenId::from_symbol(&format!("{a}/{b}"));
        self.vault
            .register_pool(PoolRegistration {
                pool,
                tokens: vec![TokenConfig::standard(a, 18), TokenConfig::standard(b, 18)],
                swap_fee_percentage: 0,
                aggregate_swap_fee_percentage: 0,
                pricing: Arc::new(Linear),
                hooks: None,
            })
            .expect("register");
        self.fund("lp", a, 1_000 * ONE);
        self.fund("lp", b, 1_000 * ONE);
        self.router
            .initialize(&mut self.vault, &account("lp"), pool, &[1_000 * ONE, 1_000 * ONE], 0, SettlementMode::Pull)
            .expect("seed");
        pool
    }

    fn assert_solvent(&self, tokens: &[TokenId]) {
        for t in tokens {
            assert_eq!(
                self.vault.bank().balance_of(*t, &account(VAULT_ACCOUNT)),
                self.vault.reserves_of(*t),
                "reserves of {t}"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn routed_swap_settles_against_the_ledger() {
    let mut h = Harness::new();
    let (a, b) = (token("A"), token("B"));
    let pool = h.pool(a, b);
    h.fund("alice", a, 100 * ONE);

    let swap = SingleSwap {
        pool,
        token_in: a,
        token_out: b,
        amount_given: 10 * ONE,
        limit: 10 * ONE,
    };
    let outcome = h
        .router
        .swap_single_token(&mut h.vault, &account("alice"), SwapKind::ExactIn, &swap, DEADLINE, SettlementMode::Pull)
        .expect("swap");

    assert_eq!(outcome.amount_out_raw, 10 * ONE);
    assert_eq!(h.balance("alice", a), 90 * ONE);
    assert_eq!(h.balance("alice", b), 10 * ONE);
    let tokens = h.vault.get_pool_tokens(pool).expect("pool");
    let raw = h.vault.get_raw_balances(pool).expect("pool");
    for (t, balance) in tokens.iter().zip(raw) {
        let expected = if *t == a { 1_010 * ONE } else { 990 * ONE };
        assert_eq!(balance, expected);
    }
    assert!(!h.vault.is_unlocked());
    h.assert_solvent(&[a, b]);
}

#[test]
fn hand_settled_session() {
    let mut h = Harness::new();
    let (a, b) = (token("A"), token("B"));
    let pool = h.pool(a, b);
    h.fund("alice", a, 5 * ONE);
    let alice = account("alice");
    let vault_account = account(VAULT_ACCOUNT);

    let params = VaultSwapParams {
        kind: SwapKind::ExactIn,
        pool,
        token_in: a,
        token_out: b,
        amount_given_raw: 5 * ONE,
        limit_raw: 0,
        router: alice.clone(),
    };
    let outcome = h
        .vault
        .unlock(|v| {
            let outcome = v.swap(&params)?;
            assert_eq!(v.get_delta(a), -(outcome.amount_in_raw as i128));
            assert_eq!(v.get_delta(b), outcome.amount_out_raw as i128);
            v.bank_mut().transfer(a, &alice, &vault_account, outcome.amount_in_raw)?;
            v.settle(a, outcome.amount_in_raw)?;
            v.send_to(b, &alice, outcome.amount_out_raw)?;
            Ok(outcome)
        })
        .expect("session");

    assert_eq!(h.balance("alice", b), outcome.amount_out_raw);
    h.assert_solvent(&[a, b]);
}

#[test]
fn failed_session_leaves_no_trace() {
    let mut h = Harness::new();
    let (a, b) = (token("A"), token("B"));
    let pool = h.pool(a, b);
    h.fund("alice", a, 5 * ONE);
    let before = h.vault.get_raw_balances(pool).expect("pool");

    let swap = SingleSwap {
        pool,
        token_in: a,
        token_out: b,
        amount_given: 5 * ONE,
        limit: 6 * ONE,
    };
    let err = h
        .router
        .swap_single_token(&mut h.vault, &account("alice"), SwapKind::ExactIn, &swap, DEADLINE, SettlementMode::Pull)
        .unwrap_err();

    assert!(matches!(err, VaultError::SwapLimit { .. }));
    assert_eq!(h.vault.get_raw_balances(pool).expect("pool"), before);
    assert_eq!(h.balance("alice", a), 5 * ONE);
    assert!(h.vault.session().is_none());
    h.assert_solvent(&[a, b]);
}

// ---------------------------------------------------------------------------
// Batch through a buffer
// ---------------------------------------------------------------------------

#[test]
fn batch_path_swaps_then_wraps() {
    let mut h = Harness::new();
    let (a, u, w) = (token("A"), token("U"), token("W"));
    let pool = h.pool(a, u);

    h.vault
        .register_wrapper(&account("admin"), Arc::new(Par { account: account("par") }))
        .expect("wrapper");
    h.fund("lp", u, 100 * ONE);
    h.fund("lp", w, 100 * ONE);
    h.router
        .initialize_buffer(&mut h.vault, &account("lp"), w, 100 * ONE, 100 * ONE, 0, SettlementMode::Pull)
        .expect("buffer");

    h.fund("alice", a, 10 * ONE);
    let paths = vec![SwapPathExactAmountIn {
        token_in: a,
        steps: vec![SwapPathStep::swap(pool, u), SwapPathStep::buffer(w, w)],
        exact_amount_in: 10 * ONE,
        min_amount_out: 10 * ONE,
    }];

    let quoted = h.batch.query_swap_exact_in(&h.vault, &account("alice"), &paths).expect("query");
    let outcome = h
        .batch
        .swap_exact_in(&mut h.vault, &account("alice"), &paths, DEADLINE, SettlementMode::Pull)
        .expect("batch");

    assert_eq!(outcome.path_amounts, quoted);
    assert_eq!(outcome.path_amounts, vec![10 * ONE]);
    assert_eq!(outcome.settlement.paid_in, vec![(a, 10 * ONE)]);
    assert_eq!(outcome.settlement.paid_out, vec![(w, 10 * ONE)]);
    assert_eq!(h.vault.buffer_balances(w).expect("buffer"), (110 * ONE, 90 * ONE));
    assert_eq!(h.balance("alice", w), 10 * ONE);
    h.assert_solvent(&[a, u, w]);
}
