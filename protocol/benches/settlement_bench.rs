// Settlement benchmarks for the Tidal vault.
//
// Covers delta accounting, a routed single swap with pull settlement, and
// batch path resolution across a chain of pools.

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};

use tidal_vault::config::ONE;
use tidal_vault::external::{Action, Authorizer, InMemoryLedger, PoolPricing, PoolSwapParams, SwapKind, TokenLedger};
use tidal_vault::math::fixed_point::{mul_up, sub};
use tidal_vault::math::Rounding;
use tidal_vault::router::{FixedClock, SingleSwap, SwapPathExactAmountIn, SwapPathStep};
use tidal_vault::vault::{PackedBalance, PoolRegistration, TokenConfig, TokenDeltaLedger};
use tidal_vault::{AccountId, BatchRouter, Router, SettlementMode, TokenId, Vault, VaultConfig, VaultError};

const NOW: u64 = 1_700_000_000;

#[derive(Debug)]
struct Open;

impl Authorizer for Open {
    fn can_perform(&self, _action: Action, _caller: &AccountId) -> bool {
        true
    }
}

/// Constant-sum curve, enough to exercise the vault without curve cost.
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

struct Bench {
    vault: Vault,
    router: Router,
    batch: BatchRouter,
    sender: AccountId,
    tokens: Vec<TokenId>,
    pools: Vec<TokenId>,
}

/// A chain of `hops` pools: T0/T1, T1/T2, ... each seeded with a million
/// units per side, and a sender holding every token with both routers
/// approved.
fn setup(hops: usize) -> Bench {
    let clock = Arc::new(FixedClock(NOW));
    let router = Router::new(AccountId::new("router"), clock.clone());
    let batch = BatchRouter::new(AccountId::new("batch-router"), clock);
    let mut vault = Vault::new(VaultConfig::default(), Arc::new(Open), InMemoryLedger::new())
        .expect("default config validates");
    let sender = AccountId::new("trader");
    let lp = AccountId::new("lp");

    let tokens: Vec<TokenId> = (0..=hops).map(|i| TokenId::from_symbol(&format!("T{i}"))).collect();
    for token in &tokens {
        for who in [&sender, &lp] {
            vault.bank_mut().mint(*token, who, 1_000_000_000 * ONE).expect("mint");
            vault.bank_mut().approve(*token, who, router.account(), u128::MAX);
            vault.bank_mut().approve(*token, who, batch.account(), u128::MAX);
        }
    }

    let mut pools = Vec::with_capacity(hops);
    for pair in tokens.windows(2) {
        let pool = TokenId::from_symbol(&format!("{}-{}", pair[0], pair[1]));
        vault
            .register_pool(PoolRegistration {
                pool,
                tokens: pair.iter().map(|t| TokenConfig::standard(*t, 18)).collect(),
                swap_fee_percentage: ONE / 1_000,
                aggregate_swap_fee_percentage: 0,
                pricing: Arc::new(Linear),
                hooks: None,
            })
            .expect("register");
        router
            .initialize(&mut vault, &lp, pool, &[1_000_000 * ONE, 1_000_000 * ONE], 0, SettlementMode::Pull)
            .expect("seed");
        pools.push(pool);
    }

    Bench {
        vault,
        router,
        batch,
        sender,
        tokens,
        pools,
    }
}

fn bench_delta_ledger(c: &mut Criterion) {
    let tokens: Vec<TokenId> = (0..8).map(|i| TokenId::from_symbol(&format!("T{i}"))).collect();

    c.bench_function("settlement/delta_ledger_64_entries", |b| {
        b.iter(|| {
            let mut ledger = TokenDeltaLedger::new();
            for i in 0..64i128 {
                let token = tokens[(i % 8) as usize];
                ledger.account_delta(token, if i % 2 == 0 { i } else { -i }).expect("delta");
            }
            ledger.non_zero_count()
        });
    });

    c.bench_function("settlement/packed_balance_update", |b| {
        let packed = PackedBalance::pack(ONE, 2 * ONE);
        b.iter(|| packed.set_raw(3 * ONE).set_live(4 * ONE).unpack());
    });
}

fn bench_single_swap(c: &mut Criterion) {
    let world = setup(1);
    let swap = SingleSwap {
        pool: world.pools[0],
        token_in: world.tokens[0],
        token_out: world.tokens[1],
        amount_given: ONE,
        limit: 0,
    };

    c.bench_function("settlement/single_swap_pull", |b| {
        b.iter_batched(
            || world.vault.clone(),
            |mut vault| {
                world
                    .router
                    .swap_single_token(&mut vault, &world.sender, SwapKind::ExactIn, &swap, NOW + 60, SettlementMode::Pull)
                    .expect("swap")
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("settlement/single_swap_query", |b| {
        b.iter(|| {
            world
                .router
                .query_swap_single_token(&world.vault, SwapKind::ExactIn, &swap)
                .expect("query")
        });
    });
}

fn bench_batch_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("settlement/batch_exact_in");

    for hops in [1usize, 2, 4, 8] {
        let world = setup(hops);
        let path = SwapPathExactAmountIn {
            token_in: world.tokens[0],
            steps: world
                .pools
                .iter()
                .zip(world.tokens.iter().skip(1))
                .map(|(pool, out)| SwapPathStep::swap(*pool, *out))
                .collect(),
            exact_amount_in: ONE,
            min_amount_out: 0,
        };
        let paths = vec![path];

        group.throughput(Throughput::Elements(hops as u64));
        group.bench_with_input(BenchmarkId::from_parameter(hops), &hops, |b, _| {
            b.iter_batched(
                || world.vault.clone(),
                |mut vault| {
                    world
                        .batch
                        .swap_exact_in(&mut vault, &world.sender, &paths, NOW + 60, SettlementMode::Pull)
                        .expect("batch")
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_delta_ledger, bench_single_swap, bench_batch_paths);
criterion_main!(benches);
