//! Property tests: packing, delta netting, conservation of reserves, query
//! idempotence and rounding direction.

mod common;

use common::*;
use proptest::prelude::*;
use tidal_vault::config::ONE;
use tidal_vault::external::SwapKind;
use tidal_vault::router::SingleSwap;
use tidal_vault::vault::{PackedBalance, TokenDeltaLedger, VAULT_ACCOUNT};
use tidal_vault::{SettlementMode, TokenId};

const SYMBOLS: [&str; 4] = ["A", "B", "C", "D"];

fn product_world(swap_fee: u128) -> (World, TokenId) {
    let mut world = World::new();
    let pool = world.product_pool("A-B", token("A"), token("B"), units(1_000_000), swap_fee);
    (world, pool)
}

proptest! {
    #[test]
    fn packed_halves_are_independent(raw in any::<u128>(), live in any::<u128>(), next in any::<u128>()) {
        let packed = PackedBalance::pack(raw, live);
        prop_assert_eq!(packed.unpack(), (raw, live));
        prop_assert_eq!(packed.set_raw(next).unpack(), (next, live));
        prop_assert_eq!(packed.set_live(next).unpack(), (raw, next));
    }

    #[test]
    fn ledger_nets_per_token(deltas in prop::collection::vec((0usize..4, -1_000i128..1_000), 0..40)) {
        let mut ledger = TokenDeltaLedger::new();
        let mut sums = [0i128; 4];
        for (i, delta) in &deltas {
            ledger.account_delta(token(SYMBOLS[*i]), *delta).unwrap();
            sums[*i] += delta;
        }
        for (i, sum) in sums.iter().enumerate() {
            prop_assert_eq!(ledger.get_delta(token(SYMBOLS[i])), *sum);
        }
        prop_assert_eq!(ledger.non_zero_count(), sums.iter().filter(|s| **s != 0).count());
        prop_assert_eq!(ledger.is_settled(), sums.iter().all(|s| *s == 0));
    }

    #[test]
    fn swaps_conserve_reserves(
        trades in prop::collection::vec((any::<bool>(), 1u128..10_000, any::<bool>()), 1..12)
    ) {
        let (mut world, pool) = product_world(ONE / 1_000);
        let alice = account(ALICE);
        world.fund(ALICE, token("A"), units(1_000_000));
        world.fund(ALICE, token("B"), units(1_000_000));

        for (a_to_b, amount, exact_in) in trades {
            let (token_in, token_out) = if a_to_b { (token("A"), token("B")) } else { (token("B"), token("A")) };
            let kind = if exact_in { SwapKind::ExactIn } else { SwapKind::ExactOut };
            let swap = SingleSwap {
                pool,
                token_in,
                token_out,
                amount_given: units(amount),
                limit: if exact_in { 0 } else { u128::MAX },
            };
            world
                .router
                .swap_single_token(&mut world.vault, &alice, kind, &swap, DEADLINE, SettlementMode::Pull)
                .unwrap();

            let raw = world.vault.get_raw_balances(pool).unwrap();
            let tokens = world.vault.get_pool_tokens(pool).unwrap();
            let fees = world.vault.pool(pool).unwrap().aggregate_fees().to_vec();
            for ((t, balance), fee) in tokens.iter().zip(raw).zip(fees) {
                prop_assert_eq!(world.vault.reserves_of(*t), balance + fee);
                prop_assert_eq!(world.balance(VAULT_ACCOUNT, *t), world.vault.reserves_of(*t));
            }
        }
    }

    #[test]
    fn queries_match_execution_and_persist_nothing(amount in 1u128..100_000, exact_in in any::<bool>()) {
        let (mut world, pool) = product_world(ONE / 100);
        world.fund(ALICE, token("A"), units(1_000_000));
        let kind = if exact_in { SwapKind::ExactIn } else { SwapKind::ExactOut };
        let swap = SingleSwap {
            pool,
            token_in: token("A"),
            token_out: token("B"),
            amount_given: units(amount),
            limit: if exact_in { 0 } else { u128::MAX },
        };
        let before = world.vault.get_raw_balances(pool).unwrap();
        let quoted = world.router.query_swap_single_token(&world.vault, kind, &swap).unwrap();
        prop_assert_eq!(world.vault.get_raw_balances(pool).unwrap(), before);

        let executed = world
            .router
            .swap_single_token(&mut world.vault, &account(ALICE), kind, &swap, DEADLINE, SettlementMode::Pull)
            .unwrap();
        prop_assert_eq!(quoted, executed);
    }

    #[test]
    fn proportional_round_trip_favours_the_pool(bpt in 1u128..1_000_000_000_000_000_000_000) {
        let (mut world, pool) = product_world(0);
        let alice = account(ALICE);
        world.fund(ALICE, token("A"), units(2_000_000));
        world.fund(ALICE, token("B"), units(2_000_000));

        let paid = world
            .router
            .add_liquidity_proportional(&mut world.vault, &alice, pool, &[u128::MAX, u128::MAX], bpt, SettlementMode::Pull)
            .unwrap();
        let received = world
            .router
            .remove_liquidity_proportional(&mut world.vault, &alice, pool, bpt, &[0, 0])
            .unwrap();
        for (out, inn) in received.iter().zip(&paid) {
            prop_assert!(out <= inn);
        }
    }

    #[test]
    fn swap_round_trip_never_profits(amount in 1u128..100_000) {
        let (mut world, pool) = product_world(0);
        let alice = account(ALICE);
        world.fund(ALICE, token("A"), units(amount));
        world.fund(ALICE, token("B"), 0);
        let there = SingleSwap { pool, token_in: token("A"), token_out: token("B"), amount_given: units(amount), limit: 0 };
        let got = world
            .router
            .swap_single_token(&mut world.vault, &alice, SwapKind::ExactIn, &there, DEADLINE, SettlementMode::Pull)
            .unwrap()
            .amount_out_raw;
        let back = SingleSwap { pool, token_in: token("B"), token_out: token("A"), amount_given: got, limit: 0 };
        let returned = world
            .router
            .swap_single_token(&mut world.vault, &alice, SwapKind::ExactIn, &back, DEADLINE, SettlementMode::Pull)
            .unwrap()
            .amount_out_raw;
        prop_assert!(returned <= units(amount));
    }
}
