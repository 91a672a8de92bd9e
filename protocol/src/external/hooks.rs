//! Optional per-pool hooks.
//!
//! Hooks run before and after each pool operation. A `false` return vetoes
//! the whole operation ([`VaultError::HookVeto`](crate::error::VaultError::HookVeto)).
//! The `after_*` hooks for swaps and liquidity may additionally hand back
//! adjusted raw amounts; the vault only accepts adjustments that favour
//! the pool, and the difference stays in the pool's balances.
//!
//! Every method has a permissive default so a hook only implements the
//! stages it cares about.

use std::fmt;

use crate::external::pricing::{PoolSwapParams, SwapKind};
use crate::token::{AccountId, TokenId};
use crate::vault::liquidity::{AddLiquidityKind, RemoveLiquidityKind};

/// What `after_swap` gets to see.
#[derive(Debug, Clone)]
pub struct AfterSwapParams<'a> {
    /// Pool that was swapped against.
    pub pool: TokenId,
    /// Exact-in or exact-out.
    pub kind: SwapKind,
    /// Token sent into the pool.
    pub token_in: TokenId,
    /// Token taken out of the pool.
    pub token_out: TokenId,
    /// Live amount in, fees included.
    pub amount_in_scaled18: u128,
    /// Live amount out.
    pub amount_out_scaled18: u128,
    /// Raw calculated amount (out for exact-in, in for exact-out).
    pub amount_calculated_raw: u128,
    /// Account that drove the swap.
    pub router: &'a AccountId,
}

/// Lifecycle callbacks a pool may register.
pub trait PoolHooks: fmt::Debug + Send + Sync {
    /// Called once before the pool's first liquidity.
    fn before_initialize(&self, _pool: TokenId, _exact_amounts_in_scaled18: &[u128]) -> bool {
        true
    }

    /// Called after initialization with the BPT minted.
    fn after_initialize(&self, _pool: TokenId, _bpt_amount_out: u128) -> bool {
        true
    }

    /// Called before pricing a swap, with up-to-date live balances.
    fn before_swap(&self, _pool: TokenId, _params: &PoolSwapParams<'_>) -> bool {
        true
    }

    /// Called after a swap. Returns `(success, adjusted_amount_calculated_raw)`.
    fn after_swap(&self, params: &AfterSwapParams<'_>) -> (bool, u128) {
        (true, params.amount_calculated_raw)
    }

    /// Called before an add-liquidity operation.
    fn before_add_liquidity(
        &self,
        _pool: TokenId,
        _kind: AddLiquidityKind,
        _max_amounts_in_scaled18: &[u128],
        _min_bpt_amount_out: u128,
        _balances_scaled18: &[u128],
    ) -> bool {
        true
    }

    /// Called after an add-liquidity operation. Returns `(success,
    /// adjusted_amounts_in_raw)`; each adjusted amount must be at least the
    /// computed one.
    fn after_add_liquidity(&self, _pool: TokenId, amounts_in_raw: &[u128], _bpt_amount_out: u128) -> (bool, Vec<u128>) {
        (true, amounts_in_raw.to_vec())
    }

    /// Called before a remove-liquidity operation.
    fn before_remove_liquidity(
        &self,
        _pool: TokenId,
        _kind: RemoveLiquidityKind,
        _max_bpt_amount_in: u128,
        _min_amounts_out_scaled18: &[u128],
        _balances_scaled18: &[u128],
    ) -> bool {
        true
    }

    /// Called after a remove-liquidity operation. Returns `(success,
    /// adjusted_amounts_out_raw)`; each adjusted amount must be at most the
    /// computed one.
    fn after_remove_liquidity(
        &self,
        _pool: TokenId,
        amounts_out_raw: &[u128],
        _bpt_amount_in: u128,
    ) -> (bool, Vec<u128>) {
        (true, amounts_out_raw.to_vec())
    }
}
