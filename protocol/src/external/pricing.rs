//! Pool pricing callback.
//!
//! The vault owns balances and settlement; the curve that turns balances
//! into prices belongs to the pool. Every method must be a pure function of
//! its inputs. The vault calls it on a cloned state during queries and
//! expects the same answer when the real call follows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::math::Rounding;
use crate::token::TokenId;

/// Which side of a swap the caller fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapKind {
    /// The input amount is given; the output is calculated.
    ExactIn,
    /// The output amount is given; the input is calculated.
    ExactOut,
}

/// Arguments to [`PoolPricing::compute_swap`]. Amounts are live (18
/// decimals, rate applied).
#[derive(Debug, Clone)]
pub struct PoolSwapParams<'a> {
    /// Exact-in or exact-out.
    pub kind: SwapKind,
    /// Given amount, net of swap fees for exact-in.
    pub amount_given_scaled18: u128,
    /// Pool tokens in canonical order.
    pub tokens: &'a [TokenId],
    /// Live balances aligned with `tokens`.
    pub balances_scaled18: &'a [u128],
    /// Position of the token going into the pool.
    pub index_in: usize,
    /// Position of the token leaving the pool.
    pub index_out: usize,
}

/// A pool's invariant math.
pub trait PoolPricing: fmt::Debug + Send + Sync {
    /// Returns the calculated side of the swap (amount out for exact-in,
    /// amount in for exact-out), live-scaled.
    fn compute_swap(&self, params: &PoolSwapParams<'_>) -> Result<u128, VaultError>;

    /// Computes the pool invariant for `balances_scaled18`, rounding as
    /// asked.
    fn compute_invariant(
        &self,
        balances_scaled18: &[u128],
        rounding: Rounding,
    ) -> Result<u128, VaultError>;

    /// Returns the balance token `token_index` must have so that the
    /// invariant becomes `invariant_ratio × current invariant`, all other
    /// balances unchanged.
    fn compute_balance(
        &self,
        balances_scaled18: &[u128],
        token_index: usize,
        invariant_ratio: u128,
    ) -> Result<u128, VaultError>;

    /// Smallest invariant ratio a single-token removal may produce.
    fn minimum_invariant_ratio(&self) -> u128 {
        0
    }

    /// Largest invariant ratio an unbalanced add may produce.
    fn maximum_invariant_ratio(&self) -> u128 {
        u128::MAX
    }
}
