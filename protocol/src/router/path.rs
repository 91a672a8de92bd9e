//! Swap paths.
//!
//! A path is a starting token plus an ordered list of steps. What a step
//! *does* is implied by its shape, relative to the token flowing into it:
//!
//! | `is_buffer` | shape                 | action                      |
//! |-------------|-----------------------|-----------------------------|
//! | yes         | `token_in == pool`    | unwrap (wrapped → underlying) |
//! | yes         | `token_out == pool`   | wrap (underlying → wrapped) |
//! | no          | `token_out == pool`   | add liquidity, BPT out      |
//! | no          | `token_in == pool`    | remove liquidity, BPT in    |
//! | no          | otherwise             | pool swap                   |
//!
//! For buffer steps `pool` is the wrapped token.

use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::token::TokenId;

/// One hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPathStep {
    /// Pool id, or the wrapped token for a buffer step.
    pub pool: TokenId,
    /// Token leaving this step.
    pub token_out: TokenId,
    /// Route through the ERC4626 buffer of `pool`.
    #[serde(default)]
    pub is_buffer: bool,
}

/// An exact-in path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPathExactAmountIn {
    /// Token the sender pays.
    pub token_in: TokenId,
    /// Hops, first to last.
    pub steps: Vec<SwapPathStep>,
    /// Amount the sender pays.
    pub exact_amount_in: u128,
    /// Minimum the sender receives from the last step.
    pub min_amount_out: u128,
}

/// An exact-out path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPathExactAmountOut {
    /// Token the sender pays.
    pub token_in: TokenId,
    /// Hops, first to last.
    pub steps: Vec<SwapPathStep>,
    /// Maximum the sender pays into the first step.
    pub max_amount_in: u128,
    /// Amount the sender receives.
    pub exact_amount_out: u128,
}

/// What a step does, given the token flowing into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Pool swap.
    Swap,
    /// Buffer: underlying in, wrapped out.
    Wrap,
    /// Buffer: wrapped in, underlying out.
    Unwrap,
    /// Single-sided join; the pool's BPT comes out.
    AddLiquidity,
    /// Single-sided exit; the pool's BPT goes in.
    RemoveLiquidity,
}

impl StepAction {
    /// `true` for the two buffer actions.
    pub fn is_buffer(self) -> bool {
        matches!(self, StepAction::Wrap | StepAction::Unwrap)
    }
}

impl SwapPathStep {
    /// A plain pool swap step.
    pub fn swap(pool: TokenId, token_out: TokenId) -> Self {
        Self {
            pool,
            token_out,
            is_buffer: false,
        }
    }

    /// A buffer step through the buffer of `wrapped`.
    pub fn buffer(wrapped: TokenId, token_out: TokenId) -> Self {
        Self {
            pool: wrapped,
            token_out,
            is_buffer: true,
        }
    }

    /// Classifies this step.
    ///
    /// # Errors
    ///
    /// [`VaultError::InvalidPath`] if `token_in == token_out`, or if a
    /// buffer step touches its wrapped token on neither side.
    pub fn action(&self, token_in: TokenId) -> Result<StepAction, VaultError> {
        if token_in == self.token_out {
            return Err(VaultError::InvalidPath(format!(
                "step through {} goes from {token_in} to itself",
                self.pool
            )));
        }
        if self.is_buffer {
            return if token_in == self.pool {
                Ok(StepAction::Unwrap)
            } else if self.token_out == self.pool {
                Ok(StepAction::Wrap)
            } else {
                Err(VaultError::InvalidPath(format!(
                    "buffer step {} neither wraps nor unwraps",
                    self.pool
                )))
            };
        }
        Ok(if self.token_out == self.pool {
            StepAction::AddLiquidity
        } else if token_in == self.pool {
            StepAction::RemoveLiquidity
        } else {
            StepAction::Swap
        })
    }
}

/// Tokens flowing into each step of `steps` when the path starts at
/// `token_in`.
pub fn step_inputs(token_in: TokenId, steps: &[SwapPathStep]) -> Vec<TokenId> {
    let mut inputs = Vec::with_capacity(steps.len());
    let mut current = token_in;
    for step in steps {
        inputs.push(current);
        current = step.token_out;
    }
    inputs
}

/// `true` when the path starts by burning the sender's BPT of the first
/// pool, so the sender pays nothing in through the ledger.
pub fn starts_with_bpt_burn(token_in: TokenId, steps: &[SwapPathStep]) -> bool {
    steps
        .first()
        .is_some_and(|step| !step.is_buffer && step.pool == token_in)
}

/// `true` when the path ends by minting BPT to the sender, so the sender
/// receives nothing through the ledger.
pub fn ends_with_bpt_mint(steps: &[SwapPathStep]) -> bool {
    steps
        .last()
        .is_some_and(|step| !step.is_buffer && step.pool == step.token_out)
}
