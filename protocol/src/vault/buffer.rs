//! # ERC4626 Buffer State
//!
//! A buffer is a tiny two-sided pool pairing a wrapped token with its
//! underlying asset. Wraps and unwraps routed through a batch path are
//! served from this inventory when possible, so most of them never call
//! the wrapper at all.
//!
//! Both sides live in one [`PackedBalance`]: the underlying amount in the
//! raw half, the wrapped amount in the other. Neither side is rate-scaled.
//!
//! Liquidity providers own *buffer shares*, denominated in underlying
//! value. The first deposit burns a fixed floor of shares to nobody so the
//! share price can never be set from a near-empty buffer.

use std::collections::HashMap;

use serde::Serialize;

use super::packed_balance::PackedBalance;
use crate::error::VaultError;
use crate::external::{Erc4626, TokenLedger};
use crate::token::{AccountId, TokenId};

/// Persistent state of one buffer.
#[derive(Debug, Clone)]
pub struct BufferState {
    wrapped: TokenId,
    underlying: TokenId,
    balances: PackedBalance,
    total_shares: u128,
    owner_shares: HashMap<AccountId, u128>,
}

/// Serializable view of a buffer, for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BufferSnapshot {
    /// Wrapped token.
    pub wrapped: TokenId,
    /// Underlying token.
    pub underlying: TokenId,
    /// Underlying side.
    pub underlying_balance: u128,
    /// Wrapped side.
    pub wrapped_balance: u128,
    /// Total shares, floor included.
    pub total_shares: u128,
}

impl BufferState {
    pub(crate) fn new(wrapped: TokenId, underlying: TokenId) -> Self {
        Self {
            wrapped,
            underlying,
            balances: PackedBalance::ZERO,
            total_shares: 0,
            owner_shares: HashMap::new(),
        }
    }

    /// Wrapped token.
    pub fn wrapped(&self) -> TokenId {
        self.wrapped
    }

    /// Underlying token.
    pub fn underlying(&self) -> TokenId {
        self.underlying
    }

    /// Underlying side.
    pub fn underlying_balance(&self) -> u128 {
        self.balances.raw()
    }

    /// Wrapped side.
    pub fn wrapped_balance(&self) -> u128 {
        self.balances.live_scaled18()
    }

    pub(crate) fn set_balances(&mut self, underlying: u128, wrapped: u128) {
        self.balances = PackedBalance::pack(underlying, wrapped);
    }

    /// Total shares, floor included.
    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    /// Shares held by `owner`.
    pub fn shares_of(&self, owner: &AccountId) -> u128 {
        self.owner_shares.get(owner).copied().unwrap_or(0)
    }

    /// Sum of all owners' shares. Always `total_shares − floor` once
    /// initialized.
    pub fn owned_shares(&self) -> u128 {
        self.owner_shares.values().sum()
    }

    /// A serializable copy.
    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            wrapped: self.wrapped,
            underlying: self.underlying,
            underlying_balance: self.underlying_balance(),
            wrapped_balance: self.wrapped_balance(),
            total_shares: self.total_shares,
        }
    }

    pub(crate) fn mint_shares(&mut self, to: Option<&AccountId>, amount: u128) -> Result<(), VaultError> {
        self.total_shares = self
            .total_shares
            .checked_add(amount)
            .ok_or(VaultError::Overflow("buffer shares"))?;
        if let Some(owner) = to {
            *self.owner_shares.entry(owner.clone()).or_insert(0) += amount;
        }
        Ok(())
    }

    pub(crate) fn burn_shares(&mut self, from: &AccountId, amount: u128) -> Result<(), VaultError> {
        let held = self.shares_of(from);
        if held < amount {
            return Err(VaultError::InsufficientShares {
                token: self.wrapped,
                owner: from.clone(),
                available: held,
                requested: amount,
            });
        }
        if held == amount {
            self.owner_shares.remove(from);
        } else {
            self.owner_shares.insert(from.clone(), held - amount);
        }
        self.total_shares -= amount;
        Ok(())
    }

    // -- surplus ------------------------------------------------------------

    /// Half the excess of the underlying side over the wrapped side's
    /// underlying value, or zero.
    pub fn underlying_surplus(
        &self,
        wrapper: &dyn Erc4626,
        ledger: &dyn TokenLedger,
    ) -> Result<u128, VaultError> {
        let underlying = self.underlying_balance();
        let wrapped_as_underlying = match self.wrapped_balance() {
            0 => 0,
            wrapped => wrapper.preview_mint(ledger, wrapped)?,
        };
        Ok(underlying.saturating_sub(wrapped_as_underlying) / 2)
    }

    /// Half the excess of the wrapped side over the underlying side's
    /// wrapped value, or zero.
    pub fn wrapped_surplus(
        &self,
        wrapper: &dyn Erc4626,
        ledger: &dyn TokenLedger,
    ) -> Result<u128, VaultError> {
        let wrapped = self.wrapped_balance();
        let underlying_as_wrapped = match self.underlying_balance() {
            0 => 0,
            underlying => wrapper.preview_withdraw(ledger, underlying)?,
        };
        Ok(wrapped.saturating_sub(underlying_as_wrapped) / 2)
    }
}
