//! # Token Ledger
//!
//! The fungible-token capability the vault settles against: balances,
//! transfers, allowances. [`TokenLedger`] is the seam; [`InMemoryLedger`]
//! is the implementation every test, benchmark and the node's simulator
//! run on.
//!
//! The vault only ever touches the ledger from `settle`, `send_to`, the
//! routers' pull step and wrapper calls. Nothing else moves real tokens.

use std::collections::HashMap;
use std::fmt;

use crate::error::VaultError;
use crate::token::{AccountId, TokenId};

/// Transfer capability over many tokens.
pub trait TokenLedger: fmt::Debug {
    /// Balance of `holder` in `token`.
    fn balance_of(&self, token: TokenId, holder: &AccountId) -> u128;

    /// Total minted supply of `token`.
    fn total_supply(&self, token: TokenId) -> u128;

    /// Moves `amount` from `from` to `to`.
    fn transfer(
        &mut self,
        token: TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), VaultError>;

    /// Moves `amount` from `from` to `to` on behalf of `spender`, consuming
    /// allowance.
    fn transfer_from(
        &mut self,
        token: TokenId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), VaultError>;

    /// Sets the allowance of `spender` over `owner`'s `token`.
    fn approve(&mut self, token: TokenId, owner: &AccountId, spender: &AccountId, amount: u128);

    /// Remaining allowance.
    fn allowance(&self, token: TokenId, owner: &AccountId, spender: &AccountId) -> u128;

    /// Creates `amount` new tokens for `to`.
    fn mint(&mut self, token: TokenId, to: &AccountId, amount: u128) -> Result<(), VaultError>;

    /// Destroys `amount` of `from`'s tokens.
    fn burn(&mut self, token: TokenId, from: &AccountId, amount: u128) -> Result<(), VaultError>;
}

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

/// A plain map-backed ledger. `Clone` is what makes vault snapshots cheap.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    balances: HashMap<(TokenId, AccountId), u128>,
    supplies: HashMap<TokenId, u128>,
    allowances: HashMap<(TokenId, AccountId, AccountId), u128>,
}

impl InMemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    fn debit(&mut self, token: TokenId, from: &AccountId, amount: u128) -> Result<(), VaultError> {
        let balance = self.balance_of(token, from);
        if balance < amount {
            return Err(VaultError::TransferFailed(format!(
                "{from} holds {balance} of {token}, needs {amount}"
            )));
        }
        self.balances.insert((token, from.clone()), balance - amount);
        Ok(())
    }

    fn credit(&mut self, token: TokenId, to: &AccountId, amount: u128) -> Result<(), VaultError> {
        let entry = self.balances.entry((token, to.clone())).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(VaultError::Overflow("token balance"))?;
        Ok(())
    }
}

impl TokenLedger for InMemoryLedger {
    fn balance_of(&self, token: TokenId, holder: &AccountId) -> u128 {
        self.balances
            .get(&(token, holder.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn total_supply(&self, token: TokenId) -> u128 {
        self.supplies.get(&token).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        token: TokenId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), VaultError> {
        if amount == 0 {
            return Ok(());
        }
        self.debit(token, from, amount)?;
        self.credit(token, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: TokenId,
        spender: &AccountId,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), VaultError> {
        if spender != from {
            let allowed = self.allowance(token, from, spender);
            if allowed < amount {
                return Err(VaultError::TransferFailed(format!(
                    "{spender} allowed {allowed} of {from}'s {token}, needs {amount}"
                )));
            }
            if allowed != u128::MAX {
                self.allowances
                    .insert((token, from.clone(), spender.clone()), allowed - amount);
            }
        }
        self.transfer(token, from, to, amount)
    }

    fn approve(&mut self, token: TokenId, owner: &AccountId, spender: &AccountId, amount: u128) {
        self.allowances
            .insert((token, owner.clone(), spender.clone()), amount);
    }

    fn allowance(&self, token: TokenId, owner: &AccountId, spender: &AccountId) -> u128 {
        self.allowances
            .get(&(token, owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn mint(&mut self, token: TokenId, to: &AccountId, amount: u128) -> Result<(), VaultError> {
        let supply = self.supplies.entry(token).or_insert(0);
        *supply = supply
            .checked_add(amount)
            .ok_or(VaultError::Overflow("token supply"))?;
        self.credit(token, to, amount)
    }

    fn burn(&mut self, token: TokenId, from: &AccountId, amount: u128) -> Result<(), VaultError> {
        self.debit(token, from, amount)?;
        let supply = self.supplies.entry(token).or_insert(0);
        *supply = supply.saturating_sub(amount);
        Ok(())
    }
}
