//! ERC4626-style wrapper capability.
//!
//! A wrapper converts an underlying asset into yield-bearing shares (the
//! *wrapped* token) at an exchange rate it alone controls. Buffers consult
//! the preview functions to price wraps and unwraps, and call the mutating
//! ones when inventory runs out or during a rebalance.
//!
//! Rounding follows ERC4626: previews of what the caller receives round
//! down, previews of what the caller pays round up.

use std::fmt;

use crate::error::VaultError;
use crate::external::ledger::TokenLedger;
use crate::token::{AccountId, TokenId};

/// An ERC4626 vault over the shared token ledger.
pub trait Erc4626: fmt::Debug + Send + Sync {
    /// The share token this wrapper issues.
    fn wrapped_token(&self) -> TokenId;

    /// The underlying asset it accepts.
    fn asset(&self) -> TokenId;

    /// Shares received for depositing `assets`.
    fn preview_deposit(&self, ledger: &dyn TokenLedger, assets: u128) -> Result<u128, VaultError>;

    /// Assets required to mint exactly `shares`.
    fn preview_mint(&self, ledger: &dyn TokenLedger, shares: u128) -> Result<u128, VaultError>;

    /// Assets received for redeeming `shares`.
    fn preview_redeem(&self, ledger: &dyn TokenLedger, shares: u128) -> Result<u128, VaultError>;

    /// Shares required to withdraw exactly `assets`.
    fn preview_withdraw(&self, ledger: &dyn TokenLedger, assets: u128) -> Result<u128, VaultError>;

    /// Pulls `assets` from `owner`, mints shares to `owner`. Returns shares.
    fn deposit(
        &self,
        ledger: &mut dyn TokenLedger,
        owner: &AccountId,
        assets: u128,
    ) -> Result<u128, VaultError>;

    /// Mints exactly `shares` to `owner`, pulling the assets needed.
    /// Returns assets spent.
    fn mint(
        &self,
        ledger: &mut dyn TokenLedger,
        owner: &AccountId,
        shares: u128,
    ) -> Result<u128, VaultError>;

    /// Burns `shares` from `owner`, pays out assets. Returns assets.
    fn redeem(
        &self,
        ledger: &mut dyn TokenLedger,
        owner: &AccountId,
        shares: u128,
    ) -> Result<u128, VaultError>;

    /// Pays exactly `assets` to `owner`, burning the shares needed.
    /// Returns shares burned.
    fn withdraw(
        &self,
        ledger: &mut dyn TokenLedger,
        owner: &AccountId,
        assets: u128,
    ) -> Result<u128, VaultError>;
}
