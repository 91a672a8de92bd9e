//! # Yield-Bearing Wrapper
//!
//! An ERC4626-style vault over the shared token ledger. Deposited
//! underlying sits in the wrapper's own account; shares are minted as the
//! wrapped token. Yield is modelled by minting underlying straight into
//! that account, which raises the assets-per-share rate for every holder.
//!
//! Conversions use one virtual share and one virtual asset:
//!
//! ```text
//! shares = assets · (supply + 1) / (total_assets + 1)
//! assets = shares · (total_assets + 1) / (supply + 1)
//! ```
//!
//! which keeps the first depositor from inflating the rate and makes an
//! empty wrapper convert 1:1. Previews round against the caller.

use std::sync::atomic::{AtomicBool, Ordering};

use tidal_vault::external::{Erc4626, TokenLedger};
use tidal_vault::math::fixed_point::{add, mul_div};
use tidal_vault::math::Rounding;
use tidal_vault::{AccountId, TokenId, VaultError};
use tracing::debug;

/// ERC4626 wrapper with accruing yield.
#[derive(Debug)]
pub struct YieldWrapper {
    wrapped: TokenId,
    underlying: TokenId,
    account: AccountId,
    enabled: AtomicBool,
}

impl YieldWrapper {
    /// A wrapper issuing `wrapped` shares over `underlying`, custodying
    /// assets in `account`.
    pub fn new(wrapped: TokenId, underlying: TokenId, account: AccountId) -> Self {
        Self {
            wrapped,
            underlying,
            account,
            enabled: AtomicBool::new(true),
        }
    }

    /// The account holding deposited underlying.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Underlying held for all shareholders.
    pub fn total_assets(&self, ledger: &dyn TokenLedger) -> u128 {
        ledger.balance_of(self.underlying, &self.account)
    }

    /// Adds `amount` of underlying yield.
    pub fn accrue_yield(&self, ledger: &mut dyn TokenLedger, amount: u128) -> Result<(), VaultError> {
        ledger.mint(self.underlying, &self.account, amount)?;
        debug!(wrapped = %self.wrapped, amount, "yield accrued");
        Ok(())
    }

    /// Turns deposits, mints, redeems and withdrawals on or off. Previews
    /// keep working either way.
    pub fn set_wrapping_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether the mutating calls are accepted.
    pub fn is_wrapping_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn ensure_enabled(&self) -> Result<(), VaultError> {
        if !self.is_wrapping_enabled() {
            return Err(VaultError::ExternalWrapFailed {
                wrapped: self.wrapped,
                reason: "wrapping disabled".into(),
            });
        }
        Ok(())
    }

    /// Shares worth `assets` at the current rate, rounded as asked.
    pub fn convert_to_shares(
        &self,
        ledger: &dyn TokenLedger,
        assets: u128,
        rounding: Rounding,
    ) -> Result<u128, VaultError> {
        let supply = add(ledger.total_supply(self.wrapped), 1, "wrapper supply")?;
        let total = add(self.total_assets(ledger), 1, "wrapper assets")?;
        mul_div(assets, supply, total, rounding)
    }

    /// Underlying redeemable for `shares` at the current rate, rounded as
    /// asked.
    pub fn convert_to_assets(
        &self,
        ledger: &dyn TokenLedger,
        shares: u128,
        rounding: Rounding,
    ) -> Result<u128, VaultError> {
        let supply = add(ledger.total_supply(self.wrapped), 1, "wrapper supply")?;
        let total = add(self.total_assets(ledger), 1, "wrapper assets")?;
        mul_div(shares, total, supply, rounding)
    }

    fn enter(
        &self,
        ledger: &mut dyn TokenLedger,
        owner: &AccountId,
        assets: u128,
        shares: u128,
    ) -> Result<(), VaultError> {
        self.ensure_enabled()?;
        ledger.transfer(self.underlying, owner, &self.account, assets)?;
        ledger.mint(self.wrapped, owner, shares)?;
        debug!(wrapped = %self.wrapped, %owner, assets, shares, "wrapper entered");
        Ok(())
    }

    fn exit(
        &self,
        ledger: &mut dyn TokenLedger,
        owner: &AccountId,
        assets: u128,
        shares: u128,
    ) -> Result<(), VaultError> {
        self.ensure_enabled()?;
        ledger.burn(self.wrapped, owner, shares)?;
        ledger.transfer(self.underlying, &self.account, owner, assets)?;
        debug!(wrapped = %self.wrapped, %owner, assets, shares, "wrapper exited");
        Ok(())
    }
}

impl Erc4626 for YieldWrapper {
    fn wrapped_token(&self) -> TokenId {
        self.wrapped
    }

    fn asset(&self) -> TokenId {
        self.underlying
    }

    fn preview_deposit(&self, ledger: &dyn TokenLedger, assets: u128) -> Result<u128, VaultError> {
        self.convert_to_shares(ledger, assets, Rounding::Down)
    }

    fn preview_mint(&self, ledger: &dyn TokenLedger, shares: u128) -> Result<u128, VaultError> {
        self.convert_to_assets(ledger, shares, Rounding::Up)
    }

    fn preview_redeem(&self, ledger: &dyn TokenLedger, shares: u128) -> Result<u128, VaultError> {
        self.convert_to_assets(ledger, shares, Rounding::Down)
    }

    fn preview_withdraw(&self, ledger: &dyn TokenLedger, assets: u128) -> Result<u128, VaultError> {
        self.convert_to_shares(ledger, assets, Rounding::Up)
    }

    fn deposit(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, assets: u128) -> Result<u128, VaultError> {
        let shares = self.preview_deposit(ledger, assets)?;
        self.enter(ledger, owner, assets, shares)?;
        Ok(shares)
    }

    fn mint(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, shares: u128) -> Result<u128, VaultError> {
        let assets = self.preview_mint(ledger, shares)?;
        self.enter(ledger, owner, assets, shares)?;
        Ok(assets)
    }

    fn redeem(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, shares: u128) -> Result<u128, VaultError> {
        let assets = self.preview_redeem(ledger, shares)?;
        self.exit(ledger, owner, assets, shares)?;
        Ok(assets)
    }

    fn withdraw(&self, ledger: &mut dyn TokenLedger, owner: &AccountId, assets: u128) -> Result<u128, VaultError> {
        let shares = self.preview_withdraw(ledger, assets)?;
        self.exit(ledger, owner, assets, shares)?;
        Ok(shares)
    }
}
