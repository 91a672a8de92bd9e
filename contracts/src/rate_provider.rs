//! # Rate Providers
//!
//! Reference [`RateProvider`]s. [`ManualRateProvider`] holds a rate an
//! operator (or a test) sets by hand; [`WrapperRateProvider`] reads the
//! assets-per-share rate of a [`YieldWrapper`] from the ledger snapshot it
//! was last refreshed with.

use std::sync::Arc;

use parking_lot::RwLock;
use tidal_vault::config::ONE;
use tidal_vault::external::{RateProvider, TokenLedger};
use tidal_vault::math::Rounding;
use tidal_vault::VaultError;
use tracing::info;

use crate::yield_wrapper::YieldWrapper;

/// A rate set from outside. Zero is accepted here; the vault refuses to
/// price with it.
#[derive(Debug)]
pub struct ManualRateProvider {
    rate: RwLock<u128>,
}

impl ManualRateProvider {
    pub fn new(rate: u128) -> Self {
        Self {
            rate: RwLock::new(rate),
        }
    }

    /// Replaces the rate.
    pub fn set_rate(&self, rate: u128) {
        let mut guard = self.rate.write();
        info!(old = *guard, new = rate, "rate updated");
        *guard = rate;
    }
}

impl Default for ManualRateProvider {
    fn default() -> Self {
        Self::new(ONE)
    }
}

impl RateProvider for ManualRateProvider {
    fn get_rate(&self) -> Result<u128, VaultError> {
        Ok(*self.rate.read())
    }
}

/// Rate of one wrapped share in underlying, rounded down.
#[derive(Debug)]
pub struct WrapperRateProvider {
    wrapper: Arc<YieldWrapper>,
    cached: RwLock<u128>,
}

impl WrapperRateProvider {
    /// Reads the wrapper's current rate from `ledger`.
    pub fn new(wrapper: Arc<YieldWrapper>, ledger: &dyn TokenLedger) -> Result<Self, VaultError> {
        let provider = Self {
            wrapper,
            cached: RwLock::new(ONE),
        };
        provider.refresh(ledger)?;
        Ok(provider)
    }

    /// Re-reads the rate. Call after yield accrues.
    pub fn refresh(&self, ledger: &dyn TokenLedger) -> Result<u128, VaultError> {
        let rate = self.wrapper.convert_to_assets(ledger, ONE, Rounding::Down)?;
        *self.cached.write() = rate;
        Ok(rate)
    }
}

impl RateProvider for WrapperRateProvider {
    fn get_rate(&self) -> Result<u128, VaultError> {
        Ok(*self.cached.read())
    }
}
