//! # Vault Configuration & Constants
//!
//! Every magic number the vault depends on lives here. The compile-time
//! constants describe the fixed-point format and structural limits of a
//! pool; [`VaultConfig`] holds the tunables an operator may reasonably
//! want to change between deployments (supply floors, fee caps, rounding
//! tolerances).
//!
//! Changing the floors after pools and buffers exist is a bad idea: the
//! burned minimum supply is minted exactly once, at initialization.

use serde::{Deserialize, Serialize};

use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Fixed-Point Format
// ---------------------------------------------------------------------------

/// One, in 18-decimal fixed point. Rates, fee percentages and invariant
/// ratios are all expressed against this unit.
pub const ONE: u128 = 1_000_000_000_000_000_000;

/// Every live balance is normalized to this many decimals.
pub const SCALED_DECIMALS: u8 = 18;

/// Tokens with more decimals than this cannot be scaled up to 18 decimals
/// without losing the integer scaling factor, so registration rejects them.
pub const MAX_TOKEN_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Pool Structure
// ---------------------------------------------------------------------------

/// A pool needs at least two tokens to trade anything.
pub const MIN_POOL_TOKENS: usize = 2;

/// Upper bound on tokens per pool. Keeps every per-pool loop bounded.
pub const MAX_POOL_TOKENS: usize = 8;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Default BPT burned at pool initialization.
pub const DEFAULT_MINIMUM_POOL_SUPPLY: u128 = 1_000_000;

/// Default buffer shares burned at buffer initialization.
pub const DEFAULT_BUFFER_MINIMUM_SUPPLY: u128 = 10_000;

/// Default smallest amount accepted by a wrap or unwrap.
pub const DEFAULT_MINIMUM_WRAP_AMOUNT: u128 = 1_000;

/// Default cap on a pool's static swap fee: 10%.
pub const DEFAULT_MAX_SWAP_FEE_PERCENTAGE: u128 = ONE / 10;

/// Default cap on the protocol's cut of swap fees: 100%.
pub const DEFAULT_MAX_AGGREGATE_FEE_PERCENTAGE: u128 = ONE;

/// Default tolerance, in wrapped-token units, between the two sides of a
/// buffer after a rebalance. Empirical: covers the wrapper's own rounding.
pub const DEFAULT_REBALANCE_TOLERANCE: u128 = 3;

/// Default bound on nested unlock depth.
pub const DEFAULT_MAX_UNLOCK_DEPTH: u32 = 16;

// ---------------------------------------------------------------------------
// VaultConfig
// ---------------------------------------------------------------------------

/// Operator-tunable vault parameters.
///
/// Missing fields fall back to the defaults above when deserializing, so
/// a config file only needs to mention what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// BPT minted to nobody at pool initialization.
    pub minimum_pool_supply: u128,

    /// Buffer shares minted to nobody at buffer initialization. Also the
    /// floor total shares can never drop below.
    pub buffer_minimum_supply: u128,

    /// Wraps and unwraps below this amount (in the given token) are rejected.
    pub minimum_wrap_amount: u128,

    /// Largest static swap fee a pool may be registered with (18 decimals).
    pub max_swap_fee_percentage: u128,

    /// Largest aggregate (protocol) fee percentage (18 decimals).
    pub max_aggregate_fee_percentage: u128,

    /// Accepted drift, in wrapped units, between the wrapped side of a
    /// buffer and `preview_deposit(underlying side)` after a rebalance.
    pub rebalance_tolerance: u128,

    /// Maximum nesting of `unlock` calls.
    pub max_unlock_depth: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            minimum_pool_supply: DEFAULT_MINIMUM_POOL_SUPPLY,
            buffer_minimum_supply: DEFAULT_BUFFER_MINIMUM_SUPPLY,
            minimum_wrap_amount: DEFAULT_MINIMUM_WRAP_AMOUNT,
            max_swap_fee_percentage: DEFAULT_MAX_SWAP_FEE_PERCENTAGE,
            max_aggregate_fee_percentage: DEFAULT_MAX_AGGREGATE_FEE_PERCENTAGE,
            rebalance_tolerance: DEFAULT_REBALANCE_TOLERANCE,
            max_unlock_depth: DEFAULT_MAX_UNLOCK_DEPTH,
        }
    }
}

impl VaultConfig {
    /// Parses a config from JSON and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] if the JSON is malformed or a
    /// value is out of range.
    pub fn from_json(json: &str) -> Result<Self, VaultError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VaultError::InvalidConfig(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), VaultError> {
        if self.minimum_pool_supply == 0 {
            return Err(VaultError::InvalidConfig(
                "minimum_pool_supply must be positive".into(),
            ));
        }
        if self.buffer_minimum_supply == 0 {
            return Err(VaultError::InvalidConfig(
                "buffer_minimum_supply must be positive".into(),
            ));
        }
        // A 100% swap fee leaves nothing to price and makes the exact-out
        // gross-up divide by zero.
        if self.max_swap_fee_percentage >= ONE {
            return Err(VaultError::InvalidConfig(
                "max_swap_fee_percentage must be below 100%".into(),
            ));
        }
        if self.max_aggregate_fee_percentage > ONE {
            return Err(VaultError::InvalidConfig(
                "max_aggregate_fee_percentage must not exceed 100%".into(),
            ));
        }
        if self.max_unlock_depth == 0 {
            return Err(VaultError::InvalidConfig(
                "max_unlock_depth must allow at least the top-level unlock".into(),
            ));
        }
        Ok(())
    }
}
