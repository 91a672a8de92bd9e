// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tidal Vault — Core Library
//!
//! Tidal is a multi-token liquidity vault: one custodian for many pools,
//! one ledger of who owes what, and one settlement step per operation.
//!
//! Pools never hold tokens. They hold *balances* inside the vault, and the
//! vault reconciles those balances against real transfers only at the
//! boundary of an operation. Inside that boundary, swaps, joins, exits and
//! wraps just push signed deltas; a batch of them can cross any number of
//! pools and ERC4626 buffers and still settle with one transfer per token.
//!
//! ## Architecture
//!
//! - **config** — Protocol constants and the tunable `VaultConfig`.
//! - **error** — `VaultError` and its failure taxonomy.
//! - **token** — Token and account identifiers.
//! - **math** — 18-decimal fixed point, scaling, rates, pool-agnostic liquidity math.
//! - **external** — Capability traits for pricing, hooks, rates, tokens, wrappers, governance.
//! - **vault** — The settlement engine, pool and buffer state, and every primitive.
//! - **router** — Single and batch routers that unlock, execute and settle.
//!
//! ## Design Philosophy
//!
//! 1. An operation either fully happens or never happened.
//! 2. Rounding always favours the vault.
//! 3. Collaborators are traits. The vault trusts none of them with custody.

pub mod config;
pub mod error;
pub mod external;
pub mod math;
pub mod router;
pub mod token;
pub mod vault;

#[cfg(test)]
mod test_utils;

pub use config::VaultConfig;
pub use error::{ErrorKind, VaultError};
pub use router::{BatchRouter, Router, SettlementMode};
pub use token::{AccountId, TokenId};
pub use vault::Vault;
