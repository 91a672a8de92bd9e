//! # External Collaborators
//!
//! Everything the vault consumes but does not implement: pricing curves,
//! hooks, rate providers, the token ledger, ERC4626 wrappers and the
//! authorizer. Each is a trait so pools and deployments can plug in their
//! own; `tidal-contracts` ships reference implementations.

pub mod authorizer;
pub mod hooks;
pub mod ledger;
pub mod pricing;
pub mod rate;
pub mod wrapper;

pub use authorizer::{Action, Authorizer};
pub use hooks::{AfterSwapParams, PoolHooks};
pub use ledger::{InMemoryLedger, TokenLedger};
pub use pricing::{PoolPricing, PoolSwapParams, SwapKind};
pub use rate::RateProvider;
pub use wrapper::Erc4626;
