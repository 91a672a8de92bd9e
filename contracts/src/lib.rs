//! # Tidal Reference Contracts
//!
//! Implementations of the collaborators the vault consumes through traits.
//! None of them custody pool tokens; the vault does. They price, gate,
//! wrap and report rates:
//!
//! - **Constant Product** — two-token `x · y = k` curve.
//! - **Constant Sum** — n-token 1:1 curve for pegged assets.
//! - **Yield Wrapper** — ERC4626-style wrapper with accruing yield, the
//!   counterpart of every buffer.
//! - **Rate Providers** — a hand-set rate and a wrapper-backed rate.
//! - **Hooks** — a swap cap, a swap surcharge and a liquidity surcharge.
//! - **Role Authorizer** — per-action allow lists for governance.
//!
//! ## Design Principles
//!
//! 1. Every curve rounds in the pool's favour.
//! 2. Collaborators fail with `VaultError`, never by panicking.
//! 3. Runtime-mutable state (rates, roles, wrapping switch) sits behind
//!    interior mutability so the vault can hold collaborators in `Arc`s.

pub mod authorizer;
pub mod constant_product;
pub mod constant_sum;
pub mod hooks;
pub mod rate_provider;
pub mod yield_wrapper;

pub use authorizer::RoleAuthorizer;
pub use constant_product::ConstantProductPricing;
pub use constant_sum::ConstantSumPricing;
pub use hooks::{LiquiditySurchargeHook, SwapCapHook, SwapSurchargeHook};
pub use rate_provider::{ManualRateProvider, WrapperRateProvider};
pub use yield_wrapper::YieldWrapper;
