//! # Vault Math
//!
//! ```text
//! rounding.rs    — explicit rounding direction
//! fixed_point.rs — 18-decimal mul/div with 256-bit intermediates
//! scaling.rs     — raw ↔ live conversions (decimals + rate)
//! base_pool.rs   — liquidity math shared by every pool
//! ```

pub mod base_pool;
pub mod fixed_point;
pub mod rounding;
pub mod scaling;

pub use rounding::Rounding;
