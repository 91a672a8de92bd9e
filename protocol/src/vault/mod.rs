//! # Vault Module — Custody, Accounting and Settlement
//!
//! Every pool balance, buffer balance and reserve lives here, and only the
//! [`Vault`] writes them.
//!
//! ## Architecture
//!
//! ```text
//! packed_balance.rs — raw + live balance in one 256-bit word
//! delta_ledger.rs   — per-session signed token obligations
//! session.rs        — the explicit unlock context (id, depth, deltas)
//! pool.rs           — pool registration, balances, rates, BPT book
//! buffer.rs         — ERC4626 buffer state and share book
//! engine.rs         — Vault: unlock/lock, settle, send_to, governance
//! swap.rs           — the swap primitive
//! liquidity.rs      — initialize, add and remove liquidity
//! buffer_ops.rs     — buffer liquidity, wrap/unwrap, rebalance
//! ```
//!
//! ## Design Principles
//!
//! 1. **Amounts are `u128`.** Raw amounts are in the token's own decimals;
//!    live amounts are 18-decimal fixed point with the token rate applied.
//!
//! 2. **Every primitive is all-or-nothing.** A failing primitive leaves
//!    the vault exactly as it found it, even inside a larger session.
//!
//! 3. **Deltas, not transfers.** Primitives only record what is owed.
//!    Tokens cross the boundary in `settle` and `send_to`, once per token.

pub mod buffer;
pub mod buffer_ops;
pub mod delta_ledger;
pub mod engine;
pub mod liquidity;
pub mod packed_balance;
pub mod pool;
pub mod session;
pub mod swap;

pub use buffer::{BufferSnapshot, BufferState};
pub use buffer_ops::{BufferOutcome, BufferWrapOrUnwrapParams, RebalanceOutcome, WrappingDirection};
pub use delta_ledger::TokenDeltaLedger;
pub use engine::{Vault, VAULT_ACCOUNT};
pub use liquidity::{
    AddLiquidityKind, AddLiquidityOutcome, AddLiquidityParams, RemoveLiquidityKind, RemoveLiquidityOutcome,
    RemoveLiquidityParams,
};
pub use packed_balance::PackedBalance;
pub use pool::{PoolData, PoolRegistration, PoolState, TokenConfig, TokenType};
pub use session::Session;
pub use swap::{SwapOutcome, VaultSwapParams};
