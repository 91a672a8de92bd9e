//! # Routers
//!
//! The vault's public face for end users. A router unlocks the vault, runs
//! one or more primitives, and settles the sender's net token flows.
//!
//! ```text
//! path.rs       — swap paths and step classification
//! batch.rs      — BatchRouter: multi-hop, multi-path, netted settlement
//! single.rs     — Router: single swaps, pool and buffer liquidity
//! settlement.rs — pay-in / pay-out against the sender
//! clock.rs      — deadline time source
//! ```

pub mod batch;
pub mod clock;
pub mod path;
pub mod settlement;
pub mod single;

pub use batch::{BatchRouter, BatchSwapOutcome, ResolvedPaths, BATCH_ROUTER_ACCOUNT};
pub use clock::{Clock, FixedClock, SystemClock};
pub use path::{StepAction, SwapPathExactAmountIn, SwapPathExactAmountOut, SwapPathStep};
pub use settlement::{NetFlows, Settlement, SettlementMode};
pub use single::{Router, SingleSwap, ROUTER_ACCOUNT};
