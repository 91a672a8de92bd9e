//! Authorization capability for privileged vault entry points.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::token::AccountId;

/// Privileged actions. Each one is checked separately so a deployment can
/// hand out, say, rebalancing without handing out pausing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Register an ERC4626 wrapper for buffer use.
    RegisterWrapper,
    /// Pause every mutating primitive.
    PauseVault,
    /// Lift a vault pause.
    UnpauseVault,
    /// Pause one pool.
    PausePool,
    /// Lift a pool pause.
    UnpausePool,
    /// Change a pool's static swap fee.
    SetSwapFee,
    /// Change a pool's aggregate (protocol) fee.
    SetAggregateFee,
    /// Withdraw accrued aggregate fees.
    CollectAggregateFees,
    /// Rebalance an ERC4626 buffer.
    RebalanceBuffer,
}

impl Action {
    /// Stable snake_case name, used in errors and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegisterWrapper => "register_wrapper",
            Self::PauseVault => "pause_vault",
            Self::UnpauseVault => "unpause_vault",
            Self::PausePool => "pause_pool",
            Self::UnpausePool => "unpause_pool",
            Self::SetSwapFee => "set_swap_fee",
            Self::SetAggregateFee => "set_aggregate_fee",
            Self::CollectAggregateFees => "collect_aggregate_fees",
            Self::RebalanceBuffer => "rebalance_buffer",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Yes/no role check.
pub trait Authorizer: fmt::Debug + Send + Sync {
    /// `true` when `caller` may perform `action`.
    fn can_perform(&self, action: Action, caller: &AccountId) -> bool;
}
