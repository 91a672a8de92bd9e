//! # Role Authorizer
//!
//! A per-action allow list. Each [`Action`] has its own set of accounts;
//! granting one action grants nothing else.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tidal_vault::external::{Action, Authorizer};
use tidal_vault::AccountId;
use tracing::info;

/// Every privileged action the vault checks.
pub const ALL_ACTIONS: [Action; 9] = [
    Action::RegisterWrapper,
    Action::PauseVault,
    Action::UnpauseVault,
    Action::PausePool,
    Action::UnpausePool,
    Action::SetSwapFee,
    Action::SetAggregateFee,
    Action::CollectAggregateFees,
    Action::RebalanceBuffer,
];

/// Grant/revoke authorizer.
#[derive(Debug, Default)]
pub struct RoleAuthorizer {
    roles: RwLock<HashMap<Action, HashSet<AccountId>>>,
}

impl RoleAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// An authorizer where `admin` holds every action.
    pub fn with_admin(admin: &AccountId) -> Self {
        let authorizer = Self::new();
        for action in ALL_ACTIONS {
            authorizer.grant(action, admin);
        }
        authorizer
    }

    /// Lets `account` perform `action`. Returns `false` if it already could.
    pub fn grant(&self, action: Action, account: &AccountId) -> bool {
        let added = self.roles.write().entry(action).or_default().insert(account.clone());
        if added {
            info!(%action, %account, "role granted");
        }
        added
    }

    /// Takes `action` away from `account`. Returns `false` if it never had it.
    pub fn revoke(&self, action: Action, account: &AccountId) -> bool {
        let removed = self
            .roles
            .write()
            .get_mut(&action)
            .is_some_and(|members| members.remove(account));
        if removed {
            info!(%action, %account, "role revoked");
        }
        removed
    }

    /// Accounts holding `action`, sorted.
    pub fn members(&self, action: Action) -> Vec<AccountId> {
        let mut members: Vec<AccountId> = self
            .roles
            .read()
            .get(&action)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }
}

impl Authorizer for RoleAuthorizer {
    fn can_perform(&self, action: Action, caller: &AccountId) -> bool {
        self.roles
            .read()
            .get(&action)
            .is_some_and(|members| members.contains(caller))
    }
}
