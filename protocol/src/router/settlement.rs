//! Moving tokens across the vault boundary on behalf of a sender.
//!
//! Routers compute what a sender owes and is owed, then settle each token
//! once: pay-ins first (so reserves exist for anything paid back out),
//! then pay-outs. Zero amounts never touch the ledger.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::VaultError;
use crate::external::TokenLedger;
use crate::token::{AccountId, TokenId};
use crate::vault::Vault;

/// How the sender's payment reaches the vault.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementMode {
    /// The router pulls with `transfer_from`; the sender must have approved
    /// the router's account.
    #[default]
    Pull,
    /// The sender already transferred into the vault; the router only
    /// settles.
    Prepaid,
}

/// Net token movement of one router call, from the sender's side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    /// Tokens the sender paid in, in token order.
    pub paid_in: Vec<(TokenId, u128)>,
    /// Tokens the sender received, in token order.
    pub paid_out: Vec<(TokenId, u128)>,
}

impl Settlement {
    /// Folds a pay-in made before the final settlement into `paid_in`,
    /// keeping token order.
    pub(crate) fn record_paid_in(&mut self, token: TokenId, amount: u128) -> Result<(), VaultError> {
        if amount == 0 {
            return Ok(());
        }
        match self.paid_in.binary_search_by_key(&token, |(t, _)| *t) {
            Ok(i) => {
                let total = &mut self.paid_in[i].1;
                *total = total.checked_add(amount).ok_or(VaultError::Overflow("paid in"))?;
            }
            Err(i) => self.paid_in.insert(i, (token, amount)),
        }
        Ok(())
    }
}

/// Signed per-token flows, vault sign convention: negative is owed to the
/// vault by the sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetFlows(BTreeMap<TokenId, i128>);

impl NetFlows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the sender owes `amount` of `token`.
    pub fn owe(&mut self, token: TokenId, amount: u128) -> Result<(), VaultError> {
        self.add(token, -to_signed(amount)?)
    }

    /// Records that the sender is owed `amount` of `token`.
    pub fn receive(&mut self, token: TokenId, amount: u128) -> Result<(), VaultError> {
        self.add(token, to_signed(amount)?)
    }

    fn add(&mut self, token: TokenId, delta: i128) -> Result<(), VaultError> {
        if delta == 0 {
            return Ok(());
        }
        let entry = self.0.entry(token).or_insert(0);
        *entry = entry.checked_add(delta).ok_or(VaultError::Overflow("net flow"))?;
        Ok(())
    }

    /// Net flow of `token`.
    pub fn get(&self, token: TokenId) -> i128 {
        self.0.get(&token).copied().unwrap_or(0)
    }

    /// Nonzero flows in token order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, i128)> + '_ {
        self.0.iter().filter(|(_, v)| **v != 0).map(|(k, v)| (*k, *v))
    }

    /// The session's outstanding deltas, as flows.
    pub fn outstanding<L: TokenLedger + Clone>(vault: &Vault<L>) -> Self {
        let mut flows = BTreeMap::new();
        if let Some(session) = vault.session() {
            for (token, delta) in session.deltas.iter() {
                flows.insert(token, delta);
            }
        }
        Self(flows)
    }
}

fn to_signed(amount: u128) -> Result<i128, VaultError> {
    i128::try_from(amount).map_err(|_| VaultError::Overflow("net flow"))
}

/// Brings `amount` of `token` from `sender` into the vault and settles it.
pub(crate) fn pay_in<L: TokenLedger + Clone>(
    vault: &mut Vault<L>,
    router: &AccountId,
    sender: &AccountId,
    token: TokenId,
    amount: u128,
    mode: SettlementMode,
) -> Result<(), VaultError> {
    if amount == 0 {
        return Ok(());
    }
    if mode == SettlementMode::Pull {
        let vault_account = vault.account().clone();
        vault
            .bank_mut()
            .transfer_from(token, router, sender, &vault_account, amount)?;
    }
    vault.settle(token, amount)?;
    Ok(())
}

/// Settles every flow: pay-ins first, then pay-outs.
pub(crate) fn settle_flows<L: TokenLedger + Clone>(
    vault: &mut Vault<L>,
    router: &AccountId,
    sender: &AccountId,
    flows: &NetFlows,
    mode: SettlementMode,
) -> Result<Settlement, VaultError> {
    let mut settlement = Settlement::default();
    for (token, flow) in flows.iter().filter(|(_, f)| *f < 0) {
        let amount = flow.unsigned_abs();
        pay_in(vault, router, sender, token, amount, mode)?;
        settlement.paid_in.push((token, amount));
    }
    for (token, flow) in flows.iter().filter(|(_, f)| *f > 0) {
        let amount = flow.unsigned_abs();
        vault.send_to(token, sender, amount)?;
        settlement.paid_out.push((token, amount));
    }
    debug!(
        %sender,
        tokens_in = settlement.paid_in.len(),
        tokens_out = settlement.paid_out.len(),
        "router settled"
    );
    Ok(settlement)
}
