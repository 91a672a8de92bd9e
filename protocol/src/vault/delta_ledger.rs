//! # Token Delta Ledger
//!
//! The transient ledger of one unlocked session: for every token touched,
//! the signed net amount still to be reconciled against real transfers.
//!
//! Sign convention:
//!
//! - **negative** — the vault must still *receive* this much (caller debt)
//! - **positive** — the vault must still *pay out* this much (caller credit)
//!
//! Primitives push deltas; `settle` pays debt down, `send_to` draws credit
//! down. A counter of nonzero entries makes "is everything settled?" O(1).
//! Entries that net to zero are removed, so a settled ledger is also an
//! empty one.

use std::collections::HashMap;

use crate::error::VaultError;
use crate::token::TokenId;

/// Per-session signed obligations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenDeltaLedger {
    deltas: HashMap<TokenId, i128>,
    non_zero_count: usize,
}

impl TokenDeltaLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` to `token`'s running total.
    ///
    /// # Errors
    ///
    /// [`VaultError::Overflow`] if the running total leaves `i128`.
    pub fn account_delta(&mut self, token: TokenId, delta: i128) -> Result<(), VaultError> {
        if delta == 0 {
            return Ok(());
        }
        let current = self.get_delta(token);
        let next = current
            .checked_add(delta)
            .ok_or(VaultError::Overflow("token delta"))?;

        if current == 0 {
            self.non_zero_count += 1;
        }
        if next == 0 {
            self.non_zero_count -= 1;
            self.deltas.remove(&token);
        } else {
            self.deltas.insert(token, next);
        }
        Ok(())
    }

    /// `true` when no token has an outstanding delta.
    pub fn is_settled(&self) -> bool {
        self.non_zero_count == 0
    }

    /// Outstanding delta for `token` (zero if untouched).
    pub fn get_delta(&self, token: TokenId) -> i128 {
        self.deltas.get(&token).copied().unwrap_or(0)
    }

    /// Number of tokens with a nonzero delta.
    pub fn non_zero_count(&self) -> usize {
        self.non_zero_count
    }

    /// Iterates the outstanding deltas in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, i128)> + '_ {
        self.deltas.iter().map(|(token, delta)| (*token, *delta))
    }

    /// Any one outstanding entry, for error reporting.
    pub fn first_outstanding(&self) -> Option<(TokenId, i128)> {
        self.deltas
            .iter()
            .min_by_key(|(token, _)| **token)
            .map(|(token, delta)| (*token, *delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dai() -> TokenId {
        TokenId::from_symbol("DAI")
    }

    fn usdc() -> TokenId {
        TokenId::from_symbol("USDC")
    }

    #[test]
    fn fresh_ledger_is_settled() {
        let ledger = TokenDeltaLedger::new();
        assert!(ledger.is_settled());
        assert_eq!(ledger.get_delta(dai()), 0);
    }

    #[test]
    fn counter_tracks_nonzero_entries() {
        let mut ledger = TokenDeltaLedger::new();
        ledger.account_delta(dai(), -100).unwrap();
        ledger.account_delta(usdc(), 50).unwrap();
        assert_eq!(ledger.non_zero_count(), 2);

        ledger.account_delta(dai(), 60).unwrap();
        assert_eq!(ledger.non_zero_count(), 2);
        assert_eq!(ledger.get_delta(dai()), -40);

        ledger.account_delta(dai(), 40).unwrap();
        assert_eq!(ledger.non_zero_count(), 1);
        ledger.account_delta(usdc(), -50).unwrap();
        assert!(ledger.is_settled());
        assert_eq!(ledger.iter().count(), 0);
    }

    #[test]
    fn zero_delta_is_a_noop() {
        let mut ledger = TokenDeltaLedger::new();
        ledger.account_delta(dai(), 0).unwrap();
        assert!(ledger.is_settled());
    }

    #[test]
    fn sign_flip_keeps_one_entry() {
        let mut ledger = TokenDeltaLedger::new();
        ledger.account_delta(dai(), -10).unwrap();
        ledger.account_delta(dai(), 25).unwrap();
        assert_eq!(ledger.non_zero_count(), 1);
        assert_eq!(ledger.get_delta(dai()), 15);
    }

    #[test]
    fn overflow_leaves_ledger_untouched() {
        let mut ledger = TokenDeltaLedger::new();
        ledger.account_delta(dai(), i128::MAX).unwrap();
        assert!(ledger.account_delta(dai(), 1).is_err());
        assert_eq!(ledger.get_delta(dai()), i128::MAX);
        assert_eq!(ledger.non_zero_count(), 1);
    }

    proptest! {
        #[test]
        fn netting_deltas_always_settles(amounts in proptest::collection::vec(-1_000_000i128..1_000_000, 1..32)) {
            let mut ledger = TokenDeltaLedger::new();
            for amount in &amounts {
                ledger.account_delta(dai(), *amount).unwrap();
            }
            let total: i128 = amounts.iter().sum();
            prop_assert_eq!(ledger.get_delta(dai()), total);
            prop_assert_eq!(ledger.is_settled(), total == 0);
            ledger.account_delta(dai(), -total).unwrap();
            prop_assert!(ledger.is_settled());
        }
    }
}
