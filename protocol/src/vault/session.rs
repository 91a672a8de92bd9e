//! Unlock sessions.
//!
//! A session is the explicit context of one top-level operation: the delta
//! ledger, the nesting depth of `unlock` calls inside it, and whether it is
//! a throwaway query. It exists exactly while the vault is unlocked; the
//! locked state is simply "no session".

use uuid::Uuid;

use super::delta_ledger::TokenDeltaLedger;

/// State of an open unlock scope.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    depth: u32,
    query: bool,
    /// Outstanding token obligations.
    pub deltas: TokenDeltaLedger,
}

impl Session {
    pub(crate) fn open(query: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            depth: 1,
            query,
            deltas: TokenDeltaLedger::new(),
        }
    }

    /// Session identifier, carried on every log line of the operation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current `unlock` nesting depth; 1 for the top level.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// `true` inside [`Vault::quote`](crate::vault::Vault::quote).
    pub fn is_query(&self) -> bool {
        self.query
    }

    pub(crate) fn enter(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn exit(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
