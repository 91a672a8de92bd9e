//! Rate-provider capability.

use std::fmt;

use crate::error::VaultError;

/// Source of a token's exchange rate, 18-decimal fixed point.
///
/// Queried every time live balances are recomputed for a
/// [`TokenType::WithRate`](crate::vault::pool::TokenType::WithRate) token. A
/// provider may legitimately report zero (a depegged or broken feed); the
/// vault rejects that rather than pricing the pool at nothing.
pub trait RateProvider: fmt::Debug + Send + Sync {
    /// Current rate.
    fn get_rate(&self) -> Result<u128, VaultError>;
}
