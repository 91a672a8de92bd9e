//! Error types for the Tidal vault.
//!
//! Every fallible vault, router or collaborator operation returns a
//! [`VaultError`]. Each variant belongs to exactly one [`ErrorKind`], so a
//! caller can tell "retry with different amounts" apart from "this will
//! never work without a role" without matching on every variant.

use std::fmt;

use thiserror::Error;

use crate::token::{AccountId, TokenId};

/// Broad failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Ledger or arithmetic invariant broken. Never recoverable; always a
    /// programming or integration error.
    Invariant,
    /// A caller-supplied bound was violated (slippage, deadline, minimum
    /// shares). Retrying with adjusted bounds may succeed.
    Bound,
    /// Unknown pool, uninitialized buffer, zero rate, bad registration.
    Configuration,
    /// The caller lacks the role for a privileged action.
    Authorization,
    /// A collaborator (hook, pricing curve, wrapper, token ledger) refused.
    External,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invariant => "invariant",
            Self::Bound => "bound",
            Self::Configuration => "configuration",
            Self::Authorization => "authorization",
            Self::External => "external",
        };
        f.write_str(name)
    }
}

/// Errors produced by the vault and its routers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    // -- invariant ----------------------------------------------------------
    /// A balance-mutating primitive ran outside an unlocked scope.
    #[error("vault is locked: balance-mutating calls require an unlocked session")]
    VaultLocked,

    /// The top-level unlock finished with unresolved token deltas.
    #[error("balance not settled: {outstanding} token(s) still owed, first {token} = {delta}")]
    BalanceNotSettled {
        /// Number of tokens with a nonzero delta.
        outstanding: usize,
        /// One of the offending tokens.
        token: TokenId,
        /// Its remaining delta.
        delta: i128,
    },

    /// Nested unlocks went deeper than the configured bound.
    #[error("unlock nesting too deep: depth {depth} exceeds {max}")]
    ReentrancyLimit {
        /// Depth that was attempted.
        depth: u32,
        /// Configured maximum.
        max: u32,
    },

    /// Arithmetic overflow (including a value not fitting a packed half).
    #[error("arithmetic overflow: {0}")]
    Overflow(&'static str),

    /// Arithmetic underflow.
    #[error("arithmetic underflow: {0}")]
    Underflow(&'static str),

    /// Division by zero in fixed-point math.
    #[error("division by zero")]
    DivisionByZero,

    /// The vault's real token balance fell below its recorded reserves.
    #[error("reserves of {token} decreased: recorded {recorded}, actual {actual}")]
    ReservesDecreased {
        /// Token whose balance shrank.
        token: TokenId,
        /// Reserves on record.
        recorded: u128,
        /// Balance reported by the token ledger.
        actual: u128,
    },

    /// `send_to` asked for more than the vault holds.
    #[error("insufficient reserves of {token}: available {available}, requested {requested}")]
    InsufficientReserves {
        /// Token being sent.
        token: TokenId,
        /// Reserves on record.
        available: u128,
        /// Amount requested.
        requested: u128,
    },

    /// A pool balance would go negative.
    #[error("insufficient balance of {token} in pool {pool}: available {available}, requested {requested}")]
    InsufficientPoolBalance {
        /// Pool id.
        pool: TokenId,
        /// Token id.
        token: TokenId,
        /// Current raw balance.
        available: u128,
        /// Amount requested.
        requested: u128,
    },

    /// A buffer side would go negative.
    #[error("insufficient buffer balance for {wrapped}: available {available}, requested {requested}")]
    InsufficientBufferBalance {
        /// Wrapped token identifying the buffer.
        wrapped: TokenId,
        /// Current balance of the side.
        available: u128,
        /// Amount requested.
        requested: u128,
    },

    // -- bound --------------------------------------------------------------
    /// Swap output below the minimum (exact-in) or input above the maximum
    /// (exact-out).
    #[error("swap limit violated: amount {amount}, limit {limit}")]
    SwapLimit {
        /// Calculated amount.
        amount: u128,
        /// Caller limit.
        limit: u128,
    },

    /// Required input exceeds the caller's maximum.
    #[error("amount in of {token} above max: {amount} > {max}")]
    AmountInAboveMax {
        /// Token id.
        token: TokenId,
        /// Required amount.
        amount: u128,
        /// Caller maximum.
        max: u128,
    },

    /// Output below the caller's minimum.
    #[error("amount out of {token} below min: {amount} < {min}")]
    AmountOutBelowMin {
        /// Token id.
        token: TokenId,
        /// Calculated amount.
        amount: u128,
        /// Caller minimum.
        min: u128,
    },

    /// BPT minted below the caller's minimum.
    #[error("bpt out below min: {amount} < {min}")]
    BptAmountOutBelowMin {
        /// BPT minted.
        amount: u128,
        /// Caller minimum.
        min: u128,
    },

    /// BPT burned above the caller's maximum.
    #[error("bpt in above max: {amount} > {max}")]
    BptAmountInAboveMax {
        /// BPT required.
        amount: u128,
        /// Caller maximum.
        max: u128,
    },

    /// Buffer shares issued below the caller's minimum.
    #[error("issued buffer shares below min: {issued} < {min}")]
    IssuedSharesBelowMin {
        /// Shares credited to the owner.
        issued: u128,
        /// Caller minimum.
        min: u128,
    },

    /// The call started after its deadline.
    #[error("deadline exceeded: deadline {deadline}, now {now}")]
    DeadlineExceeded {
        /// Caller deadline (unix seconds).
        deadline: u64,
        /// Current time (unix seconds).
        now: u64,
    },

    /// Wrap or unwrap below the minimum wrap amount.
    #[error("wrap amount too small for {wrapped}: {amount} < {min}")]
    WrapAmountTooSmall {
        /// Wrapped token.
        wrapped: TokenId,
        /// Given amount.
        amount: u128,
        /// Configured minimum.
        min: u128,
    },

    /// Owner holds fewer pool or buffer shares than requested.
    #[error("insufficient shares of {token} for {owner}: holds {available}, requested {requested}")]
    InsufficientShares {
        /// Pool or wrapped token the shares belong to.
        token: TokenId,
        /// Share owner.
        owner: AccountId,
        /// Shares held.
        available: u128,
        /// Shares requested.
        requested: u128,
    },

    /// Pool total supply would fall below the burned minimum.
    #[error("pool total supply too low: {supply} < {min}")]
    PoolTotalSupplyTooLow {
        /// Supply after the operation.
        supply: u128,
        /// Configured minimum.
        min: u128,
    },

    /// Buffer total shares would fall below the floor.
    #[error("buffer total shares too low: {shares} < {min}")]
    BufferTotalSupplyTooLow {
        /// Shares after the operation.
        shares: u128,
        /// Configured floor.
        min: u128,
    },

    /// An amounts vector does not have the shape the operation needs.
    #[error("invalid amounts: {0}")]
    InvalidAmounts(String),

    /// A swap primitive was called with a zero given amount.
    #[error("amount given is zero")]
    AmountGivenZero,

    /// Invariant ratio outside the pool's supported range.
    #[error("invariant ratio {ratio} outside [{min}, {max}]")]
    InvariantRatioOutOfBounds {
        /// Ratio requested.
        ratio: u128,
        /// Pool minimum.
        min: u128,
        /// Pool maximum.
        max: u128,
    },

    // -- configuration ------------------------------------------------------
    /// Unknown pool id.
    #[error("pool not registered: {0}")]
    PoolNotRegistered(TokenId),

    /// Pool id already in use.
    #[error("pool already registered: {0}")]
    PoolAlreadyRegistered(TokenId),

    /// Pool has not been initialized yet.
    #[error("pool not initialized: {0}")]
    PoolNotInitialized(TokenId),

    /// Pool was already initialized.
    #[error("pool already initialized: {0}")]
    PoolAlreadyInitialized(TokenId),

    /// Token is not part of the pool.
    #[error("token {token} not registered in pool {pool}")]
    TokenNotRegistered {
        /// Pool id.
        pool: TokenId,
        /// Token id.
        token: TokenId,
    },

    /// Pool registration rejected.
    #[error("invalid pool registration: {0}")]
    InvalidRegistration(String),

    /// Amount vector length does not match the pool's token count.
    #[error("input length mismatch: expected {expected}, got {got}")]
    InputLengthMismatch {
        /// Token count.
        expected: usize,
        /// Supplied length.
        got: usize,
    },

    /// A rate provider reported zero.
    #[error("zero rate reported for token {token}")]
    ZeroRate {
        /// Token whose rate is zero.
        token: TokenId,
    },

    /// Swap fee above the configured cap or at 100%.
    #[error("swap fee percentage {fee} above max {max}")]
    SwapFeeTooHigh {
        /// Requested fee.
        fee: u128,
        /// Cap.
        max: u128,
    },

    /// Aggregate fee percentage above the configured cap.
    #[error("aggregate fee percentage {fee} above max {max}")]
    AggregateFeeTooHigh {
        /// Requested fee.
        fee: u128,
        /// Cap.
        max: u128,
    },

    /// Swap between a token and itself.
    #[error("cannot swap {0} for itself")]
    CannotSwapSameToken(TokenId),

    /// No wrapper registered for this wrapped token.
    #[error("no wrapper registered for {0}")]
    WrapperNotRegistered(TokenId),

    /// A wrapper for this token already exists.
    #[error("wrapper already registered for {0}")]
    WrapperAlreadyRegistered(TokenId),

    /// Buffer operations need an initialized buffer.
    #[error("buffer not initialized: {0}")]
    BufferNotInitialized(TokenId),

    /// Buffer already initialized.
    #[error("buffer already initialized: {0}")]
    BufferAlreadyInitialized(TokenId),

    /// The wrapper's underlying asset disagrees with the buffer's.
    #[error("wrong underlying for {wrapped}: expected {expected}, got {got}")]
    WrongUnderlyingToken {
        /// Wrapped token.
        wrapped: TokenId,
        /// Underlying recorded by the vault.
        expected: TokenId,
        /// Underlying reported by the wrapper or requested by the path.
        got: TokenId,
    },

    /// A batch path is malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Vault configuration rejected.
    #[error("invalid vault config: {0}")]
    InvalidConfig(String),

    /// The vault is paused.
    #[error("vault is paused")]
    VaultPaused,

    /// The pool is paused.
    #[error("pool is paused: {0}")]
    PoolPaused(TokenId),

    // -- authorization ------------------------------------------------------
    /// Caller lacks the role for the action.
    #[error("unauthorized: {caller} may not {action}")]
    Unauthorized {
        /// Calling account.
        caller: AccountId,
        /// Action name.
        action: String,
    },

    // -- external -----------------------------------------------------------
    /// A hook returned failure.
    #[error("hook vetoed {stage} on pool {pool}")]
    HookVeto {
        /// Pool whose hook refused.
        pool: TokenId,
        /// Hook stage, e.g. `before_swap`.
        stage: &'static str,
    },

    /// A hook adjusted an amount in the caller's favour.
    #[error("hook adjusted amount invalid: {adjusted} vs calculated {calculated}")]
    HookAdjustedAmountInvalid {
        /// Amount returned by the hook.
        adjusted: u128,
        /// Amount calculated by the pool.
        calculated: u128,
    },

    /// Pricing callback failure.
    #[error("pricing failed: {0}")]
    PricingFailed(String),

    /// The wrapper could not wrap or unwrap externally.
    #[error("external wrap failed for {wrapped}: {reason}")]
    ExternalWrapFailed {
        /// Wrapped token.
        wrapped: TokenId,
        /// Collaborator message.
        reason: String,
    },

    /// The token ledger refused a transfer.
    #[error("token transfer failed: {0}")]
    TransferFailed(String),
}

impl VaultError {
    /// Returns the taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        use VaultError::*;
        match self {
            VaultLocked
            | BalanceNotSettled { .. }
            | ReentrancyLimit { .. }
            | Overflow(_)
            | Underflow(_)
            | DivisionByZero
            | ReservesDecreased { .. }
            | InsufficientReserves { .. }
            | InsufficientPoolBalance { .. }
            | InsufficientBufferBalance { .. } => ErrorKind::Invariant,

            SwapLimit { .. }
            | AmountInAboveMax { .. }
            | AmountOutBelowMin { .. }
            | BptAmountOutBelowMin { .. }
            | BptAmountInAboveMax { .. }
            | IssuedSharesBelowMin { .. }
            | DeadlineExceeded { .. }
            | WrapAmountTooSmall { .. }
            | InsufficientShares { .. }
            | PoolTotalSupplyTooLow { .. }
            | BufferTotalSupplyTooLow { .. }
            | InvalidAmounts(_)
            | AmountGivenZero
            | InvariantRatioOutOfBounds { .. } => ErrorKind::Bound,

            PoolNotRegistered(_)
            | PoolAlreadyRegistered(_)
            | PoolNotInitialized(_)
            | PoolAlreadyInitialized(_)
            | TokenNotRegistered { .. }
            | InvalidRegistration(_)
            | InputLengthMismatch { .. }
            | ZeroRate { .. }
            | SwapFeeTooHigh { .. }
            | AggregateFeeTooHigh { .. }
            | CannotSwapSameToken(_)
            | WrapperNotRegistered(_)
            | WrapperAlreadyRegistered(_)
            | BufferNotInitialized(_)
            | BufferAlreadyInitialized(_)
            | WrongUnderlyingToken { .. }
            | InvalidPath(_)
            | InvalidConfig(_)
            | VaultPaused
            | PoolPaused(_) => ErrorKind::Configuration,

            Unauthorized { .. } => ErrorKind::Authorization,

            HookVeto { .. }
            | HookAdjustedAmountInvalid { .. }
            | PricingFailed(_)
            | ExternalWrapFailed { .. }
            | TransferFailed(_) => ErrorKind::External,
        }
    }

    /// `true` when the same call with different amounts or a later
    /// deadline could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_is_invariant() {
        assert_eq!(VaultError::VaultLocked.kind(), ErrorKind::Invariant);
        assert!(!VaultError::VaultLocked.is_retryable());
    }

    #[test]
    fn slippage_is_retryable() {
        let err = VaultError::SwapLimit {
            amount: 10,
            limit: 11,
        };
        assert_eq!(err.kind(), ErrorKind::Bound);
        assert!(err.is_retryable());
    }

    #[test]
    fn authorization_is_distinct_from_bounds() {
        let err = VaultError::Unauthorized {
            caller: AccountId::new("mallory"),
            action: "rebalance buffer".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("mallory"));
    }

    #[test]
    fn zero_rate_names_the_token() {
        let token = TokenId::from_symbol("wstETH");
        let err = VaultError::ZeroRate { token };
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.to_string().contains(&token.to_hex()));
    }
}
