//! # Batch Router
//!
//! Resolves one or more multi-hop paths inside a single unlocked session
//! and settles the sender once per token at the end.
//!
//! ```text
//!   deadline ─► unlock ─► walk every path ─► net flows ─► pay in ─► pay out ─► lock
//! ```
//!
//! Exact-in paths walk forward: each step's output is the next step's
//! exact input. Exact-out paths walk backward: each step's required input
//! is the previous step's exact output. Only a path's first input and last
//! output enter the flow map; everything in between nets to zero inside the
//! vault's delta ledger, and opposite flows on the same token across paths
//! cancel before any transfer happens.
//!
//! A first step through a buffer is paid for before it runs, so a buffer
//! too thin to cover the trade can fall back to the wrapper with the
//! sender's tokens already in the vault. Queries skip the early payment.
//!
//! A zero amount reaching a step skips it outright. A path whose first step
//! removes liquidity from a pool equal to the path's input token burns the
//! sender's BPT directly and generates no pay-in.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::clock::{Clock, SystemClock};
use super::path::{
    ends_with_bpt_mint, starts_with_bpt_burn, step_inputs, StepAction, SwapPathExactAmountIn, SwapPathExactAmountOut,
    SwapPathStep,
};
use super::settlement::{pay_in, settle_flows, NetFlows, Settlement, SettlementMode};
use crate::error::VaultError;
use crate::external::{SwapKind, TokenLedger};
use crate::token::{AccountId, TokenId};
use crate::vault::{
    AddLiquidityKind, AddLiquidityParams, BufferWrapOrUnwrapParams, RemoveLiquidityKind, RemoveLiquidityParams, Vault,
    VaultSwapParams, WrappingDirection,
};

/// Default ledger account of the batch router.
pub const BATCH_ROUTER_ACCOUNT: &str = "batch-router";

/// Result of a batch call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSwapOutcome {
    /// Per path: amount out (exact-in) or amount in (exact-out).
    pub path_amounts: Vec<u128>,
    /// Tokens that crossed the vault boundary, after netting.
    pub settlement: Settlement,
}

/// Paths resolved inside an open session, before settlement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedPaths {
    /// Per path: amount out (exact-in) or amount in (exact-out).
    pub path_amounts: Vec<u128>,
    /// What the sender owes and is owed.
    pub flows: NetFlows,
    /// Inputs already paid in ahead of a first-step buffer.
    pub paid_early: Vec<(TokenId, u128)>,
}

impl ResolvedPaths {
    /// Nets an early payment against the flows and remembers it for the
    /// settlement report.
    fn record_early(&mut self, token: TokenId, amount: u128) -> Result<(), VaultError> {
        if amount == 0 {
            return Ok(());
        }
        self.flows.receive(token, amount)?;
        self.paid_early.push((token, amount));
        Ok(())
    }

    fn settle<L: TokenLedger + Clone>(
        self,
        vault: &mut Vault<L>,
        router: &AccountId,
        sender: &AccountId,
        mode: SettlementMode,
    ) -> Result<BatchSwapOutcome, VaultError> {
        let mut settlement = settle_flows(vault, router, sender, &self.flows, mode)?;
        for (token, amount) in self.paid_early {
            settlement.record_paid_in(token, amount)?;
        }
        Ok(BatchSwapOutcome {
            path_amounts: self.path_amounts,
            settlement,
        })
    }
}

/// Multi-hop router.
#[derive(Debug, Clone)]
pub struct BatchRouter {
    account: AccountId,
    clock: Arc<dyn Clock>,
}

impl Default for BatchRouter {
    fn default() -> Self {
        Self::new(AccountId::new(BATCH_ROUTER_ACCOUNT), Arc::new(SystemClock))
    }
}

impl BatchRouter {
    /// A router acting as `account`, reading time from `clock`.
    pub fn new(account: AccountId, clock: Arc<dyn Clock>) -> Self {
        Self { account, clock }
    }

    /// The router's ledger account. Senders approve this for `Pull`.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    fn check_deadline(&self, deadline: u64) -> Result<(), VaultError> {
        let now = self.clock.now();
        if now > deadline {
            return Err(VaultError::DeadlineExceeded { deadline, now });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Entry points
    // -----------------------------------------------------------------------

    /// Executes exact-in paths and settles.
    ///
    /// # Errors
    ///
    /// [`VaultError::DeadlineExceeded`], any step failure, a path ending
    /// below its minimum, or a settlement failure. All-or-nothing.
    pub fn swap_exact_in<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        paths: &[SwapPathExactAmountIn],
        deadline: u64,
        mode: SettlementMode,
    ) -> Result<BatchSwapOutcome, VaultError> {
        self.check_deadline(deadline)?;
        let outcome = vault.unlock(|vault| {
            self.resolve_exact_in(vault, sender, paths, mode)?
                .settle(vault, &self.account, sender, mode)
        })?;
        info!(%sender, paths = paths.len(), "batch exact-in executed");
        Ok(outcome)
    }

    /// Executes exact-out paths and settles.
    ///
    /// # Errors
    ///
    /// As [`BatchRouter::swap_exact_in`], plus [`VaultError::InvalidPath`]
    /// for an intermediate BPT hop.
    pub fn swap_exact_out<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        paths: &[SwapPathExactAmountOut],
        deadline: u64,
        mode: SettlementMode,
    ) -> Result<BatchSwapOutcome, VaultError> {
        self.check_deadline(deadline)?;
        let outcome = vault.unlock(|vault| {
            self.resolve_exact_out(vault, sender, paths, mode)?
                .settle(vault, &self.account, sender, mode)
        })?;
        info!(%sender, paths = paths.len(), "batch exact-out executed");
        Ok(outcome)
    }

    /// Prices exact-in paths without persisting anything.
    pub fn query_swap_exact_in<L: TokenLedger + Clone>(
        &self,
        vault: &Vault<L>,
        sender: &AccountId,
        paths: &[SwapPathExactAmountIn],
    ) -> Result<Vec<u128>, VaultError> {
        vault.quote(|vault| Ok(self.resolve_exact_in(vault, sender, paths, SettlementMode::Prepaid)?.path_amounts))
    }

    /// Prices exact-out paths without persisting anything.
    pub fn query_swap_exact_out<L: TokenLedger + Clone>(
        &self,
        vault: &Vault<L>,
        sender: &AccountId,
        paths: &[SwapPathExactAmountOut],
    ) -> Result<Vec<u128>, VaultError> {
        vault.quote(|vault| Ok(self.resolve_exact_out(vault, sender, paths, SettlementMode::Prepaid)?.path_amounts))
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Walks exact-in paths inside the open session. Records vault deltas;
    /// the only tokens moved are inputs paid early for a first-step buffer.
    pub fn resolve_exact_in<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        paths: &[SwapPathExactAmountIn],
        mode: SettlementMode,
    ) -> Result<ResolvedPaths, VaultError> {
        vault.ensure_unlocked()?;
        let mut resolved = ResolvedPaths::default();
        for path in paths {
            let (amount_out, paid_early) = self.walk_exact_in(vault, sender, path, mode)?;
            if amount_out < path.min_amount_out {
                return Err(VaultError::SwapLimit {
                    amount: amount_out,
                    limit: path.min_amount_out,
                });
            }
            if !starts_with_bpt_burn(path.token_in, &path.steps) {
                resolved.flows.owe(path.token_in, path.exact_amount_in)?;
            }
            resolved.record_early(path.token_in, paid_early)?;
            if !ends_with_bpt_mint(&path.steps) {
                if let Some(last) = path.steps.last() {
                    resolved.flows.receive(last.token_out, amount_out)?;
                }
            }
            resolved.path_amounts.push(amount_out);
        }
        Ok(resolved)
    }

    fn walk_exact_in<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        path: &SwapPathExactAmountIn,
        mode: SettlementMode,
    ) -> Result<(u128, u128), VaultError> {
        if path.steps.is_empty() {
            return Err(VaultError::InvalidPath("path has no steps".into()));
        }
        let inputs = step_inputs(path.token_in, &path.steps);
        let last = path.steps.len() - 1;
        let mut amount = path.exact_amount_in;
        let mut paid_early = 0;

        for (i, (step, token_in)) in path.steps.iter().zip(inputs).enumerate() {
            let action = step.action(token_in)?;
            if amount == 0 {
                debug!(pool = %step.pool, "zero amount, step skipped");
                continue;
            }
            let min_out = if i == last { path.min_amount_out } else { 0 };
            amount = match action {
                StepAction::Wrap | StepAction::Unwrap => {
                    if i == 0 {
                        paid_early = self.pay_early(vault, sender, token_in, amount, mode)?;
                    }
                    vault
                        .erc4626_buffer_wrap_or_unwrap(&BufferWrapOrUnwrapParams {
                            kind: SwapKind::ExactIn,
                            direction: direction(action),
                            wrapped: step.pool,
                            amount_given_raw: amount,
                            limit_raw: min_out,
                        })?
                        .amount_out_raw
                }
                StepAction::Swap => {
                    vault
                        .swap(&VaultSwapParams {
                            kind: SwapKind::ExactIn,
                            pool: step.pool,
                            token_in,
                            token_out: step.token_out,
                            amount_given_raw: amount,
                            limit_raw: min_out,
                            router: self.account.clone(),
                        })?
                        .amount_out_raw
                }
                StepAction::AddLiquidity => {
                    let to = if i == last { sender } else { &self.account };
                    let exact_amounts_in = single_amount(vault, step.pool, token_in, amount)?;
                    vault
                        .add_liquidity(&AddLiquidityParams {
                            pool: step.pool,
                            to: to.clone(),
                            max_amounts_in: exact_amounts_in,
                            min_bpt_amount_out: min_out,
                            kind: AddLiquidityKind::Unbalanced,
                        })?
                        .bpt_amount_out
                }
                StepAction::RemoveLiquidity => {
                    let from = if i == 0 { sender } else { &self.account };
                    // The nonzero minimum selects the exit token.
                    let min_amounts_out = single_amount(vault, step.pool, step.token_out, min_out.max(1))?;
                    let outcome = vault.remove_liquidity(&RemoveLiquidityParams {
                        pool: step.pool,
                        from: from.clone(),
                        max_bpt_amount_in: amount,
                        min_amounts_out,
                        kind: RemoveLiquidityKind::SingleTokenExactIn,
                    })?;
                    outcome.amounts_out.iter().sum()
                }
            };
            debug!(pool = %step.pool, action = ?action, amount, "step resolved");
        }
        Ok((amount, paid_early))
    }

    /// Walks exact-out paths backward inside the open session.
    pub fn resolve_exact_out<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        paths: &[SwapPathExactAmountOut],
        mode: SettlementMode,
    ) -> Result<ResolvedPaths, VaultError> {
        vault.ensure_unlocked()?;
        let mut resolved = ResolvedPaths::default();
        for path in paths {
            let (amount_in, paid_early) = self.walk_exact_out(vault, sender, path, mode)?;
            if amount_in > path.max_amount_in {
                return Err(VaultError::SwapLimit {
                    amount: amount_in,
                    limit: path.max_amount_in,
                });
            }
            if !starts_with_bpt_burn(path.token_in, &path.steps) {
                resolved.flows.owe(path.token_in, amount_in)?;
            }
            resolved.record_early(path.token_in, paid_early)?;
            if !ends_with_bpt_mint(&path.steps) {
                if let Some(last) = path.steps.last() {
                    resolved.flows.receive(last.token_out, path.exact_amount_out)?;
                }
            }
            resolved.path_amounts.push(amount_in);
        }
        Ok(resolved)
    }

    fn walk_exact_out<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        path: &SwapPathExactAmountOut,
        mode: SettlementMode,
    ) -> Result<(u128, u128), VaultError> {
        if path.steps.is_empty() {
            return Err(VaultError::InvalidPath("path has no steps".into()));
        }
        let inputs = step_inputs(path.token_in, &path.steps);
        let last = path.steps.len() - 1;
        let mut amount = path.exact_amount_out;
        let mut paid_early = 0;

        for (i, (step, token_in)) in path.steps.iter().zip(inputs).enumerate().rev() {
            let action = step.action(token_in)?;
            reject_intermediate_bpt(step, action, i, last)?;
            if amount == 0 {
                debug!(pool = %step.pool, "zero amount, step skipped");
                continue;
            }
            let max_in = if i == 0 { path.max_amount_in } else { u128::MAX };
            amount = match action {
                StepAction::Wrap | StepAction::Unwrap => {
                    if i == 0 {
                        let needed = preview_buffer_input(vault, step.pool, direction(action), amount)?;
                        paid_early = self.pay_early(vault, sender, token_in, needed.min(max_in), mode)?;
                    }
                    vault
                        .erc4626_buffer_wrap_or_unwrap(&BufferWrapOrUnwrapParams {
                            kind: SwapKind::ExactOut,
                            direction: direction(action),
                            wrapped: step.pool,
                            amount_given_raw: amount,
                            limit_raw: max_in,
                        })?
                        .amount_in_raw
                }
                StepAction::Swap => {
                    vault
                        .swap(&VaultSwapParams {
                            kind: SwapKind::ExactOut,
                            pool: step.pool,
                            token_in,
                            token_out: step.token_out,
                            amount_given_raw: amount,
                            limit_raw: max_in,
                            router: self.account.clone(),
                        })?
                        .amount_in_raw
                }
                StepAction::AddLiquidity => {
                    let max_amounts_in = single_amount(vault, step.pool, token_in, max_in)?;
                    let outcome = vault.add_liquidity(&AddLiquidityParams {
                        pool: step.pool,
                        to: sender.clone(),
                        max_amounts_in,
                        min_bpt_amount_out: amount,
                        kind: AddLiquidityKind::SingleTokenExactOut,
                    })?;
                    outcome.amounts_in.iter().sum()
                }
                StepAction::RemoveLiquidity => {
                    let exact_amounts_out = single_amount(vault, step.pool, step.token_out, amount)?;
                    vault
                        .remove_liquidity(&RemoveLiquidityParams {
                            pool: step.pool,
                            from: sender.clone(),
                            max_bpt_amount_in: max_in,
                            min_amounts_out: exact_amounts_out,
                            kind: RemoveLiquidityKind::SingleTokenExactOut,
                        })?
                        .bpt_amount_in
                }
            };
            debug!(pool = %step.pool, action = ?action, amount, "step resolved");
        }
        Ok((amount, paid_early))
    }

    /// Pays a first-step buffer input into the vault ahead of the walk.
    /// Returns what was paid; queries pay nothing.
    fn pay_early<L: TokenLedger + Clone>(
        &self,
        vault: &mut Vault<L>,
        sender: &AccountId,
        token: TokenId,
        amount: u128,
        mode: SettlementMode,
    ) -> Result<u128, VaultError> {
        if vault.is_query() {
            return Ok(0);
        }
        pay_in(vault, &self.account, sender, token, amount, mode)?;
        debug!(%sender, %token, amount, "buffer input paid early");
        Ok(amount)
    }
}

/// Input a buffer step needs to produce exactly `amount_out`, at the
/// wrapper's preview price.
pub(crate) fn preview_buffer_input<L: TokenLedger + Clone>(
    vault: &Vault<L>,
    wrapped: TokenId,
    direction: WrappingDirection,
    amount_out: u128,
) -> Result<u128, VaultError> {
    let wrapper = vault.wrapper(wrapped)?;
    match direction {
        WrappingDirection::Wrap => wrapper.preview_mint(vault.bank(), amount_out),
        WrappingDirection::Unwrap => wrapper.preview_withdraw(vault.bank(), amount_out),
    }
}

fn direction(action: StepAction) -> WrappingDirection {
    match action {
        StepAction::Unwrap => WrappingDirection::Unwrap,
        _ => WrappingDirection::Wrap,
    }
}

/// Exact-out would burn an intermediate BPT before minting it.
fn reject_intermediate_bpt(step: &SwapPathStep, action: StepAction, index: usize, last: usize) -> Result<(), VaultError> {
    let intermediate = match action {
        StepAction::AddLiquidity => index != last,
        StepAction::RemoveLiquidity => index != 0,
        _ => false,
    };
    if intermediate {
        return Err(VaultError::InvalidPath(format!(
            "intermediate BPT of {} is not supported for exact-out paths",
            step.pool
        )));
    }
    Ok(())
}

/// A pool-length amount vector with `amount` at `token`'s index.
fn single_amount<L: TokenLedger + Clone>(
    vault: &Vault<L>,
    pool: TokenId,
    token: TokenId,
    amount: u128,
) -> Result<Vec<u128>, VaultError> {
    let state = vault.pool(pool)?;
    let index = state.token_index(token)?;
    let mut amounts = vec![0; state.tokens().len()];
    amounts[index] = amount;
    Ok(amounts)
}
