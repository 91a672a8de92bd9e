//! # ERC4626 Buffer Operations
//!
//! Buffer liquidity (initialize, add, remove), wrap/unwrap through the
//! buffer, and rebalancing.
//!
//! A wrap or unwrap is served from inventory when the buffer holds enough
//! of the output side. Otherwise the vault calls the wrapper itself for the
//! requested amount *plus* half of the buffer's surplus on the input side,
//! which nudges the buffer back toward balance as a side effect. Either
//! way the caller sees the same preview-priced amounts; the buffer absorbs
//! whatever the wrapper actually returned.
//!
//! Share math mirrors a tiny AMM: the first deposit burns a fixed floor,
//! later adds pay proportionally rounding up, removes receive
//! proportionally rounding down.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::buffer::BufferState;
use super::engine::{Scope, Vault};
use crate::error::VaultError;
use crate::external::{Action, Erc4626, SwapKind, TokenLedger};
use crate::math::fixed_point::{add, mul_div, sub};
use crate::math::Rounding;
use crate::token::{AccountId, TokenId};

/// Which way a buffer converts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrappingDirection {
    /// Underlying in, wrapped out.
    Wrap,
    /// Wrapped in, underlying out.
    Unwrap,
}

/// Arguments of [`Vault::erc4626_buffer_wrap_or_unwrap`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferWrapOrUnwrapParams {
    /// Exact-in or exact-out.
    pub kind: SwapKind,
    /// Wrap or unwrap.
    pub direction: WrappingDirection,
    /// The buffer's wrapped token.
    pub wrapped: TokenId,
    /// Raw given amount.
    pub amount_given_raw: u128,
    /// Minimum out (exact-in) or maximum in (exact-out).
    pub limit_raw: u128,
}

/// What a wrap or unwrap did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferOutcome {
    /// The non-given side.
    pub amount_calculated_raw: u128,
    /// Amount of the input token.
    pub amount_in_raw: u128,
    /// Amount of the output token.
    pub amount_out_raw: u128,
    /// `true` if the wrapper was called.
    pub used_wrapper: bool,
}

/// Result of a rebalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceOutcome {
    /// Underlying side afterwards.
    pub underlying_balance: u128,
    /// Wrapped side afterwards.
    pub wrapped_balance: u128,
    /// `|wrapped − preview_deposit(underlying)|` afterwards.
    pub drift: u128,
}

#[derive(Debug, Clone, Copy)]
enum WrapperCall {
    Deposit,
    Mint,
    Redeem,
    Withdraw,
}

fn short_side(wrapped: TokenId, available: u128, requested: u128) -> VaultError {
    VaultError::InsufficientBufferBalance {
        wrapped,
        available,
        requested,
    }
}

impl<L: TokenLedger + Clone> Vault<L> {
    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Registers the ERC4626 wrapper for its wrapped token. Governed.
    pub fn register_wrapper(&mut self, caller: &AccountId, wrapper: Arc<dyn Erc4626>) -> Result<(), VaultError> {
        self.ensure_authorized(Action::RegisterWrapper, caller)?;
        let wrapped = wrapper.wrapped_token();
        if self.wrappers.contains_key(&wrapped) {
            return Err(VaultError::WrapperAlreadyRegistered(wrapped));
        }
        let underlying = wrapper.asset();
        if underlying == wrapped {
            return Err(VaultError::WrongUnderlyingToken {
                wrapped,
                expected: underlying,
                got: wrapped,
            });
        }
        info!(%caller, %wrapped, %underlying, "wrapper registered");
        self.wrappers.insert(wrapped, wrapper);
        Ok(())
    }

    /// The wrapper registered for `wrapped`.
    pub fn wrapper(&self, wrapped: TokenId) -> Result<Arc<dyn Erc4626>, VaultError> {
        self.wrappers
            .get(&wrapped)
            .cloned()
            .ok_or(VaultError::WrapperNotRegistered(wrapped))
    }

    /// The buffer for `wrapped`.
    pub fn buffer(&self, wrapped: TokenId) -> Result<&BufferState, VaultError> {
        self.buffers
            .get(&wrapped)
            .ok_or(VaultError::BufferNotInitialized(wrapped))
    }

    fn buffer_mut(&mut self, wrapped: TokenId) -> Result<&mut BufferState, VaultError> {
        self.buffers
            .get_mut(&wrapped)
            .ok_or(VaultError::BufferNotInitialized(wrapped))
    }

    /// `(underlying, wrapped)` sides of a buffer.
    pub fn buffer_balances(&self, wrapped: TokenId) -> Result<(u128, u128), VaultError> {
        let buffer = self.buffer(wrapped)?;
        Ok((buffer.underlying_balance(), buffer.wrapped_balance()))
    }

    /// Shares of `owner` in a buffer.
    pub fn buffer_shares_of(&self, wrapped: TokenId, owner: &AccountId) -> Result<u128, VaultError> {
        Ok(self.buffer(wrapped)?.shares_of(owner))
    }

    /// Total shares of a buffer, floor included.
    pub fn buffer_total_shares(&self, wrapped: TokenId) -> Result<u128, VaultError> {
        Ok(self.buffer(wrapped)?.total_shares())
    }

    /// Wrapped tokens that have an initialized buffer.
    pub fn buffer_ids(&self) -> Vec<TokenId> {
        let mut ids: Vec<TokenId> = self.buffers.keys().copied().collect();
        ids.sort();
        ids
    }

    // -----------------------------------------------------------------------
    // Liquidity
    // -----------------------------------------------------------------------

    /// First deposit into a buffer. Issued shares are the deposit's value
    /// in underlying terms minus the burned floor. Returns the shares
    /// credited to `owner`.
    pub fn initialize_buffer(
        &mut self,
        wrapped: TokenId,
        underlying_in: u128,
        wrapped_in: u128,
        min_issued_shares: u128,
        owner: &AccountId,
    ) -> Result<u128, VaultError> {
        self.ensure_unlocked()?;
        self.ensure_not_paused()?;
        let wrapper = self.wrapper(wrapped)?;
        if self.buffers.contains_key(&wrapped) {
            return Err(VaultError::BufferAlreadyInitialized(wrapped));
        }

        self.atomic(Scope::buffer(wrapped), |vault| {
            let underlying = wrapper.asset();
            let wrapped_value = wrapper.preview_redeem(&vault.bank, wrapped_in)?;
            let issued = add(wrapped_value, underlying_in, "buffer shares")?;
            let floor = vault.config.buffer_minimum_supply;
            if issued < floor {
                return Err(VaultError::BufferTotalSupplyTooLow {
                    shares: issued,
                    min: floor,
                });
            }
            let credited = issued - floor;
            if credited < min_issued_shares {
                return Err(VaultError::IssuedSharesBelowMin {
                    issued: credited,
                    min: min_issued_shares,
                });
            }

            vault.take_debt(underlying, underlying_in)?;
            vault.take_debt(wrapped, wrapped_in)?;

            let mut buffer = BufferState::new(wrapped, underlying);
            buffer.set_balances(underlying_in, wrapped_in);
            buffer.mint_shares(None, floor)?;
            buffer.mint_shares(Some(owner), credited)?;
            vault.buffers.insert(wrapped, buffer);

            info!(%wrapped, underlying_in, wrapped_in, shares = credited, "buffer initialized");
            Ok(credited)
        })
    }

    /// Mints exactly `exact_shares_out` buffer shares, taking both sides
    /// proportionally (rounded up). Returns `(underlying_in, wrapped_in)`.
    pub fn add_liquidity_to_buffer(
        &mut self,
        wrapped: TokenId,
        max_underlying_in: u128,
        max_wrapped_in: u128,
        exact_shares_out: u128,
        owner: &AccountId,
    ) -> Result<(u128, u128), VaultError> {
        self.ensure_unlocked()?;
        self.ensure_not_paused()?;
        self.atomic(Scope::buffer(wrapped), |vault| {
            let buffer = vault.buffer(wrapped)?;
            let underlying = buffer.underlying();
            let total = buffer.total_shares();
            let (u, w) = (buffer.underlying_balance(), buffer.wrapped_balance());

            let underlying_in = mul_div(u, exact_shares_out, total, Rounding::Up)?;
            let wrapped_in = mul_div(w, exact_shares_out, total, Rounding::Up)?;
            if underlying_in > max_underlying_in {
                return Err(VaultError::AmountInAboveMax {
                    token: underlying,
                    amount: underlying_in,
                    max: max_underlying_in,
                });
            }
            if wrapped_in > max_wrapped_in {
                return Err(VaultError::AmountInAboveMax {
                    token: wrapped,
                    amount: wrapped_in,
                    max: max_wrapped_in,
                });
            }

            vault.take_debt(underlying, underlying_in)?;
            vault.take_debt(wrapped, wrapped_in)?;
            let new_u = add(u, underlying_in, "buffer underlying")?;
            let new_w = add(w, wrapped_in, "buffer wrapped")?;
            let buffer = vault.buffer_mut(wrapped)?;
            buffer.set_balances(new_u, new_w);
            buffer.mint_shares(Some(owner), exact_shares_out)?;

            debug!(%wrapped, underlying_in, wrapped_in, shares = exact_shares_out, "buffer liquidity added");
            Ok((underlying_in, wrapped_in))
        })
    }

    /// Burns `shares_in` of `owner`'s buffer shares, paying out both sides
    /// proportionally (rounded down). Returns `(underlying_out, wrapped_out)`.
    pub fn remove_liquidity_from_buffer(
        &mut self,
        wrapped: TokenId,
        shares_in: u128,
        min_underlying_out: u128,
        min_wrapped_out: u128,
        owner: &AccountId,
    ) -> Result<(u128, u128), VaultError> {
        self.ensure_unlocked()?;
        self.ensure_not_paused()?;
        self.atomic(Scope::buffer(wrapped), |vault| {
            let floor = vault.config.buffer_minimum_supply;
            let buffer = vault.buffer(wrapped)?;
            let underlying = buffer.underlying();
            let held = buffer.shares_of(owner);
            if held < shares_in {
                return Err(VaultError::InsufficientShares {
                    token: wrapped,
                    owner: owner.clone(),
                    available: held,
                    requested: shares_in,
                });
            }
            let total = buffer.total_shares();
            let (u, w) = (buffer.underlying_balance(), buffer.wrapped_balance());

            let underlying_out = mul_div(u, shares_in, total, Rounding::Down)?;
            let wrapped_out = mul_div(w, shares_in, total, Rounding::Down)?;
            if underlying_out < min_underlying_out {
                return Err(VaultError::AmountOutBelowMin {
                    token: underlying,
                    amount: underlying_out,
                    min: min_underlying_out,
                });
            }
            if wrapped_out < min_wrapped_out {
                return Err(VaultError::AmountOutBelowMin {
                    token: wrapped,
                    amount: wrapped_out,
                    min: min_wrapped_out,
                });
            }

            let buffer = vault.buffer_mut(wrapped)?;
            buffer.burn_shares(owner, shares_in)?;
            if buffer.total_shares() < floor {
                return Err(VaultError::BufferTotalSupplyTooLow {
                    shares: buffer.total_shares(),
                    min: floor,
                });
            }
            buffer.set_balances(u - underlying_out, w - wrapped_out);
            vault.supply_credit(underlying, underlying_out)?;
            vault.supply_credit(wrapped, wrapped_out)?;

            debug!(%wrapped, underlying_out, wrapped_out, shares = shares_in, "buffer liquidity removed");
            Ok((underlying_out, wrapped_out))
        })
    }

    // -----------------------------------------------------------------------
    // Wrap / unwrap
    // -----------------------------------------------------------------------

    /// Wraps or unwraps through the buffer. Unlock-scoped; records
    /// `−amount_in` of the input token and `+amount_out` of the output.
    pub fn erc4626_buffer_wrap_or_unwrap(
        &mut self,
        params: &BufferWrapOrUnwrapParams,
    ) -> Result<BufferOutcome, VaultError> {
        self.ensure_unlocked()?;
        self.ensure_not_paused()?;
        let min = self.config.minimum_wrap_amount;
        if params.amount_given_raw < min {
            return Err(VaultError::WrapAmountTooSmall {
                wrapped: params.wrapped,
                amount: params.amount_given_raw,
                min,
            });
        }
        let wrapper = self.wrapper(params.wrapped)?;
        let underlying = self.buffer(params.wrapped)?.underlying();
        if wrapper.asset() != underlying {
            return Err(VaultError::WrongUnderlyingToken {
                wrapped: params.wrapped,
                expected: underlying,
                got: wrapper.asset(),
            });
        }

        self.atomic(Scope::wrapping(params.wrapped), |vault| {
            let (amount_in, amount_out, used_wrapper) = match params.direction {
                WrappingDirection::Wrap => vault.wrap_with_buffer(params.kind, &wrapper, params.amount_given_raw)?,
                WrappingDirection::Unwrap => {
                    vault.unwrap_with_buffer(params.kind, &wrapper, params.amount_given_raw)?
                }
            };
            let amount_calculated_raw = match params.kind {
                SwapKind::ExactIn => {
                    if amount_out < params.limit_raw {
                        return Err(VaultError::SwapLimit {
                            amount: amount_out,
                            limit: params.limit_raw,
                        });
                    }
                    amount_out
                }
                SwapKind::ExactOut => {
                    if amount_in > params.limit_raw {
                        return Err(VaultError::SwapLimit {
                            amount: amount_in,
                            limit: params.limit_raw,
                        });
                    }
                    amount_in
                }
            };
            debug!(
                wrapped = %params.wrapped,
                direction = ?params.direction,
                amount_in,
                amount_out,
                used_wrapper,
                "buffer conversion"
            );
            Ok(BufferOutcome {
                amount_calculated_raw,
                amount_in_raw: amount_in,
                amount_out_raw: amount_out,
                used_wrapper,
            })
        })
    }

    fn wrap_with_buffer(
        &mut self,
        kind: SwapKind,
        wrapper: &Arc<dyn Erc4626>,
        amount_given: u128,
    ) -> Result<(u128, u128, bool), VaultError> {
        let wrapped = wrapper.wrapped_token();
        let underlying = wrapper.asset();
        let (amount_in, amount_out) = match kind {
            SwapKind::ExactIn => (amount_given, wrapper.preview_deposit(&self.bank, amount_given)?),
            SwapKind::ExactOut => (wrapper.preview_mint(&self.bank, amount_given)?, amount_given),
        };

        let buffer = self.buffer(wrapped)?;
        let (u, w) = (buffer.underlying_balance(), buffer.wrapped_balance());
        let used_wrapper = w < amount_out;
        let (new_u, new_w) = if !used_wrapper {
            (add(u, amount_in, "buffer underlying")?, w - amount_out)
        } else if self.is_query() {
            // Quoted at preview prices; the wrapper is never called.
            (u, w)
        } else {
            let surplus = buffer.underlying_surplus(wrapper.as_ref(), &self.bank)?;
            let (spent, minted) = match kind {
                SwapKind::ExactIn => {
                    let assets = add(amount_in, surplus, "wrap amount")?;
                    self.call_wrapper(wrapper, WrapperCall::Deposit, assets)?
                }
                SwapKind::ExactOut => {
                    let surplus_wrapped = match surplus {
                        0 => 0,
                        s => wrapper.preview_deposit(&self.bank, s)?,
                    };
                    let shares = add(amount_out, surplus_wrapped, "wrap amount")?;
                    self.call_wrapper(wrapper, WrapperCall::Mint, shares)?
                }
            };
            let pooled_u = add(u, amount_in, "buffer underlying")?;
            let pooled_w = add(w, minted, "buffer wrapped")?;
            (
                pooled_u
                    .checked_sub(spent)
                    .ok_or_else(|| short_side(wrapped, pooled_u, spent))?,
                pooled_w
                    .checked_sub(amount_out)
                    .ok_or_else(|| short_side(wrapped, pooled_w, amount_out))?,
            )
        };

        self.buffer_mut(wrapped)?.set_balances(new_u, new_w);
        self.take_debt(underlying, amount_in)?;
        self.supply_credit(wrapped, amount_out)?;
        Ok((amount_in, amount_out, used_wrapper))
    }

    fn unwrap_with_buffer(
        &mut self,
        kind: SwapKind,
        wrapper: &Arc<dyn Erc4626>,
        amount_given: u128,
    ) -> Result<(u128, u128, bool), VaultError> {
        let wrapped = wrapper.wrapped_token();
        let underlying = wrapper.asset();
        let (amount_in, amount_out) = match kind {
            SwapKind::ExactIn => (amount_given, wrapper.preview_redeem(&self.bank, amount_given)?),
            SwapKind::ExactOut => (wrapper.preview_withdraw(&self.bank, amount_given)?, amount_given),
        };

        let buffer = self.buffer(wrapped)?;
        let (u, w) = (buffer.underlying_balance(), buffer.wrapped_balance());
        let used_wrapper = u < amount_out;
        let (new_u, new_w) = if !used_wrapper {
            (u - amount_out, add(w, amount_in, "buffer wrapped")?)
        } else if self.is_query() {
            (u, w)
        } else {
            let surplus = buffer.wrapped_surplus(wrapper.as_ref(), &self.bank)?;
            let (received, burned) = match kind {
                SwapKind::ExactIn => {
                    let shares = add(amount_in, surplus, "unwrap amount")?;
                    self.call_wrapper(wrapper, WrapperCall::Redeem, shares)?
                }
                SwapKind::ExactOut => {
                    let surplus_underlying = match surplus {
                        0 => 0,
                        s => wrapper.preview_redeem(&self.bank, s)?,
                    };
                    let assets = add(amount_out, surplus_underlying, "unwrap amount")?;
                    self.call_wrapper(wrapper, WrapperCall::Withdraw, assets)?
                }
            };
            let pooled_u = add(u, received, "buffer underlying")?;
            let pooled_w = add(w, amount_in, "buffer wrapped")?;
            (
                pooled_u
                    .checked_sub(amount_out)
                    .ok_or_else(|| short_side(wrapped, pooled_u, amount_out))?,
                pooled_w
                    .checked_sub(burned)
                    .ok_or_else(|| short_side(wrapped, pooled_w, burned))?,
            )
        };

        self.buffer_mut(wrapped)?.set_balances(new_u, new_w);
        self.take_debt(wrapped, amount_in)?;
        self.supply_credit(underlying, amount_out)?;
        Ok((amount_in, amount_out, used_wrapper))
    }

    /// Calls the wrapper on the vault's own account and reconciles reserves
    /// against the ledger. Returns `(underlying moved, wrapped moved)`.
    fn call_wrapper(
        &mut self,
        wrapper: &Arc<dyn Erc4626>,
        call: WrapperCall,
        amount: u128,
    ) -> Result<(u128, u128), VaultError> {
        let wrapped = wrapper.wrapped_token();
        let underlying = wrapper.asset();
        let u_before = self.bank.balance_of(underlying, &self.account);
        let w_before = self.bank.balance_of(wrapped, &self.account);

        let failed = |err: VaultError| VaultError::ExternalWrapFailed {
            wrapped,
            reason: err.to_string(),
        };
        let reported = match call {
            WrapperCall::Deposit => wrapper.deposit(&mut self.bank, &self.account, amount),
            WrapperCall::Mint => wrapper.mint(&mut self.bank, &self.account, amount),
            WrapperCall::Redeem => wrapper.redeem(&mut self.bank, &self.account, amount),
            WrapperCall::Withdraw => wrapper.withdraw(&mut self.bank, &self.account, amount),
        }
        .map_err(failed)?;

        let u_after = self.bank.balance_of(underlying, &self.account);
        let w_after = self.bank.balance_of(wrapped, &self.account);
        let (underlying_moved, wrapped_moved, expected) = match call {
            WrapperCall::Deposit | WrapperCall::Mint => (
                u_before.saturating_sub(u_after),
                w_after.saturating_sub(w_before),
                if matches!(call, WrapperCall::Deposit) {
                    (amount, reported)
                } else {
                    (reported, amount)
                },
            ),
            WrapperCall::Redeem | WrapperCall::Withdraw => (
                u_after.saturating_sub(u_before),
                w_before.saturating_sub(w_after),
                if matches!(call, WrapperCall::Redeem) {
                    (reported, amount)
                } else {
                    (amount, reported)
                },
            ),
        };
        if (underlying_moved, wrapped_moved) != expected {
            return Err(VaultError::ExternalWrapFailed {
                wrapped,
                reason: format!(
                    "wrapper reported {expected:?} but ledger moved ({underlying_moved}, {wrapped_moved})"
                ),
            });
        }

        let (u_reserves, w_reserves) = (self.reserves_of(underlying), self.reserves_of(wrapped));
        let (u_next, w_next) = match call {
            WrapperCall::Deposit | WrapperCall::Mint => (
                sub(u_reserves, underlying_moved, "underlying reserves")?,
                add(w_reserves, wrapped_moved, "wrapped reserves")?,
            ),
            WrapperCall::Redeem | WrapperCall::Withdraw => (
                add(u_reserves, underlying_moved, "underlying reserves")?,
                sub(w_reserves, wrapped_moved, "wrapped reserves")?,
            ),
        };
        self.reserves.insert(underlying, u_next);
        self.reserves.insert(wrapped, w_next);
        debug!(%wrapped, call = ?call, underlying_moved, wrapped_moved, "wrapper called");
        Ok((underlying_moved, wrapped_moved))
    }

    // -----------------------------------------------------------------------
    // Rebalance
    // -----------------------------------------------------------------------

    /// Converts the surplus side of a buffer through the wrapper until both
    /// sides hold equal value. Governed and unlock-scoped; moves no session
    /// deltas.
    pub fn rebalance_buffer(&mut self, caller: &AccountId, wrapped: TokenId) -> Result<RebalanceOutcome, VaultError> {
        self.ensure_unlocked()?;
        self.ensure_not_paused()?;
        self.ensure_authorized(Action::RebalanceBuffer, caller)?;
        let wrapper = self.wrapper(wrapped)?;

        self.atomic(Scope::wrapping(wrapped), |vault| {
            let buffer = vault.buffer(wrapped)?;
            let (u, w) = (buffer.underlying_balance(), buffer.wrapped_balance());
            let underlying_surplus = buffer.underlying_surplus(wrapper.as_ref(), &vault.bank)?;
            let wrapped_surplus = buffer.wrapped_surplus(wrapper.as_ref(), &vault.bank)?;

            let (new_u, new_w) = if underlying_surplus > 0 {
                let (spent, minted) = vault.call_wrapper(&wrapper, WrapperCall::Deposit, underlying_surplus)?;
                (sub(u, spent, "buffer underlying")?, add(w, minted, "buffer wrapped")?)
            } else if wrapped_surplus > 0 {
                let (received, burned) = vault.call_wrapper(&wrapper, WrapperCall::Redeem, wrapped_surplus)?;
                (add(u, received, "buffer underlying")?, sub(w, burned, "buffer wrapped")?)
            } else {
                (u, w)
            };
            vault.buffer_mut(wrapped)?.set_balances(new_u, new_w);

            let target = wrapper.preview_deposit(&vault.bank, new_u)?;
            let drift = new_w.abs_diff(target);
            let tolerance = vault.config.rebalance_tolerance;
            if drift > tolerance {
                warn!(%wrapped, drift, tolerance, "buffer drift above tolerance after rebalance");
            }
            info!(%caller, %wrapped, underlying = new_u, wrapped_side = new_w, "buffer rebalanced");
            Ok(RebalanceOutcome {
                underlying_balance: new_u,
                wrapped_balance: new_w,
                drift,
            })
        })
    }
}
