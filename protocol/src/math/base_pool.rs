//! # Liquidity Math Shared by Every Pool
//!
//! Proportional joins and exits need nothing but balances and supply.
//! Non-proportional ones go through the pool's invariant: a single-token or
//! unbalanced operation is priced as "proportional part + implicit swap",
//! and the implicit swap pays the pool's swap fee.
//!
//! All balances are live (18 decimals). Every function rounds so the pool
//! keeps the dust: amounts in and BPT in round up, amounts out and BPT out
//! round down.

use super::fixed_point::{complement, div_down, div_up, mul_div, mul_up, sub};
use super::Rounding;
use crate::error::VaultError;
use crate::external::PoolPricing;

/// Result of a non-proportional computation: the headline amount plus the
/// swap fee charged per token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonProportionalOutcome {
    /// BPT (for unbalanced adds and exact-out removes) or token amount.
    pub amount: u128,
    /// Swap fee per token, live-scaled.
    pub swap_fee_amounts: Vec<u128>,
}

fn ensure_ratio_within(pricing: &dyn PoolPricing, ratio: u128) -> Result<(), VaultError> {
    let min = pricing.minimum_invariant_ratio();
    let max = pricing.maximum_invariant_ratio();
    if ratio < min || ratio > max {
        return Err(VaultError::InvariantRatioOutOfBounds { ratio, min, max });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Proportional
// ---------------------------------------------------------------------------

/// Token amounts needed to mint exactly `bpt_amount_out`. Rounds up.
pub fn compute_proportional_amounts_in(
    balances: &[u128],
    total_supply: u128,
    bpt_amount_out: u128,
) -> Result<Vec<u128>, VaultError> {
    balances
        .iter()
        .map(|&balance| mul_div(balance, bpt_amount_out, total_supply, Rounding::Up))
        .collect()
}

/// Token amounts paid for burning exactly `bpt_amount_in`. Rounds down.
pub fn compute_proportional_amounts_out(
    balances: &[u128],
    total_supply: u128,
    bpt_amount_in: u128,
) -> Result<Vec<u128>, VaultError> {
    balances
        .iter()
        .map(|&balance| mul_div(balance, bpt_amount_in, total_supply, Rounding::Down))
        .collect()
}

// ---------------------------------------------------------------------------
// Add
// ---------------------------------------------------------------------------

/// BPT minted for adding `exact_amounts` in arbitrary proportions.
pub fn compute_add_liquidity_unbalanced(
    current_balances: &[u128],
    exact_amounts: &[u128],
    total_supply: u128,
    swap_fee_percentage: u128,
    pricing: &dyn PoolPricing,
) -> Result<NonProportionalOutcome, VaultError> {
    let n = current_balances.len();
    let mut new_balances = Vec::with_capacity(n);
    for (balance, amount) in current_balances.iter().zip(exact_amounts) {
        // Minus one so the new balances never round in the caller's favour.
        new_balances.push(balance.saturating_add(*amount).saturating_sub(1));
    }

    let current_invariant = pricing.compute_invariant(current_balances, Rounding::Up)?;
    if current_invariant == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let new_invariant = pricing.compute_invariant(&new_balances, Rounding::Down)?;
    let invariant_ratio = div_down(new_invariant, current_invariant)?;
    ensure_ratio_within(pricing, invariant_ratio)?;

    let mut swap_fee_amounts = vec![0u128; n];
    for i in 0..n {
        let proportional = mul_up(invariant_ratio, current_balances[i])?;
        if new_balances[i] > proportional {
            let taxable = new_balances[i] - proportional;
            swap_fee_amounts[i] = mul_up(taxable, swap_fee_percentage)?;
            new_balances[i] = sub(new_balances[i], swap_fee_amounts[i], "unbalanced fee")?;
        }
    }

    let invariant_with_fees = pricing.compute_invariant(&new_balances, Rounding::Down)?;
    let growth = invariant_with_fees.saturating_sub(current_invariant);
    let bpt_amount_out = mul_div(total_supply, growth, current_invariant, Rounding::Down)?;

    Ok(NonProportionalOutcome {
        amount: bpt_amount_out,
        swap_fee_amounts,
    })
}

/// Amount of token `token_in_index` needed to mint exactly
/// `exact_bpt_amount_out`.
pub fn compute_add_liquidity_single_token_exact_out(
    current_balances: &[u128],
    token_in_index: usize,
    exact_bpt_amount_out: u128,
    total_supply: u128,
    swap_fee_percentage: u128,
    pricing: &dyn PoolPricing,
) -> Result<NonProportionalOutcome, VaultError> {
    let new_supply = exact_bpt_amount_out
        .checked_add(total_supply)
        .ok_or(VaultError::Overflow("bpt supply"))?;
    let invariant_ratio = div_up(new_supply, total_supply)?;
    ensure_ratio_within(pricing, invariant_ratio)?;

    let current = current_balances[token_in_index];
    let new_balance = pricing.compute_balance(current_balances, token_in_index, invariant_ratio)?;
    let amount_in = sub(new_balance, current, "single token add")?;

    let non_taxable = mul_div(new_supply, current, total_supply, Rounding::Up)?;
    let taxable = new_balance.saturating_sub(non_taxable);
    let fee = div_up(taxable, complement(swap_fee_percentage))?.saturating_sub(taxable);

    let mut swap_fee_amounts = vec![0u128; current_balances.len()];
    swap_fee_amounts[token_in_index] = fee;
    Ok(NonProportionalOutcome {
        amount: amount_in
            .checked_add(fee)
            .ok_or(VaultError::Overflow("amount in with fee"))?,
        swap_fee_amounts,
    })
}

// ---------------------------------------------------------------------------
// Remove
// ---------------------------------------------------------------------------

/// Amount of token `token_out_index` paid for burning exactly
/// `exact_bpt_amount_in`.
pub fn compute_remove_liquidity_single_token_exact_in(
    current_balances: &[u128],
    token_out_index: usize,
    exact_bpt_amount_in: u128,
    total_supply: u128,
    swap_fee_percentage: u128,
    pricing: &dyn PoolPricing,
) -> Result<NonProportionalOutcome, VaultError> {
    let new_supply = sub(total_supply, exact_bpt_amount_in, "bpt supply")?;
    let invariant_ratio = div_up(new_supply, total_supply)?;
    ensure_ratio_within(pricing, invariant_ratio)?;

    let current = current_balances[token_out_index];
    let new_balance = pricing.compute_balance(current_balances, token_out_index, invariant_ratio)?;
    let amount_out = sub(current, new_balance, "single token remove")?;

    let before_tax = mul_div(new_supply, current, total_supply, Rounding::Up)?;
    let taxable = before_tax.saturating_sub(new_balance);
    let fee = mul_up(taxable, swap_fee_percentage)?;

    let mut swap_fee_amounts = vec![0u128; current_balances.len()];
    swap_fee_amounts[token_out_index] = fee;
    Ok(NonProportionalOutcome {
        amount: sub(amount_out, fee, "amount out after fee")?,
        swap_fee_amounts,
    })
}

/// BPT that must be burned to withdraw exactly `exact_amount_out` of
/// token `token_out_index`.
pub fn compute_remove_liquidity_single_token_exact_out(
    current_balances: &[u128],
    token_out_index: usize,
    exact_amount_out: u128,
    total_supply: u128,
    swap_fee_percentage: u128,
    pricing: &dyn PoolPricing,
) -> Result<NonProportionalOutcome, VaultError> {
    let mut new_balances = current_balances.to_vec();
    new_balances[token_out_index] = sub(
        new_balances[token_out_index],
        exact_amount_out,
        "single token remove",
    )?;

    let invariant_before = pricing.compute_invariant(current_balances, Rounding::Up)?;
    if invariant_before == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let invariant_after = pricing.compute_invariant(&new_balances, Rounding::Up)?;
    let invariant_ratio = div_up(invariant_after, invariant_before)?;
    ensure_ratio_within(pricing, invariant_ratio)?;

    let proportional = mul_up(invariant_ratio, current_balances[token_out_index])?;
    let taxable = proportional.saturating_sub(new_balances[token_out_index]);
    let fee = div_up(taxable, complement(swap_fee_percentage))?.saturating_sub(taxable);
    new_balances[token_out_index] = sub(new_balances[token_out_index], fee, "exit fee")?;

    let invariant_with_fees = pricing.compute_invariant(&new_balances, Rounding::Down)?;
    let shrink = invariant_before.saturating_sub(invariant_with_fees);
    let bpt_amount_in = mul_div(total_supply, shrink, invariant_before, Rounding::Up)?;

    let mut swap_fee_amounts = vec![0u128; current_balances.len()];
    swap_fee_amounts[token_out_index] = fee;
    Ok(NonProportionalOutcome {
        amount: bpt_amount_in,
        swap_fee_amounts,
    })
}
