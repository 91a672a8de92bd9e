//! # Packed Dual Balance
//!
//! Each (pool, token) balance is one 256-bit word holding two halves:
//!
//! ```text
//! ┌──────────────── 128 ───────────────┬──────────────── 128 ───────────────┐
//! │ live balance, scaled18 (cached)    │ raw balance, native decimals       │
//! └────────────────────────────────────┴────────────────────────────────────┘
//!   high word                            low word
//! ```
//!
//! The raw half is authoritative. The live half is a cache of
//! `raw × scaling factor × rate` as of the last write and may be stale once
//! a rate provider moves; anything that prices against it reloads first.
//!
//! Either half can be replaced without touching the other. Nothing is ever
//! truncated: a value that does not fit 128 bits is an
//! [`VaultError::Overflow`].

use std::fmt;

use ethnum::U256;

use crate::error::VaultError;

/// One storage word: raw balance in the low half, live balance in the high.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PackedBalance(U256);

impl PackedBalance {
    /// The all-zero word.
    pub const ZERO: Self = Self(U256::ZERO);

    /// Packs a raw and a live balance.
    pub fn pack(raw: u128, live_scaled18: u128) -> Self {
        Self(U256::from_words(live_scaled18, raw))
    }

    /// Packs two 256-bit values, failing if either does not fit its half.
    pub fn try_pack(raw: U256, live_scaled18: U256) -> Result<Self, VaultError> {
        let (raw_high, raw) = raw.into_words();
        if raw_high != 0 {
            return Err(VaultError::Overflow("packed raw balance"));
        }
        let (live_high, live) = live_scaled18.into_words();
        if live_high != 0 {
            return Err(VaultError::Overflow("packed live balance"));
        }
        Ok(Self::pack(raw, live))
    }

    /// Splits the word into `(raw, live_scaled18)`.
    pub fn unpack(self) -> (u128, u128) {
        let (live, raw) = self.0.into_words();
        (raw, live)
    }

    /// The raw half.
    pub fn raw(self) -> u128 {
        self.unpack().0
    }

    /// The live half.
    pub fn live_scaled18(self) -> u128 {
        self.unpack().1
    }

    /// Replaces the raw half, keeping the live half.
    pub fn set_raw(self, raw: u128) -> Self {
        Self::pack(raw, self.live_scaled18())
    }

    /// Replaces the live half, keeping the raw half.
    pub fn set_live(self, live_scaled18: u128) -> Self {
        Self::pack(self.raw(), live_scaled18)
    }

    /// The underlying word.
    pub fn word(self) -> U256 {
        self.0
    }

    /// Adds to the raw half. Live is left for the caller to refresh.
    pub fn credit_raw(self, amount: u128) -> Result<Self, VaultError> {
        let raw = self
            .raw()
            .checked_add(amount)
            .ok_or(VaultError::Overflow("raw balance"))?;
        Ok(self.set_raw(raw))
    }

    /// Subtracts from the raw half.
    pub fn debit_raw(self, amount: u128) -> Result<Self, VaultError> {
        let raw = self
            .raw()
            .checked_sub(amount)
            .ok_or(VaultError::Underflow("raw balance"))?;
        Ok(self.set_raw(raw))
    }
}

impl fmt::Debug for PackedBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (raw, live) = self.unpack();
        f.debug_struct("PackedBalance")
            .field("raw", &raw)
            .field("live_scaled18", &live)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn halves_are_independent() {
        let word = PackedBalance::pack(7, 9);
        assert_eq!(word.set_raw(1).unpack(), (1, 9));
        assert_eq!(word.set_live(2).unpack(), (7, 2));
    }

    #[test]
    fn raw_lives_in_the_low_word() {
        let word = PackedBalance::pack(1, 0);
        assert_eq!(word.word(), U256::ONE);
        let word = PackedBalance::pack(0, 1);
        assert_eq!(word.word(), U256::ONE << 128);
    }

    #[test]
    fn oversized_halves_are_rejected() {
        let too_big = U256::ONE << 128;
        assert!(matches!(
            PackedBalance::try_pack(too_big, U256::ZERO),
            Err(VaultError::Overflow(_))
        ));
        assert!(matches!(
            PackedBalance::try_pack(U256::ZERO, too_big),
            Err(VaultError::Overflow(_))
        ));
        let max = U256::from(u128::MAX);
        assert_eq!(
            PackedBalance::try_pack(max, max).unwrap().unpack(),
            (u128::MAX, u128::MAX)
        );
    }

    #[test]
    fn credit_and_debit_are_checked() {
        let word = PackedBalance::pack(u128::MAX - 1, 5);
        assert!(word.credit_raw(2).is_err());
        assert_eq!(word.credit_raw(1).unwrap().raw(), u128::MAX);
        assert!(PackedBalance::ZERO.debit_raw(1).is_err());
        assert_eq!(word.debit_raw(1).unwrap().live_scaled18(), 5);
    }

    proptest! {
        #[test]
        fn pack_unpack_roundtrip(raw in any::<u128>(), live in any::<u128>()) {
            prop_assert_eq!(PackedBalance::pack(raw, live).unpack(), (raw, live));
        }

        #[test]
        fn set_raw_preserves_live(raw in any::<u128>(), live in any::<u128>(), new_raw in any::<u128>()) {
            let word = PackedBalance::pack(raw, live).set_raw(new_raw);
            prop_assert_eq!(word.unpack(), (new_raw, live));
        }
    }
}
