//! Explicit rounding direction.

/// Direction of a lossy conversion.
///
/// Every balance-to-live conversion and every share computation takes one
/// of these. There is no default: the caller decides who absorbs the dust,
/// and it is always the vault that ends up with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rounding {
    /// Towards positive infinity.
    Up,
    /// Towards zero.
    Down,
}

impl Rounding {
    /// Returns `true` for [`Rounding::Up`].
    #[must_use]
    pub const fn is_up(&self) -> bool {
        matches!(self, Self::Up)
    }

    /// The opposite direction.
    #[must_use]
    pub const fn flip(&self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_is_involutive() {
        assert_eq!(Rounding::Up.flip(), Rounding::Down);
        assert_eq!(Rounding::Down.flip().flip(), Rounding::Down);
        assert!(Rounding::Up.is_up());
    }
}
