//! Package-processing statistics
//!
//! A [`Stat`] counts how many packages a mirror run copied out of how many
//! it considered. Results from independent repositories and groups are
//! combined in whatever order they complete, so combination is a plain
//! field-wise sum: associative, commutative, with `Stat::default()` as the
//! identity.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Accumulable `(copied, total)` counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Stat {
    /// Packages whose transfer moved bytes
    pub copied: u64,
    /// Packages considered for copying
    pub total: u64,
}

impl Stat {
    pub const fn new(copied: u64, total: u64) -> Self {
        Self { copied, total }
    }

    /// Sums both fields of `self` and `other`.
    pub const fn combine(self, other: Stat) -> Stat {
        Stat {
            copied: self.copied + other.copied,
            total: self.total + other.total,
        }
    }

    /// True when no packages were considered.
    pub const fn is_empty(&self) -> bool {
        self.total == 0
    }
}

impl Add for Stat {
    type Output = Stat;

    fn add(self, rhs: Stat) -> Stat {
        self.combine(rhs)
    }
}

impl AddAssign for Stat {
    fn add_assign(&mut self, rhs: Stat) {
        *self = self.combine(rhs);
    }
}

impl Sum for Stat {
    fn sum<I: Iterator<Item = Stat>>(iter: I) -> Stat {
        iter.fold(Stat::default(), Stat::combine)
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.copied, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_combine_sums_fields() {
        let a = Stat::new(1, 3);
        let b = Stat::new(2, 2);
        assert_eq!(a.combine(b), Stat::new(3, 5));
        assert_eq!(a + b, Stat::new(3, 5));
    }

    #[test]
    fn test_default_is_identity() {
        let a = Stat::new(4, 7);
        assert_eq!(a + Stat::default(), a);
        assert_eq!(Stat::default() + a, a);
        assert!(Stat::default().is_empty());
    }

    #[test]
    fn test_sum_and_add_assign() {
        let stats = vec![Stat::new(1, 1), Stat::new(0, 2), Stat::new(3, 3)];
        let summed: Stat = stats.iter().copied().sum();
        assert_eq!(summed, Stat::new(4, 6));

        let mut running = Stat::default();
        for stat in stats {
            running += stat;
        }
        assert_eq!(running, summed);
    }

    #[test]
    fn test_display() {
        assert_eq!(Stat::new(5, 6).to_string(), "5/6");
    }

    fn stat() -> impl Strategy<Value = Stat> {
        (0u64..1_000_000)
            .prop_flat_map(|total| (0..=total, Just(total)))
            .prop_map(|(copied, total)| Stat::new(copied, total))
    }

    proptest! {
        /// Property: combining is associative
        #[test]
        fn combine_is_associative(a in stat(), b in stat(), c in stat()) {
            prop_assert_eq!(a.combine(b).combine(c), a.combine(b.combine(c)));
        }

        /// Property: combining is commutative
        #[test]
        fn combine_is_commutative(a in stat(), b in stat()) {
            prop_assert_eq!(a.combine(b), b.combine(a));
        }

        /// Property: copied never exceeds total after combining consistent stats
        #[test]
        fn combine_preserves_copied_le_total(a in stat(), b in stat()) {
            let c = a.combine(b);
            prop_assert!(c.copied <= c.total);
        }
    }
}
