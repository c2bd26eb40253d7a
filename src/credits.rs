use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// Whole number of credits. Balances are never negative, so the inner value is unsigned.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Credits(u32);

impl Credits {
    pub const ZERO: Credits = Credits(0);

    pub const fn new(value: u32) -> Self {
        Credits(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtract `rhs`, or `None` if the result would go below zero.
    pub fn checked_sub(self, rhs: Credits) -> Option<Credits> {
        self.0.checked_sub(rhs.0).map(Credits)
    }

    /// Add `rhs`, or `None` if the result does not fit.
    pub fn checked_add(self, rhs: Credits) -> Option<Credits> {
        self.0.checked_add(rhs.0).map(Credits)
    }

    /// Repeat this amount `times` times (bulk grants of the same value),
    /// or `None` if the result does not fit.
    pub fn times(self, times: u32) -> Option<Credits> {
        self.0.checked_mul(times).map(Credits)
    }
}

impl From<u32> for Credits {
    fn from(value: u32) -> Self {
        Credits(value)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Saturates; used for totals only. Balance writes go through `checked_add`.
impl std::ops::Add for Credits {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Credits(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for Credits {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Credits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Credits::ZERO, |acc, c| acc + c)
    }
}

impl<'a> Sum<&'a Credits> for Credits {
    fn sum<I: Iterator<Item = &'a Credits>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero() {
        assert_eq!(Credits::default(), Credits::ZERO);
        assert!(Credits::default().is_zero());
    }

    #[test]
    fn display_is_plain_integer() {
        assert_eq!(Credits::new(15).to_string(), "15");
        assert_eq!(Credits::ZERO.to_string(), "0");
    }

    #[test]
    fn add_assign() {
        let mut c = Credits::new(10);
        c += Credits::new(5);
        assert_eq!(c, Credits::new(15));
    }

    #[test]
    fn add_saturates() {
        assert_eq!(Credits::new(u32::MAX) + Credits::new(1), Credits::new(u32::MAX));
    }

    #[test]
    fn checked_sub_refuses_to_go_negative() {
        assert_eq!(Credits::new(10).checked_sub(Credits::new(10)), Some(Credits::ZERO));
        assert_eq!(Credits::new(5).checked_sub(Credits::new(10)), None);
    }

    #[test]
    fn checked_add_refuses_to_overflow() {
        assert_eq!(Credits::new(10).checked_add(Credits::new(5)), Some(Credits::new(15)));
        assert_eq!(Credits::new(u32::MAX - 5).checked_add(Credits::new(6)), None);
    }

    #[test]
    fn times_multiplies() {
        assert_eq!(Credits::new(10).times(3), Some(Credits::new(30)));
        assert_eq!(Credits::new(10).times(0), Some(Credits::ZERO));
        assert_eq!(Credits::new(u32::MAX / 2 + 1).times(2), None);
    }

    #[test]
    fn sum_of_credits() {
        let all = [Credits::new(1), Credits::new(2), Credits::new(3)];
        assert_eq!(all.iter().sum::<Credits>(), Credits::new(6));
    }

    #[test]
    fn ordering() {
        assert!(Credits::new(5) < Credits::new(10));
    }
}
