//! Wall-clock budgets for the anytime search loops.
//!
//! A [`Deadline`] is created once per run and handed down to every loop that
//! has to stop on time. Loops poll [`Deadline::expired`] and return their best
//! result so far when it fires.

use std::time::{Duration, Instant};

/// A point in time after which budget-checked loops stop.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    /// `None` when the budget is too large to be represented as an `Instant`.
    end: Option<Instant>,
}

impl Deadline {
    /// Deadline `budget` from now.
    pub fn after(budget: Duration) -> Self {
        Deadline {
            end: Instant::now().checked_add(budget),
        }
    }

    /// Deadline from a budget in seconds. Negative or NaN budgets expire immediately.
    pub fn from_secs_f64(seconds: f64) -> Self {
        if seconds.is_nan() || seconds <= 0.0 {
            return Self::after(Duration::ZERO);
        }
        match Duration::try_from_secs_f64(seconds) {
            Ok(budget) => Self::after(budget),
            Err(_) => Self::unbounded(),
        }
    }

    /// A deadline that never expires.
    pub fn unbounded() -> Self {
        Deadline { end: None }
    }

    #[inline]
    pub fn expired(&self) -> bool {
        match self.end {
            Some(end) => Instant::now() >= end,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_is_expired() {
        assert!(Deadline::after(Duration::ZERO).expired());
        assert!(Deadline::from_secs_f64(0.0).expired());
        assert!(Deadline::from_secs_f64(-3.0).expired());
        assert!(Deadline::from_secs_f64(f64::NAN).expired());
    }

    #[test]
    fn test_large_budget_does_not_expire() {
        assert!(!Deadline::from_secs_f64(3600.0).expired());
        assert!(!Deadline::from_secs_f64(f64::MAX).expired());
        assert!(!Deadline::unbounded().expired());
    }

    #[test]
    fn test_short_budget_expires() {
        let deadline = Deadline::after(Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(20));
        assert!(deadline.expired());
    }
}
