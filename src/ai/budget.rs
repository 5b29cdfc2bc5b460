//! Per-Article Cost Budget
//!
//! Thread-safe USD spend tracking for one article's AI usage, stored in
//! integer cents for atomic operations. The cap is hard: a reservation
//! that would cross it fails and the caller must abort the call. An
//! operator may raise the cap for a single article.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::budget as budget_constants;
use crate::types::{PressError, Result};

/// Convert USD to integer cents, rounding up so fractions of a cent
/// still count against the cap
pub fn usd_to_cents(usd: f64) -> u64 {
    (usd * 100.0).ceil().max(0.0) as u64
}

/// Hard per-article spend cap with atomic accounting
pub struct CostBudget {
    cap_cents: AtomicU64,
    spent_cents: AtomicU64,
}

impl CostBudget {
    pub fn new(cap_usd: f64) -> Self {
        Self {
            cap_cents: AtomicU64::new(usd_to_cents(cap_usd)),
            spent_cents: AtomicU64::new(0),
        }
    }

    /// Budget with the default cap
    pub fn with_default_cap() -> Self {
        Self {
            cap_cents: AtomicU64::new(budget_constants::DEFAULT_ARTICLE_CAP_CENTS),
            spent_cents: AtomicU64::new(0),
        }
    }

    /// Record spend that has already been incurred. Returns an error when
    /// the cap is now exceeded; the spend is still recorded, since the
    /// money is gone either way.
    pub fn record(&self, cost_usd: f64) -> Result<()> {
        let cents = usd_to_cents(cost_usd);
        let spent = self.spent_cents.fetch_add(cents, Ordering::SeqCst) + cents;
        let cap = self.cap_cents.load(Ordering::SeqCst);
        if spent > cap {
            return Err(PressError::CostCapExceeded {
                spent_cents: spent,
                cap_cents: cap,
            });
        }
        Ok(())
    }

    /// Check whether an estimated spend would fit under the cap without
    /// recording anything
    pub fn check(&self, estimated_usd: f64) -> Result<()> {
        let cents = usd_to_cents(estimated_usd);
        let spent = self.spent_cents.load(Ordering::SeqCst);
        let cap = self.cap_cents.load(Ordering::SeqCst);
        if spent + cents > cap {
            return Err(PressError::CostCapExceeded {
                spent_cents: spent + cents,
                cap_cents: cap,
            });
        }
        Ok(())
    }

    /// Operator override: raise the cap for this one article
    pub fn raise_cap(&self, new_cap_usd: f64) {
        self.cap_cents
            .store(usd_to_cents(new_cap_usd), Ordering::SeqCst);
    }

    pub fn spent_usd(&self) -> f64 {
        self.spent_cents.load(Ordering::SeqCst) as f64 / 100.0
    }

    pub fn cap_usd(&self) -> f64 {
        self.cap_cents.load(Ordering::SeqCst) as f64 / 100.0
    }

    /// Spend has crossed the warning threshold
    pub fn near_cap(&self) -> bool {
        let spent = self.spent_cents.load(Ordering::SeqCst) as f64;
        let cap = self.cap_cents.load(Ordering::SeqCst) as f64;
        cap > 0.0 && spent / cap >= budget_constants::WARNING_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usd_to_cents_rounds_up() {
        assert_eq!(usd_to_cents(0.10), 10);
        assert_eq!(usd_to_cents(0.101), 11);
        assert_eq!(usd_to_cents(0.0), 0);
        assert_eq!(usd_to_cents(-1.0), 0);
    }

    #[test]
    fn test_record_under_cap() {
        let budget = CostBudget::new(0.50);
        assert!(budget.record(0.06).is_ok());
        assert!(budget.record(0.06).is_ok());
        assert!((budget.spent_usd() - 0.12).abs() < 1e-9);
    }

    #[test]
    fn test_record_over_cap_errors_but_books_spend() {
        let budget = CostBudget::new(0.50);
        budget.record(0.45).unwrap();
        let err = budget.record(0.10).unwrap_err();
        assert!(matches!(err, PressError::CostCapExceeded { .. }));
        // Incurred spend is still booked
        assert!((budget.spent_usd() - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_check_does_not_book() {
        let budget = CostBudget::new(0.50);
        assert!(budget.check(0.40).is_ok());
        assert!(budget.check(0.60).is_err());
        assert_eq!(budget.spent_usd(), 0.0);
    }

    #[test]
    fn test_raise_cap_allows_more() {
        let budget = CostBudget::new(0.50);
        budget.record(0.50).unwrap();
        assert!(budget.check(0.01).is_err());

        budget.raise_cap(1.00);
        assert!(budget.check(0.01).is_ok());
    }

    #[test]
    fn test_near_cap() {
        let budget = CostBudget::new(1.00);
        assert!(!budget.near_cap());
        budget.record(0.80).unwrap();
        assert!(budget.near_cap());
    }
}
