use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// The global item cutoff
///
/// Only the record sink mutates the budget, and only while holding its
/// writer lock, so the emitted count can never pass the cutoff. Other parties
/// just read it.
#[derive(Debug)]
pub struct CrawlBudget {
    max_items: Option<u64>,
    emitted: AtomicU64,
    truncated: AtomicU64,
    exhausted: AtomicBool,
}

impl CrawlBudget {
    pub fn new(max_items: Option<u64>) -> Self {
        Self {
            max_items,
            emitted: AtomicU64::new(0),
            truncated: AtomicU64::new(0),
            exhausted: AtomicBool::new(max_items == Some(0)),
        }
    }

    /// A budget without a cutoff
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn max_items(&self) -> Option<u64> {
        self.max_items
    }

    pub fn emitted(&self) -> u64 {
        self.emitted.load(Ordering::SeqCst)
    }

    pub fn truncated(&self) -> u64 {
        self.truncated.load(Ordering::SeqCst)
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }

    /// Counts a written record; returns true if it reached the cutoff
    pub(crate) fn record_emitted(&self) -> bool {
        let emitted = self.emitted.fetch_add(1, Ordering::SeqCst) + 1;
        match self.max_items {
            Some(max) if emitted >= max => {
                self.exhausted.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    /// Counts a record dropped because the budget was exhausted
    pub(crate) fn record_truncated(&self) {
        self.truncated.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_exhausts() {
        let budget = CrawlBudget::unlimited();
        for _ in 0..1000 {
            assert!(!budget.record_emitted());
        }
        assert!(!budget.is_exhausted());
        assert_eq!(budget.emitted(), 1000);
    }

    #[test]
    fn test_cutoff_reached_exactly_once() {
        let budget = CrawlBudget::new(Some(2));
        assert!(!budget.record_emitted());
        assert!(budget.record_emitted());
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_zero_budget_starts_exhausted() {
        assert!(CrawlBudget::new(Some(0)).is_exhausted());
    }
}
