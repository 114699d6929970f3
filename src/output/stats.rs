//! Run summary
//!
//! Counters gathered while the crawl runs and the summary printed at the
//! end of it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters of a running crawl
#[derive(Debug, Default)]
pub struct CrawlCounters {
    pages_fetched: AtomicU64,
    pages_failed: AtomicU64,
    fetch_attempts: AtomicU64,
}

impl CrawlCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attempts(&self, attempts: u32) {
        self.fetch_attempts
            .fetch_add(u64::from(attempts), Ordering::Relaxed);
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    pub fn pages_failed(&self) -> u64 {
        self.pages_failed.load(Ordering::Relaxed)
    }

    pub fn fetch_attempts(&self) -> u64 {
        self.fetch_attempts.load(Ordering::Relaxed)
    }
}

/// Outcome of a finished crawl
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub pages_fetched: u64,
    pub pages_failed: u64,
    pub records_emitted: u64,
    pub records_truncated: u64,
    /// True if the item cutoff stopped the crawl
    pub truncated: bool,
    /// Requests sent, retries included
    pub fetch_attempts: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Wall-clock duration of the run
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Share of fetched pages among all pages that reached a final state
    pub fn success_rate(&self) -> f64 {
        let total = self.pages_fetched + self.pages_failed;
        if total == 0 {
            return 0.0;
        }
        (self.pages_fetched as f64 / total as f64) * 100.0
    }
}

/// Prints a run summary to stdout
pub fn print_summary(name: &str, summary: &RunSummary) {
    println!("=== Crawl Summary: {} ===\n", name);

    println!("Pages:");
    println!("  Fetched: {}", summary.pages_fetched);
    println!("  Failed: {}", summary.pages_failed);
    println!("  Requests sent: {}", summary.fetch_attempts);
    println!("  Success rate: {:.1}%", summary.success_rate());
    println!();

    println!("Records:");
    println!("  Emitted: {}", summary.records_emitted);
    if summary.truncated {
        println!(
            "  Item cutoff reached ({} further records dropped)",
            summary.records_truncated
        );
    }
    println!();

    println!("Started: {}", summary.started_at.to_rfc3339());
    println!("Finished: {}", summary.finished_at.to_rfc3339());
    println!("Duration: {}s", summary.duration().num_seconds());
}
