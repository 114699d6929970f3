//! Per-host request spacing
//!
//! Each host has a next free start slot. A worker reserves the earliest slot
//! under the lock and then sleeps until it, so two workers can never start
//! requests to the same host closer together than the configured delay.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct HostThrottle {
    delay: Duration,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl HostThrottle {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    /// Reserves the next start slot for `host` and returns how long to wait
    pub fn reserve(&self, host: &str) -> Duration {
        if self.delay.is_zero() {
            return Duration::ZERO;
        }

        let now = Instant::now();
        let mut slots = self.next_slot.lock().unwrap();
        let slot = match slots.get(host) {
            Some(next) if *next > now => *next,
            _ => now,
        };
        slots.insert(host.to_string(), slot + self.delay);
        slot - now
    }

    /// Waits until a request to `host` may start
    pub async fn wait(&self, host: &str) {
        let wait = self.reserve(host);
        if !wait.is_zero() {
            tracing::trace!("Delaying request to {} by {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }
    }
}
