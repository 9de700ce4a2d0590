//! # Fibonacci Backoff
//!
//! Requeue delays for Agents whose last pass failed. Delays grow along the
//! Fibonacci sequence, which is gentler than doubling:
//! 1m, 1m, 2m, 3m, 5m, 8m, 10m (max).
//!
//! [`BackoffTracker`] keeps one sequence per resource and is reset as soon as
//! a pass for that resource succeeds.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Fibonacci backoff calculator
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    min: Duration,
    max: Duration,
    prev: Duration,
    current: Duration,
}

impl FibonacciBackoff {
    /// Create a backoff starting at `min` and capped at `max`
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            prev: Duration::ZERO,
            current: min,
        }
    }

    /// Backoff used for reconcile errors: 1 minute, capped at 10 minutes
    #[must_use]
    pub fn for_reconcile_errors() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(600))
    }

    /// Return the current delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;
        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = next.min(self.max);
        result
    }

    /// Restart the sequence from `min`
    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.min;
    }
}

#[derive(Debug)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

/// Per-resource backoff bookkeeping, keyed by resource name
#[derive(Debug, Default)]
pub struct BackoffTracker {
    states: Mutex<HashMap<String, BackoffState>>,
}

impl BackoffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for `key` and returns `(delay, consecutive_errors)`
    pub fn record_error(&self, key: &str) -> (Duration, u32) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        let state = states.entry(key.to_string()).or_insert_with(|| BackoffState {
            backoff: FibonacciBackoff::for_reconcile_errors(),
            error_count: 0,
        });
        state.error_count += 1;
        (state.backoff.next_backoff(), state.error_count)
    }

    /// Forgets earlier failures of `key`
    pub fn reset(&self, key: &str) {
        let mut states = self.states.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(state) = states.get_mut(key) {
            state.error_count = 0;
            state.backoff.reset();
        }
    }
}
