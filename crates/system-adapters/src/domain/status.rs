//! # Call Accounting
//!
//! Every adapter call moves through `Idle → InFlight → {Success, Failed}`.
//! [`CallStats`] counts those transitions per client; the health reporter
//! exports them as metrics.

use bridge_types::SystemId;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// State of the most recent call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Idle,
    InFlight,
    Success,
    Failed,
}

/// Per-client call counters.
#[derive(Debug)]
pub struct CallStats {
    in_flight: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    last: Mutex<CallState>,
}

impl Default for CallStats {
    fn default() -> Self {
        Self {
            in_flight: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
            last: Mutex::new(CallState::Idle),
        }
    }
}

/// Point-in-time copy of [`CallStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallStatsSnapshot {
    pub in_flight: u64,
    pub succeeded: u64,
    /// Includes timeouts.
    pub failed: u64,
    pub timed_out: u64,
    pub last_state: CallState,
}

impl CallStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `InFlight`. The returned guard records the outcome.
    pub(crate) fn begin(&self) -> CallGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        *self.last.lock() = CallState::InFlight;
        CallGuard {
            stats: self,
            outcome: None,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> CallStatsSnapshot {
        CallStatsSnapshot {
            in_flight: self.in_flight.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            last_state: *self.last.lock(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Success,
    Failed { timed_out: bool },
}

/// Tracks one call. Dropping it without an outcome (the call future was
/// cancelled) counts as a failure.
pub(crate) struct CallGuard<'a> {
    stats: &'a CallStats,
    outcome: Option<Outcome>,
}

impl CallGuard<'_> {
    pub(crate) fn succeed(mut self) {
        self.outcome = Some(Outcome::Success);
    }

    pub(crate) fn fail(mut self, timed_out: bool) {
        self.outcome = Some(Outcome::Failed { timed_out });
    }
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        let stats = self.stats;
        stats.in_flight.fetch_sub(1, Ordering::Relaxed);
        let state = match self.outcome.unwrap_or(Outcome::Failed { timed_out: false }) {
            Outcome::Success => {
                stats.succeeded.fetch_add(1, Ordering::Relaxed);
                CallState::Success
            }
            Outcome::Failed { timed_out } => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                if timed_out {
                    stats.timed_out.fetch_add(1, Ordering::Relaxed);
                }
                CallState::Failed
            }
        };
        *stats.last.lock() = state;
    }
}

/// Result of a connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub system: SystemId,
    pub connected: bool,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
