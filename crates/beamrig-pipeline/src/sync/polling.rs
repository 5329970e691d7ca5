//! Request epochs and polled values.
//!
//! Remote calls may answer out of order. Requests for a "generate X"
//! operation carry an epoch so a stale answer can be dropped, and polled
//! values keep whichever result arrived last.

use std::time::{Duration, Instant};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Monotonic request counter for one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochTracker {
    issued: u64,
    accepted: u64,
}

impl EpochTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request and return its epoch.
    pub fn begin(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    /// Whether a response for `epoch` would be accepted.
    pub fn accepts(&self, epoch: u64) -> bool {
        epoch >= self.accepted && epoch <= self.issued
    }

    /// Accept a response for `epoch` unless a newer one was already accepted.
    pub fn settle(&mut self, epoch: u64) -> bool {
        if !self.accepts(epoch) {
            warn!(
                "discarding response for epoch {epoch} (accepted {}, issued {})",
                self.accepted, self.issued
            );
            return false;
        }
        self.accepted = epoch;
        true
    }

    pub fn latest_issued(&self) -> u64 {
        self.issued
    }

    /// A request newer than the last accepted response is outstanding.
    pub fn is_pending(&self) -> bool {
        self.issued > self.accepted
    }
}

/// State of one long-running remote operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum RequestLifecycle<T> {
    Idle,
    Pending { epoch: u64 },
    Settled(T),
    Failed(String),
}

impl<T> Default for RequestLifecycle<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> RequestLifecycle<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn settled(&self) -> Option<&T> {
        match self {
            Self::Settled(value) => Some(value),
            _ => None,
        }
    }
}

/// Request lifecycle bound to its epoch tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRequest<T> {
    epochs: EpochTracker,
    state: RequestLifecycle<T>,
}

impl<T> Default for TrackedRequest<T> {
    fn default() -> Self {
        Self {
            epochs: EpochTracker::default(),
            state: RequestLifecycle::Idle,
        }
    }
}

impl<T> TrackedRequest<T> {
    pub fn begin(&mut self) -> u64 {
        let epoch = self.epochs.begin();
        self.state = RequestLifecycle::Pending { epoch };
        epoch
    }

    pub fn accepts(&self, epoch: u64) -> bool {
        self.epochs.accepts(epoch)
    }

    /// Apply the answer of request `epoch`. Returns `false` for a stale one.
    pub fn settle(&mut self, epoch: u64, result: Result<T, String>) -> bool {
        if !self.epochs.settle(epoch) {
            return false;
        }
        self.state = match result {
            Ok(value) => RequestLifecycle::Settled(value),
            Err(message) => RequestLifecycle::Failed(message),
        };
        // An older answer accepted while a newer request is outstanding.
        if self.epochs.is_pending() {
            self.state = RequestLifecycle::Pending {
                epoch: self.epochs.latest_issued(),
            };
        }
        true
    }

    pub fn state(&self) -> &RequestLifecycle<T> {
        &self.state
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Polling
// ─────────────────────────────────────────────────────────────────────────────

/// Poll intervals in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollIntervals {
    /// Camera connection status while acquiring data.
    pub live_connection_ms: u64,
    /// Pi and camera roster status.
    pub roster_ms: u64,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            live_connection_ms: 500,
            roster_ms: 5000,
        }
    }
}

impl PollIntervals {
    pub fn live_connection(&self) -> Duration {
        Duration::from_millis(self.live_connection_ms)
    }

    pub fn roster(&self) -> Duration {
        Duration::from_millis(self.roster_ms)
    }
}

/// Fixed-interval schedule driven by caller-supplied instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl PollSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.last_sent
            .map_or(true, |sent| now.saturating_duration_since(sent) >= self.interval)
    }

    pub fn mark_sent(&mut self, now: Instant) {
        self.last_sent = Some(now);
    }
}

/// Latest polled value; the most recently received result wins regardless
/// of when its request was sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PollSlot<T> {
    value: Option<T>,
    received: u64,
}

impl<T> Default for PollSlot<T> {
    fn default() -> Self {
        Self {
            value: None,
            received: 0,
        }
    }
}

impl<T> PollSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive(&mut self, value: T) {
        self.received += 1;
        debug!("poll result #{} received", self.received);
        self.value = Some(value);
    }

    pub fn latest(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn received_count(&self) -> u64 {
        self.received
    }
}

/// Connection state of one camera as reported by the roster poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    /// Disconnect requested but not yet observed.
    PendingDisconnect,
}
