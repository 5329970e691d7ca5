//! Optimistic mutations, request epochs and polling.

mod optimistic;
mod polling;

pub use optimistic::{OptimisticStore, PendingId};
pub use polling::{
    ConnectionStatus, EpochTracker, PollIntervals, PollSchedule, PollSlot, RequestLifecycle,
    TrackedRequest,
};
