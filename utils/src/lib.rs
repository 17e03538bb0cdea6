//! Shared utilities for the Vouch review network.

pub mod clock;
pub mod retry;

pub use clock::{Clock, SystemClock};
pub use retry::{poll_until, ReplicationTimeout, RetryPolicy};
