//! Polling with exponential backoff for eventually-consistent reads.
//!
//! Replication between nodes is asynchronous, so a reader that expects a
//! record to arrive polls for it. The deadline belongs to the caller; nothing
//! in the store itself times out.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("condition not met after {attempts} attempts in {elapsed:?}")]
pub struct ReplicationTimeout {
    pub attempts: u32,
    pub elapsed: Duration,
}

/// Backoff schedule for [`poll_until`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_secs(1),
            deadline: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline,
            ..Self::default()
        }
    }
}

/// Run `check` until it yields `Some`, doubling the pause between attempts up
/// to `max_delay`. Gives up once `deadline` has passed.
pub async fn poll_until<T, F, Fut>(policy: RetryPolicy, mut check: F) -> Result<T, ReplicationTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    let mut delay = policy.initial_delay;
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        if let Some(value) = check().await {
            return Ok(value);
        }
        let elapsed = start.elapsed();
        if elapsed >= policy.deadline {
            return Err(ReplicationTimeout { attempts, elapsed });
        }
        let remaining = policy.deadline - elapsed;
        tokio::time::sleep(delay.min(remaining)).await;
        delay = (delay * 2).min(policy.max_delay);
    }
}
