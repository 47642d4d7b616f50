use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Floor for the gap between probes, so a zero interval cannot busy-loop.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// Multiply the interval by `factor` after every miss, up to `max`.
    Exponential { factor: u32, max: Duration },
}

#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
    pub backoff: Backoff,
}

impl WaitPolicy {
    pub fn fixed(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        match self.backoff {
            Backoff::Fixed => current,
            Backoff::Exponential { factor, max } => (current * factor).min(max),
        }
    }
}

/// Poll `probe` until it yields a value or `policy.timeout` elapses.
///
/// The probe always runs at least once, so a zero timeout is a single check.
/// Probes are never closer together than [`MIN_POLL_INTERVAL`].
pub async fn wait_for<T, F, Fut>(policy: &WaitPolicy, mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut interval = policy.interval;

    loop {
        if let Some(value) = probe().await {
            return Some(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        sleep(interval.max(MIN_POLL_INTERVAL).min(deadline - now)).await;
        interval = policy.next_interval(interval);
    }
}
