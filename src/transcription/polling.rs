use async_trait::async_trait;
use std::time::Duration;

/// Suspends the poller between status checks
#[async_trait]
pub trait Waiter: Send + Sync {
    async fn wait(&self, delay: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioWaiter;

#[async_trait]
impl Waiter for TokioWaiter {
    async fn wait(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// How often and how long to poll a transcription job
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Growth factor per poll; 1.0 keeps the interval fixed
    pub backoff: f64,
    pub max_interval: Duration,
    /// Total waiting allowed before giving up
    pub max_wait: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            backoff: 1.0,
            max_interval: Duration::from_secs(30),
            max_wait: Duration::from_secs(3600),
        }
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval,
            backoff: 1.0,
            max_interval: interval,
            max_wait,
        }
    }

    pub fn schedule(&self) -> PollSchedule {
        PollSchedule {
            policy: self.clone(),
            next: self.interval,
            waited: Duration::ZERO,
        }
    }
}

/// Delay sequence for one job. Elapsed time is the sum of the delays handed
/// out, so the deadline does not depend on the wall clock.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    policy: PollPolicy,
    next: Duration,
    waited: Duration,
}

impl PollSchedule {
    /// Delay before the next poll, or `None` once the deadline is used up
    pub fn next_delay(&mut self) -> Option<Duration> {
        let remaining = self.policy.max_wait.checked_sub(self.waited)?;
        if remaining.is_zero() {
            return None;
        }

        let delay = self.next.min(remaining);
        self.waited += delay;

        let grown = self.next.mul_f64(self.policy.backoff.max(1.0));
        let cap = self.policy.max_interval.max(self.policy.interval);
        self.next = grown.min(cap);

        Some(delay)
    }

    pub fn waited(&self) -> Duration {
        self.waited
    }
}
