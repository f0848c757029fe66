//! Polling until a remote entity reaches a state
//!
//! Fixed-interval polling with a bounded number of attempts: sleep, refresh,
//! test the predicate. There is no backoff. The outcome says whether the
//! predicate held, so a caller cannot mistake a timeout for completion.

use crate::config::WaitSettings;
use crate::entity::Refresh;
use crate::error::{Error, Result};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// How long and how often to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            interval: Duration::from_secs(1),
        }
    }
}

impl WaitPolicy {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Number of refreshes the policy allows
    ///
    /// Rounds up, so a partial interval still gets a refresh. A zero timeout
    /// allows none; a zero interval is treated as one millisecond.
    pub fn max_attempts(&self) -> u32 {
        let timeout = self.timeout.as_millis();
        if timeout == 0 {
            return 0;
        }
        let interval = self.interval.as_millis().max(1);
        let attempts = (timeout + interval - 1) / interval;
        u32::try_from(attempts).unwrap_or(u32::MAX)
    }
}

impl From<&WaitSettings> for WaitPolicy {
    fn from(settings: &WaitSettings) -> Self {
        Self::new(settings.timeout(), settings.interval())
    }
}

/// How a wait ended
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The predicate held after `attempts` refreshes
    Completed { attempts: u32, elapsed: Duration },
    /// Every allowed refresh ran without the predicate holding
    TimedOut { attempts: u32, elapsed: Duration },
}

impl WaitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WaitOutcome::Completed { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            WaitOutcome::Completed { attempts, .. } | WaitOutcome::TimedOut { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            WaitOutcome::Completed { elapsed, .. } | WaitOutcome::TimedOut { elapsed, .. } => {
                *elapsed
            }
        }
    }

    /// Turn a timeout into `Error::WaitTimeout`
    pub fn into_result(self) -> Result<Duration> {
        match self {
            WaitOutcome::Completed { elapsed, .. } => Ok(elapsed),
            WaitOutcome::TimedOut { attempts, elapsed } => {
                Err(Error::WaitTimeout { attempts, elapsed })
            }
        }
    }
}

/// Refresh `entity` every `policy.interval` until `predicate` holds
///
/// Sleeps before each refresh. Refresh errors are returned as-is.
pub async fn wait_until<E, P>(
    entity: &mut E,
    mut predicate: P,
    policy: &WaitPolicy,
) -> Result<WaitOutcome>
where
    E: Refresh + ?Sized,
    P: FnMut(&E) -> bool + Send,
{
    let start = Instant::now();
    let max_attempts = policy.max_attempts();
    let mut attempts = 0;

    while attempts < max_attempts {
        sleep(policy.interval).await;
        entity.refresh().await?;
        attempts += 1;

        if predicate(entity) {
            debug!("Wait completed after {} attempts", attempts);
            return Ok(WaitOutcome::Completed {
                attempts,
                elapsed: start.elapsed(),
            });
        }
    }

    debug!("Wait gave up after {} attempts", attempts);
    Ok(WaitOutcome::TimedOut {
        attempts,
        elapsed: start.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Becomes ready on the n-th refresh
    struct Countdown {
        refreshes: u32,
        ready_at: u32,
        fail_at: Option<u32>,
    }

    impl Countdown {
        fn ready_at(ready_at: u32) -> Self {
            Self {
                refreshes: 0,
                ready_at,
                fail_at: None,
            }
        }

        fn is_ready(&self) -> bool {
            self.refreshes >= self.ready_at
        }
    }

    #[async_trait]
    impl Refresh for Countdown {
        async fn refresh(&mut self) -> Result<()> {
            self.refreshes += 1;
            if Some(self.refreshes) == self.fail_at {
                return Err(Error::UnexpectedResponse("refresh failed".to_string()));
            }
            Ok(())
        }
    }

    fn fast_policy(attempts: u64) -> WaitPolicy {
        WaitPolicy::new(Duration::from_millis(attempts * 5), Duration::from_millis(5))
    }

    #[test]
    fn test_default_policy() {
        let policy = WaitPolicy::default();
        assert_eq!(policy.max_attempts(), 30);
        assert_eq!(WaitPolicy::from(&WaitSettings::default()), policy);
    }

    #[test]
    fn test_zero_interval_is_bounded() {
        let policy = WaitPolicy::new(Duration::from_millis(20), Duration::ZERO);
        assert_eq!(policy.max_attempts(), 20);
    }

    #[test]
    fn test_partial_interval_rounds_up() {
        let policy = WaitPolicy::new(Duration::from_millis(2500), Duration::from_secs(1));
        assert_eq!(policy.max_attempts(), 3);

        let policy = WaitPolicy::new(Duration::from_millis(50), Duration::from_millis(100));
        assert_eq!(policy.max_attempts(), 1);
    }

    #[tokio::test]
    async fn test_timeout_shorter_than_interval_still_checks() {
        let mut entity = Countdown::ready_at(1);
        let policy = WaitPolicy::new(Duration::from_millis(5), Duration::from_millis(10));
        let outcome = wait_until(&mut entity, |e| e.is_ready(), &policy).await.unwrap();

        assert!(outcome.is_completed());
        assert_eq!(outcome.attempts(), 1);
        assert_eq!(entity.refreshes, 1);
    }

    #[tokio::test]
    async fn test_completes_when_predicate_holds() {
        let mut entity = Countdown::ready_at(3);
        let outcome = wait_until(&mut entity, |e| e.is_ready(), &fast_policy(10))
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(entity.refreshes, 3);
    }

    #[tokio::test]
    async fn test_times_out_without_error() {
        let mut entity = Countdown::ready_at(100);
        let outcome = wait_until(&mut entity, |e| e.is_ready(), &fast_policy(4))
            .await
            .unwrap();

        assert!(!outcome.is_completed());
        assert_eq!(outcome.attempts(), 4);
        assert!(matches!(
            outcome.into_result(),
            Err(Error::WaitTimeout { attempts: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_timeout_never_refreshes() {
        let mut entity = Countdown::ready_at(0);
        let policy = WaitPolicy::new(Duration::ZERO, Duration::from_millis(5));
        let outcome = wait_until(&mut entity, |e| e.is_ready(), &policy).await.unwrap();

        assert_eq!(outcome.attempts(), 0);
        assert!(!outcome.is_completed());
        assert_eq!(entity.refreshes, 0);
    }

    #[tokio::test]
    async fn test_refresh_error_propagates() {
        let mut entity = Countdown {
            refreshes: 0,
            ready_at: 10,
            fail_at: Some(2),
        };
        let result = wait_until(&mut entity, |e| e.is_ready(), &fast_policy(10)).await;
        tokio_test::assert_err!(result);
        assert_eq!(entity.refreshes, 2);
    }
}
