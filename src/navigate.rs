//! Navigation retry policy
//!
//! A page load is attempted up to `max_attempts` times; each failed attempt
//! is followed by an exponentially growing backoff sleep. The backoff is a
//! plain suspension point, so concurrent sessions keep running while one
//! session waits out a flaky load.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Page-readiness criterion a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// DOM parsed (`document.readyState` is "interactive" or "complete")
    DomContentLoaded,
    /// Full load event fired (`document.readyState` is "complete")
    #[default]
    Load,
    /// Load complete and no in-flight fetch/XHR requests for 500ms
    NetworkIdle,
}

/// Options for a navigation call.
///
/// Defaults mirror the scraper's historical behavior: wait for the load
/// event, 60 second per-attempt timeout, 3 attempts, 1 second base delay.
#[derive(Debug, Clone, Copy)]
pub struct NavigateOptions {
    pub wait_until: WaitUntil,
    /// Bound on each individual attempt; backoff sleeps are not counted.
    pub timeout: Duration,
    /// Total attempt budget. 1 means no retry.
    pub max_attempts: u32,
    /// First backoff delay; doubles after every further failure.
    pub base_delay: Duration,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            wait_until: WaitUntil::Load,
            timeout: Duration::from_secs(60),
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl NavigateOptions {
    pub fn with_wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = wait_until;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

/// Drive `attempt` through the retry state machine.
///
/// Attempts are strictly sequential. The attempt closure receives the
/// 1-based attempt index; after a failed attempt `n < max_attempts` the
/// loop sleeps `base_delay * 2^(n-1)` before the next attempt. Once the
/// budget is exhausted the last failure is wrapped in
/// [`Error::Navigation`] with the attempt count.
pub(crate) async fn run_with_retry<F, Fut>(
    url: &str,
    max_attempts: u32,
    base_delay: Duration,
    mut attempt: F,
) -> Result<()>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_err: Option<Error> = None;

    for n in 1..=max_attempts {
        match attempt(n).await {
            Ok(()) => {
                tracing::info!(url, attempt = n, "Navigation succeeded");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(url, attempt = n, max_attempts, error = %e, "Navigation attempt failed");
                last_err = Some(e);
                if n < max_attempts {
                    // Saturate: large attempt budgets must not overflow.
                    let delay = base_delay.saturating_mul(2u32.saturating_pow(n - 1));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    let cause = last_err
        .unwrap_or_else(|| Error::NavigationAttempt("no attempts were made".into()));
    Err(Error::navigation(url, max_attempts, cause))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_counts_attempts_and_backs_off() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let err = run_with_retry("http://example.test", 3, Duration::from_millis(1000), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::Timeout("load".into())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two backoff sleeps: 1000ms then 2000ms.
        assert_eq!(start.elapsed(), Duration::from_millis(3000));

        match err {
            Error::Navigation { url, attempts, cause } => {
                assert_eq!(url, "http://example.test");
                assert_eq!(attempts, 3);
                assert!(matches!(*cause, Error::Timeout(_)));
            }
            other => panic!("expected Navigation error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_later_attempt_stops_retrying() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        run_with_retry("http://example.test", 5, Duration::from_millis(1000), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(Error::Timeout("load".into()))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Only the delays before the successful attempt: 1000 + 2000.
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_means_no_retry() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let err = run_with_retry("http://example.test", 1, Duration::from_millis(1000), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::NavigationAttempt("refused".into())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(err, Error::Navigation { attempts: 1, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn large_attempt_budget_saturates_backoff() {
        // Attempt 34's doubling would overflow a u32 multiplier.
        let calls = AtomicU32::new(0);

        let err = run_with_retry("http://example.test", 40, Duration::from_millis(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(Error::Timeout("load".into())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 40);
        assert!(matches!(err, Error::Navigation { attempts: 40, .. }));
    }

    #[tokio::test]
    async fn first_attempt_success_invokes_once() {
        let calls = AtomicU32::new(0);
        run_with_retry("http://example.test", 3, Duration::from_millis(1), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_indices_are_one_based() {
        let seen = std::sync::Mutex::new(Vec::new());
        let _ = run_with_retry("http://example.test", 3, Duration::from_millis(1), |n| {
            seen.lock().unwrap().push(n);
            async { Err::<(), _>(Error::Timeout("load".into())) }
        })
        .await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }
}
