//! Retry policy for single-attempt network operations
//!
//! A [`RetryPolicy`] repeats an operation while it fails with an error the
//! caller considers transient, sleeping with exponential backoff between
//! attempts. The operation itself must perform exactly one attempt per call.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use bon::Builder;
use tracing::{debug, warn};

mod defaults {
    use std::time::Duration;

    pub(super) const MAX_ATTEMPTS: u32 = 3;
    pub(super) const MULTIPLIER: Duration = Duration::from_secs(1);
    pub(super) const MIN_DELAY: Duration = Duration::from_secs(2);
    pub(super) const MAX_DELAY: Duration = Duration::from_secs(10);
}

/// Exponential backoff retry policy
///
/// The delay after failed attempt `n` (starting at 1) is
/// `min(max_delay, multiplier * 2^(n-1))`, raised to at least `min_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Builder)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    #[builder(default = defaults::MAX_ATTEMPTS)]
    max_attempts: u32,

    #[builder(default = defaults::MULTIPLIER)]
    multiplier: Duration,

    #[builder(default = defaults::MIN_DELAY)]
    min_delay: Duration,

    #[builder(default = defaults::MAX_DELAY)]
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The error of the last attempt made by a [`RetryPolicy`]
#[derive(Debug)]
pub struct Exhausted<E> {
    /// How many attempts were made in total
    pub attempts: u32,
    pub error: E,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn multiplier(&self) -> Duration {
        self.multiplier
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// The delay to wait after the given failed attempt
    ///
    /// Never exceeds `max_delay`, even when `min_delay` is configured above it.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let min_delay = self.min_delay.min(self.max_delay);
        self.multiplier
            .saturating_mul(factor)
            .min(self.max_delay)
            .max(min_delay)
    }

    /// Run `operation` until it succeeds, fails with an error `is_retryable` rejects,
    /// or the attempt budget is spent.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut operation: F,
        is_retryable: impl Fn(&E) -> bool,
    ) -> Result<T, Exhausted<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt < max_attempts && is_retryable(&error) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        "Attempt failed, retrying in {delay:?}: {error}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    debug!(attempt, "Giving up: {error}");
                    return Err(Exhausted {
                        attempts: attempt,
                        error,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;
    use tracing_test::traced_test;

    #[derive(Debug)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient"),
                TestError::Fatal => write!(f, "fatal"),
            }
        }
    }

    fn is_transient(error: &TestError) -> bool {
        matches!(error, TestError::Transient)
    }

    #[rstest]
    #[case(1, 2)]
    #[case(2, 2)]
    #[case(3, 4)]
    #[case(4, 8)]
    #[case(5, 10)]
    #[case(12, 10)]
    #[case(u32::MAX, 10)]
    fn default_delays_are_bounded(#[case] attempt: u32, #[case] seconds: u64) {
        assert_eq!(
            RetryPolicy::default().delay_after(attempt),
            Duration::from_secs(seconds)
        );
    }

    #[test]
    fn delays_never_decrease() {
        let policy = RetryPolicy::default();
        let delays: Vec<_> = (1..20).map(|attempt| policy.delay_after(attempt)).collect();

        assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(
            delays
                .iter()
                .all(|delay| *delay >= Duration::from_secs(2) && *delay <= Duration::from_secs(10))
        );
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(6)]
    fn min_delay_above_max_delay_is_capped(#[case] attempt: u32) {
        let policy = RetryPolicy::builder()
            .min_delay(Duration::from_secs(30))
            .max_delay(Duration::from_secs(5))
            .build();

        assert_eq!(policy.delay_after(attempt), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn it_stops_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;
        let started = Instant::now();

        let result: Result<(), _> = RetryPolicy::default()
            .run(
                move || async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Transient)
                },
                is_transient,
            )
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert!(matches!(exhausted.error, TestError::Transient));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        // Two waits of 2s each between three attempts
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn it_waits_with_backoff_between_attempts() {
        let recorded = std::sync::Mutex::new(Vec::new());
        let attempt_times = &recorded;
        let started = Instant::now();

        let _: Result<(), _> = RetryPolicy::builder()
            .max_attempts(5)
            .build()
            .run(
                move || async move {
                    attempt_times.lock().unwrap().push(started.elapsed());
                    Err(TestError::Transient)
                },
                is_transient,
            )
            .await;

        let attempt_times = recorded.into_inner().unwrap();
        let gaps: Vec<_> = attempt_times
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect();
        assert_eq!(
            gaps,
            [2, 2, 4, 8].map(Duration::from_secs).to_vec(),
            "attempts at {attempt_times:?}"
        );
    }

    #[tokio::test]
    async fn it_does_not_retry_fatal_errors() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let result: Result<(), _> = RetryPolicy::default()
            .run(
                move || async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(TestError::Fatal)
                },
                is_transient,
            )
            .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 1);
        assert!(matches!(exhausted.error, TestError::Fatal));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn it_returns_the_first_success() {
        let counter = AtomicU32::new(0);
        let attempts = &counter;

        let result = RetryPolicy::default()
            .run(
                move || async move {
                    match attempts.fetch_add(1, Ordering::SeqCst) {
                        0 => Err(TestError::Transient),
                        n => Ok(n),
                    }
                },
                is_transient,
            )
            .await;

        assert_eq!(result.unwrap(), 1);
        assert!(logs_contain("Attempt failed, retrying in 2s: transient"));
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        assert_eq!(
            RetryPolicy::builder().max_attempts(0).build().max_attempts(),
            1
        );
    }
}
