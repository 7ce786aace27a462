//! Bounded retries for bootstrap calls.
//!
//! Early in the League client's boot sequence the REST server is not up yet:
//! requests are refused or answered with 4xx codes. Those are worth waiting
//! out. A 5xx answer from a reachable server is not.
//!
//! The loop takes the delay as a function so tests can drive it without real
//! time passing.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{PluginError, Result};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Fatal,
}

/// Classify a failed identity lookup.
///
/// A 5xx status is fatal unless the connection itself was refused. Everything
/// else is retryable.
pub fn classify_identity_error(error: &PluginError) -> RetryDecision {
    match error.status() {
        Some(status) if status >= 500 && !error.is_connection_refused() => RetryDecision::Fatal,
        _ => RetryDecision::Retry,
    }
}

/// Attempt bound and fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, at least 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `operation` until it succeeds, `classify` calls its error fatal, or
    /// the attempts run out. `sleep` is awaited between attempts only.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, or the last error once the bound is
    /// exhausted.
    pub async fn run<T, Op, OpFut, Sleep, SleepFut>(
        &self,
        mut operation: Op,
        classify: impl Fn(&PluginError) -> RetryDecision,
        mut sleep: Sleep,
    ) -> Result<T>
    where
        Op: FnMut() -> OpFut,
        OpFut: Future<Output = Result<T>>,
        Sleep: FnMut(Duration) -> SleepFut,
        SleepFut: Future<Output = ()>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if classify(&error) == RetryDecision::Fatal {
                warn!(attempt, "giving up on fatal error: {error}");
                return Err(error);
            }
            if attempt >= self.max_attempts {
                warn!(attempt, "retries exhausted: {error}");
                return Err(error);
            }

            debug!(
                attempt,
                max_attempts = self.max_attempts,
                "attempt failed, retrying in {:?}: {error}",
                self.delay
            );
            sleep(self.delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn refused() -> PluginError {
        PluginError::ConnectionRefused("connect ECONNREFUSED 127.0.0.1".into())
    }

    fn status(code: u16) -> PluginError {
        PluginError::Http {
            status: code,
            message: String::new(),
        }
    }

    #[test]
    fn classifier() {
        assert_eq!(classify_identity_error(&refused()), RetryDecision::Retry);
        assert_eq!(classify_identity_error(&status(404)), RetryDecision::Retry);
        assert_eq!(
            classify_identity_error(&PluginError::Request("reset".into())),
            RetryDecision::Retry
        );
        assert_eq!(classify_identity_error(&status(500)), RetryDecision::Fatal);
        assert_eq!(classify_identity_error(&status(503)), RetryDecision::Fatal);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = RefCell::new(0u32);
        let sleeps = RefCell::new(Vec::new());
        let policy = RetryPolicy::new(20, Duration::from_secs(1));

        let result = policy
            .run(
                || {
                    *calls.borrow_mut() += 1;
                    let attempt = *calls.borrow();
                    async move {
                        if attempt <= 5 {
                            Err(refused())
                        } else {
                            Ok(attempt)
                        }
                    }
                },
                classify_identity_error,
                |delay| {
                    sleeps.borrow_mut().push(delay);
                    async {}
                },
            )
            .await;

        assert_eq!(result.unwrap(), 6);
        assert_eq!(*calls.borrow(), 6);
        assert_eq!(sleeps.borrow().len(), 5);
        assert!(sleeps.borrow().iter().all(|d| *d == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn fatal_error_stops_immediately() {
        let calls = RefCell::new(0u32);
        let sleeps = RefCell::new(0u32);
        let policy = RetryPolicy::new(20, Duration::from_secs(1));

        let result: Result<()> = policy
            .run(
                || {
                    *calls.borrow_mut() += 1;
                    async { Err(status(503)) }
                },
                classify_identity_error,
                |_| {
                    *sleeps.borrow_mut() += 1;
                    async {}
                },
            )
            .await;

        assert_eq!(result.unwrap_err().status(), Some(503));
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(*sleeps.borrow(), 0);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let calls = RefCell::new(0u32);
        let sleeps = RefCell::new(0u32);
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result: Result<()> = policy
            .run(
                || {
                    *calls.borrow_mut() += 1;
                    let attempt = *calls.borrow();
                    async move { Err(status(400 + attempt as u16)) }
                },
                classify_identity_error,
                |_| {
                    *sleeps.borrow_mut() += 1;
                    async {}
                },
            )
            .await;

        assert_eq!(result.unwrap_err().status(), Some(403));
        assert_eq!(*calls.borrow(), 3);
        assert_eq!(*sleeps.borrow(), 2);
    }

    #[test]
    fn policy_clamps_attempts() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }
}
