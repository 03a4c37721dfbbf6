//! One retry loop for every unreliable call site.
//!
//! The gateway's JSON-RPC dispatch, the pipeline's nonce fetch, and the
//! broadcast step all share this helper; each site supplies its own
//! classifier deciding which errors are transient and how long to back off.

use std::thread;
use std::time::Duration;

/// Backoff schedule between attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^attempt`, attempt counted from zero.
    Exponential { base: Duration },
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { base } => *base * 2u32.saturating_pow(attempt),
        }
    }
}

/// Classifier verdict for a failed attempt.
pub enum RetryDecision {
    Retry(Duration),
    Fatal,
}

/// Run `op` up to `max_retries + 1` times, sleeping per the classifier's
/// verdict between attempts. Fatal errors and exhausted retries surface the
/// last error unchanged.
pub fn with_retries<T, E>(
    max_retries: u32,
    mut op: impl FnMut() -> Result<T, E>,
    classify: impl Fn(&E, u32) -> RetryDecision,
) -> Result<T, E> {
    let mut attempt = 0u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= max_retries {
                    return Err(error);
                }
                match classify(&error, attempt) {
                    RetryDecision::Fatal => return Err(error),
                    RetryDecision::Retry(delay) => {
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                    }
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn succeeds_without_retry() {
        let mut calls = 0;
        let result: Result<u32, ()> = with_retries(
            3,
            || {
                calls += 1;
                Ok(42)
            },
            |_, _| RetryDecision::Retry(Duration::ZERO),
        );
        assert_eq!(result, Ok(42));
        assert_eq!(calls, 1);
    }

    #[test]
    fn fatal_errors_stop_immediately() {
        let mut calls = 0;
        let result: Result<(), &str> = with_retries(
            3,
            || {
                calls += 1;
                Err("bad request")
            },
            |_, _| RetryDecision::Fatal,
        );
        assert_eq!(result, Err("bad request"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn exhausts_retries_then_surfaces_last_error() {
        let mut calls = 0;
        let result: Result<(), &str> = with_retries(
            2,
            || {
                calls += 1;
                Err("timeout")
            },
            |_, _| RetryDecision::Retry(Duration::ZERO),
        );
        assert_eq!(result, Err("timeout"));
        assert_eq!(calls, 3);
    }

    #[test]
    fn exponential_backoff_doubles() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
    }

    #[test]
    fn sleeps_between_transient_failures() {
        let base = Duration::from_millis(10);
        let backoff = Backoff::Exponential { base };
        let start = Instant::now();
        let mut calls = 0;
        let result: Result<u32, &str> = with_retries(
            2,
            || {
                calls += 1;
                if calls < 3 {
                    Err("rate limited")
                } else {
                    Ok(7)
                }
            },
            |_, attempt| RetryDecision::Retry(backoff.delay(attempt)),
        );
        assert_eq!(result, Ok(7));
        // base * 2^0 + base * 2^1
        assert!(start.elapsed() >= base + base * 2);
    }
}
