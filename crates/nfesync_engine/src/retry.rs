//! Bounded exponential-delay retry around a single remote call.

use crate::config::RetryConfig;
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Calls `operation` until it succeeds or `config.max_attempts` is reached.
///
/// After the failed attempt with 0-based index `n` the thread sleeps
/// `base_delay * 2^n`; there is no sleep after the last attempt, whose error
/// is returned unchanged.
pub fn retry<T, E, F>(config: &RetryConfig, operation: F) -> Result<T, E>
where
    E: fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    retry_with_sleep(config, thread::sleep, operation)
}

/// [`retry`] with an explicit sleep function.
pub fn retry_with_sleep<T, E, F, S>(config: &RetryConfig, mut sleep: S, mut operation: F) -> Result<T, E>
where
    E: fmt::Display,
    F: FnMut() -> Result<T, E>,
    S: FnMut(Duration),
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= attempts {
                    warn!(attempts, error = %err, "giving up after final attempt");
                    return Err(err);
                }
                let delay = config.delay_for_attempt(attempt - 1);
                warn!(
                    attempt,
                    attempts,
                    delay_secs = delay.as_secs_f64(),
                    error = %err,
                    "remote call failed, retrying"
                );
                if !delay.is_zero() {
                    sleep(delay);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    struct Flaky(u32);

    impl fmt::Display for Flaky {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "flaky #{}", self.0)
        }
    }

    #[test]
    fn always_failing_sleeps_between_attempts_only() {
        let calls = Cell::new(0);
        let mut slept = Vec::new();

        let result: Result<(), Flaky> = retry_with_sleep(
            &RetryConfig::default(),
            |d| slept.push(d.as_secs()),
            || {
                calls.set(calls.get() + 1);
                Err(Flaky(calls.get()))
            },
        );

        assert_eq!(calls.get(), 3);
        assert_eq!(slept, vec![5, 10]);
        assert_eq!(result, Err(Flaky(3)));
    }

    #[test]
    fn success_after_failure() {
        let calls = Cell::new(0);
        let mut slept = Vec::new();

        let result = retry_with_sleep(
            &RetryConfig::default(),
            |d| slept.push(d),
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 2 {
                    Err(Flaky(1))
                } else {
                    Ok("page")
                }
            },
        );

        assert_eq!(result, Ok("page"));
        assert_eq!(slept, vec![Duration::from_secs(5)]);
    }

    #[test]
    fn first_success_never_sleeps() {
        let mut slept = 0;
        let result: Result<u8, Flaky> =
            retry_with_sleep(&RetryConfig::default(), |_| slept += 1, || Ok(1));
        assert_eq!(result, Ok(1));
        assert_eq!(slept, 0);
    }

    #[test]
    fn zero_attempts_still_calls_once() {
        let calls = Cell::new(0);
        let result: Result<(), Flaky> = retry_with_sleep(
            &RetryConfig::new(0),
            |_| panic!("must not sleep"),
            || {
                calls.set(calls.get() + 1);
                Err(Flaky(0))
            },
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn zero_delay_skips_sleep() {
        let calls = Cell::new(0);
        let config = RetryConfig::new(4).with_base_delay(Duration::ZERO);
        let result: Result<(), Flaky> = retry(&config, || {
            calls.set(calls.get() + 1);
            Err(Flaky(calls.get()))
        });
        assert_eq!(result, Err(Flaky(4)));
        assert_eq!(calls.get(), 4);
    }
}
