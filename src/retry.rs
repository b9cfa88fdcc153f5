//! Bounded retry with a fixed pause
//!
//! Network operations (connectivity probe, feed fetch, catalog fetch) are
//! attempted a fixed number of times with a short pause in between.

use crate::config::RetryConfig;
use std::fmt::Display;
use std::thread;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, refused connections, server errors) should
/// return `true`. Malformed responses will not get better on a second try.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

/// Runs `operation` until it succeeds, fails permanently, or the configured
/// number of attempts is exhausted. Returns the last error in the latter cases.
pub fn with_retry<T, E, F>(config: &RetryConfig, what: &str, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: IsRetryable + Display,
{
    let attempts = config.attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation() {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "{} succeeded after retry", what);
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = attempts,
                    "{} failed, retrying",
                    what
                );
                thread::sleep(config.pause());
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = %e, attempts, "{} failed, giving up", what);
                }
                return Err(e);
            }
        }
    }
}
