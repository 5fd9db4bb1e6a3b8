//! Retry classification and randomized backoff
//!
//! The strategy engine decides after every failed strategy whether the chain is
//! worth continuing; [`IsRetryable`] answers that question. Between passes it
//! sleeps for [`backoff_delay`], drawn uniformly from the configured window so
//! repeated requests never hit the site in lock-step.
//!
//! [`with_retry`] wraps a single fallible operation (such as listing a collection)
//! with the same policy.
//!
//! # Example
//!
//! ```no_run
//! use playlist_dl::retry::with_retry;
//! use playlist_dl::config::RetryConfig;
//! use playlist_dl::Error;
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::default();
//! let listing = with_retry(&config, || async {
//!     Ok::<_, Error>("listing".to_string())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, ErrorKind};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Errors that another attempt (or another strategy) might get past return `true`.
/// Errors that no request variation can fix return `false`.
pub trait IsRetryable {
    /// Returns true if trying again could succeed
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for ErrorKind {
    fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::AccessForbidden | ErrorKind::Timeout | ErrorKind::Other => true,
            // Deleted or private content stays that way
            ErrorKind::NotFound => false,
            ErrorKind::Cancelled => false,
        }
    }
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Backend { kind, .. } => kind.is_retryable(),
            // Local I/O trouble mid-fetch (garbled pipe output, a vanished temp file)
            Error::Io(_) => true,
            // Another strategy may well produce a locatable artifact
            Error::FileNotFound { .. } => true,
            // Truncated or garbled backend output
            Error::Serialization(_) => true,
            // Missing or unrunnable binary: every strategy would fail the same way
            Error::ExternalTool(_) => false,
            Error::Other(msg) => ErrorKind::classify(msg).is_retryable(),
            Error::Config { .. }
            | Error::InvalidUrl(_)
            | Error::Archive(_)
            | Error::Zip(_)
            | Error::Cancelled => false,
        }
    }
}

/// Wait between two passes over the strategy list
///
/// Uniform in `[min_backoff, max_backoff]` when jitter is enabled, otherwise
/// exactly `min_backoff`.
pub fn backoff_delay(config: &RetryConfig) -> Duration {
    if !config.jitter || config.max_backoff <= config.min_backoff {
        return config.min_backoff;
    }

    let mut rng = rand::thread_rng();
    let secs = rng.gen_range(config.min_backoff.as_secs_f64()..=config.max_backoff.as_secs_f64());
    Duration::from_secs_f64(secs)
}

/// Execute an async operation, retrying retryable errors
///
/// Runs at most `config.max_attempts` times (at least once) and sleeps
/// [`backoff_delay`] between attempts. Returns the first success or the last error.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = backoff_delay(config);
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(error = %e, attempts = attempt, "operation failed after all attempts");
                } else {
                    tracing::error!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}
