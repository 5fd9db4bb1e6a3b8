//! Fetch strategy engine
//!
//! Fetches one item by walking the strategy list in order, up to
//! `max_attempts` passes. The first strategy that yields a located artifact
//! wins and nothing further is tried. Between passes the engine sleeps a
//! randomized backoff. Errors that no strategy can get past (deleted or
//! private content, a missing backend binary) end the chain early.
//!
//! Failures never escape as `Err`: the engine always returns a
//! [`FetchOutcome`], carrying the classification of the last error.

use crate::backend::{MediaBackend, ResolvedMedia};
use crate::config::{FetchConfig, RetryConfig};
use crate::error::{Error, ErrorKind, Result};
use crate::file_resolver;
use crate::progress::ItemProgress;
use crate::retry::{IsRetryable, backoff_delay};
use crate::strategy::{Strategy, default_strategies};
use crate::types::{FetchFailure, FetchOutcome, FetchSuccess};
use crate::utils::sanitize_title;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runs the fallback strategy chain against a backend
#[derive(Clone)]
pub struct FetchEngine {
    backend: Arc<dyn MediaBackend>,
    fetch_config: FetchConfig,
    retry_config: RetryConfig,
    strategies: Vec<Strategy>,
}

impl FetchEngine {
    /// Create an engine using the default strategy order
    pub fn new(
        backend: Arc<dyn MediaBackend>,
        fetch_config: FetchConfig,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            backend,
            fetch_config,
            retry_config,
            strategies: default_strategies(),
        }
    }

    /// Replace the strategy list
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Strategies in the order they are tried
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    /// The backend this engine drives
    pub fn backend(&self) -> &Arc<dyn MediaBackend> {
        &self.backend
    }

    /// Fetch `url` into `output_dir`
    ///
    /// Always returns an outcome; failures carry the last error's kind and a
    /// message annotated with the number of attempts made.
    pub async fn fetch(
        &self,
        url: &str,
        output_dir: &Path,
        progress: &ItemProgress,
        cancel: &CancellationToken,
    ) -> FetchOutcome {
        let started = Instant::now();
        let max_attempts = self.retry_config.max_attempts.max(1);

        if self.strategies.is_empty() {
            return failure(ErrorKind::Other, "no fetch strategies configured", 0);
        }

        let mut last_error: Option<Error> = None;
        let mut attempts = 0;

        'attempts: for attempt in 1..=max_attempts {
            attempts = attempt;

            for strategy in &self.strategies {
                if cancel.is_cancelled() {
                    return cancelled(attempt);
                }

                tracing::debug!(url = %url, strategy = %strategy.name, attempt, "trying strategy");

                let result = tokio::select! {
                    _ = cancel.cancelled() => return cancelled(attempt),
                    result = self.try_strategy(url, strategy, output_dir, progress) => result,
                };

                match result {
                    Ok((media, path)) => {
                        let size_bytes = tokio::fs::metadata(&path)
                            .await
                            .map(|m| m.len())
                            .unwrap_or(0);

                        tracing::info!(
                            url = %url,
                            strategy = %strategy.name,
                            attempt,
                            path = %path.display(),
                            size_bytes,
                            "fetch succeeded"
                        );

                        return FetchOutcome::Success(FetchSuccess {
                            path,
                            size_bytes,
                            elapsed: started.elapsed(),
                            title: media.title,
                            duration: media.duration,
                            strategy: strategy.name.clone(),
                            attempt,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(
                            url = %url,
                            strategy = %strategy.name,
                            attempt,
                            kind = %e.kind(),
                            error = %e,
                            "strategy failed"
                        );

                        let retryable = e.is_retryable();
                        last_error = Some(e);
                        if !retryable {
                            break 'attempts;
                        }
                    }
                }
            }

            if attempt < max_attempts {
                let delay = backoff_delay(&self.retry_config);
                tracing::debug!(url = %url, attempt, delay_ms = delay.as_millis() as u64, "backing off before next pass");

                tokio::select! {
                    _ = cancel.cancelled() => return cancelled(attempt),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        let (kind, message) = match &last_error {
            Some(e) => (e.kind(), describe(e)),
            None => (ErrorKind::Other, "fetch failed".to_string()),
        };

        tracing::error!(url = %url, kind = %kind, attempts, error = %message, "all strategies exhausted");
        failure(kind, &message, attempts)
    }

    /// Resolve, fetch and locate the artifact with one strategy
    async fn try_strategy(
        &self,
        url: &str,
        strategy: &Strategy,
        output_dir: &Path,
        progress: &ItemProgress,
    ) -> Result<(ResolvedMedia, PathBuf)> {
        let request = strategy.build_request(&self.fetch_config);
        tokio::fs::create_dir_all(output_dir).await?;

        let media = self.backend.resolve(url, &request).await?;
        progress.set_title(&sanitize_title(&media.title));
        let reported = self
            .backend
            .fetch(url, &request, output_dir, progress)
            .await?;

        let path = match reported {
            Some(path) => path,
            None => file_resolver::resolve(output_dir, &media.title, &media.id).await?,
        };

        Ok((media, path))
    }
}

/// Message text without the error-type prefix
fn describe(error: &Error) -> String {
    match error {
        Error::Backend { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn failure(kind: ErrorKind, message: &str, attempts: u32) -> FetchOutcome {
    FetchOutcome::Failure(FetchFailure {
        kind,
        message: format!("{} (after {} attempt(s))", message, attempts),
        attempts,
    })
}

fn cancelled(attempt: u32) -> FetchOutcome {
    tracing::info!(attempt, "fetch cancelled");
    failure(ErrorKind::Cancelled, "download cancelled", attempt)
}
