//! Collection download orchestration
//!
//! A batch lists the collection, applies [`SelectionFilters`], fetches every
//! selected item through the [`FetchEngine`] and packages the successes into
//! one ordered archive. A failing item is recorded and skipped; it never aborts
//! the rest of the batch.
//!
//! Items run strictly one after another with a short pause by default. With
//! `max_concurrent > 1` up to that many fetches overlap, but outcomes and
//! archive entries still follow selection order.

use crate::archive::{self, ordinal_prefix, ordinal_width};
use crate::config::{BatchConfig, Config, RetryConfig};
use crate::engine::FetchEngine;
use crate::error::{Error, ErrorKind, Result};
use crate::progress::ProgressTracker;
use crate::retry::with_retry;
use crate::types::{
    BatchResult, CollectionInfo, FetchFailure, FetchOutcome, ItemOutcome, MediaItem,
    SelectionFilters,
};
use crate::utils::{create_fresh_dir, sanitize_title};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Archive file stem used when the collection title is empty
const FALLBACK_ARCHIVE_STEM: &str = "playlist";

/// One selected item waiting to be fetched
struct Job {
    ordinal: usize,
    position: usize,
    item: MediaItem,
}

/// Drives the fetch engine over a whole collection
pub struct BatchOrchestrator {
    engine: FetchEngine,
    tracker: ProgressTracker,
    batch: BatchConfig,
    retry: RetryConfig,
    socket_timeout: Duration,
}

impl BatchOrchestrator {
    /// Create an orchestrator reporting progress to `tracker`
    pub fn new(engine: FetchEngine, config: &Config, tracker: ProgressTracker) -> Self {
        Self {
            engine,
            tracker,
            batch: config.batch.clone(),
            retry: config.retry.clone(),
            socket_timeout: config.fetch.socket_timeout,
        }
    }

    /// List a collection, retrying transient backend failures
    pub async fn list(&self, collection_url: &str) -> Result<CollectionInfo> {
        self.list_counted(collection_url).await.map_err(|(e, _)| e)
    }

    async fn list_counted(
        &self,
        collection_url: &str,
    ) -> std::result::Result<CollectionInfo, (Error, u32)> {
        let calls = AtomicU32::new(0);
        self.list_with_counter(collection_url, &calls)
            .await
            .map_err(|e| (e, calls.load(Ordering::Relaxed)))
    }

    async fn list_with_counter(
        &self,
        collection_url: &str,
        calls: &AtomicU32,
    ) -> Result<CollectionInfo> {
        let backend = self.engine.backend().as_ref();
        let timeout = self.socket_timeout;

        let listing = with_retry(&self.retry, move || {
            calls.fetch_add(1, Ordering::Relaxed);
            backend.list_collection(collection_url, timeout)
        })
        .await?;

        Ok(listing.into_collection(collection_url))
    }

    /// List `collection_url` and download the selected items into `work_dir`
    ///
    /// A listing failure yields a failed [`BatchResult`] with no outcomes.
    pub async fn run(
        &self,
        collection_url: &str,
        filters: &SelectionFilters,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> BatchResult {
        tracing::info!(url = %collection_url, "listing collection");

        let calls = AtomicU32::new(0);
        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            listed = self.list_with_counter(collection_url, &calls) => Some(listed),
        };
        let attempts = calls.load(Ordering::Relaxed);

        let collection = match listed {
            None => {
                tracing::info!(url = %collection_url, attempts, "collection listing cancelled");
                let mut result = BatchResult::listing_failed(FetchFailure {
                    kind: ErrorKind::Cancelled,
                    message: format!("listing cancelled (after {} attempt(s))", attempts),
                    attempts,
                });
                result.mark_cancelled();
                return result;
            }
            Some(Ok(collection)) => collection,
            Some(Err(e)) => {
                let message = match &e {
                    Error::Backend { message, .. } => message.clone(),
                    other => other.to_string(),
                };
                tracing::error!(url = %collection_url, kind = %e.kind(), error = %message, "collection listing failed");

                return BatchResult::listing_failed(FetchFailure {
                    kind: e.kind(),
                    message: format!("{} (after {} attempt(s))", message, attempts),
                    attempts,
                });
            }
        };

        self.run_collection(collection, filters, work_dir, cancel).await
    }

    /// Download the selected items of an already listed collection
    pub async fn run_collection(
        &self,
        collection: CollectionInfo,
        filters: &SelectionFilters,
        work_dir: &Path,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let mut jobs: Vec<Job> = collection
            .select(filters)
            .into_iter()
            .enumerate()
            .map(|(i, (position, item))| Job {
                ordinal: i + 1,
                position,
                item: item.clone(),
            })
            .collect();

        if jobs.len() > self.batch.max_collection_size {
            tracing::warn!(
                selected = jobs.len(),
                cap = self.batch.max_collection_size,
                "selection exceeds collection size cap, truncating"
            );
            jobs.truncate(self.batch.max_collection_size);
        }

        let width = ordinal_width(jobs.len());
        let mut result = BatchResult::new(collection, jobs.len());

        tracing::info!(
            collection = %result.collection().map(|c| c.title()).unwrap_or_default(),
            total = result.collection().map(|c| c.len()).unwrap_or(0),
            selected = jobs.len(),
            max_concurrent = self.batch.max_concurrent,
            "starting batch"
        );

        for job in &jobs {
            self.tracker.register(job.item.id(), job.item.title());
        }

        let mut item_dirs = Vec::new();
        if self.batch.max_concurrent <= 1 {
            self.run_sequential(jobs, work_dir, width, cancel, &mut result, &mut item_dirs)
                .await;
        } else {
            let this = self;
            let mut finished = stream::iter(jobs)
                .map(move |job| this.fetch_item(job, work_dir, width, cancel))
                .buffer_unordered(self.batch.max_concurrent);

            while let Some(done) = finished.next().await {
                if let Some((outcome, dir)) = done {
                    result.record(outcome);
                    item_dirs.extend(dir);
                }
            }
        }

        if cancel.is_cancelled() {
            result.mark_cancelled();
        }

        if self.batch.create_archive && result.success_count() > 0 {
            self.package(&mut result, work_dir).await;
            if result.archive().is_some() && !self.batch.keep_item_files {
                remove_item_dirs(&item_dirs).await;
            }
        }

        result.finish();
        tracing::info!(
            requested = result.requested(),
            succeeded = result.success_count(),
            failed = result.failure_count(),
            cancelled = result.was_cancelled(),
            "batch finished"
        );
        result
    }

    async fn run_sequential(
        &self,
        jobs: Vec<Job>,
        work_dir: &Path,
        width: usize,
        cancel: &CancellationToken,
        result: &mut BatchResult,
        item_dirs: &mut Vec<PathBuf>,
    ) {
        for (i, job) in jobs.into_iter().enumerate() {
            if i > 0 && !self.batch.inter_item_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.batch.inter_item_delay) => {}
                }
            }

            match self.fetch_item(job, work_dir, width, cancel).await {
                Some((outcome, dir)) => {
                    result.record(outcome);
                    item_dirs.extend(dir);
                }
                None => break,
            }
        }
    }

    /// Fetch one item into a fresh directory
    ///
    /// Returns None if the batch was cancelled before the item started, otherwise
    /// the outcome and the directory created for it.
    async fn fetch_item(
        &self,
        job: Job,
        work_dir: &Path,
        width: usize,
        cancel: &CancellationToken,
    ) -> Option<(ItemOutcome, Option<PathBuf>)> {
        if cancel.is_cancelled() {
            return None;
        }

        let id = job.item.id().to_string();
        tracing::info!(item_id = %id, ordinal = job.ordinal, title = %job.item.title(), "fetching item");

        let wanted = item_dir(work_dir, job.ordinal, width, &id);
        let (outcome, dir) = match create_fresh_dir(&wanted).await {
            Ok(dir) => {
                let outcome = self
                    .engine
                    .fetch(job.item.url(), &dir, &self.tracker.item(&id), cancel)
                    .await;
                (outcome, Some(dir))
            }
            Err(e) => {
                let outcome = FetchOutcome::Failure(FetchFailure {
                    kind: e.kind(),
                    message: format!("cannot create item directory: {}", e),
                    attempts: 0,
                });
                (outcome, None)
            }
        };

        match &outcome {
            FetchOutcome::Success(success) => {
                self.tracker.complete(&id);
                tracing::info!(item_id = %id, ordinal = job.ordinal, strategy = %success.strategy, "item succeeded");
            }
            FetchOutcome::Failure(failure) => {
                self.tracker.fail(&id, &failure.message);
                tracing::warn!(
                    item_id = %id,
                    ordinal = job.ordinal,
                    kind = %failure.kind,
                    error = %failure.message,
                    "item failed, skipping"
                );
            }
        }

        let outcome = ItemOutcome {
            ordinal: job.ordinal,
            position: job.position,
            item: job.item,
            outcome,
        };
        Some((outcome, dir))
    }

    async fn package(&self, result: &mut BatchResult, work_dir: &Path) {
        let files: Vec<(usize, PathBuf)> = result
            .successes()
            .map(|(item, success)| (item.ordinal, success.path.clone()))
            .collect();

        let stem = result
            .collection()
            .map(|c| sanitize_title(c.title()))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| FALLBACK_ARCHIVE_STEM.to_string());
        let archive_path = work_dir.join(format!("{}.zip", stem));

        match archive::package(&files, result.requested(), &archive_path).await {
            Ok(info) => result.set_archive(info),
            Err(e) => {
                tracing::error!(path = %archive_path.display(), error = %e, "archive packaging failed");
            }
        }
    }
}

/// Remove per-item directories whose artifacts are now in the archive
async fn remove_item_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove item directory");
        }
    }
    tracing::debug!(removed = dirs.len(), "item directories cleaned up");
}

/// Per-item working directory: `<work_dir>/<NNN>_<id>`
fn item_dir(work_dir: &Path, ordinal: usize, width: usize, id: &str) -> PathBuf {
    work_dir.join(format!("{}_{}", ordinal_prefix(ordinal, width), sanitize_title(id)))
}
