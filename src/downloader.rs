//! High-level entry point
//!
//! [`Downloader`] ties the pieces together: it classifies a URL, then either
//! runs the strategy engine for a single item or the batch orchestrator for a
//! collection. One shared [`ProgressTracker`] and one cancellation token cover
//! every operation started from the same downloader.

use crate::backend::MediaBackend;
use crate::batch::BatchOrchestrator;
use crate::config::Config;
use crate::engine::FetchEngine;
use crate::error::{Error, Result};
use crate::progress::ProgressTracker;
use crate::types::{BatchResult, CollectionInfo, Event, FetchOutcome, SelectionFilters};
use crate::url_classifier::{self, ClassifiedUrl, UrlKind};
use crate::utils::{create_fresh_dir, sanitize_title};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// What a [`Downloader::download`] call produced
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadReport {
    /// The URL named a single item
    Single(FetchOutcome),
    /// The URL named a collection
    Batch(BatchResult),
}

impl DownloadReport {
    /// Whether anything was successfully fetched
    pub fn is_success(&self) -> bool {
        match self {
            DownloadReport::Single(outcome) => outcome.is_success(),
            DownloadReport::Batch(result) => !result.is_failed(),
        }
    }
}

/// Main downloader instance
///
/// # Examples
///
/// ```no_run
/// use playlist_dl::{Config, Downloader, SelectionFilters};
/// use playlist_dl::backend::YtDlpBackend;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = YtDlpBackend::from_path().ok_or("yt-dlp not found in PATH")?;
/// let downloader = Downloader::new(Config::default(), Arc::new(backend))?;
///
/// let report = downloader
///     .download("https://youtu.be/dQw4w9WgXcQ", &SelectionFilters::default())
///     .await?;
/// println!("success: {}", report.is_success());
/// # Ok(())
/// # }
/// ```
pub struct Downloader {
    config: Arc<Config>,
    engine: FetchEngine,
    tracker: ProgressTracker,
    cancel: CancellationToken,
}

impl Downloader {
    /// Create a downloader after validating `config`
    pub fn new(config: Config, backend: Arc<dyn MediaBackend>) -> Result<Self> {
        config.validate()?;

        let engine = FetchEngine::new(backend, config.fetch.clone(), config.retry.clone());
        tracing::debug!(output_dir = %config.output_dir.display(), "downloader created");

        Ok(Self {
            config: Arc::new(config),
            engine,
            tracker: ProgressTracker::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared progress tracker handle
    pub fn progress(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tracker.subscribe()
    }

    /// Cancel every in-flight and future operation of this downloader
    pub fn cancel(&self) {
        tracing::info!("cancellation requested");
        self.cancel.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Classify `url`, then fetch it as a single item or a collection
    ///
    /// `filters` only apply to collections. Returns [`Error::InvalidUrl`] for
    /// unrecognized input and [`Error::Io`] when the output directory cannot be
    /// created; every other failure is reported inside the report.
    pub async fn download(&self, url: &str, filters: &SelectionFilters) -> Result<DownloadReport> {
        let classified = self.classify(url)?;

        match classified.kind {
            UrlKind::Single => Ok(DownloadReport::Single(
                self.fetch_classified(&classified).await?,
            )),
            UrlKind::Collection => {
                filters.validate()?;
                Ok(DownloadReport::Batch(
                    self.batch_classified(&classified, filters).await?,
                ))
            }
            UrlKind::Invalid => Err(Error::InvalidUrl(url.trim().to_string())),
        }
    }

    /// Fetch a single item into a fresh `<output_dir>/<item id>` directory
    ///
    /// A directory left by an earlier run is never reused; the new one gets a
    /// ` (N)` suffix instead.
    pub async fn download_single(&self, url: &str) -> Result<FetchOutcome> {
        let classified = self.classify(url)?;
        match classified.kind {
            UrlKind::Single => self.fetch_classified(&classified).await,
            _ => Err(Error::InvalidUrl(url.trim().to_string())),
        }
    }

    /// Download a collection into a fresh `<output_dir>/<collection id>` directory
    pub async fn download_collection(
        &self,
        url: &str,
        filters: &SelectionFilters,
    ) -> Result<BatchResult> {
        filters.validate()?;
        let classified = self.classify(url)?;
        match classified.kind {
            UrlKind::Collection => self.batch_classified(&classified, filters).await,
            _ => Err(Error::InvalidUrl(url.trim().to_string())),
        }
    }

    /// List a collection without downloading anything
    pub async fn list_collection(&self, url: &str) -> Result<CollectionInfo> {
        let classified = self.classify(url)?;
        match classified.kind {
            UrlKind::Collection => self.orchestrator().list(&classified.normalized_url).await,
            _ => Err(Error::InvalidUrl(url.trim().to_string())),
        }
    }

    fn classify(&self, url: &str) -> Result<ClassifiedUrl> {
        let classified = url_classifier::classify(url);
        if !classified.is_valid() {
            tracing::warn!(url = %url.trim(), "unrecognized URL");
            return Err(Error::InvalidUrl(url.trim().to_string()));
        }
        Ok(classified)
    }

    fn orchestrator(&self) -> BatchOrchestrator {
        BatchOrchestrator::new(self.engine.clone(), &self.config, self.tracker.clone())
    }

    async fn work_dir(&self, id: &str) -> Result<PathBuf> {
        let dir = create_fresh_dir(&self.config.output_dir.join(sanitize_title(id))).await?;
        tracing::debug!(dir = %dir.display(), "work directory created");
        Ok(dir)
    }

    async fn fetch_classified(&self, classified: &ClassifiedUrl) -> Result<FetchOutcome> {
        let id = classified.id.as_str();
        let work_dir = self.work_dir(id).await?;
        self.tracker.register(id, id);

        let outcome = self
            .engine
            .fetch(
                &classified.normalized_url,
                &work_dir,
                &self.tracker.item(id),
                &self.cancel,
            )
            .await;

        match &outcome {
            FetchOutcome::Success(_) => {
                self.tracker.complete(id);
            }
            FetchOutcome::Failure(failure) => {
                self.tracker.fail(id, &failure.message);
            }
        }
        Ok(outcome)
    }

    async fn batch_classified(
        &self,
        classified: &ClassifiedUrl,
        filters: &SelectionFilters,
    ) -> Result<BatchResult> {
        let work_dir = self.work_dir(&classified.id).await?;
        Ok(self
            .orchestrator()
            .run(&classified.normalized_url, filters, &work_dir, &self.cancel)
            .await)
    }
}
