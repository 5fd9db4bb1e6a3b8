//! Core types for playlist-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, ErrorKind, Result};
use crate::utils::sanitize_title;

/// One fetchable unit of media
///
/// The title is sanitized on construction. Fields are read-only afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    id: String,
    title: String,
    url: String,
    duration: Option<u64>,
    view_count: Option<u64>,
    uploader: Option<String>,
}

impl MediaItem {
    /// Create a new item, sanitizing the title
    pub fn new(id: impl Into<String>, title: &str, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: sanitize_title(title),
            url: url.into(),
            duration: None,
            view_count: None,
            uploader: None,
        }
    }

    /// Set the duration in seconds
    #[must_use]
    pub fn with_duration(mut self, seconds: Option<u64>) -> Self {
        self.duration = seconds;
        self
    }

    /// Set the view count
    #[must_use]
    pub fn with_view_count(mut self, views: Option<u64>) -> Self {
        self.view_count = views;
        self
    }

    /// Set the uploader name
    #[must_use]
    pub fn with_uploader(mut self, uploader: Option<String>) -> Self {
        self.uploader = uploader;
        self
    }

    /// Stable identifier assigned by the source
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sanitized title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Source URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Duration in seconds, if known
    pub fn duration(&self) -> Option<u64> {
        self.duration
    }

    /// View count, if known
    pub fn view_count(&self) -> Option<u64> {
        self.view_count
    }

    /// Uploader name, if known
    pub fn uploader(&self) -> Option<&str> {
        self.uploader.as_deref()
    }

    /// Duration as `MM:SS` or `HH:MM:SS`, or `"Unknown"`
    pub fn duration_formatted(&self) -> String {
        match self.duration {
            None | Some(0) => "Unknown".to_string(),
            Some(total) => {
                let hours = total / 3600;
                let minutes = (total % 3600) / 60;
                let seconds = total % 60;
                if hours > 0 {
                    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
                } else {
                    format!("{:02}:{:02}", minutes, seconds)
                }
            }
        }
    }

    /// View count abbreviated as `1.5M` / `2.3K`, or `"Unknown"`
    pub fn view_count_formatted(&self) -> String {
        match self.view_count {
            None | Some(0) => "Unknown".to_string(),
            Some(v) if v >= 1_000_000 => format!("{:.1}M", v as f64 / 1_000_000.0),
            Some(v) if v >= 1_000 => format!("{:.1}K", v as f64 / 1_000.0),
            Some(v) => v.to_string(),
        }
    }
}

/// An ordered group of items
///
/// Item order is the order reported by the backend and is significant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    id: String,
    title: String,
    url: String,
    items: Vec<MediaItem>,
}

impl CollectionInfo {
    /// Create an empty collection, sanitizing the title
    pub fn new(id: impl Into<String>, title: &str, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: sanitize_title(title),
            url: url.into(),
            items: Vec::new(),
        }
    }

    /// Append an item, preserving backend order
    pub fn push(&mut self, item: MediaItem) {
        self.items.push(item);
    }

    /// Collection identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sanitized title
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Source URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Items in backend order
    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items chosen by `filters`, in selection order, paired with their
    /// 1-based position in the collection
    pub fn select(&self, filters: &SelectionFilters) -> Vec<(usize, &MediaItem)> {
        filters
            .select_indices(self.items.len())
            .into_iter()
            .map(|i| (i + 1, &self.items[i]))
            .collect()
    }
}

/// Collection selection filters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionFilters {
    /// First item to include, 1-based (default: 1)
    #[serde(default = "default_start_index")]
    pub start_index: usize,

    /// Last item to include, 1-based inclusive; 0 means "to the end" (default: 0)
    #[serde(default)]
    pub end_index: usize,

    /// Reverse the selected range before capping (default: false)
    #[serde(default)]
    pub reverse_order: bool,

    /// Maximum number of items taken from the front of the selection (default: 50)
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

impl Default for SelectionFilters {
    fn default() -> Self {
        Self {
            start_index: default_start_index(),
            end_index: 0,
            reverse_order: false,
            max_items: default_max_items(),
        }
    }
}

impl SelectionFilters {
    /// Reject filters that can never select anything meaningful
    pub fn validate(&self) -> Result<()> {
        if self.start_index == 0 {
            return Err(Error::config("filters.start_index", "must be at least 1"));
        }
        if self.max_items == 0 {
            return Err(Error::config("filters.max_items", "must be at least 1"));
        }
        Ok(())
    }

    /// 0-based indices selected from a collection of `len` items
    ///
    /// Slices `[start_index - 1, end_index)` clamped to `[0, len]`, reverses the
    /// slice if requested, then keeps the first `max_items`.
    ///
    /// # Examples
    ///
    /// ```
    /// use playlist_dl::SelectionFilters;
    ///
    /// let filters = SelectionFilters { start_index: 3, end_index: 7, ..Default::default() };
    /// assert_eq!(filters.select_indices(10), vec![2, 3, 4, 5, 6]);
    /// ```
    pub fn select_indices(&self, len: usize) -> Vec<usize> {
        let start = self.start_index.saturating_sub(1).min(len);
        let end = if self.end_index == 0 {
            len
        } else {
            self.end_index.min(len)
        };

        if start >= end {
            return Vec::new();
        }

        let mut indices: Vec<usize> = (start..end).collect();
        if self.reverse_order {
            indices.reverse();
        }
        indices.truncate(self.max_items);
        indices
    }
}

fn default_start_index() -> usize {
    1
}

fn default_max_items() -> usize {
    50
}

/// Details of a successful fetch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchSuccess {
    /// Path of the produced artifact
    ///
    /// For a batch item this directory is removed once the archive is written,
    /// unless `batch.keep_item_files` is set.
    pub path: PathBuf,
    /// Artifact size in bytes
    pub size_bytes: u64,
    /// Wall-clock time spent on the fetch, including failed strategies
    pub elapsed: Duration,
    /// Title reported by the backend
    pub title: String,
    /// Duration in seconds reported by the backend
    pub duration: Option<u64>,
    /// Name of the strategy that succeeded
    pub strategy: String,
    /// Attempt (pass over the strategy list) on which it succeeded, 1-based
    pub attempt: u32,
}

/// Details of a failed fetch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FetchFailure {
    /// Classification of the last error
    pub kind: ErrorKind,
    /// Human-readable message, annotated with the attempt count
    pub message: String,
    /// Number of attempts made before giving up
    pub attempts: u32,
}

impl FetchFailure {
    /// Remediation hint for presentation layers
    pub fn remediation(&self) -> &'static str {
        self.kind.remediation()
    }
}

/// Result of fetching one item: exactly one of success or failure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// An artifact was produced
    Success(FetchSuccess),
    /// Every strategy was exhausted
    Failure(FetchFailure),
}

impl FetchOutcome {
    /// Whether the fetch succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// Success details, if any
    pub fn success(&self) -> Option<&FetchSuccess> {
        match self {
            FetchOutcome::Success(s) => Some(s),
            FetchOutcome::Failure(_) => None,
        }
    }

    /// Failure details, if any
    pub fn failure(&self) -> Option<&FetchFailure> {
        match self {
            FetchOutcome::Success(_) => None,
            FetchOutcome::Failure(f) => Some(f),
        }
    }
}

/// One item's outcome inside a batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// 1-based position in the selection order
    pub ordinal: usize,
    /// 1-based position in the collection
    pub position: usize,
    /// The item that was fetched
    pub item: MediaItem,
    /// What happened
    pub outcome: FetchOutcome,
}

/// The packaged archive of a batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    /// Archive path
    pub path: PathBuf,
    /// Archive size in bytes
    pub size_bytes: u64,
    /// Entry names in archive order
    pub entries: Vec<String>,
}

/// Result of a collection download
///
/// Success and failure counts are derived from `outcomes` on every call, so
/// `success_count() + failure_count() == outcomes().len()` always holds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    collection: Option<CollectionInfo>,
    requested: usize,
    outcomes: Vec<ItemOutcome>,
    archive: Option<ArchiveInfo>,
    listing_error: Option<FetchFailure>,
    cancelled: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl BatchResult {
    /// Start a batch over `collection` with `requested` selected items
    pub fn new(collection: CollectionInfo, requested: usize) -> Self {
        Self {
            collection: Some(collection),
            requested,
            outcomes: Vec::new(),
            archive: None,
            listing_error: None,
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// A batch that never started because the collection listing failed
    pub fn listing_failed(failure: FetchFailure) -> Self {
        let now = Utc::now();
        Self {
            collection: None,
            requested: 0,
            outcomes: Vec::new(),
            archive: None,
            listing_error: Some(failure),
            cancelled: false,
            started_at: now,
            finished_at: Some(now),
        }
    }

    /// Record an item's outcome, keeping outcomes sorted by ordinal
    pub fn record(&mut self, outcome: ItemOutcome) {
        let pos = self
            .outcomes
            .partition_point(|o| o.ordinal <= outcome.ordinal);
        self.outcomes.insert(pos, outcome);
    }

    pub(crate) fn set_archive(&mut self, archive: ArchiveInfo) {
        self.archive = Some(archive);
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// The resolved collection (None if the listing failed)
    pub fn collection(&self) -> Option<&CollectionInfo> {
        self.collection.as_ref()
    }

    /// Number of items selected for download
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Per-item outcomes in selection order
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    /// Number of successful items
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_success()).count()
    }

    /// Number of failed items
    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }

    /// Successful items in selection order
    pub fn successes(&self) -> impl Iterator<Item = (&ItemOutcome, &FetchSuccess)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.outcome.success().map(|s| (o, s)))
    }

    /// Failed items in selection order
    pub fn failures(&self) -> impl Iterator<Item = (&ItemOutcome, &FetchFailure)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.outcome.failure().map(|f| (o, f)))
    }

    /// Success rate as a percentage (0.0 for an empty batch)
    pub fn success_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        self.success_count() as f64 / self.outcomes.len() as f64 * 100.0
    }

    /// The packaged archive, if one was produced
    pub fn archive(&self) -> Option<&ArchiveInfo> {
        self.archive.as_ref()
    }

    /// The listing failure, if the collection could not be resolved
    pub fn listing_error(&self) -> Option<&FetchFailure> {
        self.listing_error.as_ref()
    }

    /// Whether the host cancelled the batch before every item was attempted
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Whether the batch failed overall
    ///
    /// True when the listing failed or no item succeeded.
    pub fn is_failed(&self) -> bool {
        self.listing_error.is_some() || self.success_count() == 0
    }

    /// When the batch started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Total wall-clock time, once finished
    pub fn total_elapsed(&self) -> Option<Duration> {
        self.finished_at
            .and_then(|end| (end - self.started_at).to_std().ok())
    }
}

/// Progress status of one tracked item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// Registered, not started
    Pending,
    /// Bytes are flowing
    Downloading,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

/// Progress of one tracked item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Item identifier
    pub id: String,
    /// Item title
    pub title: String,
    /// Current status
    pub status: ProgressStatus,
    /// Progress fraction in `[0.0, 1.0]`
    pub progress: f32,
    /// Speed text (e.g. "1.2 MiB/s")
    pub speed: String,
    /// ETA text (e.g. "00:42")
    pub eta: String,
    /// Size text (e.g. "12.3 MB")
    pub size: String,
    /// Error message, once failed
    pub error: Option<String>,
}

/// Counts of tracked items per status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    /// Items registered but not started
    pub pending: usize,
    /// Items downloading
    pub downloading: usize,
    /// Items completed
    pub completed: usize,
    /// Items failed
    pub failed: usize,
}

impl ProgressSummary {
    /// Total number of tracked items
    pub fn total(&self) -> usize {
        self.pending + self.downloading + self.completed + self.failed
    }
}

/// Event emitted by the progress tracker after each mutation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Item registered
    Registered {
        /// Item identifier
        id: String,
        /// Item title
        title: String,
    },

    /// Display title replaced, typically once the backend resolved the item
    Titled {
        /// Item identifier
        id: String,
        /// New title
        title: String,
    },

    /// Progress update
    Progress {
        /// Item identifier
        id: String,
        /// Progress fraction in `[0.0, 1.0]`
        progress: f32,
        /// Speed text
        speed: String,
        /// ETA text
        eta: String,
    },

    /// Item completed
    Completed {
        /// Item identifier
        id: String,
    },

    /// Item failed
    Failed {
        /// Item identifier
        id: String,
        /// Error message
        error: String,
    },

    /// Completed records removed
    Cleared {
        /// Number of records removed
        removed: usize,
    },
}
