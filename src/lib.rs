//! # playlist-dl
//!
//! Resilient video and playlist download orchestration.
//!
//! ## Design Philosophy
//!
//! playlist-dl is designed to be:
//! - **Resilient** - Every item walks an ordered chain of fallback strategies with
//!   randomized backoff before it is reported as failed
//! - **Honest about failure** - Outcomes are data: each failure carries a
//!   classification (forbidden, not found, timeout, other) and the attempt count
//! - **Library-first** - No CLI or UI; the site-specific work sits behind the
//!   [`MediaBackend`] trait
//! - **Observable** - A shared [`ProgressTracker`] exposes snapshots and an event stream
//!
//! ## Quick Start
//!
//! ```no_run
//! use playlist_dl::{Config, Downloader, DownloadReport, SelectionFilters};
//! use playlist_dl::backend::YtDlpBackend;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = YtDlpBackend::from_path().ok_or("yt-dlp not found in PATH")?;
//!     let downloader = Downloader::new(Config::default(), Arc::new(backend))?;
//!
//!     // Subscribe to progress events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let filters = SelectionFilters { start_index: 1, end_index: 10, ..Default::default() };
//!     let report = downloader
//!         .download("https://www.youtube.com/playlist?list=PL0123456789", &filters)
//!         .await?;
//!
//!     if let DownloadReport::Batch(result) = report {
//!         println!(
//!             "{} of {} items downloaded ({:.1}%)",
//!             result.success_count(),
//!             result.requested(),
//!             result.success_rate()
//!         );
//!         for (item, failure) in result.failures() {
//!             println!("{}: {} ({})", item.item.title(), failure.message, failure.remediation());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Ordered ZIP packaging
pub mod archive;
/// Media backend abstraction and the yt-dlp implementation
pub mod backend;
/// Collection download orchestration
pub mod batch;
/// Configuration types
pub mod config;
/// High-level downloader facade
pub mod downloader;
/// Fetch strategy engine
pub mod engine;
/// Error types
pub mod error;
/// Downloaded file resolution
pub mod file_resolver;
/// Thread-safe progress tracking
pub mod progress;
/// Retry classification and backoff
pub mod retry;
/// Fallback fetch strategies
pub mod strategy;
/// Core types and events
pub mod types;
/// URL classification and normalization
pub mod url_classifier;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use backend::{MediaBackend, YtDlpBackend};
pub use batch::BatchOrchestrator;
pub use config::{BatchConfig, Config, CookieSource, FetchConfig, OutputFormat, Quality, RetryConfig};
pub use downloader::{DownloadReport, Downloader};
pub use engine::FetchEngine;
pub use error::{Error, ErrorKind, Result};
pub use progress::{ItemProgress, ProgressTracker};
pub use strategy::{FetchRequest, Strategy};
pub use types::{
    ArchiveInfo, BatchResult, CollectionInfo, Event, FetchFailure, FetchOutcome, FetchSuccess,
    ItemOutcome, MediaItem, ProgressRecord, ProgressStatus, ProgressSummary, SelectionFilters,
};
pub use url_classifier::{ClassifiedUrl, UrlKind, classify};
pub use utils::{format_size, sanitize_title};

/// Cancellation token accepted by the engine and the orchestrator
pub use tokio_util::sync::CancellationToken;
