//! Media backend abstraction
//!
//! The backend resolves metadata, lists collections and produces media files
//! on disk. Everything site-specific lives behind [`MediaBackend`]; the engine
//! only interprets the outcomes.

mod ytdlp;

pub use ytdlp::YtDlpBackend;

use crate::error::Result;
use crate::progress::ItemProgress;
use crate::strategy::FetchRequest;
use crate::types::{CollectionInfo, MediaItem};
use crate::url_classifier::item_url;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata of a single resolvable item
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMedia {
    /// Stable item identifier
    pub id: String,
    /// Title as reported by the site
    pub title: String,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<u64>,
    /// View count
    #[serde(default)]
    pub view_count: Option<u64>,
    /// Uploader name
    #[serde(default)]
    pub uploader: Option<String>,
}

impl ResolvedMedia {
    /// Convert into a [`MediaItem`] for `url`
    pub fn into_item(self, url: &str) -> MediaItem {
        MediaItem::new(self.id, &self.title, url)
            .with_duration(self.duration)
            .with_view_count(self.view_count)
            .with_uploader(self.uploader)
    }
}

/// One entry of a collection listing
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingEntry {
    /// Item identifier (entries without one are dropped)
    #[serde(default)]
    pub id: String,
    /// Item title
    #[serde(default)]
    pub title: String,
    /// Item URL (defaults to the canonical URL of `id`)
    #[serde(default)]
    pub url: Option<String>,
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<u64>,
}

/// Ordered listing of a collection
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionListing {
    /// Collection identifier
    pub id: String,
    /// Collection title
    pub title: String,
    /// Entries in site order
    pub entries: Vec<ListingEntry>,
}

impl CollectionListing {
    /// Convert into a [`CollectionInfo`], keeping entry order
    pub fn into_collection(self, url: &str) -> CollectionInfo {
        let title = if self.title.trim().is_empty() {
            "Unknown Playlist"
        } else {
            self.title.as_str()
        };
        let mut collection = CollectionInfo::new(self.id.clone(), title, url);

        for entry in self.entries {
            if entry.id.trim().is_empty() {
                tracing::debug!(title = %entry.title, "dropping listing entry without id");
                continue;
            }
            let url = entry
                .url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| item_url(&entry.id));
            let title = if entry.title.is_empty() {
                "Unknown"
            } else {
                entry.title.as_str()
            };
            collection.push(MediaItem::new(entry.id.clone(), title, url).with_duration(entry.duration));
        }

        collection
    }
}

/// Trait for media backends
///
/// Implementations report failures as [`Error::Backend`](crate::Error::Backend)
/// carrying the site's error text, so the engine can classify it.
///
/// # Examples
///
/// ```no_run
/// use playlist_dl::backend::{MediaBackend, YtDlpBackend};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = YtDlpBackend::from_path().expect("yt-dlp not found in PATH");
/// let listing = backend
///     .list_collection("https://www.youtube.com/playlist?list=PL123", std::time::Duration::from_secs(30))
///     .await?;
/// println!("{} entries", listing.entries.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Resolve item metadata using the request's configuration
    async fn resolve(&self, url: &str, request: &FetchRequest) -> Result<ResolvedMedia>;

    /// Download the item into `output_dir`
    ///
    /// Returns the artifact path when the backend knows it. Backends that only
    /// guarantee "a matching file appeared" return `None` and the caller
    /// locates the file itself.
    async fn fetch(
        &self,
        url: &str,
        request: &FetchRequest,
        output_dir: &Path,
        progress: &ItemProgress,
    ) -> Result<Option<PathBuf>>;

    /// List the items of a collection in site order
    async fn list_collection(
        &self,
        url: &str,
        socket_timeout: std::time::Duration,
    ) -> Result<CollectionListing>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
