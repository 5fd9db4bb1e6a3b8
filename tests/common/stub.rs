//! Scriptable in-memory media backend

use async_trait::async_trait;
use playlist_dl::backend::{CollectionListing, ListingEntry, MediaBackend, ResolvedMedia};
use playlist_dl::{Error, FetchRequest, ItemProgress, Result};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// How a scripted item fails
#[derive(Clone, Debug)]
enum Failure {
    /// Every strategy fails with this message
    Always(String),
    /// Only the listed strategies fail
    Strategies(HashSet<String>, String),
}

/// Backend whose behavior is scripted per collection and per item
///
/// Items succeed by default: `fetch` writes `<output_dir>/Title <id>.mp4` and
/// leaves it to the caller to locate the file.
#[derive(Default)]
pub struct StubBackend {
    collections: HashMap<String, std::result::Result<CollectionListing, String>>,
    failures: HashMap<String, Failure>,
    delays: HashMap<String, Duration>,
    no_artifact: HashSet<String>,
    resolve_calls: Mutex<Vec<(String, String)>>,
    list_calls: AtomicU32,
    active_fetches: AtomicUsize,
    max_active_fetches: AtomicUsize,
}

/// Display title the stub reports for `id`
pub fn stub_title(id: &str) -> String {
    format!("Title {id}")
}

/// Canonical URL of a stub collection
pub fn collection_url(id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={id}")
}

/// Eleven-character item id with a numeric suffix, e.g. `item0000003`
pub fn item_id(n: usize) -> String {
    format!("item{:07}", n)
}

fn query_value(url: &str, key: &str) -> String {
    url.split(['?', '&'])
        .find_map(|pair| pair.strip_prefix(&format!("{key}=")))
        .unwrap_or_default()
        .to_string()
}

impl StubBackend {
    /// Empty backend: every listing fails, every item succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection whose entries are `item_ids`, in order
    pub fn with_collection(mut self, id: &str, title: &str, item_ids: &[String]) -> Self {
        let entries = item_ids
            .iter()
            .map(|item| ListingEntry {
                id: item.clone(),
                title: stub_title(item),
                url: None,
                duration: Some(60),
            })
            .collect();

        self.collections.insert(
            id.to_string(),
            Ok(CollectionListing {
                id: id.to_string(),
                title: title.to_string(),
                entries,
            }),
        );
        self
    }

    /// Make listing collection `id` fail with `message`
    pub fn with_listing_error(mut self, id: &str, message: &str) -> Self {
        self.collections
            .insert(id.to_string(), Err(message.to_string()));
        self
    }

    /// Make every strategy fail for `item`
    pub fn fail_item(mut self, item: &str, message: &str) -> Self {
        self.failures
            .insert(item.to_string(), Failure::Always(message.to_string()));
        self
    }

    /// Make only `strategies` fail for `item`
    pub fn fail_item_strategies(mut self, item: &str, strategies: &[&str], message: &str) -> Self {
        let set = strategies.iter().map(|s| s.to_string()).collect();
        self.failures.insert(
            item.to_string(),
            Failure::Strategies(set, message.to_string()),
        );
        self
    }

    /// Make fetching `item` take `delay`
    pub fn delay_item(mut self, item: &str, delay: Duration) -> Self {
        self.delays.insert(item.to_string(), delay);
        self
    }

    /// Make fetching `item` report success without writing any file
    pub fn without_artifact(mut self, item: &str) -> Self {
        self.no_artifact.insert(item.to_string());
        self
    }

    /// Every `(item id, strategy)` pair passed to `resolve`, in call order
    pub fn resolve_calls(&self) -> Vec<(String, String)> {
        self.resolve_calls.lock().unwrap().clone()
    }

    /// Number of `resolve` calls for one item
    pub fn calls_for(&self, item: &str) -> usize {
        self.resolve_calls()
            .iter()
            .filter(|(id, _)| id == item)
            .count()
    }

    /// Number of `list_collection` calls
    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at once
    pub fn max_active_fetches(&self) -> usize {
        self.max_active_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaBackend for StubBackend {
    async fn resolve(&self, url: &str, request: &FetchRequest) -> Result<ResolvedMedia> {
        let id = query_value(url, "v");
        self.resolve_calls
            .lock()
            .unwrap()
            .push((id.clone(), request.strategy.clone()));

        match self.failures.get(&id) {
            Some(Failure::Always(message)) => return Err(Error::backend(message.clone())),
            Some(Failure::Strategies(strategies, message))
                if strategies.contains(&request.strategy) =>
            {
                return Err(Error::backend(message.clone()));
            }
            _ => {}
        }

        Ok(ResolvedMedia {
            title: stub_title(&id),
            id,
            duration: Some(60),
            view_count: Some(1_000),
            uploader: Some("stub".to_string()),
        })
    }

    async fn fetch(
        &self,
        url: &str,
        _request: &FetchRequest,
        output_dir: &Path,
        progress: &ItemProgress,
    ) -> Result<Option<PathBuf>> {
        let id = query_value(url, "v");

        let active = self.active_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_fetches.fetch_max(active, Ordering::SeqCst);

        progress.report(0.5, "1.00MiB/s", "00:01", "1.0 MB");
        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }

        let written = if self.no_artifact.contains(&id) {
            Ok(())
        } else {
            let path = output_dir.join(format!("{}.mp4", stub_title(&id)));
            tokio::fs::write(&path, id.as_bytes()).await
        };

        self.active_fetches.fetch_sub(1, Ordering::SeqCst);
        written?;
        Ok(None)
    }

    async fn list_collection(&self, url: &str, _timeout: Duration) -> Result<CollectionListing> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let id = query_value(url, "list");

        match self.collections.get(&id) {
            Some(Ok(listing)) => Ok(listing.clone()),
            Some(Err(message)) => Err(Error::backend(message.clone())),
            None => Err(Error::backend(format!("HTTP Error 404: playlist {id} not found"))),
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
