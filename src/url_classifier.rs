//! URL classification and normalization
//!
//! Recognizes single-item links (watch, short, shorts, embed, live) and collection
//! links (playlist pages, or any item link carrying a `list` parameter), extracts
//! their identifiers and rewrites them to one canonical form per kind.
//! Classification is pure: no I/O and no panics on arbitrary input.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use url::Url;

#[allow(clippy::expect_used)]
static ITEM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("constant pattern"));

#[allow(clippy::expect_used)]
static COLLECTION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{2,64}$").expect("constant pattern"));

/// Hosts serving full watch pages
const WATCH_HOSTS: &[&str] = &["youtube.com", "m.youtube.com", "music.youtube.com"];

/// Host serving short links
const SHORT_HOST: &str = "youtu.be";

/// Path prefixes whose next segment is an item id
const ITEM_PATH_PREFIXES: &[&str] = &["shorts", "embed", "live", "v"];

/// Kind of URL recognized by [`classify`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlKind {
    /// A single item
    Single,
    /// A collection of items
    Collection,
    /// Not a recognized URL
    Invalid,
}

/// Result of classifying a URL
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedUrl {
    /// What the URL points at
    pub kind: UrlKind,
    /// Canonical form of the URL (the trimmed input when invalid)
    pub normalized_url: String,
    /// Item or collection identifier (empty when invalid)
    pub id: String,
}

impl ClassifiedUrl {
    fn single(id: &str) -> Self {
        Self {
            kind: UrlKind::Single,
            normalized_url: item_url(id),
            id: id.to_string(),
        }
    }

    fn collection(id: &str) -> Self {
        Self {
            kind: UrlKind::Collection,
            normalized_url: collection_url(id),
            id: id.to_string(),
        }
    }

    fn invalid(raw: &str) -> Self {
        Self {
            kind: UrlKind::Invalid,
            normalized_url: raw.to_string(),
            id: String::new(),
        }
    }

    /// Whether the URL was recognized
    pub fn is_valid(&self) -> bool {
        self.kind != UrlKind::Invalid
    }
}

/// Canonical URL of a single item
pub fn item_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// Canonical URL of a collection
pub fn collection_url(id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={}", id)
}

/// Classify and normalize a raw URL
///
/// Guarantees `classify(&classify(u).normalized_url) == classify(u)`.
///
/// # Examples
///
/// ```
/// use playlist_dl::url_classifier::{classify, UrlKind};
///
/// let short = classify("https://youtu.be/dQw4w9WgXcQ?t=42");
/// assert_eq!(short.kind, UrlKind::Single);
/// assert_eq!(short.id, "dQw4w9WgXcQ");
/// assert_eq!(short.normalized_url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
///
/// let list = classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabc123xyz");
/// assert_eq!(list.kind, UrlKind::Collection);
/// assert_eq!(list.normalized_url, "https://www.youtube.com/playlist?list=PLabc123xyz");
///
/// assert_eq!(classify("not a url").kind, UrlKind::Invalid);
/// ```
pub fn classify(raw: &str) -> ClassifiedUrl {
    let trimmed = raw.trim();
    match parse_lenient(trimmed) {
        Some(url) => classify_parsed(&url).unwrap_or_else(|| ClassifiedUrl::invalid(trimmed)),
        None => ClassifiedUrl::invalid(trimmed),
    }
}

/// Parse with or without an explicit scheme
fn parse_lenient(raw: &str) -> Option<Url> {
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return None;
    }

    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse(&format!("https://{}", raw)).ok()?
        }
        Err(_) => return None,
    };

    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn classify_parsed(url: &Url) -> Option<ClassifiedUrl> {
    let host = url.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let list_param = query_value(url, "list").filter(|id| COLLECTION_ID.is_match(id));
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    let item_id = if host == SHORT_HOST {
        segments.first().map(|s| s.to_string())
    } else if WATCH_HOSTS.contains(&host) {
        match segments.as_slice() {
            ["watch"] => query_value(url, "v"),
            ["playlist"] => None,
            [prefix, id, ..] if ITEM_PATH_PREFIXES.contains(prefix) => Some(id.to_string()),
            _ => None,
        }
    } else {
        return None;
    };

    if let Some(list_id) = list_param {
        let is_playlist_page = WATCH_HOSTS.contains(&host) && segments == ["playlist"];
        if is_playlist_page || item_id.is_some() {
            return Some(ClassifiedUrl::collection(&list_id));
        }
    }

    item_id
        .filter(|id| ITEM_ID.is_match(id))
        .map(|id| ClassifiedUrl::single(&id))
}

fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}
