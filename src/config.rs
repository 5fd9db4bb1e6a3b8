//! Configuration types for playlist-dl
//!
//! Every recognized backend option is an explicit field with a documented default.
//! All structs deserialize from partial input: missing fields take their defaults.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf, time::Duration};

/// Desktop browser User-Agent sent by the standard strategy
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Requested video quality
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    /// Best available rendition
    Best,
    /// Worst available rendition
    Worst,
    /// Best rendition no taller than the given height in pixels
    MaxHeight(u32),
}

impl Default for Quality {
    fn default() -> Self {
        Quality::MaxHeight(720)
    }
}

/// Requested output container
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// MP4 video
    #[default]
    Mp4,
    /// WebM video
    Webm,
    /// MP3 audio extracted from the best audio stream
    Mp3Audio,
}

impl OutputFormat {
    /// Container extension used in format selectors
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Webm => "webm",
            OutputFormat::Mp3Audio => "mp3",
        }
    }

    /// Whether this format requires audio extraction
    pub fn is_audio_only(&self) -> bool {
        matches!(self, OutputFormat::Mp3Audio)
    }
}

/// Where the backend should read cookies from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieSource {
    /// Netscape-format cookie file
    File(PathBuf),
    /// Browser profile name (e.g. "firefox", "chrome")
    Browser(String),
}

/// Per-item request configuration sent to the media backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Requested quality (default: at most 720p)
    #[serde(default)]
    pub quality: Quality,

    /// Requested output format (default: mp4)
    #[serde(default)]
    pub format: OutputFormat,

    /// HTTP headers sent with every request (default: desktop User-Agent and Accept-Language)
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,

    /// Socket timeout for backend network calls (default: 30 seconds)
    #[serde(default = "default_socket_timeout", with = "duration_secs")]
    pub socket_timeout: Duration,

    /// Retry count the backend applies internally to a single request (default: 3)
    #[serde(default = "default_backend_retries")]
    pub backend_retries: u32,

    /// Cookie source for authenticated or age-gated content
    #[serde(default)]
    pub cookie_source: Option<CookieSource>,

    /// Proxy URL (e.g. "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy: Option<String>,

    /// Output filename template relative to the output directory
    #[serde(default = "default_output_template")]
    pub output_template: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            format: OutputFormat::default(),
            headers: default_headers(),
            socket_timeout: default_socket_timeout(),
            backend_retries: default_backend_retries(),
            cookie_source: None,
            proxy: None,
            output_template: default_output_template(),
        }
    }
}

impl FetchConfig {
    /// Format selector string understood by the backend
    ///
    /// # Examples
    ///
    /// ```
    /// use playlist_dl::config::{FetchConfig, OutputFormat, Quality};
    ///
    /// let config = FetchConfig {
    ///     quality: Quality::MaxHeight(720),
    ///     format: OutputFormat::Mp4,
    ///     ..Default::default()
    /// };
    /// assert_eq!(
    ///     config.format_selector(),
    ///     "best[height<=720][ext=mp4]/best[height<=720]/best"
    /// );
    /// ```
    pub fn format_selector(&self) -> String {
        if self.format.is_audio_only() {
            return "bestaudio/best".to_string();
        }

        let ext = self.format.extension();
        match self.quality {
            Quality::Best => format!("best[ext={ext}]/best"),
            Quality::Worst => format!("worst[ext={ext}]/worst"),
            Quality::MaxHeight(h) => {
                format!("best[height<={h}][ext={ext}]/best[height<={h}]/best")
            }
        }
    }
}

/// Retry behavior of the fetch strategy engine
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of passes over the strategy list (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the wait between passes (default: 1 second)
    #[serde(default = "default_min_backoff", with = "duration_millis")]
    pub min_backoff: Duration,

    /// Upper bound of the wait between passes (default: 3 seconds)
    #[serde(default = "default_max_backoff", with = "duration_millis")]
    pub max_backoff: Duration,

    /// Randomize the wait between the bounds (default: true)
    ///
    /// When disabled the wait is always `min_backoff`.
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            min_backoff: default_min_backoff(),
            max_backoff: default_max_backoff(),
            jitter: true,
        }
    }
}

/// Collection download behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum items fetched at once (default: 1, strictly sequential)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Pause between sequential items (default: 1 second)
    #[serde(default = "default_inter_item_delay", with = "duration_millis")]
    pub inter_item_delay: Duration,

    /// Package successful artifacts into a ZIP archive (default: true)
    #[serde(default = "default_true")]
    pub create_archive: bool,

    /// Hard cap on items selected from one collection (default: 100)
    #[serde(default = "default_max_collection_size")]
    pub max_collection_size: usize,

    /// Keep per-item directories after they were packaged (default: false)
    ///
    /// When false, a successfully written archive replaces the loose files and
    /// the `path` of each success points into a directory that no longer exists.
    #[serde(default)]
    pub keep_item_files: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            inter_item_delay: default_inter_item_delay(),
            create_archive: true,
            max_collection_size: default_max_collection_size(),
            keep_item_files: false,
        }
    }
}

/// Main configuration for [`Downloader`](crate::Downloader)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Root directory for downloaded artifacts (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Backend request options
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Strategy engine retry behavior
    #[serde(default)]
    pub retry: RetryConfig,

    /// Collection download behavior
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            fetch: FetchConfig::default(),
            retry: RetryConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Config {
    /// Check option combinations that would make the engine misbehave
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.min_backoff > self.retry.max_backoff {
            return Err(Error::config(
                "retry.min_backoff",
                "must not exceed retry.max_backoff",
            ));
        }
        if self.batch.max_concurrent == 0 {
            return Err(Error::config("batch.max_concurrent", "must be at least 1"));
        }
        if self.fetch.socket_timeout.is_zero() {
            return Err(Error::config("fetch.socket_timeout", "must be non-zero"));
        }
        Ok(())
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string()),
        (
            "Accept-Language".to_string(),
            "en-US,en;q=0.9".to_string(),
        ),
    ])
}

fn default_socket_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_backend_retries() -> u32 {
    3
}

fn default_output_template() -> String {
    "%(title)s.%(ext)s".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_min_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(3)
}

fn default_max_concurrent() -> usize {
    1
}

fn default_inter_item_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_collection_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

// Duration serialization helpers
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
