//! Media backend driving the external `yt-dlp` binary

use super::{CollectionListing, ListingEntry, MediaBackend, ResolvedMedia};
use crate::config::CookieSource;
use crate::error::{Error, Result};
use crate::progress::ItemProgress;
use crate::strategy::FetchRequest;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::LazyLock;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

#[allow(clippy::expect_used)]
static PROGRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[download\]\s+(?P<pct>\d+(?:\.\d+)?)%\s+of\s+~?\s*(?P<size>\S+)(?:\s+at\s+(?P<speed>Unknown B/s|\S+))?(?:\s+ETA\s+(?P<eta>\S+))?",
    )
    .expect("constant pattern")
});

/// Grace period added on top of the network budget for metadata calls
const METADATA_GRACE: Duration = Duration::from_secs(30);

/// Media backend using the external `yt-dlp` binary
///
/// # Examples
///
/// ```no_run
/// use playlist_dl::backend::YtDlpBackend;
/// use std::path::PathBuf;
///
/// // Explicit path
/// let backend = YtDlpBackend::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let backend = YtDlpBackend::from_path().expect("yt-dlp not found in PATH");
/// ```
#[derive(Clone, Debug)]
pub struct YtDlpBackend {
    binary_path: PathBuf,
}

impl YtDlpBackend {
    /// Create a backend with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find `yt-dlp` in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Path of the binary this backend runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Run a metadata command to completion and return its stdout
    async fn run_capture(&self, args: &[String], deadline: Duration) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.binary_path);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match tokio::time::timeout(deadline, command.output()).await {
            Ok(result) => result
                .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?,
            Err(_) => {
                return Err(Error::backend(format!(
                    "yt-dlp timed out after {}s",
                    deadline.as_secs()
                )));
            }
        };

        if !output.status.success() {
            return Err(backend_error(&output.stderr, output.status));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    async fn resolve(&self, url: &str, request: &FetchRequest) -> Result<ResolvedMedia> {
        let args = resolve_args(url, request);
        let deadline = metadata_deadline(request.socket_timeout, request.backend_retries);

        tracing::debug!(url = %url, strategy = %request.strategy, "resolving metadata");
        let stdout = self.run_capture(&args, deadline).await?;
        parse_resolved(&stdout)
    }

    async fn fetch(
        &self,
        url: &str,
        request: &FetchRequest,
        output_dir: &Path,
        progress: &ItemProgress,
    ) -> Result<Option<PathBuf>> {
        let args = fetch_args(url, request, output_dir);

        tracing::debug!(url = %url, strategy = %request.strategy, dir = %output_dir.display(), "starting yt-dlp download");
        let mut child = Command::new(&self.binary_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stdout unavailable".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stderr unavailable".to_string()))?;

        // Drain stderr alongside stdout
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = stderr.read_to_end(&mut buf).await;
            buf
        });

        // Titles may reach stdout in the platform encoding, so lines are decoded lossily
        let mut destination = None;
        let mut reader = BufReader::new(stdout);
        let mut raw = Vec::new();
        loop {
            raw.clear();
            match reader.read_until(b'\n', &mut raw).await {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "yt-dlp stdout read failed");
                    break;
                }
            }

            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if let Some(update) = parse_progress_line(line) {
                progress.report(update.fraction, &update.speed, &update.eta, &update.size);
            } else if let Some(path) = parse_destination(line) {
                destination = Some(path);
            }
        }

        let status = child.wait().await?;
        let stderr = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(backend_error(&stderr, status));
        }

        match destination {
            Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => Ok(Some(path)),
            _ => Ok(None),
        }
    }

    async fn list_collection(
        &self,
        url: &str,
        socket_timeout: Duration,
    ) -> Result<CollectionListing> {
        let args = list_args(url, socket_timeout);

        tracing::debug!(url = %url, "listing collection");
        let stdout = self
            .run_capture(&args, metadata_deadline(socket_timeout, 0))
            .await?;
        parse_listing(&stdout)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

fn metadata_deadline(socket_timeout: Duration, retries: u32) -> Duration {
    socket_timeout
        .saturating_mul(retries.saturating_add(1))
        .saturating_add(METADATA_GRACE)
}

/// Options shared by every request made on behalf of a strategy
fn network_args(request: &FetchRequest) -> Vec<String> {
    let mut args = vec![
        "--socket-timeout".to_string(),
        request.socket_timeout.as_secs().max(1).to_string(),
        "--retries".to_string(),
        request.backend_retries.to_string(),
    ];

    for (name, value) in &request.headers {
        args.push("--add-header".to_string());
        args.push(format!("{}:{}", name, value));
    }

    match &request.cookie_source {
        Some(CookieSource::File(path)) => {
            args.push("--cookies".to_string());
            args.push(path.to_string_lossy().into_owned());
        }
        Some(CookieSource::Browser(browser)) => {
            args.push("--cookies-from-browser".to_string());
            args.push(browser.clone());
        }
        None => {}
    }

    if let Some(proxy) = &request.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    args
}

pub(crate) fn resolve_args(url: &str, request: &FetchRequest) -> Vec<String> {
    let mut args: Vec<String> = ["--dump-single-json", "--no-playlist", "--skip-download"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.extend(network_args(request));
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

pub(crate) fn list_args(url: &str, socket_timeout: Duration) -> Vec<String> {
    vec![
        "--flat-playlist".to_string(),
        "--dump-single-json".to_string(),
        "--socket-timeout".to_string(),
        socket_timeout.as_secs().max(1).to_string(),
        "--".to_string(),
        url.to_string(),
    ]
}

pub(crate) fn fetch_args(url: &str, request: &FetchRequest, output_dir: &Path) -> Vec<String> {
    let template = output_dir.join(&request.output_template);
    let mut args = vec![
        "--newline".to_string(),
        "--no-playlist".to_string(),
        "-f".to_string(),
        request.format_selector.clone(),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
    ];
    args.extend(network_args(request));

    if request.extract_audio {
        args.extend(
            ["-x", "--audio-format", "mp3", "--audio-quality", "192K"]
                .iter()
                .map(|s| s.to_string()),
        );
    }

    args.push("--".to_string());
    args.push(url.to_string());
    args
}

/// A parsed `[download]` progress line
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ProgressLine {
    pub fraction: f32,
    pub size: String,
    pub speed: String,
    pub eta: String,
}

pub(crate) fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let caps = PROGRESS_LINE.captures(line.trim())?;
    let pct: f32 = caps.name("pct")?.as_str().parse().ok()?;
    let text = |name: &str| {
        caps.name(name)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };

    Some(ProgressLine {
        fraction: (pct / 100.0).clamp(0.0, 1.0),
        size: text("size"),
        speed: text("speed"),
        eta: text("eta"),
    })
}

/// Extract the artifact path announced on a yt-dlp output line
///
/// Later announcements supersede earlier ones: a merge or audio extraction
/// replaces the intermediate download.
pub(crate) fn parse_destination(line: &str) -> Option<PathBuf> {
    let line = line.trim();

    for prefix in ["[download] Destination: ", "[ExtractAudio] Destination: "] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return Some(PathBuf::from(rest.trim()));
        }
    }

    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into ") {
        return Some(PathBuf::from(rest.trim().trim_matches('"')));
    }

    line.strip_prefix("[download] ")
        .and_then(|rest| rest.strip_suffix(" has already been downloaded"))
        .map(|path| PathBuf::from(path.trim()))
}

/// Error text of a failed run: the `ERROR:` lines, or the last line of stderr
fn backend_error(stderr: &[u8], status: ExitStatus) -> Error {
    let text = String::from_utf8_lossy(stderr);
    let errors: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("ERROR"))
        .collect();

    let message = if !errors.is_empty() {
        errors.join("; ")
    } else if let Some(last) = text.lines().map(str::trim).rev().find(|l| !l.is_empty()) {
        last.to_string()
    } else {
        format!("yt-dlp exited with {}", status)
    };

    Error::backend(message)
}

#[derive(Deserialize)]
struct RawMedia {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    view_count: Option<u64>,
    #[serde(default)]
    uploader: Option<String>,
}

#[derive(Deserialize)]
struct RawListing {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    entries: Vec<Option<RawEntry>>,
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

fn whole_seconds(duration: Option<f64>) -> Option<u64> {
    duration
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d.round() as u64)
}

pub(crate) fn parse_resolved(json: &[u8]) -> Result<ResolvedMedia> {
    let raw: RawMedia = serde_json::from_slice(json)?;
    Ok(ResolvedMedia {
        id: raw.id,
        title: raw.title.unwrap_or_else(|| "Unknown".to_string()),
        duration: whole_seconds(raw.duration),
        view_count: raw.view_count,
        uploader: raw.uploader,
    })
}

pub(crate) fn parse_listing(json: &[u8]) -> Result<CollectionListing> {
    let raw: RawListing = serde_json::from_slice(json)?;
    let entries = raw
        .entries
        .into_iter()
        .flatten()
        .map(|entry| ListingEntry {
            id: entry.id.unwrap_or_default(),
            title: entry.title.unwrap_or_default(),
            url: entry.url,
            duration: whole_seconds(entry.duration),
        })
        .collect();

    Ok(CollectionListing {
        id: raw.id.unwrap_or_default(),
        title: raw.title.unwrap_or_default(),
        entries,
    })
}
