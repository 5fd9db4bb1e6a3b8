//! Error types for playlist-dl
//!
//! This module provides the library's error handling:
//! - [`Error`], the typed error returned by fallible operations
//! - [`ErrorKind`], the caller-visible classification attached to every fetch failure
//!
//! Fetch and batch failures are normally reported as data
//! ([`FetchOutcome`](crate::types::FetchOutcome), [`BatchResult`](crate::types::BatchResult)).
//! `Error` is reserved for invalid input, configuration mistakes, and local I/O problems.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for playlist-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for playlist-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_attempts")
        key: Option<String>,
    },

    /// The input string is not a recognized item or collection URL
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The media backend rejected or failed a request
    #[error("backend error ({kind}): {message}")]
    Backend {
        /// Classification derived from the backend's error text
        kind: ErrorKind,
        /// Backend error text, verbatim
        message: String,
    },

    /// No media artifact could be located after a fetch
    #[error("no media file for {title:?} found in {}", dir.display())]
    FileNotFound {
        /// Directory that was searched
        dir: PathBuf,
        /// Title the artifact was expected to carry
        title: String,
    },

    /// Archive packaging failed
    #[error("archive error: {0}")]
    Archive(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP writer error
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (yt-dlp missing, spawn failure, etc.)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation was cancelled by the host
    #[error("operation cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a backend error, classifying the message text
    pub fn backend(message: impl Into<String>) -> Self {
        let message = message.into();
        Error::Backend {
            kind: ErrorKind::classify(&message),
            message,
        }
    }

    /// Build a configuration error for a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Classification of this error as surfaced to callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Backend { kind, .. } => *kind,
            Error::ExternalTool(msg) | Error::Other(msg) => ErrorKind::classify(msg),
            Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            Error::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Other,
        }
    }
}

/// Classification of a fetch failure
///
/// Derived from the backend's error text by matching well-known status markers.
/// The classification is always surfaced to the caller alongside the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The site rejected the request (403, 429, bot check)
    AccessForbidden,
    /// The item is deleted, private or otherwise unavailable
    NotFound,
    /// Transient network condition
    Timeout,
    /// Uncategorized failure
    Other,
    /// The host cancelled the operation
    Cancelled,
}

// Status codes only count behind "http error": item ids routinely contain digit runs
const FORBIDDEN_MARKERS: &[&str] = &[
    "http error 403",
    "forbidden",
    "http error 429",
    "too many requests",
    "sign in to confirm",
    "not a bot",
];

const NOT_FOUND_MARKERS: &[&str] = &[
    "http error 404",
    "not found",
    "private video",
    "video unavailable",
    "has been removed",
    "does not exist",
];

const TIMEOUT_MARKERS: &[&str] = &[
    "timed out",
    "timeout",
    "connection reset",
    "temporarily unavailable",
];

impl ErrorKind {
    /// Classify free-form backend error text
    ///
    /// Markers are matched case-insensitively. Forbidden markers win over
    /// not-found markers, which win over timeout markers.
    ///
    /// # Examples
    ///
    /// ```
    /// use playlist_dl::ErrorKind;
    ///
    /// assert_eq!(ErrorKind::classify("HTTP Error 403: Forbidden"), ErrorKind::AccessForbidden);
    /// assert_eq!(ErrorKind::classify("Private video"), ErrorKind::NotFound);
    /// assert_eq!(ErrorKind::classify("read timed out"), ErrorKind::Timeout);
    /// assert_eq!(ErrorKind::classify("muxer exploded"), ErrorKind::Other);
    /// ```
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        let has_any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

        if has_any(FORBIDDEN_MARKERS) {
            ErrorKind::AccessForbidden
        } else if has_any(NOT_FOUND_MARKERS) {
            ErrorKind::NotFound
        } else if has_any(TIMEOUT_MARKERS) {
            ErrorKind::Timeout
        } else {
            ErrorKind::Other
        }
    }

    /// Short remediation hint suitable for display next to the error
    pub fn remediation(&self) -> &'static str {
        match self {
            ErrorKind::AccessForbidden => {
                "The site rejected the request. Try a lower quality, audio only, or wait and retry later."
            }
            ErrorKind::NotFound => "The video is private, removed, or does not exist.",
            ErrorKind::Timeout => "The network timed out. Check your connection and try again.",
            ErrorKind::Other => "An unexpected error occurred. See the message for details.",
            ErrorKind::Cancelled => "The download was cancelled.",
        }
    }

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::AccessForbidden => "access_forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Other => "other",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
