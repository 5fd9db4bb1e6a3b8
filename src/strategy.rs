//! Fallback fetch strategies
//!
//! A strategy is one concrete request configuration tried against the backend.
//! Strategies are plain data: the engine walks [`default_strategies`] in order,
//! so adding or reordering a fallback never touches control flow.

use crate::config::{CookieSource, FetchConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Selector used by the reduced-quality fallback
pub const REDUCED_QUALITY_SELECTOR: &str = "best[height<=480]/worst";

/// Selector used by the audio-only fallback
pub const AUDIO_ONLY_SELECTOR: &str = "bestaudio/best";

/// Selector used by the minimal-options fallback
pub const MINIMAL_SELECTOR: &str = "best";

/// One request configuration variant
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Name used in logs and in successful outcomes
    pub name: String,
    /// Format selector override (None = the configured selector)
    pub format_selector: Option<String>,
    /// Send the configured header set
    pub send_headers: bool,
    /// Send the configured cookie source
    pub send_cookies: bool,
    /// Force audio extraction (None = follow the configured format)
    pub extract_audio: Option<bool>,
}

impl Strategy {
    /// Configured selector with every configured option
    pub fn standard() -> Self {
        Self {
            name: "standard".to_string(),
            format_selector: None,
            send_headers: true,
            send_cookies: true,
            extract_audio: None,
        }
    }

    /// Capped at 480p, falling back to the worst rendition
    pub fn reduced_quality() -> Self {
        Self {
            name: "reduced_quality".to_string(),
            format_selector: Some(REDUCED_QUALITY_SELECTOR.to_string()),
            send_headers: true,
            send_cookies: true,
            extract_audio: None,
        }
    }

    /// Best audio stream only, extracted to mp3
    pub fn audio_only() -> Self {
        Self {
            name: "audio_only".to_string(),
            format_selector: Some(AUDIO_ONLY_SELECTOR.to_string()),
            send_headers: true,
            send_cookies: true,
            extract_audio: Some(true),
        }
    }

    /// Plain `best` with no custom headers or cookies
    pub fn minimal() -> Self {
        Self {
            name: "minimal".to_string(),
            format_selector: Some(MINIMAL_SELECTOR.to_string()),
            send_headers: false,
            send_cookies: false,
            extract_audio: None,
        }
    }

    /// Build the concrete backend request for this strategy
    pub fn build_request(&self, config: &FetchConfig) -> FetchRequest {
        FetchRequest {
            strategy: self.name.clone(),
            format_selector: self
                .format_selector
                .clone()
                .unwrap_or_else(|| config.format_selector()),
            headers: if self.send_headers {
                config.headers.clone()
            } else {
                BTreeMap::new()
            },
            extract_audio: self
                .extract_audio
                .unwrap_or_else(|| config.format.is_audio_only()),
            socket_timeout: config.socket_timeout,
            backend_retries: config.backend_retries,
            cookie_source: if self.send_cookies {
                config.cookie_source.clone()
            } else {
                None
            },
            proxy: config.proxy.clone(),
            output_template: config.output_template.clone(),
        }
    }
}

/// The ordered fallback list: standard, reduced quality, audio only, minimal
pub fn default_strategies() -> Vec<Strategy> {
    vec![
        Strategy::standard(),
        Strategy::reduced_quality(),
        Strategy::audio_only(),
        Strategy::minimal(),
    ]
}

/// A fully-resolved request sent to the media backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Name of the strategy that produced this request
    pub strategy: String,
    /// Backend format selector
    pub format_selector: String,
    /// HTTP headers
    pub headers: BTreeMap<String, String>,
    /// Extract audio to mp3 after download
    pub extract_audio: bool,
    /// Socket timeout
    pub socket_timeout: Duration,
    /// Backend-internal retry count
    pub backend_retries: u32,
    /// Cookie source
    pub cookie_source: Option<CookieSource>,
    /// Proxy URL
    pub proxy: Option<String>,
    /// Output filename template
    pub output_template: String,
}
