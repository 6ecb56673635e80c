use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::youtube::InnerTube;
use crate::ytdlp::YtDlp;

/// English locale variants tried, in order, before falling back to translation
pub const DEFAULT_LANGUAGES: &[&str] = &["en", "en-US", "en-GB", "en-AU"];

/// Why a transcript could not be produced. The display text is shown to the end user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscriptError {
    #[error("This video is private.")]
    Private,

    #[error("This video is unavailable.")]
    Unavailable,

    #[error("Transcripts are disabled or unavailable for this video.")]
    Disabled,

    #[error("This video has no subtitles or captions available.")]
    NoCaptions,

    #[error("No usable transcript found. Try a different video.")]
    NoUsableTranscript,

    #[error("Transcript was empty after parsing.")]
    Empty,

    #[error("This video can't be played: {0}")]
    Unplayable(String),

    #[error("Subtitle downloads are not available on this server (yt-dlp not found).")]
    ToolMissing,

    #[error("Could not fetch transcript: {0}")]
    Fetch(String),
}

impl TranscriptError {
    pub(crate) fn fetch(err: impl std::fmt::Display) -> Self {
        TranscriptError::Fetch(err.to_string())
    }
}

/// A way of obtaining English transcript text for a video
#[async_trait]
pub trait TranscriptProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Fetch the transcript as continuous English prose
    async fn fetch(&self, video_id: &str) -> Result<String, TranscriptError>;
}

/// Which caption retrieval strategy to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Query the player API directly and use its caption tracks
    #[default]
    Innertube,
    /// Download subtitle files with yt-dlp and normalize them
    Ytdlp,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Innertube => write!(f, "innertube"),
            Strategy::Ytdlp => write!(f, "ytdlp"),
        }
    }
}

/// Authenticated HTTP proxy for caption-provider traffic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub host: String,
    pub port: String,
    pub username: String,
    pub password: String,
}

impl ProxyConfig {
    /// Read PROXY_IP, PROXY_PORT, PROXY_USER and PROXY_PASS; all four must be set
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Some(Self {
            host: get("PROXY_IP")?,
            port: get("PROXY_PORT")?,
            username: get("PROXY_USER")?,
            password: get("PROXY_PASS")?,
        })
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Proxy URL with credentials inline, for tools that take a single URL
    pub fn authenticated_url(&self) -> String {
        format!("http://{}:{}@{}:{}", self.username, self.password, self.host, self.port)
    }
}

/// HTTP client for caption traffic, routed through the proxy when one is configured
pub fn caption_client(proxy: Option<&ProxyConfig>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(proxy) = proxy {
        debug!("Routing caption requests through proxy {}", proxy.url());
        builder = builder.proxy(reqwest::Proxy::all(proxy.url())?.basic_auth(&proxy.username, &proxy.password));
    }
    Ok(builder.build()?)
}

/// Build the provider for the selected strategy
pub fn build_provider(
    strategy: Strategy,
    proxy: Option<ProxyConfig>,
    languages: Vec<String>,
) -> Result<Arc<dyn TranscriptProvider>> {
    let provider: Arc<dyn TranscriptProvider> = match strategy {
        Strategy::Innertube => Arc::new(InnerTube::new(caption_client(proxy.as_ref())?, languages)),
        Strategy::Ytdlp => Arc::new(YtDlp::new(proxy, languages)),
    };
    Ok(provider)
}

/// Join caption fragments into one line of prose
pub fn flatten<'a>(pieces: impl IntoIterator<Item = &'a str>) -> String {
    pieces
        .into_iter()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn is_english(language_code: &str) -> bool {
    language_code == "en" || language_code.starts_with("en-")
}
