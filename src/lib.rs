pub mod config;
pub mod server;
pub mod summarize;
pub mod transcript;
pub mod vtt;
pub mod youtube;
pub mod ytdlp;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Structured summary returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub tldr: String,
    pub key_points: Vec<String>,
    pub detailed_summary: String,
    pub takeaways: Vec<String>,
    pub topics: Vec<String>,
}

// Checked in order: query parameter first, then the path-based forms.
static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"v=([a-zA-Z0-9_-]{11})",
        r"youtu\.be/([a-zA-Z0-9_-]{11})",
        r"embed/([a-zA-Z0-9_-]{11})",
        r"shorts/([a-zA-Z0-9_-]{11})",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static BARE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap());

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<String> {
    for re in ID_PATTERNS.iter() {
        if let Some(caps) = re.captures(input) {
            return Some(caps[1].to_string());
        }
    }

    // Bare 11-character video ID
    let input = input.trim();
    if BARE_ID.is_match(input) {
        return Some(input.to_string());
    }

    None
}
