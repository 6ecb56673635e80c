use std::collections::HashSet;
use std::future::Future;

use async_trait::async_trait;
use eyre::{Result, bail};
use log::{debug, info};
use regex::Regex;
use serde::Deserialize;

use crate::transcript::{TranscriptError, TranscriptProvider, flatten, is_english};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    #[serde(rename = "playabilityStatus")]
    playability_status: Option<PlayabilityStatus>,
    captions: Option<CaptionsData>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Clone, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    kind: Option<String>,
    #[serde(rename = "isTranslatable", default)]
    is_translatable: bool,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// One caption download to try
#[derive(Debug, Clone, PartialEq, Eq)]
struct Attempt {
    url: String,
    language_code: String,
    translated: bool,
}

impl Attempt {
    fn native(track: &CaptionTrack) -> Self {
        Self {
            url: track.base_url.replace("&fmt=srv3", ""),
            language_code: track.language_code.clone(),
            translated: false,
        }
    }

    fn translated(track: &CaptionTrack) -> Self {
        Self {
            url: format!("{}&tlang=en", track.base_url.replace("&fmt=srv3", "")),
            language_code: track.language_code.clone(),
            translated: true,
        }
    }
}

/// Caption retrieval through YouTube's InnerTube player API
pub struct InnerTube {
    client: reqwest::Client,
    languages: Vec<String>,
}

impl InnerTube {
    pub fn new(client: reqwest::Client, languages: Vec<String>) -> Self {
        Self { client, languages }
    }

    async fn fetch_player(&self, video_id: &str) -> Result<InnerTubePlayerResponse> {
        // Step 1: Fetch the watch page to get the InnerTube API key
        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        debug!("Fetching watch page: {watch_url}");

        let page_html = self
            .client
            .get(&watch_url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let api_key = extract_api_key(&page_html)?;
        debug!("Extracted InnerTube API key: {api_key}");

        // Step 2: Call InnerTube player endpoint
        let player_url = format!("https://www.youtube.com/youtubei/v1/player?key={api_key}&prettyPrint=false");

        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": "en",
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": "2.20241126.01.00"
                }
            },
            "videoId": video_id
        });

        let resp = self
            .client
            .post(&player_url)
            .header("User-Agent", USER_AGENT)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(resp)
    }

    async fn fetch_attempt(&self, attempt: Attempt) -> Result<String> {
        if attempt.url.contains("&exp=xpe") {
            bail!("caption track {} requires a proof-of-origin token", attempt.language_code);
        }

        let caption_xml = self
            .client
            .get(&attempt.url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let lines = parse_caption_xml(&caption_xml)?;
        Ok(flatten(lines.iter().map(String::as_str)))
    }
}

#[async_trait]
impl TranscriptProvider for InnerTube {
    fn name(&self) -> &'static str {
        "innertube"
    }

    async fn fetch(&self, video_id: &str) -> Result<String, TranscriptError> {
        let player = self.fetch_player(video_id).await.map_err(TranscriptError::fetch)?;

        check_playability(player.playability_status.as_ref())?;

        let tracks = caption_tracks(player)?;
        debug!("Video {video_id} offers {} caption track(s)", tracks.len());

        let attempts = plan_attempts(&tracks, &self.languages);
        first_usable(attempts, |attempt| self.fetch_attempt(attempt))
            .await
            .ok_or(TranscriptError::NoUsableTranscript)
    }
}

fn extract_api_key(html: &str) -> Result<String> {
    let re = Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#)?;
    if let Some(caps) = re.captures(html) {
        return Ok(caps[1].to_string());
    }

    // Fallback: try the newer pattern
    let re2 = Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#)?;
    if let Some(caps) = re2.captures(html) {
        return Ok(caps[1].to_string());
    }

    bail!("could not extract InnerTube API key from watch page");
}

fn check_playability(status: Option<&PlayabilityStatus>) -> Result<(), TranscriptError> {
    let Some(status) = status else {
        return Ok(());
    };

    let code = status.status.as_deref().unwrap_or("OK");
    if code == "OK" {
        return Ok(());
    }

    // Private and removed videos arrive under several status codes
    let reason = status.reason.clone().unwrap_or_default();
    let lower = reason.to_lowercase();
    if lower.contains("private") {
        Err(TranscriptError::Private)
    } else if lower.contains("unavailable") {
        Err(TranscriptError::Unavailable)
    } else if reason.is_empty() {
        Err(TranscriptError::Unplayable(code.to_lowercase()))
    } else {
        Err(TranscriptError::Unplayable(reason))
    }
}

fn caption_tracks(player: InnerTubePlayerResponse) -> Result<Vec<CaptionTrack>, TranscriptError> {
    let renderer = player
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .ok_or(TranscriptError::Disabled)?;

    let tracks = renderer.caption_tracks.unwrap_or_default();
    if tracks.is_empty() {
        return Err(TranscriptError::NoCaptions);
    }
    Ok(tracks)
}

/// Order the downloads to try: English locales directly, then every track
/// (manual before auto-generated) translated to English.
fn plan_attempts(tracks: &[CaptionTrack], languages: &[String]) -> Vec<Attempt> {
    let mut attempts = Vec::new();

    for lang in languages {
        let track = tracks
            .iter()
            .find(|t| &t.language_code == lang && !t.is_generated())
            .or_else(|| tracks.iter().find(|t| &t.language_code == lang));
        if let Some(track) = track {
            attempts.push(Attempt::native(track));
        }
    }

    let mut ordered: Vec<&CaptionTrack> = tracks.iter().collect();
    ordered.sort_by_key(|t| t.is_generated());

    for track in ordered {
        if is_english(&track.language_code) {
            attempts.push(Attempt::native(track));
        } else if track.is_translatable {
            attempts.push(Attempt::translated(track));
        } else {
            debug!("Skipping non-English, non-translatable track {}", track.language_code);
        }
    }

    let mut seen = HashSet::new();
    attempts.retain(|a| seen.insert(a.url.clone()));
    attempts
}

/// Run attempts in order and return the first non-empty text
async fn first_usable<F, Fut>(attempts: Vec<Attempt>, mut fetch: F) -> Option<String>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    for attempt in attempts {
        let lang = attempt.language_code.clone();
        let translated = attempt.translated;
        match fetch(attempt).await {
            Ok(text) if !text.trim().is_empty() => {
                info!("Using caption track: lang={lang} translated={translated}");
                return Some(text);
            }
            Ok(_) => debug!("Caption track {lang} was empty"),
            Err(e) => debug!("Caption track {lang} failed: {e}"),
        }
    }
    None
}

fn parse_caption_xml(xml: &str) -> Result<Vec<String>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => in_text = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => in_text = false,
            Ok(Event::Text(ref e)) if in_text => {
                let raw_text = e.unescape().unwrap_or_default().to_string();
                let text = html_escape::decode_html_entities(&raw_text).to_string();
                if !text.trim().is_empty() {
                    lines.push(text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("error parsing caption XML: {e}"),
            _ => {}
        }
    }

    Ok(lines)
}
