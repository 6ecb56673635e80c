use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use eyre::Result;
use log::{debug, info};
use serde::Deserialize;
use tokio::process::Command;

use crate::transcript::{ProxyConfig, TranscriptError, TranscriptProvider, is_english};
use crate::vtt;

const OUTPUT_STEM: &str = "sub";

/// Subset of `yt-dlp --dump-single-json` describing caption availability.
/// Keys keep the order yt-dlp lists them in.
#[derive(Debug, Default, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    subtitles: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    automatic_captions: serde_json::Map<String, serde_json::Value>,
}

/// Caption retrieval by downloading WebVTT subtitle files with yt-dlp
pub struct YtDlp {
    binary: String,
    proxy: Option<ProxyConfig>,
    languages: Vec<String>,
}

impl YtDlp {
    pub fn new(proxy: Option<ProxyConfig>, languages: Vec<String>) -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            proxy,
            languages,
        }
    }

    async fn run(&self, extra: Vec<String>) -> Result<Output, TranscriptError> {
        let mut args = Vec::with_capacity(extra.len() + 2);
        if let Some(proxy) = &self.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.authenticated_url());
        }
        args.extend(extra);
        debug!("Running {} {}", self.binary, redact(&args).join(" "));

        let output = match Command::new(&self.binary).args(&args).output().await {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(TranscriptError::ToolMissing),
            Err(e) => return Err(TranscriptError::fetch(e)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("{} exited with status {}: {}", self.binary, output.status, stderr.trim());
            return Err(classify_failure(&stderr));
        }
        Ok(output)
    }

    async fn probe(&self, url: &str) -> Result<VideoInfo, TranscriptError> {
        let output = self
            .run(vec![
                "--dump-single-json".to_string(),
                "--skip-download".to_string(),
                "--no-playlist".to_string(),
                "--no-warnings".to_string(),
                url.to_string(),
            ])
            .await?;
        serde_json::from_slice(&output.stdout).map_err(TranscriptError::fetch)
    }
}

#[async_trait]
impl TranscriptProvider for YtDlp {
    fn name(&self) -> &'static str {
        "ytdlp"
    }

    async fn fetch(&self, video_id: &str) -> Result<String, TranscriptError> {
        let url = format!("https://www.youtube.com/watch?v={video_id}");

        let info = self.probe(&url).await?;
        let langs = choose_languages(&info, &self.languages)?;
        info!("Downloading subtitles for {video_id}: {}", langs.join(","));

        // Removed with all downloaded files when it goes out of scope
        let dir = tempfile::tempdir().map_err(TranscriptError::fetch)?;
        self.run(download_args(&url, &langs, dir.path())).await?;

        let path = find_subtitle_file(dir.path(), &langs)
            .map_err(TranscriptError::fetch)?
            .ok_or(TranscriptError::Disabled)?;
        debug!("Parsing subtitle file {}", path.display());

        let content = tokio::fs::read_to_string(&path).await.map_err(TranscriptError::fetch)?;
        let text = html_escape::decode_html_entities(&vtt::normalize(&content)).to_string();

        if text.trim().is_empty() {
            return Err(TranscriptError::Empty);
        }
        Ok(text)
    }
}

/// Languages to request: the preferred English variants when any exist,
/// otherwise the first other English track, manual before automatic. Automatic
/// captions include yt-dlp's translated English tracks, so a non-English video
/// with translation available still resolves here.
fn choose_languages(info: &VideoInfo, preferred: &[String]) -> Result<Vec<String>, TranscriptError> {
    if info.subtitles.is_empty() && info.automatic_captions.is_empty() {
        return Err(TranscriptError::NoCaptions);
    }

    let available = |lang: &str| info.subtitles.contains_key(lang) || info.automatic_captions.contains_key(lang);

    let english: Vec<String> = preferred.iter().filter(|l| available(l.as_str())).cloned().collect();
    if !english.is_empty() {
        return Ok(english);
    }

    info.subtitles
        .keys()
        .chain(info.automatic_captions.keys())
        .find(|lang| is_english(lang))
        .map(|lang| vec![lang.clone()])
        .ok_or(TranscriptError::NoUsableTranscript)
}

fn download_args(url: &str, langs: &[String], dir: &Path) -> Vec<String> {
    let template = dir.join(format!("{OUTPUT_STEM}.%(ext)s"));
    vec![
        "--skip-download".to_string(),
        "--write-subs".to_string(),
        "--write-auto-subs".to_string(),
        "--sub-langs".to_string(),
        langs.join(","),
        "--sub-format".to_string(),
        "vtt".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
        url.to_string(),
    ]
}

/// Pick the downloaded file for the most preferred language, or any `.vtt` file
fn find_subtitle_file(dir: &Path, langs: &[String]) -> Result<Option<PathBuf>> {
    for lang in langs {
        let path = dir.join(format!("{OUTPUT_STEM}.{lang}.vtt"));
        if path.is_file() {
            return Ok(Some(path));
        }
    }

    let mut vtt_files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "vtt"))
        .collect();
    vtt_files.sort();
    Ok(vtt_files.into_iter().next())
}

/// Map yt-dlp's error output to a failure kind
fn classify_failure(stderr: &str) -> TranscriptError {
    let lower = stderr.to_lowercase();
    if lower.contains("private video") || lower.contains("video is private") {
        return TranscriptError::Private;
    }
    if lower.contains("video unavailable") || lower.contains("is unavailable") {
        return TranscriptError::Unavailable;
    }

    let detail = stderr
        .lines()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("yt-dlp failed")
        .trim();
    TranscriptError::Fetch(detail.to_string())
}

fn redact(args: &[String]) -> Vec<String> {
    let mut out = args.to_vec();
    for i in 1..out.len() {
        if out[i - 1] == "--proxy" {
            out[i] = "<proxy>".to_string();
        }
    }
    out
}
