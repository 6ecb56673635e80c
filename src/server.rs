use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use eyre::{Result, WrapErr};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::summarize::{SummarizeError, Summarizer};
use crate::transcript::{TranscriptError, TranscriptProvider};
use crate::{Summary, extract_video_id};

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Shared, read-only handles used by every request
#[derive(Clone)]
pub struct AppState {
    pub transcripts: Arc<dyn TranscriptProvider>,
    pub summarizer: Arc<Summarizer>,
}

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<TranscriptError> for ApiError {
    fn from(err: TranscriptError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<SummarizeError> for ApiError {
    fn from(err: SummarizeError) -> Self {
        Self::internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/summarize", post(summarize))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .wrap_err_with(|| format!("binding to {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .wrap_err("running HTTP server")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {e}");
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn summarize(
    State(state): State<AppState>,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult<Json<Summary>> {
    let Json(request) = payload.map_err(|e| {
        debug!("Rejected request body: {e}");
        ApiError::bad_request("Invalid request body. Send JSON like {\"url\": \"...\"}.")
    })?;

    let url = request.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("Please enter a YouTube URL."));
    }

    let video_id = extract_video_id(url)
        .ok_or_else(|| ApiError::bad_request("Invalid YouTube URL. Please check and try again."))?;
    info!("Summarizing video {video_id} using {} captions", state.transcripts.name());

    let transcript = state.transcripts.fetch(&video_id).await.inspect_err(|e| {
        warn!("Transcript for {video_id} unavailable: {e:?}");
    })?;
    debug!("Transcript for {video_id}: {} chars", transcript.chars().count());

    let summary = state.summarizer.summarize(&transcript).await.inspect_err(|e| {
        warn!("Summarization for {video_id} failed: {e:?}");
    })?;

    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarize::tests::{CannedCompletion, VALID_REPLY};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, header};
    use std::sync::Mutex;
    use tower::ServiceExt;

    struct FakeTranscripts {
        result: Result<String, TranscriptError>,
        requested: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TranscriptProvider for FakeTranscripts {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch(&self, video_id: &str) -> Result<String, TranscriptError> {
            self.requested.lock().unwrap().push(video_id.to_string());
            self.result.clone()
        }
    }

    fn app(transcript: Result<String, TranscriptError>, completion: CannedCompletion) -> (Router, Arc<FakeTranscripts>) {
        let transcripts = Arc::new(FakeTranscripts {
            result: transcript,
            requested: Mutex::new(Vec::new()),
        });
        let state = AppState {
            transcripts: transcripts.clone(),
            summarizer: Arc::new(Summarizer::new(Arc::new(completion), 100)),
        };
        (router(state), transcripts)
    }

    async fn post_json(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/summarize")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_summarize_success() {
        let (app, transcripts) = app(Ok("hello world".into()), CannedCompletion::ok(VALID_REPLY));
        let (status, body) = post_json(app, r#"{"url": "https://youtu.be/dQw4w9WgXcQ"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tldr"], "A short video.");
        assert_eq!(body["key_points"][1], "two");
        assert_eq!(*transcripts.requested.lock().unwrap(), vec!["dQw4w9WgXcQ"]);
    }

    #[tokio::test]
    async fn test_empty_url() {
        let (app, transcripts) = app(Ok("unused".into()), CannedCompletion::ok(VALID_REPLY));
        let (status, body) = post_json(app, r#"{"url": "   "}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"error": "Please enter a YouTube URL."}));
        assert!(transcripts.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_url_field_is_empty() {
        let (app, _) = app(Ok("unused".into()), CannedCompletion::ok(VALID_REPLY));
        let (status, body) = post_json(app, "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please enter a YouTube URL.");
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let (app, _) = app(Ok("unused".into()), CannedCompletion::ok(VALID_REPLY));
        let (status, body) = post_json(app, r#"{"url": "not a url"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid YouTube URL. Please check and try again.");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (app, _) = app(Ok("unused".into()), CannedCompletion::ok(VALID_REPLY));
        let (status, body) = post_json(app, "url=abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_transcript_failure_is_400() {
        let completion = CannedCompletion::ok(VALID_REPLY);
        let (app, _) = app(Err(TranscriptError::Private), completion);
        let (status, body) = post_json(app, r#"{"url": "dQw4w9WgXcQ"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({"error": "This video is private."}));
    }

    #[tokio::test]
    async fn test_bad_model_reply_is_500_without_partial_fields() {
        let (app, _) = app(Ok("text".into()), CannedCompletion::ok("```json\n{\"tldr\": oops\n```"));
        let (status, body) = post_json(app, r#"{"url": "dQw4w9WgXcQ"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("format"));
        assert_eq!(body.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_is_500() {
        let (app, _) = app(Ok("text".into()), CannedCompletion::err("401 Unauthorized"));
        let (status, body) = post_json(app, r#"{"url": "dQw4w9WgXcQ"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "AI error: 401 Unauthorized");
    }

    #[tokio::test]
    async fn test_index_page() {
        let (app, _) = app(Ok("unused".into()), CannedCompletion::ok(VALID_REPLY));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("/summarize"));
    }
}
