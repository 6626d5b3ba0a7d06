//! HTTP client for the remote metadata/transcript/summary service.
//!
//! Endpoints:
//! - `GET  /get-metadata?url=`      -> metadata object
//! - `GET  /get-video-id?url=`      -> `{"video_id": ...}`
//! - `GET  /fetch-transcript?id=`   -> `{"transcript": ...}`
//! - `POST /summarize-video`        -> `{"summary": ...}`
//!
//! Failed requests carry `{"error": ...}` when the service has something to
//! say; otherwise the message is `<endpoint> failed (<status>)`.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use tubedigest_core::config::BackendConfig;
use tubedigest_core::types::{VideoId, VideoMetadata, UNKNOWN_CHANNEL};
use tubedigest_pipeline::{BackendError, VideoBackend};

const METADATA: &str = "get-metadata";
const VIDEO_ID: &str = "get-video-id";
const TRANSCRIPT: &str = "fetch-transcript";
const SUMMARIZE: &str = "summarize-video";

#[derive(Deserialize)]
struct VideoIdResponse {
    video_id: String,
}

#[derive(Deserialize)]
struct TranscriptResponse {
    transcript: serde_json::Value,
}

#[derive(Deserialize)]
struct SummaryResponse {
    summary: serde_json::Value,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    transcript: &'a str,
    channel_uploader: &'a str,
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .get(self.url(endpoint))
            .query(query)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        parse_response(endpoint, response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .client
            .post(self.url(endpoint))
            .json(body)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        parse_response(endpoint, response).await
    }
}

async fn parse_response<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<T, BackendError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| BackendError::Transport(e.to_string()))?;
    if status.is_success() {
        serde_json::from_str(&text).map_err(|e| BackendError::InvalidResponse(e.to_string()))
    } else {
        Err(BackendError::Service(error_message(
            endpoint,
            status.as_u16(),
            &text,
        )))
    }
}

/// The service's own error text, or a generic one naming the endpoint.
fn error_message(endpoint: &str, status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| format!("{} failed ({})", endpoint, status))
}

/// Strings pass through; anything else is pretty-printed JSON.
fn text_value(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
    }
}

#[async_trait]
impl VideoBackend for HttpBackend {
    async fn resolve_metadata(&self, reference: &str) -> Result<VideoMetadata, BackendError> {
        self.get_json(METADATA, &[("url", reference)]).await
    }

    async fn resolve_video_id(&self, reference: &str) -> Result<VideoId, BackendError> {
        let body: VideoIdResponse = self.get_json(VIDEO_ID, &[("url", reference)]).await?;
        Ok(VideoId::new(body.video_id))
    }

    async fn resolve_transcript(&self, video_id: &VideoId) -> Result<String, BackendError> {
        let body: TranscriptResponse = self
            .get_json(TRANSCRIPT, &[("id", video_id.as_str())])
            .await?;
        Ok(text_value(body.transcript))
    }

    async fn resolve_summary(
        &self,
        transcript: &str,
        display_name: &str,
    ) -> Result<String, BackendError> {
        let channel_uploader = if display_name.is_empty() {
            UNKNOWN_CHANNEL
        } else {
            display_name
        };
        let body: SummaryResponse = self
            .post_json(
                SUMMARIZE,
                &SummarizeRequest {
                    transcript,
                    channel_uploader,
                },
            )
            .await?;
        Ok(text_value(body.summary))
    }
}
