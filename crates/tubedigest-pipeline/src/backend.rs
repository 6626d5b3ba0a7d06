//! Remote collaborator interface.
//!
//! The four calls a pipeline run makes, one per stage. Each is a single
//! request/response; implementations report failures as `BackendError` with
//! a human-readable message.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use tubedigest_core::types::{VideoId, VideoMetadata};
use tubedigest_core::video_id::extract_video_id;

use crate::error::BackendError;
use crate::state::Stage;

/// Metadata, identifier, transcript and summary provider.
#[async_trait]
pub trait VideoBackend: Send + Sync {
    /// Describe the video behind a raw reference.
    async fn resolve_metadata(&self, reference: &str) -> Result<VideoMetadata, BackendError>;

    /// Canonical video id for a raw reference.
    async fn resolve_video_id(&self, reference: &str) -> Result<VideoId, BackendError>;

    /// Full transcript text for a video.
    async fn resolve_transcript(&self, video_id: &VideoId) -> Result<String, BackendError>;

    /// Summary of a transcript, written for the named channel.
    async fn resolve_summary(
        &self,
        transcript: &str,
        display_name: &str,
    ) -> Result<String, BackendError>;
}

/// Deterministic in-process backend for tests and offline runs.
///
/// Derives the id locally, fabricates transcript and summary text, and can be
/// told to fail at one stage or to stall before summarizing.
pub struct MockBackend {
    metadata: VideoMetadata,
    fail_at: Option<Stage>,
    summary_delay: Option<Duration>,
    calls: [AtomicUsize; 4],
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            metadata: VideoMetadata {
                title: Some("Mock Video".to_string()),
                uploader: Some("Mock Channel".to_string()),
                ..Default::default()
            },
            fail_at: None,
            summary_delay: None,
            calls: Default::default(),
        }
    }

    /// A backend whose `stage` call always fails.
    pub fn failing_at(stage: Stage) -> Self {
        Self {
            fail_at: Some(stage),
            ..Self::new()
        }
    }

    pub fn with_metadata(mut self, metadata: VideoMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sleep this long before answering the summary call.
    pub fn with_summary_delay(mut self, delay: Duration) -> Self {
        self.summary_delay = Some(delay);
        self
    }

    /// Number of calls made for `stage`.
    pub fn calls(&self, stage: Stage) -> usize {
        self.calls[stage.index()].load(Ordering::SeqCst)
    }

    /// Number of calls made across all stages.
    pub fn total_calls(&self) -> usize {
        Stage::ALL.iter().map(|s| self.calls(*s)).sum()
    }

    fn record_call(&self, stage: Stage) -> Result<(), BackendError> {
        self.calls[stage.index()].fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(stage) {
            return Err(BackendError::Service(format!("mock failure at {}", stage)));
        }
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoBackend for MockBackend {
    async fn resolve_metadata(&self, reference: &str) -> Result<VideoMetadata, BackendError> {
        self.record_call(Stage::FetchingMetadata)?;
        let mut metadata = self.metadata.clone();
        if metadata.webpage_url.is_none() {
            metadata.webpage_url = Some(reference.to_string());
        }
        Ok(metadata)
    }

    async fn resolve_video_id(&self, reference: &str) -> Result<VideoId, BackendError> {
        self.record_call(Stage::ExtractingId)?;
        extract_video_id(reference)
            .ok_or_else(|| BackendError::Service("Could not extract a YouTube video id".to_string()))
    }

    async fn resolve_transcript(&self, video_id: &VideoId) -> Result<String, BackendError> {
        self.record_call(Stage::FetchingTranscript)?;
        Ok(format!("Transcript of {}", video_id))
    }

    async fn resolve_summary(
        &self,
        transcript: &str,
        display_name: &str,
    ) -> Result<String, BackendError> {
        if let Some(delay) = self.summary_delay {
            tokio::time::sleep(delay).await;
        }
        self.record_call(Stage::Summarizing)?;
        Ok(format!("{} summarized for {}", transcript, display_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_happy_path() {
        let backend = MockBackend::new();
        let meta = backend
            .resolve_metadata("https://youtu.be/abc12345678")
            .await
            .unwrap();
        assert_eq!(meta.display_name(), "Mock Channel");

        let id = backend
            .resolve_video_id("https://youtu.be/abc12345678")
            .await
            .unwrap();
        assert_eq!(id.as_str(), "abc12345678");

        let transcript = backend.resolve_transcript(&id).await.unwrap();
        let summary = backend.resolve_summary(&transcript, "Mock Channel").await.unwrap();
        assert_eq!(summary, "Transcript of abc12345678 summarized for Mock Channel");
        assert_eq!(backend.total_calls(), 4);
    }

    #[tokio::test]
    async fn test_mock_backend_fails_at_stage() {
        let backend = MockBackend::failing_at(Stage::FetchingTranscript);
        let err = backend
            .resolve_transcript(&VideoId::new("abc12345678"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "mock failure at fetching_transcript");
        assert_eq!(backend.calls(Stage::FetchingTranscript), 1);
    }

    #[tokio::test]
    async fn test_mock_backend_rejects_unparseable_reference() {
        let backend = MockBackend::new();
        assert!(backend.resolve_video_id("not a video").await.is_err());
    }
}
