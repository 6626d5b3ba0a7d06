//! Error types for the pipeline.

use uuid::Uuid;

use crate::state::Stage;

/// Failure reported by a remote collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The service answered with an error message of its own.
    #[error("{0}")]
    Service(String),
    /// The request never produced a usable response.
    #[error("Request failed: {0}")]
    Transport(String),
    /// The response could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A remote stage failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("Metadata lookup failed: {0}")]
    Metadata(#[source] BackendError),
    #[error("Video id lookup failed: {0}")]
    Identifier(#[source] BackendError),
    #[error("Transcript fetch failed: {0}")]
    Transcript(#[source] BackendError),
    #[error("Summarization failed: {0}")]
    Summary(#[source] BackendError),
}

impl StageError {
    /// The stage this error aborted.
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Metadata(_) => Stage::FetchingMetadata,
            StageError::Identifier(_) => Stage::ExtractingId,
            StageError::Transcript(_) => Stage::FetchingTranscript,
            StageError::Summary(_) => Stage::Summarizing,
        }
    }

    /// The collaborator's original error.
    pub fn backend_error(&self) -> &BackendError {
        match self {
            StageError::Metadata(e)
            | StageError::Identifier(e)
            | StageError::Transcript(e)
            | StageError::Summary(e) => e,
        }
    }
}

/// A pipeline run ended in `Failed(stage)`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Pipeline failed at {stage}: {error}")]
pub struct PipelineFailure {
    pub run_id: Uuid,
    pub stage: Stage,
    #[source]
    pub error: StageError,
}

/// Errors from a submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Please enter a URL.")]
    EmptyReference,
    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),
}
