//! Pipeline orchestrator.
//!
//! Drives the four remote stages strictly in sequence, publishes progress on
//! a watch channel, and commits the assembled record on success. It does no
//! caching and no retries: the first stage error ends the run.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tubedigest_core::types::{CacheRecord, NewRecord};
use tubedigest_storage::RecordStore;

use crate::backend::VideoBackend;
use crate::error::{PipelineFailure, StageError};
use crate::state::{validate_transition, PipelineState, RunProgress, Stage};
use crate::tokens::RunToken;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Committed to the store.
    Stored(CacheRecord),
    /// All stages succeeded but the store write failed.
    Unsaved(NewRecord),
    /// A newer run started before this one finished; nothing was written.
    Superseded(NewRecord),
}

impl Outcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Outcome::Stored(_))
    }
}

/// Runs the metadata -> id -> transcript -> summary pipeline.
pub struct Orchestrator {
    backend: Arc<dyn VideoBackend>,
    store: Arc<RecordStore>,
    progress: watch::Sender<RunProgress>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn VideoBackend>, store: Arc<RecordStore>) -> Self {
        let (progress, _) = watch::channel(RunProgress::idle());
        Self {
            backend,
            store,
            progress,
        }
    }

    /// Receive progress updates for every run from now on.
    pub fn subscribe(&self) -> watch::Receiver<RunProgress> {
        self.progress.subscribe()
    }

    /// Latest published progress.
    pub fn progress(&self) -> RunProgress {
        self.progress.borrow().clone()
    }

    /// Run the pipeline and commit its result unconditionally.
    pub async fn run(&self, reference: &str) -> Result<Outcome, PipelineFailure> {
        self.execute(reference, None).await
    }

    /// Run the pipeline, committing only if `token` is still current when
    /// the last stage finishes.
    pub async fn run_with_token(
        &self,
        reference: &str,
        token: &RunToken,
    ) -> Result<Outcome, PipelineFailure> {
        self.execute(reference, Some(token)).await
    }

    async fn execute(
        &self,
        reference: &str,
        token: Option<&RunToken>,
    ) -> Result<Outcome, PipelineFailure> {
        let mut run = RunTracker::start(&self.progress);
        info!(run_id = %run.id, url = %reference, "Pipeline run started");

        run.enter(Stage::FetchingMetadata, None);
        let metadata = self
            .backend
            .resolve_metadata(reference)
            .await
            .map_err(|e| run.fail(StageError::Metadata(e)))?;
        run.complete(Stage::FetchingMetadata);

        run.enter(Stage::ExtractingId, None);
        let video_id = self
            .backend
            .resolve_video_id(reference)
            .await
            .map_err(|e| run.fail(StageError::Identifier(e)))?;
        run.complete(Stage::ExtractingId);

        run.enter(Stage::FetchingTranscript, None);
        let transcript = self
            .backend
            .resolve_transcript(&video_id)
            .await
            .map_err(|e| run.fail(StageError::Transcript(e)))?;
        run.complete(Stage::FetchingTranscript);

        let display_name = metadata.display_name();
        run.enter(
            Stage::Summarizing,
            Some(format!("Summarizing transcript for {}...", display_name)),
        );
        let summary = self
            .backend
            .resolve_summary(&transcript, &display_name)
            .await
            .map_err(|e| run.fail(StageError::Summary(e)))?;
        run.complete(Stage::Summarizing);

        let record = NewRecord::new(reference, video_id, metadata, summary);
        let outcome = self.commit(run.id, record, token).await;
        run.finish();
        Ok(outcome)
    }

    async fn commit(&self, run_id: Uuid, record: NewRecord, token: Option<&RunToken>) -> Outcome {
        if let Some(token) = token {
            if !token.is_current() {
                info!(
                    run_id = %run_id,
                    generation = token.generation(),
                    "Newer run started, discarding result"
                );
                return Outcome::Superseded(record);
            }
        }

        let store = Arc::clone(&self.store);
        let pending = record.clone();
        match tokio::task::spawn_blocking(move || store.put(&pending)).await {
            Ok(Ok(id)) => {
                info!(run_id = %run_id, id = %id, video_id = %record.video_id, "Pipeline result stored");
                Outcome::Stored(record.into_stored(id))
            }
            Ok(Err(e)) => {
                warn!(run_id = %run_id, error = %e, "Failed to store pipeline result");
                Outcome::Unsaved(record)
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Store task aborted");
                Outcome::Unsaved(record)
            }
        }
    }
}

/// Per-run state holder that validates and publishes every transition.
struct RunTracker<'a> {
    id: Uuid,
    progress: &'a watch::Sender<RunProgress>,
    current: RunProgress,
}

impl<'a> RunTracker<'a> {
    fn start(progress: &'a watch::Sender<RunProgress>) -> Self {
        let id = Uuid::new_v4();
        let tracker = Self {
            id,
            progress,
            current: RunProgress {
                run_id: Some(id),
                ..RunProgress::idle()
            },
        };
        tracker.publish();
        tracker
    }

    fn enter(&mut self, stage: Stage, message: Option<String>) {
        if self.transition(PipelineState::Running(stage)) {
            self.current.last_entered = Some(stage);
            self.current.message = message.unwrap_or_else(|| stage.status_line().to_string());
            debug!(run_id = %self.id, stage = %stage, "Stage entered");
            self.publish();
        }
    }

    fn complete(&mut self, stage: Stage) {
        self.current.last_completed = Some(stage);
        self.publish();
    }

    fn fail(&mut self, error: StageError) -> PipelineFailure {
        let stage = error.stage();
        if self.transition(PipelineState::Failed(stage)) {
            self.current.message = format!("Error: {}", error.backend_error());
            self.publish();
        }
        warn!(run_id = %self.id, stage = %stage, error = %error, "Pipeline run failed");
        PipelineFailure {
            run_id: self.id,
            stage,
            error,
        }
    }

    fn finish(&mut self) {
        if self.transition(PipelineState::Done) {
            self.current.message = "Done.".to_string();
            info!(run_id = %self.id, "Pipeline run finished");
            self.publish();
        }
    }

    fn transition(&mut self, to: PipelineState) -> bool {
        match validate_transition(self.current.state, to) {
            Ok(()) => {
                self.current.state = to;
                true
            }
            Err(e) => {
                warn!(run_id = %self.id, error = %e, "Ignoring invalid pipeline transition");
                false
            }
        }
    }

    fn publish(&self) {
        self.progress.send_replace(self.current.clone());
    }
}
