//! Application state for one user session.
//!
//! Ties the resolver, orchestrator and history projector together behind
//! the two user actions: submit a reference, and page through history.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tubedigest_core::config::DigestConfig;
use tubedigest_core::types::{CacheRecord, NewRecord, RecordId, VideoId};
use tubedigest_storage::RecordStore;

use crate::backend::VideoBackend;
use crate::error::SubmitError;
use crate::history::{HistoryPage, HistoryProjector, HistorySnapshot};
use crate::orchestrator::{Orchestrator, Outcome};
use crate::resolver::CacheResolver;
use crate::tokens::RunTokens;

/// What a submission produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// An existing record answered the submission; no remote calls were made.
    Cached(CacheRecord),
    /// A fresh run was committed.
    Stored(CacheRecord),
    /// A fresh run succeeded but could not be persisted.
    Unsaved(NewRecord),
    /// A fresh run succeeded after a newer submission started; not persisted.
    Superseded(NewRecord),
}

impl Resolution {
    pub fn summary(&self) -> &str {
        match self {
            Resolution::Cached(r) | Resolution::Stored(r) => &r.summary,
            Resolution::Unsaved(r) | Resolution::Superseded(r) => &r.summary,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Resolution::Cached(r) | Resolution::Stored(r) => &r.title,
            Resolution::Unsaved(r) | Resolution::Superseded(r) => &r.title,
        }
    }

    pub fn channel(&self) -> &str {
        match self {
            Resolution::Cached(r) | Resolution::Stored(r) => &r.channel,
            Resolution::Unsaved(r) | Resolution::Superseded(r) => &r.channel,
        }
    }

    pub fn video_id(&self) -> &VideoId {
        match self {
            Resolution::Cached(r) | Resolution::Stored(r) => &r.video_id,
            Resolution::Unsaved(r) | Resolution::Superseded(r) => &r.video_id,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Resolution::Cached(r) | Resolution::Stored(r) => &r.url,
            Resolution::Unsaved(r) | Resolution::Superseded(r) => &r.url,
        }
    }

    pub fn is_cache_hit(&self) -> bool {
        matches!(self, Resolution::Cached(_))
    }

    /// Id of the record backing this result, if it is in the store.
    pub fn record_id(&self) -> Option<RecordId> {
        match self {
            Resolution::Cached(r) | Resolution::Stored(r) => Some(r.id),
            Resolution::Unsaved(_) | Resolution::Superseded(_) => None,
        }
    }

    pub fn persisted(&self) -> bool {
        self.record_id().is_some()
    }
}

impl From<Outcome> for Resolution {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Stored(r) => Resolution::Stored(r),
            Outcome::Unsaved(r) => Resolution::Unsaved(r),
            Outcome::Superseded(r) => Resolution::Superseded(r),
        }
    }
}

pub struct Session {
    resolver: CacheResolver,
    orchestrator: Orchestrator,
    history: HistoryProjector,
    tokens: RunTokens,
    latest_run_only: bool,
    page_size: usize,
}

impl Session {
    pub fn new(
        store: Arc<RecordStore>,
        backend: Arc<dyn VideoBackend>,
        config: &DigestConfig,
    ) -> Self {
        Self {
            resolver: CacheResolver::new(Arc::clone(&store)),
            orchestrator: Orchestrator::new(backend, Arc::clone(&store)),
            history: HistoryProjector::new(store),
            tokens: RunTokens::new(),
            latest_run_only: config.pipeline.latest_run_only,
            page_size: config.history.page_size,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Resolve a reference from the cache, running the pipeline on a miss.
    pub async fn submit(&self, reference: &str) -> Result<Resolution, SubmitError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SubmitError::EmptyReference);
        }

        if let Some(record) = self.lookup(reference).await {
            info!(url = %reference, id = %record.id, "Returning cached summary");
            return Ok(Resolution::Cached(record));
        }

        let outcome = if self.latest_run_only {
            let token = self.tokens.issue();
            debug!(url = %reference, generation = token.generation(), "Run token issued");
            self.orchestrator.run_with_token(reference, &token).await?
        } else {
            self.orchestrator.run(reference).await?
        };
        Ok(outcome.into())
    }

    /// Cache lookup. An unreadable store counts as a miss.
    async fn lookup(&self, reference: &str) -> Option<CacheRecord> {
        let resolver = self.resolver.clone();
        let owned = reference.to_string();
        match tokio::task::spawn_blocking(move || resolver.resolve(&owned)).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!(url = %reference, error = %e, "Cache lookup failed, running pipeline");
                None
            }
            Err(e) => {
                warn!(url = %reference, error = %e, "Cache lookup task aborted, running pipeline");
                None
            }
        }
    }

    /// Fresh history listing showing the first page. An unreadable store
    /// yields an empty listing.
    pub async fn history(&self) -> HistoryView {
        let projector = self.history.clone();
        let snapshot = match tokio::task::spawn_blocking(move || projector.snapshot()).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to load history");
                HistorySnapshot::default()
            }
            Err(e) => {
                warn!(error = %e, "History task aborted");
                HistorySnapshot::default()
            }
        };
        HistoryView::new(snapshot, self.page_size)
    }
}

/// Pages of one history snapshot, as currently displayed.
#[derive(Debug, Clone)]
pub struct HistoryView {
    snapshot: HistorySnapshot,
    shown: usize,
    page_size: usize,
}

impl HistoryView {
    pub fn new(snapshot: HistorySnapshot, page_size: usize) -> Self {
        let shown = snapshot.first_page(page_size).next_offset();
        Self {
            snapshot,
            shown,
            page_size,
        }
    }

    /// Records shown so far, newest first.
    pub fn visible(&self) -> &[CacheRecord] {
        &self.snapshot.records()[..self.shown]
    }

    pub fn has_more(&self) -> bool {
        self.shown < self.snapshot.len()
    }

    pub fn total(&self) -> usize {
        self.snapshot.len()
    }

    /// Reveal the next page and return it.
    pub fn load_more(&mut self) -> HistoryPage {
        let page = self.snapshot.more(self.shown, self.page_size);
        self.shown = page.next_offset();
        page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::state::Stage;
    use tubedigest_core::types::{Timestamp, VideoMetadata};
    use tubedigest_storage::Database;

    fn make_session(backend: MockBackend) -> (Session, Arc<MockBackend>, Arc<RecordStore>) {
        let backend = Arc::new(backend);
        let store = Arc::new(RecordStore::new(Arc::new(Database::in_memory().unwrap())));
        let session = Session::new(
            Arc::clone(&store),
            Arc::clone(&backend) as Arc<dyn VideoBackend>,
            &DigestConfig::default(),
        );
        (session, backend, store)
    }

    #[tokio::test]
    async fn test_empty_reference_rejected() {
        let (session, backend, _) = make_session(MockBackend::new());
        for input in ["", "   ", "\n\t"] {
            let err = session.submit(input).await.unwrap_err();
            assert!(matches!(err, SubmitError::EmptyReference));
            assert_eq!(err.to_string(), "Please enter a URL.");
        }
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (session, backend, store) = make_session(MockBackend::new());

        let first = session.submit("https://youtu.be/abc12345678").await.unwrap();
        assert!(matches!(first, Resolution::Stored(_)));
        assert!(!first.is_cache_hit());
        assert!(first.persisted());
        assert_eq!(backend.total_calls(), 4);

        let second = session
            .submit("  https://www.youtube.com/watch?v=abc12345678  ")
            .await
            .unwrap();
        assert!(second.is_cache_hit());
        assert_eq!(second.record_id(), first.record_id());
        assert_eq!(second.summary(), first.summary());
        assert_eq!(backend.total_calls(), 4);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reference_is_trimmed_before_storing() {
        let (session, _, store) = make_session(MockBackend::new());
        session.submit("  https://youtu.be/abc12345678 ").await.unwrap();
        assert_eq!(store.get_all().unwrap()[0].url, "https://youtu.be/abc12345678");
    }

    #[tokio::test]
    async fn test_stage_failure_surfaces_stage() {
        let (session, _, store) = make_session(MockBackend::failing_at(Stage::Summarizing));
        let err = session.submit("https://youtu.be/abc12345678").await.unwrap_err();
        match err {
            SubmitError::Pipeline(failure) => assert_eq!(failure.stage, Stage::Summarizing),
            other => panic!("Expected pipeline failure, got {:?}", other),
        }
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resolution_accessors() {
        let backend = MockBackend::new().with_metadata(VideoMetadata {
            title: Some("Talk".into()),
            channel: Some("Conf".into()),
            ..Default::default()
        });
        let (session, _, _) = make_session(backend);
        let res = session.submit("https://youtu.be/abc12345678").await.unwrap();
        assert_eq!(res.title(), "Talk");
        assert_eq!(res.channel(), "Conf");
        assert_eq!(res.video_id().as_str(), "abc12345678");
        assert_eq!(res.url(), "https://youtu.be/abc12345678");
    }

    #[tokio::test]
    async fn test_unreadable_store_falls_back_to_pipeline() {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = Arc::new(RecordStore::new(Arc::clone(&db)));
        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE records;")
                .map_err(|e| tubedigest_core::DigestError::StoreWrite(e.to_string()))
        })
        .unwrap();
        let backend = Arc::new(MockBackend::new());
        let session = Session::new(
            store,
            Arc::clone(&backend) as Arc<dyn VideoBackend>,
            &DigestConfig::default(),
        );

        let res = session.submit("https://youtu.be/abc12345678").await.unwrap();
        assert!(matches!(res, Resolution::Unsaved(_)));
        assert!(!res.persisted());
        assert_eq!(backend.total_calls(), 4);

        let view = session.history().await;
        assert_eq!(view.total(), 0);
        assert!(!view.has_more());
    }

    #[tokio::test]
    async fn test_history_view_pages() {
        let (session, _, store) = make_session(MockBackend::new());
        for i in 0..7 {
            store
                .put(&NewRecord::with_timestamp(
                    format!("https://youtu.be/video{:06}", i),
                    VideoId::new(format!("video{:06}", i)),
                    VideoMetadata::default(),
                    "s",
                    Timestamp(i),
                ))
                .unwrap();
        }

        let mut view = session.history().await;
        assert_eq!(view.visible().len(), 5);
        assert_eq!(view.visible()[0].created_at, Timestamp(6));
        assert!(view.has_more());

        let page = view.load_more();
        assert_eq!(page.records.len(), 2);
        assert_eq!(view.visible().len(), 7);
        assert!(!view.has_more());

        let empty = view.load_more();
        assert!(empty.records.is_empty());
        assert_eq!(view.visible().len(), 7);
    }

    #[tokio::test]
    async fn test_outcome_conversion() {
        let record = NewRecord::new(
            "https://youtu.be/abc12345678",
            VideoId::new("abc12345678"),
            VideoMetadata::default(),
            "s",
        );
        let res: Resolution = Outcome::Superseded(record.clone()).into();
        assert_eq!(res, Resolution::Superseded(record));
        assert!(res.record_id().is_none());
    }
}
