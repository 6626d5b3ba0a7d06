//! Cache lookup for a submitted reference.
//!
//! The exact reference is tried first. On a miss the reference is normalized
//! to a video id locally and looked up by id, so different spellings of the
//! same video share one cache entry. Nothing remote is called here.

use std::sync::Arc;

use tracing::debug;

use tubedigest_core::error::DigestError;
use tubedigest_core::types::CacheRecord;
use tubedigest_core::video_id::extract_video_id;
use tubedigest_storage::RecordStore;

#[derive(Clone)]
pub struct CacheResolver {
    store: Arc<RecordStore>,
}

impl CacheResolver {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Latest stored record for `reference`, if any.
    pub fn resolve(&self, reference: &str) -> Result<Option<CacheRecord>, DigestError> {
        if let Some(record) = self.store.find_latest_by_url(reference)? {
            debug!(url = %reference, id = %record.id, "Cache hit by url");
            return Ok(Some(record));
        }

        let Some(video_id) = extract_video_id(reference) else {
            debug!(url = %reference, "No local video id, cache miss");
            return Ok(None);
        };

        let found = self.store.find_latest_by_video_id(&video_id)?;
        match &found {
            Some(record) => debug!(video_id = %video_id, id = %record.id, "Cache hit by video id"),
            None => debug!(video_id = %video_id, "Cache miss"),
        }
        Ok(found)
    }
}
