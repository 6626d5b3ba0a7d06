//! Reverse-chronological, paginated view of stored records.
//!
//! A snapshot is read once per listing. Later pages come from that snapshot,
//! so records committed while paging only show up on the next listing.

use std::sync::Arc;

use tubedigest_core::error::DigestError;
use tubedigest_core::types::CacheRecord;
use tubedigest_storage::RecordStore;

/// Reads the store and orders its records newest first.
#[derive(Clone)]
pub struct HistoryProjector {
    store: Arc<RecordStore>,
}

impl HistoryProjector {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Take a fresh snapshot of every record.
    pub fn snapshot(&self) -> Result<HistorySnapshot, DigestError> {
        let mut records = self.store.get_all()?;
        records.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
        Ok(HistorySnapshot { records })
    }

    /// Snapshot plus its first page.
    pub fn list(&self, page_size: usize) -> Result<(HistorySnapshot, HistoryPage), DigestError> {
        let snapshot = self.snapshot()?;
        let first = snapshot.first_page(page_size);
        Ok((snapshot, first))
    }
}

/// Records ordered by descending `created_at`, ties by descending id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistorySnapshot {
    records: Vec<CacheRecord>,
}

impl HistorySnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CacheRecord] {
        &self.records
    }

    /// Up to `size` records starting at `offset`.
    pub fn page(&self, offset: usize, size: usize) -> HistoryPage {
        let start = offset.min(self.records.len());
        let end = start.saturating_add(size).min(self.records.len());
        HistoryPage {
            records: self.records[start..end].to_vec(),
            offset: start,
            has_more: end < self.records.len(),
        }
    }

    pub fn first_page(&self, page_size: usize) -> HistoryPage {
        self.page(0, page_size)
    }

    /// The page after the first `already_shown` records.
    pub fn more(&self, already_shown: usize, page_size: usize) -> HistoryPage {
        self.page(already_shown, page_size)
    }
}

/// One slice of a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPage {
    pub records: Vec<CacheRecord>,
    pub offset: usize,
    pub has_more: bool,
}

impl HistoryPage {
    /// Offset of the page that follows this one.
    pub fn next_offset(&self) -> usize {
        self.offset + self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubedigest_core::types::{NewRecord, Timestamp, VideoId, VideoMetadata};
    use tubedigest_storage::Database;

    fn make_store(timestamps: &[i64]) -> Arc<RecordStore> {
        let store = Arc::new(RecordStore::new(Arc::new(Database::in_memory().unwrap())));
        for (i, at) in timestamps.iter().enumerate() {
            store
                .put(&NewRecord::with_timestamp(
                    format!("https://youtu.be/video{:06}", i),
                    VideoId::new(format!("video{:06}", i)),
                    VideoMetadata::default(),
                    format!("summary {}", i),
                    Timestamp(*at),
                ))
                .unwrap();
        }
        store
    }

    fn stamps(page: &HistoryPage) -> Vec<i64> {
        page.records.iter().map(|r| r.created_at.0).collect()
    }

    #[test]
    fn test_seven_records_in_pages_of_five() {
        let projector = HistoryProjector::new(make_store(&[30, 10, 70, 50, 20, 60, 40]));

        let (snapshot, first) = projector.list(5).unwrap();
        assert_eq!(snapshot.len(), 7);
        assert_eq!(stamps(&first), vec![70, 60, 50, 40, 30]);
        assert!(first.has_more);

        let second = snapshot.more(first.next_offset(), 5);
        assert_eq!(stamps(&second), vec![20, 10]);
        assert!(!second.has_more);

        let third = snapshot.more(second.next_offset(), 5);
        assert!(third.records.is_empty());
        assert!(!third.has_more);
    }

    #[test]
    fn test_empty_store() {
        let projector = HistoryProjector::new(make_store(&[]));
        let (snapshot, first) = projector.list(5).unwrap();
        assert!(snapshot.is_empty());
        assert!(first.records.is_empty());
        assert!(!first.has_more);
    }

    #[test]
    fn test_exact_page_has_no_more() {
        let projector = HistoryProjector::new(make_store(&[1, 2, 3, 4, 5]));
        let (_, first) = projector.list(5).unwrap();
        assert_eq!(first.records.len(), 5);
        assert!(!first.has_more);
    }

    #[test]
    fn test_ties_ordered_by_id_descending() {
        let projector = HistoryProjector::new(make_store(&[5, 5, 5]));
        let snapshot = projector.snapshot().unwrap();
        let ids: Vec<i64> = snapshot.records().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_more_is_idempotent() {
        let projector = HistoryProjector::new(make_store(&[1, 2, 3, 4, 5, 6, 7]));
        let (snapshot, _) = projector.list(5).unwrap();
        assert_eq!(snapshot.more(5, 5), snapshot.more(5, 5));
    }

    #[test]
    fn test_snapshot_ignores_later_writes() {
        let store = make_store(&[1, 2, 3]);
        let projector = HistoryProjector::new(Arc::clone(&store));
        let (snapshot, _) = projector.list(2).unwrap();

        store
            .put(&NewRecord::with_timestamp(
                "https://youtu.be/late0000000",
                VideoId::new("late0000000"),
                VideoMetadata::default(),
                "late",
                Timestamp(100),
            ))
            .unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(stamps(&snapshot.more(2, 2)), vec![1]);
        assert_eq!(projector.snapshot().unwrap().len(), 4);
    }

    #[test]
    fn test_offset_past_end() {
        let projector = HistoryProjector::new(make_store(&[1, 2]));
        let snapshot = projector.snapshot().unwrap();
        let page = snapshot.page(10, 5);
        assert!(page.records.is_empty());
        assert_eq!(page.offset, 2);
        assert!(!page.has_more);
    }

    #[test]
    fn test_zero_page_size() {
        let projector = HistoryProjector::new(make_store(&[1, 2]));
        let (_, first) = projector.list(0).unwrap();
        assert!(first.records.is_empty());
        assert!(first.has_more);
    }
}
