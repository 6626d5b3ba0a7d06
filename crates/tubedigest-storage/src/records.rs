//! Append-only store of pipeline results.
//!
//! Records are inserted once and never updated or deleted. Lookups by url and
//! by video id go through their secondary index when the schema has it and
//! degrade to a filtered scan otherwise; both paths pick the same record.

use std::sync::Arc;

use tracing::debug;

use tubedigest_core::error::DigestError;
use tubedigest_core::types::{CacheRecord, NewRecord, RecordId, Timestamp, VideoId, VideoMetadata};

use crate::db::Database;
use crate::migrations::{self, IDX_URL, IDX_VIDEO_ID};

const RECORD_COLUMNS: &str = "id, url, video_id, metadata, summary, created_at";

/// Field a "latest" lookup is keyed on.
#[derive(Debug, Clone, Copy)]
enum LookupField {
    Url,
    VideoId,
}

impl LookupField {
    fn column(self) -> &'static str {
        match self {
            LookupField::Url => "url",
            LookupField::VideoId => "video_id",
        }
    }

    fn index_name(self) -> &'static str {
        match self {
            LookupField::Url => IDX_URL,
            LookupField::VideoId => IDX_VIDEO_ID,
        }
    }

    fn matches(self, record: &CacheRecord, value: &str) -> bool {
        match self {
            LookupField::Url => record.url == value,
            LookupField::VideoId => record.video_id.as_str() == value,
        }
    }
}

/// Repository for cached pipeline results.
pub struct RecordStore {
    db: Arc<Database>,
}

impl RecordStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Persist a record and return its freshly assigned id.
    pub fn put(&self, record: &NewRecord) -> Result<RecordId, DigestError> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|e| DigestError::StoreWrite(format!("Failed to encode metadata: {}", e)))?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO records (url, video_id, metadata, summary, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    record.url,
                    record.video_id.as_str(),
                    metadata,
                    record.summary,
                    record.created_at.0,
                ],
            )
            .map_err(|e| DigestError::StoreWrite(format!("Failed to save record: {}", e)))?;
            Ok(RecordId(conn.last_insert_rowid()))
        })
    }

    /// Every stored record, in no particular order.
    pub fn get_all(&self) -> Result<Vec<CacheRecord>, DigestError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!("SELECT {} FROM records", RECORD_COLUMNS))
                .map_err(|e| DigestError::StoreRead(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| Ok(row_to_record(row)))
                .map_err(|e| DigestError::StoreRead(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let record = row.map_err(|e| DigestError::StoreRead(e.to_string()))??;
                records.push(record);
            }
            Ok(records)
        })
    }

    /// Most recent record submitted with exactly this url.
    pub fn find_latest_by_url(&self, url: &str) -> Result<Option<CacheRecord>, DigestError> {
        self.find_latest(LookupField::Url, url)
    }

    /// Most recent record for this video id.
    pub fn find_latest_by_video_id(
        &self,
        video_id: &VideoId,
    ) -> Result<Option<CacheRecord>, DigestError> {
        self.find_latest(LookupField::VideoId, video_id.as_str())
    }

    /// Total number of stored records.
    pub fn count(&self) -> Result<u64, DigestError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
                .map_err(|e| DigestError::StoreRead(e.to_string()))?;
            Ok(count as u64)
        })
    }

    fn find_latest(
        &self,
        field: LookupField,
        value: &str,
    ) -> Result<Option<CacheRecord>, DigestError> {
        let indexed = self
            .db
            .with_conn(|conn| migrations::has_index(conn, field.index_name()))?;

        if indexed {
            self.find_latest_indexed(field, value)
        } else {
            debug!(
                index = field.index_name(),
                "Lookup index missing, scanning all records"
            );
            self.find_latest_scan(field, value)
        }
    }

    fn find_latest_indexed(
        &self,
        field: LookupField,
        value: &str,
    ) -> Result<Option<CacheRecord>, DigestError> {
        let sql = format!(
            "SELECT {} FROM records INDEXED BY {} WHERE {} = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT 1",
            RECORD_COLUMNS,
            field.index_name(),
            field.column(),
        );

        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DigestError::StoreRead(e.to_string()))?;

            let result = stmt
                .query_row(rusqlite::params![value], |row| Ok(row_to_record(row)))
                .optional()
                .map_err(|e| DigestError::StoreRead(e.to_string()))?;

            match result {
                Some(record) => Ok(Some(record?)),
                None => Ok(None),
            }
        })
    }

    fn find_latest_scan(
        &self,
        field: LookupField,
        value: &str,
    ) -> Result<Option<CacheRecord>, DigestError> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|record| field.matches(record, value))
            .max_by_key(CacheRecord::recency_key))
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<CacheRecord, DigestError> {
    let id: i64 = row
        .get(0)
        .map_err(|e| DigestError::StoreRead(e.to_string()))?;
    let url: String = row
        .get(1)
        .map_err(|e| DigestError::StoreRead(e.to_string()))?;
    let video_id: String = row
        .get(2)
        .map_err(|e| DigestError::StoreRead(e.to_string()))?;
    let metadata_json: String = row
        .get(3)
        .map_err(|e| DigestError::StoreRead(e.to_string()))?;
    let summary: String = row
        .get(4)
        .map_err(|e| DigestError::StoreRead(e.to_string()))?;
    let created_at: i64 = row
        .get(5)
        .map_err(|e| DigestError::StoreRead(e.to_string()))?;

    let metadata: VideoMetadata = serde_json::from_str(&metadata_json).map_err(|e| {
        DigestError::StoreRead(format!("Invalid metadata for record {}: {}", id, e))
    })?;

    Ok(NewRecord::with_timestamp(
        url,
        VideoId(video_id),
        metadata,
        summary,
        Timestamp(created_at),
    )
    .into_stored(RecordId(id)))
}

/// Extension trait for rusqlite to support optional query results.
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
