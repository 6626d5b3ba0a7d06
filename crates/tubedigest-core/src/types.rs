use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display name used when metadata carries neither a channel nor an uploader.
pub const UNKNOWN_CHANNEL: &str = "Unknown";

/// Display title used when metadata carries no title.
pub const UNTITLED: &str = "Untitled";

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Store-assigned surrogate key of a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized video identifier (11-character token on the upstream platform).
///
/// The newtype does not enforce the length: identifiers come either from the
/// remote resolver or from URL paths, and both are stored as given.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoId(pub String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wall-clock time in milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

/// Highest timestamp handed out by [`Timestamp::now`] in this process.
static LAST_ISSUED: AtomicI64 = AtomicI64::new(i64::MIN);

impl Timestamp {
    /// Current time, never earlier than any value previously returned here,
    /// so a backwards clock step cannot make a newer record look older.
    pub fn now() -> Self {
        Self::issue(Utc::now().timestamp_millis())
    }

    fn issue(clock_millis: i64) -> Self {
        let previous = LAST_ISSUED.fetch_max(clock_millis, Ordering::SeqCst);
        Self(previous.max(clock_millis))
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

// =============================================================================
// Video Metadata
// =============================================================================

/// Structured description of a resolved video.
///
/// All known attributes are optional; anything else the resolver returns is
/// kept verbatim in `extra` so nothing is lost on the way to the store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Channel name as some resolvers spell it; any mix of the channel keys
    /// may be present.
    #[serde(
        default,
        rename = "channelTitle",
        skip_serializing_if = "Option::is_none"
    )]
    pub channel_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webpage_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl VideoMetadata {
    /// Name of whoever published the video: `channel`, `channelTitle`,
    /// `channel_name`, then uploader, then [`UNKNOWN_CHANNEL`].
    pub fn display_name(&self) -> String {
        non_blank(&self.channel)
            .or_else(|| non_blank(&self.channel_title))
            .or_else(|| non_blank(&self.channel_name))
            .or_else(|| non_blank(&self.uploader))
            .unwrap_or(UNKNOWN_CHANNEL)
            .to_string()
    }

    /// Title, or [`UNTITLED`].
    pub fn display_title(&self) -> String {
        non_blank(&self.title).unwrap_or(UNTITLED).to_string()
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

// =============================================================================
// Records
// =============================================================================

/// A fully assembled pipeline result that has not been assigned an id yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Raw reference as submitted.
    pub url: String,
    pub video_id: VideoId,
    pub metadata: VideoMetadata,
    pub summary: String,
    pub created_at: Timestamp,
    /// Resolved from `metadata` at construction.
    pub title: String,
    /// Resolved from `metadata` at construction.
    pub channel: String,
}

impl NewRecord {
    /// Assemble a record stamped with the current time.
    pub fn new(
        url: impl Into<String>,
        video_id: VideoId,
        metadata: VideoMetadata,
        summary: impl Into<String>,
    ) -> Self {
        Self::with_timestamp(url, video_id, metadata, summary, Timestamp::now())
    }

    pub fn with_timestamp(
        url: impl Into<String>,
        video_id: VideoId,
        metadata: VideoMetadata,
        summary: impl Into<String>,
        created_at: Timestamp,
    ) -> Self {
        let title = metadata.display_title();
        let channel = metadata.display_name();
        Self {
            url: url.into(),
            video_id,
            metadata,
            summary: summary.into(),
            created_at,
            title,
            channel,
        }
    }

    /// Attach the id the store assigned.
    pub fn into_stored(self, id: RecordId) -> CacheRecord {
        CacheRecord {
            id,
            url: self.url,
            video_id: self.video_id,
            metadata: self.metadata,
            summary: self.summary,
            created_at: self.created_at,
            title: self.title,
            channel: self.channel,
        }
    }
}

/// One persisted outcome of a successful pipeline run. Never mutated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub id: RecordId,
    pub url: String,
    pub video_id: VideoId,
    pub metadata: VideoMetadata,
    pub summary: String,
    pub created_at: Timestamp,
    pub title: String,
    pub channel: String,
}

impl CacheRecord {
    /// Ordering key for "latest wins": creation time, then surrogate id.
    pub fn recency_key(&self) -> (Timestamp, RecordId) {
        (self.created_at, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_prefers_channel() {
        let meta = VideoMetadata {
            channel: Some("Channel".into()),
            uploader: Some("Uploader".into()),
            ..Default::default()
        };
        assert_eq!(meta.display_name(), "Channel");
    }

    #[test]
    fn test_display_name_falls_back_to_uploader_then_unknown() {
        let meta = VideoMetadata {
            uploader: Some("Uploader".into()),
            channel: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(meta.display_name(), "Uploader");
        assert_eq!(VideoMetadata::default().display_name(), UNKNOWN_CHANNEL);
    }

    #[test]
    fn test_display_title_fallback() {
        assert_eq!(VideoMetadata::default().display_title(), UNTITLED);
        let meta = VideoMetadata {
            title: Some("Rust in 100 Seconds".into()),
            ..Default::default()
        };
        assert_eq!(meta.display_title(), "Rust in 100 Seconds");
    }

    #[test]
    fn test_metadata_accepts_channel_aliases_and_keeps_extra() {
        let json = r#"{
            "title": "Talk",
            "channelTitle": "Conf",
            "view_count": 42
        }"#;
        let meta: VideoMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.channel_title.as_deref(), Some("Conf"));
        assert_eq!(meta.display_name(), "Conf");
        assert_eq!(meta.extra.get("view_count"), Some(&serde_json::json!(42)));

        let meta: VideoMetadata = serde_json::from_str(r#"{"channel_name": "Other"}"#).unwrap();
        assert_eq!(meta.display_name(), "Other");
    }

    #[test]
    fn test_metadata_with_several_channel_keys() {
        let meta: VideoMetadata = serde_json::from_str(
            r#"{"title":"T","channel":"Chan","channelTitle":"Chan","uploader":"U"}"#,
        )
        .unwrap();
        assert_eq!(meta.channel.as_deref(), Some("Chan"));
        assert_eq!(meta.channel_title.as_deref(), Some("Chan"));
        assert_eq!(meta.display_name(), "Chan");

        let meta: VideoMetadata =
            serde_json::from_str(r#"{"channelTitle":"A","channel_name":"B"}"#).unwrap();
        assert_eq!(meta.display_name(), "A");
        assert!(meta.extra.is_empty());

        let meta: VideoMetadata =
            serde_json::from_str(r#"{"channel_name":"B","uploader":"U"}"#).unwrap();
        assert_eq!(meta.display_name(), "B");
    }

    #[test]
    fn test_channel_keys_survive_roundtrip() {
        let meta: VideoMetadata =
            serde_json::from_str(r#"{"channelTitle":"A","channel_name":"B","likes":3}"#).unwrap();
        let json = serde_json::to_string(&meta).unwrap();
        let back: VideoMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn test_new_record_resolves_display_fields() {
        let meta = VideoMetadata {
            uploader: Some("Someone".into()),
            ..Default::default()
        };
        let record = NewRecord::with_timestamp(
            "https://youtu.be/abc12345678",
            VideoId::new("abc12345678"),
            meta,
            "summary",
            Timestamp(1_700_000_000_000),
        );
        assert_eq!(record.title, UNTITLED);
        assert_eq!(record.channel, "Someone");

        let stored = record.into_stored(RecordId(3));
        assert_eq!(stored.id, RecordId(3));
        assert_eq!(stored.recency_key(), (Timestamp(1_700_000_000_000), RecordId(3)));
    }

    #[test]
    fn test_timestamp_now_does_not_go_backwards() {
        let ahead = Utc::now().timestamp_millis() + 60_000;
        assert_eq!(Timestamp::issue(ahead), Timestamp(ahead));
        // Clock stepped back five seconds.
        assert_eq!(Timestamp::issue(ahead - 5_000), Timestamp(ahead));
        assert!(Timestamp::now() >= Timestamp(ahead));
    }

    #[test]
    fn test_timestamp_millis_roundtrip() {
        let now = Utc::now();
        let ts = Timestamp::from_datetime(now);
        assert_eq!(ts.to_datetime().timestamp_millis(), now.timestamp_millis());
    }
}
