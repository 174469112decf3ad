use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum TorrentSource {
    Url(String),
    File(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentTaskStatus {
    Queued,
    Downloading,
    AwaitingSelection,
    Uploading,
    Completed,
    Error,
}

/// Source-cleanup scheduling policy (spec.md §4.8, Design Note §9).
/// `dueAt` is computed once at scheduling time and never recomputed, so a
/// later policy change only affects future tasks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SourceCleanupPolicy {
    Immediate,
    Fixed { minutes: u32 },
    Random { min_minutes: u32, max_minutes: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentTask {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub source: TorrentSource,
    pub name: String,
    /// 40 hex chars.
    pub infohash: String,
    pub meta_file_path: String,
    #[serde(default)]
    pub client_hash: Option<String>,
    pub target_chat_id: String,
    #[serde(default)]
    pub target_parent_item_id: Option<ObjectId>,
    pub submitter: String,
    pub estimated_size: u64,
    pub downloaded_bytes: u64,
    /// `[0, 1]`.
    pub progress: f64,
    pub private: bool,
    pub tracker_hosts: Vec<String>,
    pub status: TorrentTaskStatus,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub source_cleanup_due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-file selection + ingest result (spec.md §3 "TorrentTaskFile").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentTaskFile {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub task_id: ObjectId,
    pub file_index: u32,
    pub absolute_path: String,
    pub display_name: String,
    pub size: u64,
    pub selected: bool,
    pub uploaded: bool,
    #[serde(default)]
    pub uploaded_item_id: Option<ObjectId>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TorrentTask {
    pub fn is_done(&self) -> bool {
        self.progress >= 0.999
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_threshold_matches_spec() {
        let mut t = base();
        t.progress = 0.998;
        assert!(!t.is_done());
        t.progress = 0.999;
        assert!(t.is_done());
        t.progress = 1.0;
        assert!(t.is_done());
    }

    fn base() -> TorrentTask {
        TorrentTask {
            id: None,
            source: TorrentSource::Url("magnet:?xt=urn:btih:abc".into()),
            name: "t".into(),
            infohash: "a".repeat(40),
            meta_file_path: "/tmp/t.torrent".into(),
            client_hash: None,
            target_chat_id: "chat".into(),
            target_parent_item_id: None,
            submitter: "op".into(),
            estimated_size: 0,
            downloaded_bytes: 0,
            progress: 0.0,
            private: false,
            tracker_hosts: vec![],
            status: TorrentTaskStatus::Queued,
            error_message: None,
            source_cleanup_due_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
