use crate::config::AccessMethod;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Uploading,
    Completed,
    Failed,
}

/// Resumable upload staging state (spec.md §3 "UploadSession").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSession {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub item_id: ObjectId,
    pub file_name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub total_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u32,
    pub access_method: AccessMethod,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadSession {
    /// Design Note §9(b): a single-chunk official session never runs the
    /// merge branch — it relies on the single chunk inserted at receive
    /// time, same as any other official chunk. Only self-hosted sessions
    /// stage to disk and merge at completion; this is the gate that keeps
    /// the two completion code paths apart.
    pub fn uses_merge_completion(&self) -> bool {
        matches!(self.access_method, AccessMethod::SelfHosted)
    }

    pub fn staging_dir(&self, staging_root: &std::path::Path) -> std::path::PathBuf {
        staging_root.join(self.id.expect("session must be persisted").to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(access_method: AccessMethod, total_chunks: u32) -> UploadSession {
        UploadSession {
            id: Some(ObjectId::new()),
            item_id: ObjectId::new(),
            file_name: "f".into(),
            mime_type: None,
            total_size: 10,
            chunk_size: 10,
            total_chunks,
            access_method,
            status: SessionStatus::Uploading,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn official_never_merges_regardless_of_chunk_count() {
        assert!(!session(AccessMethod::Official, 1).uses_merge_completion());
        assert!(!session(AccessMethod::Official, 3).uses_merge_completion());
    }

    #[test]
    fn self_hosted_always_merges() {
        assert!(session(AccessMethod::SelfHosted, 1).uses_merge_completion());
        assert!(session(AccessMethod::SelfHosted, 5).uses_merge_completion());
    }
}
