use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Upload,
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Completed,
    Error,
    Canceled,
}

/// Append-only audit row for each uploaded file and each user-initiated
/// download (spec.md §3 "TransferHistory").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferHistory {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub source_task_id: Option<ObjectId>,
    pub direction: TransferDirection,
    #[serde(default)]
    pub item_id: Option<ObjectId>,
    pub size: u64,
    pub status: TransferStatus,
    #[serde(default)]
    pub faststart_fallback: bool,
    #[serde(default)]
    pub preview_fallback: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// An upstream delete that could not be completed at permanent-delete time,
/// kept for later reconciliation (spec.md §3 "TelegramDeleteFailure").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramDeleteFailure {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub item_id: ObjectId,
    pub telegram_chat_id: String,
    pub telegram_message_id: i64,
    pub error_message: String,
    pub created_at: DateTime<Utc>,
}
