use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// One piece of an item's bytes, stored as one Telegram message
/// (spec.md §3 "Chunk").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub item_id: ObjectId,
    pub chunk_index: u32,
    pub size: u64,
    pub telegram_chat_id: String,
    pub telegram_message_id: i64,
    pub telegram_file_id: String,
    pub telegram_file_unique_id: String,
    pub created_at: DateTime<Utc>,
}

/// Inclusive `[start, end]` span a chunk occupies within an item's bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub chunk_index: u32,
    pub start_abs: u64,
    pub end_abs: u64,
}

impl Chunk {
    pub fn span(&self, offset: u64) -> ChunkSpan {
        ChunkSpan {
            chunk_index: self.chunk_index,
            start_abs: offset,
            end_abs: offset + self.size - 1,
        }
    }
}

/// Chunk filename scheme (spec.md §4.5): `<base>-<first-8-of-itemid>.part<5
/// digit index><ext>`, so humans inspecting the storage chat can see
/// ordering.
pub fn chunk_file_name(original_name: &str, item_id: &ObjectId, index: u32) -> String {
    let id_hex = item_id.to_hex();
    let prefix = &id_hex[..id_hex.len().min(8)];
    let path = std::path::Path::new(original_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| original_name.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    format!("{}-{}.part{:05}{}", stem, prefix, index, ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_filename_matches_spec_example() {
        let id = ObjectId::parse_str("a1b2c3d4e5f607182930a1b2").unwrap();
        assert_eq!(
            chunk_file_name("movie.mp4", &id, 12),
            "movie-a1b2c3d4.part00012.mp4"
        );
    }

    #[test]
    fn chunk_filename_handles_no_extension() {
        let id = ObjectId::parse_str("a1b2c3d4e5f607182930a1b2").unwrap();
        assert_eq!(chunk_file_name("README", &id, 0), "README-a1b2c3d4.part00000");
    }
}
