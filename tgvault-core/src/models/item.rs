use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A node in the logical file tree: a folder or a file of one of the listed
/// media kinds (spec.md §3 "Item").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Folder,
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Code,
    Other,
}

impl ItemKind {
    pub fn is_folder(self) -> bool {
        matches!(self, ItemKind::Folder)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub kind: ItemKind,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<ObjectId>,
    /// Materialized path: slash-joined, always starts with `/`.
    pub path: String,
    /// Bytes; 0 for folders or until chunks are committed.
    pub size: u64,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub in_vault: bool,
    #[serde(default)]
    pub shared_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_accessed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trashed_at: Option<DateTime<Utc>>,
}

impl Item {
    /// `isShared` is derived from `sharedCode` presence, never stored twice.
    pub fn is_shared(&self) -> bool {
        self.shared_code.is_some()
    }

    pub fn is_trashed(&self) -> bool {
        self.trashed_at.is_some()
    }

    pub fn join_path(parent_path: &str, name: &str) -> String {
        if parent_path == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", parent_path, name)
        }
    }

    /// True if `maybe_descendant_path` is `self`'s path or lives under it —
    /// used to reject moving an item into itself or a descendant (invariant d).
    pub fn path_contains(ancestor_path: &str, maybe_descendant_path: &str) -> bool {
        maybe_descendant_path == ancestor_path
            || maybe_descendant_path.starts_with(&format!("{}/", ancestor_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_handles_root() {
        assert_eq!(Item::join_path("/", "movie.mp4"), "/movie.mp4");
        assert_eq!(Item::join_path("/Videos", "movie.mp4"), "/Videos/movie.mp4");
    }

    #[test]
    fn path_contains_detects_self_and_descendants() {
        assert!(Item::path_contains("/A", "/A"));
        assert!(Item::path_contains("/A", "/A/B"));
        assert!(!Item::path_contains("/A", "/AB"));
        assert!(!Item::path_contains("/A/B", "/A"));
    }
}
