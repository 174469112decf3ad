use super::MongoStore;
use crate::errors::Result;
use crate::models::SourceCleanupPolicy;
use mongodb::bson::{doc, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

const CLEANUP_POLICY_KEY: &str = "default_cleanup_policy";
const UPLOAD_SLOTS_KEY: &str = "upload_slots";
const DOWNLOAD_SLOTS_KEY: &str = "download_slots";

/// Runtime-mutable operator settings that override the values `Config`
/// loaded at boot (spec.md §5 "operators may retune concurrency without a
/// restart"). Backed by a single-document-per-key collection, mirroring the
/// teacher's ad hoc `doc! {}` usage elsewhere in `storage.rs`.
impl MongoStore {
    async fn get_setting(&self, key: &str) -> Result<Option<Document>> {
        Ok(self.settings().find_one(doc! { "_id": key }, None).await?)
    }

    async fn put_setting(&self, key: &str, value: Document) -> Result<()> {
        let mut doc = value;
        doc.insert("_id", key);
        let opts = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();
        self.settings()
            .find_one_and_update(
                doc! { "_id": key },
                doc! { "$set": doc },
                opts,
            )
            .await?;
        Ok(())
    }

    pub async fn get_cleanup_policy_override(&self) -> Result<Option<SourceCleanupPolicy>> {
        match self.get_setting(CLEANUP_POLICY_KEY).await? {
            Some(doc) => Ok(Some(mongodb::bson::from_document(doc)?)),
            None => Ok(None),
        }
    }

    pub async fn set_cleanup_policy_override(&self, policy: SourceCleanupPolicy) -> Result<()> {
        let doc = mongodb::bson::to_document(&policy)?;
        self.put_setting(CLEANUP_POLICY_KEY, doc).await
    }

    pub async fn get_slot_override(&self, key: SlotKind) -> Result<Option<usize>> {
        let key = match key {
            SlotKind::Upload => UPLOAD_SLOTS_KEY,
            SlotKind::Download => DOWNLOAD_SLOTS_KEY,
        };
        match self.get_setting(key).await? {
            Some(doc) => Ok(doc.get_i64("value").ok().map(|v| v as usize)),
            None => Ok(None),
        }
    }

    pub async fn set_slot_override(&self, key: SlotKind, value: usize) -> Result<()> {
        let key = match key {
            SlotKind::Upload => UPLOAD_SLOTS_KEY,
            SlotKind::Download => DOWNLOAD_SLOTS_KEY,
        };
        self.put_setting(key, doc! { "value": value as i64 }).await
    }
}

#[derive(Debug, Clone, Copy)]
pub enum SlotKind {
    Upload,
    Download,
}
