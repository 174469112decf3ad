use super::MongoStore;
use crate::errors::{Result, TgVaultError};
use crate::models::{SessionStatus, UploadSession};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;

impl MongoStore {
    pub async fn create_session(&self, session: &UploadSession) -> Result<ObjectId> {
        let res = self.sessions().insert_one(session, None).await?;
        res.inserted_id
            .as_object_id()
            .ok_or_else(|| TgVaultError::Internal("insert did not return an ObjectId".into()))
    }

    pub async fn get_session(&self, id: &ObjectId) -> Result<UploadSession> {
        self.sessions()
            .find_one(doc! { "_id": id }, None)
            .await?
            .ok_or_else(|| TgVaultError::NotFound(format!("upload session {}", id)))
    }

    pub async fn touch_session(&self, id: &ObjectId, now: DateTime<Utc>) -> Result<()> {
        self.sessions()
            .update_one(doc! { "_id": id }, doc! { "$set": { "updated_at": now } }, None)
            .await?;
        Ok(())
    }

    pub async fn set_session_status(
        &self,
        id: &ObjectId,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let status = mongodb::bson::to_bson(&status)?;
        self.sessions()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "status": status, "updated_at": now } },
                None,
            )
            .await?;
        Ok(())
    }

    /// Sessions idle past the TTL, for the session reaper (spec.md §4.9).
    pub async fn list_expired_sessions(&self, cutoff: DateTime<Utc>) -> Result<Vec<UploadSession>> {
        let filter = doc! {
            "status": "uploading",
            "updated_at": { "$lt": cutoff },
        };
        let mut cursor = self.sessions().find(filter, None).await?;
        let mut out = Vec::new();
        while let Some(session) = cursor.try_next().await? {
            out.push(session);
        }
        Ok(out)
    }

    pub async fn delete_session(&self, id: &ObjectId) -> Result<()> {
        self.sessions().delete_one(doc! { "_id": id }, None).await?;
        Ok(())
    }
}
