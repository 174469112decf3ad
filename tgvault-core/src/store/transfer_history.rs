use super::MongoStore;
use crate::errors::Result;
use crate::models::{TelegramDeleteFailure, TransferHistory};
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::FindOptions;

impl MongoStore {
    pub async fn insert_transfer_history(&self, entry: &TransferHistory) -> Result<()> {
        self.transfer_history().insert_one(entry, None).await?;
        Ok(())
    }

    pub async fn list_transfer_history(&self, limit: i64) -> Result<Vec<TransferHistory>> {
        let opts = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .build();
        let mut cursor = self.transfer_history().find(None, opts).await?;
        let mut out = Vec::new();
        while let Some(entry) = cursor.try_next().await? {
            out.push(entry);
        }
        Ok(out)
    }

    pub async fn record_delete_failure(&self, failure: &TelegramDeleteFailure) -> Result<()> {
        self.delete_failures().insert_one(failure, None).await?;
        Ok(())
    }

    pub async fn list_delete_failures(&self) -> Result<Vec<TelegramDeleteFailure>> {
        let mut cursor = self.delete_failures().find(None, None).await?;
        let mut out = Vec::new();
        while let Some(failure) = cursor.try_next().await? {
            out.push(failure);
        }
        Ok(out)
    }
}
