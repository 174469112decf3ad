use super::MongoStore;
use crate::errors::Result;
use crate::models::Chunk;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::FindOptions;

impl MongoStore {
    pub async fn insert_chunk(&self, chunk: &Chunk) -> Result<()> {
        self.chunks().insert_one(chunk, None).await?;
        Ok(())
    }

    pub async fn list_chunks_by_item(&self, item_id: &ObjectId) -> Result<Vec<Chunk>> {
        let opts = FindOptions::builder().sort(doc! { "chunk_index": 1 }).build();
        let mut cursor = self.chunks().find(doc! { "item_id": item_id }, opts).await?;
        let mut out = Vec::new();
        while let Some(chunk) = cursor.try_next().await? {
            out.push(chunk);
        }
        Ok(out)
    }

    pub async fn delete_chunks_by_item(&self, item_id: &ObjectId) -> Result<Vec<Chunk>> {
        let chunks = self.list_chunks_by_item(item_id).await?;
        self.chunks()
            .delete_many(doc! { "item_id": item_id }, None)
            .await?;
        Ok(chunks)
    }

    pub async fn delete_chunks_by_items(&self, item_ids: &[ObjectId]) -> Result<Vec<Chunk>> {
        let mut cursor = self
            .chunks()
            .find(doc! { "item_id": { "$in": item_ids } }, None)
            .await?;
        let mut out = Vec::new();
        while let Some(chunk) = cursor.try_next().await? {
            out.push(chunk);
        }
        self.chunks()
            .delete_many(doc! { "item_id": { "$in": item_ids } }, None)
            .await?;
        Ok(out)
    }
}
