use super::MongoStore;
use crate::errors::{Result, TgVaultError};
use crate::models::{TorrentSource, TorrentTask, TorrentTaskFile, TorrentTaskStatus};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::bson::oid::ObjectId;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};

impl MongoStore {
    pub async fn create_torrent_task(&self, task: &TorrentTask) -> Result<ObjectId> {
        let res = self.torrent_tasks().insert_one(task, None).await?;
        res.inserted_id
            .as_object_id()
            .ok_or_else(|| TgVaultError::Internal("insert did not return an ObjectId".into()))
    }

    pub async fn get_torrent_task(&self, id: &ObjectId) -> Result<TorrentTask> {
        self.torrent_tasks()
            .find_one(doc! { "_id": id }, None)
            .await?
            .ok_or_else(|| TgVaultError::NotFound(format!("torrent task {}", id)))
    }

    pub async fn list_torrent_tasks(&self) -> Result<Vec<TorrentTask>> {
        let opts = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let mut cursor = self.torrent_tasks().find(None, opts).await?;
        let mut out = Vec::new();
        while let Some(task) = cursor.try_next().await? {
            out.push(task);
        }
        Ok(out)
    }

    /// Atomically claims the oldest task still in `queued`, moving it to
    /// `downloading` in the same operation so two worker loops can never
    /// pick up the same task (spec.md §4.8 "claim-next").
    pub async fn claim_next_queued_torrent_task(&self, now: DateTime<Utc>) -> Result<Option<TorrentTask>> {
        let opts = FindOneAndUpdateOptions::builder()
            .sort(doc! { "created_at": 1 })
            .return_document(ReturnDocument::After)
            .build();
        let task = self
            .torrent_tasks()
            .find_one_and_update(
                doc! { "status": "queued" },
                doc! { "$set": { "status": "downloading", "updated_at": now } },
                opts,
            )
            .await?;
        Ok(task)
    }

    /// Finds the single oldest-updated task in any of `statuses`, for the
    /// worker's single-flighted priority loop (spec.md §4.8 priority 2 and
    /// 3: "already downloading", "uploading or awaiting_selection"). Not a
    /// `find_one_and_update` claim since no status transition happens here —
    /// the task stays in place until the corresponding phase logic decides
    /// to move it.
    pub async fn find_oldest_torrent_task_by_statuses(
        &self,
        statuses: &[TorrentTaskStatus],
    ) -> Result<Option<TorrentTask>> {
        let values: Vec<mongodb::bson::Bson> =
            statuses.iter().map(|s| mongodb::bson::to_bson(s)).collect::<std::result::Result<_, _>>()?;
        let filter = doc! { "status": { "$in": values } };
        let opts = FindOptions::builder().sort(doc! { "updated_at": 1 }).limit(1).build();
        let mut cursor = self.torrent_tasks().find(filter, opts).await?;
        Ok(cursor.try_next().await?)
    }

    /// Patches in the on-disk `.torrent` meta file path once it has been
    /// written, for a task created from an uploaded file rather than a
    /// magnet/URL (spec.md §6, §4.8 cleanup's `.torrent` meta file removal).
    pub async fn set_torrent_source_and_meta_path(
        &self,
        id: &ObjectId,
        source: &TorrentSource,
        meta_file_path: &str,
    ) -> Result<()> {
        let source_bson = mongodb::bson::to_bson(source)?;
        self.torrent_tasks()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "source": source_bson, "meta_file_path": meta_file_path } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn set_torrent_task_status(
        &self,
        id: &ObjectId,
        status: TorrentTaskStatus,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let status = mongodb::bson::to_bson(&status)?;
        self.torrent_tasks()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "status": status, "updated_at": now } },
                None,
            )
            .await?;
        Ok(())
    }

    /// Resets a task back to a fresh `queued` state for another attempt:
    /// clears progress, the prior external-client linkage, and the error
    /// message, so the worker re-adds the torrent from scratch on its next
    /// claim (spec.md §4.8 "Retry").
    pub async fn reset_torrent_task_for_retry(&self, id: &ObjectId, now: DateTime<Utc>) -> Result<()> {
        self.torrent_tasks()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "status": "queued",
                        "client_hash": mongodb::bson::Bson::Null,
                        "downloaded_bytes": 0i64,
                        "progress": 0.0,
                        "error_message": mongodb::bson::Bson::Null,
                        "updated_at": now,
                    },
                    "$unset": { "source_cleanup_due_at": "" },
                },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn set_torrent_task_error(&self, id: &ObjectId, message: &str, now: DateTime<Utc>) -> Result<()> {
        self.torrent_tasks()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "status": "error", "error_message": message, "updated_at": now } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn update_torrent_progress(
        &self,
        id: &ObjectId,
        downloaded_bytes: u64,
        progress: f64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.torrent_tasks()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "downloaded_bytes": downloaded_bytes as i64,
                        "progress": progress,
                        "updated_at": now,
                    }
                },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn set_torrent_cleanup_due_at(&self, id: &ObjectId, due_at: DateTime<Utc>) -> Result<()> {
        self.torrent_tasks()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "source_cleanup_due_at": due_at } },
                None,
            )
            .await?;
        Ok(())
    }

    /// Completed tasks whose cleanup is now due, for the source-cleanup
    /// scheduler (spec.md §4.9).
    pub async fn list_torrent_tasks_due_for_cleanup(&self, now: DateTime<Utc>) -> Result<Vec<TorrentTask>> {
        let filter = doc! {
            "status": "completed",
            "source_cleanup_due_at": { "$lte": now },
        };
        let opts = FindOptions::builder().sort(doc! { "source_cleanup_due_at": 1 }).build();
        let mut cursor = self.torrent_tasks().find(filter, opts).await?;
        let mut out = Vec::new();
        while let Some(task) = cursor.try_next().await? {
            out.push(task);
        }
        Ok(out)
    }

    pub async fn clear_torrent_cleanup_due_at(&self, id: &ObjectId) -> Result<()> {
        self.torrent_tasks()
            .update_one(
                doc! { "_id": id },
                doc! { "$unset": { "source_cleanup_due_at": "" } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn insert_torrent_task_files(&self, files: &[TorrentTaskFile]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        self.torrent_task_files().insert_many(files, None).await?;
        Ok(())
    }

    pub async fn list_torrent_task_files(&self, task_id: &ObjectId) -> Result<Vec<TorrentTaskFile>> {
        let opts = FindOptions::builder().sort(doc! { "file_index": 1 }).build();
        let mut cursor = self
            .torrent_task_files()
            .find(doc! { "task_id": task_id }, opts)
            .await?;
        let mut out = Vec::new();
        while let Some(file) = cursor.try_next().await? {
            out.push(file);
        }
        Ok(out)
    }

    pub async fn set_torrent_task_file_selection(
        &self,
        task_id: &ObjectId,
        file_index: u32,
        selected: bool,
    ) -> Result<()> {
        self.torrent_task_files()
            .update_one(
                doc! { "task_id": task_id, "file_index": file_index as i64 },
                doc! { "$set": { "selected": selected } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn mark_torrent_task_file_uploaded(
        &self,
        task_id: &ObjectId,
        file_index: u32,
        item_id: &ObjectId,
    ) -> Result<()> {
        self.torrent_task_files()
            .update_one(
                doc! { "task_id": task_id, "file_index": file_index as i64 },
                doc! { "$set": { "uploaded": true, "uploaded_item_id": item_id } },
                None,
            )
            .await?;
        Ok(())
    }

    /// Removes a task row and its per-file rows. Does not touch the external
    /// client or on-disk download directory — that cleanup is the scheduled
    /// source-cleanup sweep's job (spec.md §4.8), so deleting a task that
    /// never reached `completed` just stops the engine from tracking it.
    pub async fn delete_torrent_task(&self, id: &ObjectId) -> Result<()> {
        self.torrent_task_files().delete_many(doc! { "task_id": id }, None).await?;
        self.torrent_tasks().delete_one(doc! { "_id": id }, None).await?;
        Ok(())
    }

    /// Drops a task's per-file rows without touching the task row itself, so
    /// a retried task starts selection over from a clean slate (spec.md §4.8
    /// "Retry").
    pub async fn delete_torrent_task_files(&self, task_id: &ObjectId) -> Result<()> {
        self.torrent_task_files().delete_many(doc! { "task_id": task_id }, None).await?;
        Ok(())
    }

    pub async fn mark_torrent_task_file_error(
        &self,
        task_id: &ObjectId,
        file_index: u32,
        message: &str,
    ) -> Result<()> {
        self.torrent_task_files()
            .update_one(
                doc! { "task_id": task_id, "file_index": file_index as i64 },
                doc! { "$set": { "error": message } },
                None,
            )
            .await?;
        Ok(())
    }
}
