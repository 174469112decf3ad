pub mod chunks;
pub mod items;
pub mod settings;
pub mod shares;
pub mod sessions;
pub mod torrents;
pub mod transfer_history;

use crate::errors::Result;
use crate::models::{
    Chunk, Item, TelegramDeleteFailure, TorrentTask, TorrentTaskFile, TransferHistory,
    UploadSession,
};
use mongodb::bson::doc;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, IndexModel};

/// The Metadata Store (spec.md §4.1): offers typed operations over items,
/// chunks, sessions, tasks, shares, transfer history and runtime settings.
/// Grounded on the teacher's `MongoStore` (`storage.rs`), generalized from a
/// flat file-name index into a materialized-path tree.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db_name: String,
}

impl MongoStore {
    pub async fn new(uri: &str) -> Result<Self> {
        let mut client_options = ClientOptions::parse(uri).await?;
        client_options.app_name = Some("tgvault".to_string());
        let client = Client::with_options(client_options)?;
        let store = Self {
            client,
            db_name: "tgvault".to_string(),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    pub(crate) fn items(&self) -> Collection<Item> {
        self.client.database(&self.db_name).collection("items")
    }

    pub(crate) fn chunks(&self) -> Collection<Chunk> {
        self.client.database(&self.db_name).collection("chunks")
    }

    pub(crate) fn sessions(&self) -> Collection<UploadSession> {
        self.client.database(&self.db_name).collection("upload_sessions")
    }

    pub(crate) fn torrent_tasks(&self) -> Collection<TorrentTask> {
        self.client.database(&self.db_name).collection("torrent_tasks")
    }

    pub(crate) fn torrent_task_files(&self) -> Collection<TorrentTaskFile> {
        self.client
            .database(&self.db_name)
            .collection("torrent_task_files")
    }

    pub(crate) fn transfer_history(&self) -> Collection<TransferHistory> {
        self.client
            .database(&self.db_name)
            .collection("transfer_history")
    }

    pub(crate) fn delete_failures(&self) -> Collection<TelegramDeleteFailure> {
        self.client
            .database(&self.db_name)
            .collection("telegram_delete_failures")
    }

    pub(crate) fn settings(&self) -> Collection<mongodb::bson::Document> {
        self.client.database(&self.db_name).collection("settings")
    }

    /// Unique and partial-unique indexes backing the invariants in
    /// spec.md §3: `(parentId, name)` unique among non-trashed siblings,
    /// `(itemId, chunkIndex)` unique, `sharedCode` globally unique.
    async fn ensure_indexes(&self) -> Result<()> {
        let sibling_unique = IndexModel::builder()
            .keys(doc! { "parent_id": 1, "name": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "trashed_at": { "$eq": null } })
                    .build(),
            )
            .build();
        self.items().create_index(sibling_unique, None).await?;

        let share_unique = IndexModel::builder()
            .keys(doc! { "shared_code": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .partial_filter_expression(doc! { "shared_code": { "$exists": true } })
                    .build(),
            )
            .build();
        self.items().create_index(share_unique, None).await?;

        let path_index = IndexModel::builder().keys(doc! { "path": 1 }).build();
        self.items().create_index(path_index, None).await?;

        let chunk_unique = IndexModel::builder()
            .keys(doc! { "item_id": 1, "chunk_index": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.chunks().create_index(chunk_unique, None).await?;

        let task_status_index = IndexModel::builder().keys(doc! { "status": 1 }).build();
        self.torrent_tasks()
            .create_index(task_status_index, None)
            .await?;

        Ok(())
    }
}
