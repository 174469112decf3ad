use super::MongoStore;
use crate::errors::{Result, TgVaultError};
use crate::models::{Item, ItemKind};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Regex};

/// Everything the caller needs to clean up chunk messages upstream after a
/// subtree delete (spec.md §4.1 "Subtree delete").
pub struct DeletedSubtree {
    pub item_ids: Vec<ObjectId>,
}

impl MongoStore {
    pub async fn get_item(&self, id: &ObjectId) -> Result<Item> {
        self.items()
            .find_one(doc! { "_id": id }, None)
            .await?
            .ok_or_else(|| TgVaultError::NotFound(format!("item {}", id)))
    }

    pub async fn get_item_by_path(&self, path: &str) -> Result<Option<Item>> {
        Ok(self.items().find_one(doc! { "path": path }, None).await?)
    }

    pub async fn get_item_by_share_code(&self, code: &str) -> Result<Item> {
        self.items()
            .find_one(doc! { "shared_code": code }, None)
            .await?
            .ok_or_else(|| TgVaultError::NotFound(format!("share {}", code)))
    }

    pub async fn list_children(&self, parent_id: Option<&ObjectId>, include_trashed: bool) -> Result<Vec<Item>> {
        let mut filter = match parent_id {
            Some(id) => doc! { "parent_id": id },
            None => doc! { "parent_id": { "$eq": null } },
        };
        if !include_trashed {
            filter.insert("trashed_at", doc! { "$eq": null });
        }
        let mut cursor = self.items().find(filter, None).await?;
        let mut out = Vec::new();
        while let Some(item) = cursor.try_next().await? {
            out.push(item);
        }
        Ok(out)
    }

    /// Create a folder or a zero-size placeholder item. The item row is
    /// created at size 0 first so `(parentId, name)` uniqueness is resolved
    /// before any chunk is sent (spec.md §4.5 "Upload Pipeline" rule).
    pub async fn create_item(
        &self,
        kind: ItemKind,
        name: &str,
        parent_id: Option<ObjectId>,
        mime_type: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Item> {
        if name.is_empty() || name.contains('/') {
            return Err(TgVaultError::BadInput(format!("invalid name {:?}", name)));
        }

        let parent_path = match parent_id {
            Some(ref pid) => self.get_item(pid).await?.path,
            None => "/".to_string(),
        };
        let path = Item::join_path(&parent_path, name);

        let item = Item {
            id: None,
            kind,
            name: name.to_string(),
            parent_id,
            path,
            size: 0,
            mime_type,
            is_favorite: false,
            in_vault: false,
            shared_code: None,
            created_at: now,
            updated_at: now,
            last_accessed_at: None,
            trashed_at: None,
        };

        let insert = self.items().insert_one(&item, None).await;
        let inserted_id = match insert {
            Ok(res) => res.inserted_id.as_object_id().ok_or_else(|| {
                TgVaultError::Internal("insert did not return an ObjectId".into())
            })?,
            Err(e) => {
                if is_duplicate_key(&e) {
                    return Err(TgVaultError::Conflict(format!(
                        "an item named {:?} already exists in this folder",
                        name
                    )));
                }
                return Err(e.into());
            }
        };

        let mut item = item;
        item.id = Some(inserted_id);
        Ok(item)
    }

    pub async fn set_item_size(&self, id: &ObjectId, size: u64, now: DateTime<Utc>) -> Result<()> {
        self.items()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "size": size as i64, "updated_at": now } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn touch_last_accessed(&self, id: &ObjectId, now: DateTime<Utc>) -> Result<()> {
        self.items()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "last_accessed_at": now } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn set_favorite(&self, id: &ObjectId, favorite: bool, now: DateTime<Utc>) -> Result<()> {
        self.items()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "is_favorite": favorite, "updated_at": now } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn set_vault(&self, id: &ObjectId, enabled: bool, now: DateTime<Utc>) -> Result<()> {
        self.items()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "in_vault": enabled, "updated_at": now } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn set_share(&self, id: &ObjectId, code: &str, now: DateTime<Utc>) -> Result<()> {
        let result = self
            .items()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "shared_code": code, "updated_at": now } },
                None,
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(TgVaultError::Conflict("share code collision".into())),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn clear_share(&self, id: &ObjectId, now: DateTime<Utc>) -> Result<()> {
        self.items()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "shared_code": mongodb::bson::Bson::Null, "updated_at": now } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn trash_item(&self, id: &ObjectId, now: DateTime<Utc>) -> Result<()> {
        self.items()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "trashed_at": now, "updated_at": now } },
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn restore_item(&self, id: &ObjectId, now: DateTime<Utc>) -> Result<()> {
        self.items()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": { "updated_at": now },
                    "$unset": { "trashed_at": "" },
                },
                None,
            )
            .await?;
        Ok(())
    }

    /// Atomic rename/move: validates the new `(parent, name)` has no live
    /// sibling, rewrites the item's own row, then rewrites every descendant
    /// row's `path` prefix — all inside one Mongo transaction (spec.md §4.1
    /// "Path maintenance").
    pub async fn rename_or_move(
        &self,
        id: &ObjectId,
        new_parent_id: Option<ObjectId>,
        new_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Item> {
        if new_name.is_empty() || new_name.contains('/') {
            return Err(TgVaultError::BadInput(format!("invalid name {:?}", new_name)));
        }

        let item = self.get_item(id).await?;

        let new_parent_path = match &new_parent_id {
            Some(pid) => self.get_item(pid).await?.path,
            None => "/".to_string(),
        };

        // Invariant (d): reject moving into self or a descendant.
        if Item::path_contains(&item.path, &new_parent_path) {
            return Err(TgVaultError::Forbidden(
                "cannot move an item into itself or a descendant".into(),
            ));
        }

        let new_path = Item::join_path(&new_parent_path, new_name);

        let sibling_filter = doc! {
            "_id": { "$ne": id },
            "parent_id": option_to_bson(&new_parent_id),
            "name": new_name,
            "trashed_at": { "$eq": null },
        };
        if self.items().count_documents(sibling_filter, None).await? > 0 {
            return Err(TgVaultError::Conflict(format!(
                "an item named {:?} already exists in the destination folder",
                new_name
            )));
        }

        let old_path = item.path.clone();

        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let update_self = doc! {
            "$set": {
                "name": new_name,
                "parent_id": option_to_bson(&new_parent_id),
                "path": &new_path,
                "updated_at": now,
            }
        };
        self.items()
            .update_one_with_session(doc! { "_id": id }, update_self, None, &mut session)
            .await?;

        if old_path != new_path {
            let descendant_prefix = format!("{}/", old_path);
            let mut cursor = self
                .items()
                .find_with_session(
                    doc! { "path": { "$regex": Regex { pattern: format!("^{}", regex_escape(&descendant_prefix)), options: String::new() } } },
                    None,
                    &mut session,
                )
                .await?;
            let mut descendants = Vec::new();
            while let Some(doc) = cursor.next(&mut session).await.transpose()? {
                descendants.push(doc);
            }
            for descendant in descendants {
                let suffix = &descendant.path[old_path.len()..];
                let rewritten = format!("{}{}", new_path, suffix);
                self.items()
                    .update_one_with_session(
                        doc! { "_id": descendant.id.unwrap() },
                        doc! { "$set": { "path": rewritten, "updated_at": now } },
                        None,
                        &mut session,
                    )
                    .await?;
            }
        }

        session.commit_transaction().await?;

        let mut item = item;
        item.name = new_name.to_string();
        item.parent_id = new_parent_id;
        item.path = new_path;
        item.updated_at = now;
        Ok(item)
    }

    /// Reads a snapshot of a subtree *before* the destination root is
    /// created, so "copy into self or descendant" does not re-pick up the
    /// freshly created nodes (spec.md §4.1 "Subtree snapshot for copy").
    pub async fn snapshot_subtree(&self, root_path: &str) -> Result<Vec<Item>> {
        let prefix = format!("{}/", root_path);
        let filter = doc! {
            "$or": [
                { "path": root_path },
                { "path": { "$regex": Regex { pattern: format!("^{}", regex_escape(&prefix)), options: String::new() } } },
            ]
        };
        let mut cursor = self.items().find(filter, None).await?;
        let mut out = Vec::new();
        while let Some(item) = cursor.try_next().await? {
            out.push(item);
        }
        Ok(out)
    }

    /// Removes the item and every descendant in one transaction, returning
    /// the ids so the caller can clean up chunk messages upstream (spec.md
    /// §4.1 "Subtree delete").
    pub async fn delete_items_by_path_prefix(&self, path: &str) -> Result<DeletedSubtree> {
        let prefix = format!("{}/", path);
        let filter = doc! {
            "$or": [
                { "path": path },
                { "path": { "$regex": Regex { pattern: format!("^{}", regex_escape(&prefix)), options: String::new() } } },
            ]
        };
        let mut cursor = self.items().find(filter.clone(), None).await?;
        let mut item_ids = Vec::new();
        while let Some(item) = cursor.try_next().await? {
            if let Some(id) = item.id {
                item_ids.push(id);
            }
        }
        self.items().delete_many(filter, None).await?;
        Ok(DeletedSubtree { item_ids })
    }

    /// Clones an item (and, for a folder, its whole subtree) under a
    /// destination parent (spec.md §4.1 "Subtree snapshot for copy", scenario
    /// 5 "Copy into self"). The snapshot is read before the destination root
    /// is created so a copy-into-descendant never re-copies the freshly
    /// created nodes. File bytes are never re-uploaded: the new `Chunk` rows
    /// point at the same Telegram messages as the originals.
    pub async fn copy_item(
        &self,
        id: &ObjectId,
        new_parent_id: Option<ObjectId>,
        now: DateTime<Utc>,
    ) -> Result<Item> {
        let root = self.get_item(id).await?;
        let snapshot = self.snapshot_subtree(&root.path).await?;

        let dest_parent_path = match &new_parent_id {
            Some(pid) => self.get_item(pid).await?.path,
            None => "/".to_string(),
        };
        if Item::path_contains(&root.path, &dest_parent_path) {
            return Err(TgVaultError::Forbidden(
                "cannot copy an item into itself or a descendant".into(),
            ));
        }

        let new_root_name = self.next_free_sibling_name(&new_parent_id, &root.name).await?;
        let new_root = self
            .create_item(root.kind, &new_root_name, new_parent_id, root.mime_type.clone(), now)
            .await?;
        let new_root_id = new_root.id.expect("just inserted");
        self.clone_chunks(&root.id.expect("root always has an id"), &new_root_id, now)
            .await?;

        let mut id_map = std::collections::HashMap::new();
        id_map.insert(root.path.clone(), new_root_id);

        // Parents must be created before their children; materialized paths
        // guarantee a parent's path is always strictly shorter (fewer path
        // separators) than any of its descendants' paths.
        let mut descendants: Vec<Item> = snapshot.into_iter().filter(|d| d.id != Some(*id)).collect();
        descendants.sort_by_key(|d| d.path.matches('/').count());

        for descendant in descendants {
            let parent_path = descendant.path[..descendant.path.rfind('/').unwrap_or(0)].to_string();
            let parent_path = if parent_path.is_empty() { "/".to_string() } else { parent_path };
            let Some(&mapped_parent_id) = id_map.get(&parent_path) else {
                continue;
            };
            let created = self
                .create_item(
                    descendant.kind,
                    &descendant.name,
                    Some(mapped_parent_id),
                    descendant.mime_type.clone(),
                    now,
                )
                .await?;
            let created_id = created.id.expect("just inserted");
            if let Some(old_id) = descendant.id {
                self.clone_chunks(&old_id, &created_id, now).await?;
                self.set_item_size(&created_id, descendant.size, now).await?;
            }
            id_map.insert(descendant.path.clone(), created_id);
        }

        self.set_item_size(&new_root_id, root.size, now).await?;
        self.get_item(&new_root_id).await
    }

    async fn clone_chunks(&self, from_item: &ObjectId, to_item: &ObjectId, now: DateTime<Utc>) -> Result<()> {
        for chunk in self.list_chunks_by_item(from_item).await? {
            self.insert_chunk(&crate::models::Chunk {
                id: None,
                item_id: *to_item,
                chunk_index: chunk.chunk_index,
                size: chunk.size,
                telegram_chat_id: chunk.telegram_chat_id,
                telegram_message_id: chunk.telegram_message_id,
                telegram_file_id: chunk.telegram_file_id,
                telegram_file_unique_id: chunk.telegram_file_unique_id,
                created_at: now,
            })
            .await?;
        }
        Ok(())
    }

    /// Returns `name`, or `"<name>-copy"`, `"<name>-copy-2"`, ... the first
    /// of which has no live sibling under `parent_id` (mirrors everyday
    /// desktop "paste" behavior; spec.md scenario 5's `/A-copy` naming).
    async fn next_free_sibling_name(&self, parent_id: &Option<ObjectId>, name: &str) -> Result<String> {
        let mut candidate = name.to_string();
        let mut attempt = 0;
        loop {
            let filter = doc! {
                "parent_id": option_to_bson(parent_id),
                "name": &candidate,
                "trashed_at": { "$eq": null },
            };
            if self.items().count_documents(filter, None).await? == 0 {
                return Ok(candidate);
            }
            attempt += 1;
            candidate = if attempt == 1 {
                format!("{}-copy", name)
            } else {
                format!("{}-copy-{}", name, attempt)
            };
        }
    }
}

fn option_to_bson(id: &Option<ObjectId>) -> mongodb::bson::Bson {
    match id {
        Some(id) => mongodb::bson::Bson::ObjectId(*id),
        None => mongodb::bson::Bson::Null,
    }
}

fn regex_escape(s: &str) -> String {
    regex::escape(s)
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        *err.kind,
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(
            mongodb::error::WriteError { code: 11000, .. }
        ))
    )
}
