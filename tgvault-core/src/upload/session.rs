use crate::config::{AccessMethod, Config};
use crate::errors::{Result, TgVaultError};
use crate::models::{Item, ItemKind, SessionStatus, UploadSession};
use crate::store::MongoStore;
use crate::telegram::TelegramClient;
use crate::upload::pipeline::{merge_staged_chunks, upload_chunk, upload_whole_file, CHUNK_SIZE};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;

/// Orchestrates a resumable chunked upload end to end: session creation,
/// per-chunk receipt (official path sends immediately, self-hosted path
/// stages to disk), and completion (spec.md §4.5/§4.6 "Upload Session
/// Manager"). One instance is shared across requests; all state beyond the
/// staging directory lives in Mongo so any process can resume a session.
#[derive(Clone)]
pub struct UploadSessionManager {
    store: MongoStore,
    telegram: TelegramClient,
    config: Config,
}

impl UploadSessionManager {
    pub fn new(store: MongoStore, telegram: TelegramClient, config: Config) -> Self {
        Self {
            store,
            telegram,
            config,
        }
    }

    pub async fn create_session(
        &self,
        parent_id: Option<ObjectId>,
        file_name: &str,
        mime_type: Option<&str>,
        total_size: u64,
    ) -> Result<(Item, ObjectId)> {
        if total_size <= CHUNK_SIZE {
            return Err(TgVaultError::BadInput(
                "file fits in a single-shot upload; do not open a session for it".into(),
            ));
        }

        let now = Utc::now();
        let kind = guess_item_kind(file_name, mime_type);
        let item = self
            .store
            .create_item(kind, file_name, parent_id, mime_type.map(str::to_string), now)
            .await?;
        let item_id = item.id.expect("just inserted");

        let total_chunks = ((total_size + CHUNK_SIZE - 1) / CHUNK_SIZE) as u32;
        let session = UploadSession {
            id: None,
            item_id,
            file_name: file_name.to_string(),
            mime_type: mime_type.map(str::to_string),
            total_size,
            chunk_size: CHUNK_SIZE,
            total_chunks,
            access_method: self.config.access_method,
            status: SessionStatus::Uploading,
            created_at: now,
            updated_at: now,
        };
        let session_id = self.store.create_session(&session).await?;
        Ok((item, session_id))
    }

    /// Receives one chunk's bytes. Official sessions upload the chunk to
    /// Telegram immediately and record its `Chunk` row; self-hosted sessions
    /// stage it to a local file and defer upload to `complete_session`
    /// (spec.md §4.6).
    pub async fn receive_chunk(&self, session_id: &ObjectId, chunk_index: u32, data: Vec<u8>) -> Result<()> {
        let session = self.store.get_session(session_id).await?;
        if session.status != SessionStatus::Uploading {
            return Err(TgVaultError::Conflict("upload session is not accepting chunks".into()));
        }
        if chunk_index >= session.total_chunks {
            return Err(TgVaultError::BadInput(format!(
                "chunk index {} is out of range for {} total chunks",
                chunk_index, session.total_chunks
            )));
        }

        match session.access_method {
            AccessMethod::Official => {
                upload_chunk(
                    &self.store,
                    &self.telegram,
                    &session.item_id,
                    &session.file_name,
                    chunk_index,
                    data,
                )
                .await?;
            }
            AccessMethod::SelfHosted => {
                let staging_dir = session.staging_dir(&self.config.upload_staging_dir);
                tokio::fs::create_dir_all(&staging_dir).await?;
                let chunk_path = staging_dir.join(format!("{:05}", chunk_index));
                tokio::fs::write(&chunk_path, &data).await?;
            }
        }

        self.store.touch_session(session_id, Utc::now()).await?;
        Ok(())
    }

    pub async fn list_received_chunk_indices(&self, session_id: &ObjectId) -> Result<Vec<u32>> {
        let session = self.store.get_session(session_id).await?;
        match session.access_method {
            AccessMethod::Official => {
                let chunks = self.store.list_chunks_by_item(&session.item_id).await?;
                Ok(chunks.into_iter().map(|c| c.chunk_index).collect())
            }
            AccessMethod::SelfHosted => {
                let staging_dir = session.staging_dir(&self.config.upload_staging_dir);
                let mut indices = Vec::new();
                let mut entries = match tokio::fs::read_dir(&staging_dir).await {
                    Ok(entries) => entries,
                    Err(_) => return Ok(indices),
                };
                while let Some(entry) = entries.next_entry().await? {
                    if let Some(name) = entry.file_name().to_str() {
                        if let Ok(idx) = name.parse::<u32>() {
                            indices.push(idx);
                        }
                    }
                }
                indices.sort_unstable();
                Ok(indices)
            }
        }
    }

    /// Finalizes a session once every chunk has been received. Self-hosted
    /// sessions merge the staged chunk files into one local file and send it
    /// as a single upload via `upload_whole_file` (not the single-shot
    /// `upload_single`, whose `CHUNK_SIZE` cap would reject every merged file
    /// a session was ever worth opening for), per
    /// `UploadSession::uses_merge_completion` (Design Note §9(b)); official
    /// sessions have nothing left to do since every chunk was already
    /// committed as its own message.
    pub async fn complete_session(&self, session_id: &ObjectId) -> Result<()> {
        let session = self.store.get_session(session_id).await?;
        if session.status != SessionStatus::Uploading {
            return Err(TgVaultError::Conflict("upload session already finalized".into()));
        }

        let received = self.list_received_chunk_indices(session_id).await?;
        if received.len() as u32 != session.total_chunks {
            return Err(TgVaultError::BadInput(format!(
                "session has {} of {} chunks; cannot complete",
                received.len(),
                session.total_chunks
            )));
        }

        if session.uses_merge_completion() {
            let staging_dir = session.staging_dir(&self.config.upload_staging_dir);
            let merged_path = staging_dir.join("merged");
            merge_staged_chunks(&staging_dir, session.total_chunks, &merged_path).await?;
            let data = tokio::fs::read(&merged_path).await?;

            let uploaded = upload_whole_file(
                &self.store,
                &self.telegram,
                &self.config,
                None,
                &session.file_name,
                session.mime_type.as_deref(),
                data,
                None,
            )
            .await;

            // upload_single created a brand-new item; fold its chunk/size
            // onto the session's pre-existing item instead of leaving a
            // stray duplicate row behind.
            match uploaded {
                Ok(uploaded_item) => {
                    let chunks = self.store.list_chunks_by_item(&uploaded_item.id.unwrap()).await?;
                    for mut chunk in chunks {
                        chunk.item_id = session.item_id;
                        self.store.insert_chunk(&chunk).await?;
                    }
                    self.store
                        .delete_items_by_path_prefix(&uploaded_item.path)
                        .await
                        .ok();
                    self.store
                        .set_item_size(&session.item_id, uploaded_item.size, Utc::now())
                        .await?;
                }
                Err(e) => {
                    self.store
                        .set_session_status(session_id, SessionStatus::Failed, Utc::now())
                        .await?;
                    let _ = tokio::fs::remove_dir_all(&staging_dir).await;
                    return Err(e);
                }
            }

            let _ = tokio::fs::remove_dir_all(&staging_dir).await;
        } else {
            self.store
                .set_item_size(&session.item_id, session.total_size, Utc::now())
                .await?;
        }

        self.store
            .set_session_status(session_id, SessionStatus::Completed, Utc::now())
            .await?;
        Ok(())
    }
}

fn guess_item_kind(file_name: &str, mime_type: Option<&str>) -> ItemKind {
    let input = crate::media::ClassificationInput {
        file_name,
        mime_type,
        size: 0,
    };
    match crate::media::classify(input, AccessMethod::Official) {
        crate::telegram::MediaKind::Photo => ItemKind::Image,
        crate::telegram::MediaKind::Video | crate::telegram::MediaKind::Animation => ItemKind::Video,
        crate::telegram::MediaKind::Audio => ItemKind::Audio,
        crate::telegram::MediaKind::Document => ItemKind::Document,
    }
}
