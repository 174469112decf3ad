use crate::concurrency::{retry_telegram_call, RetryPolicy};
use crate::config::{AccessMethod, Config};
use crate::errors::{Result, TgVaultError};
use crate::media::{classify, video, ClassificationInput};
use crate::models::{chunk_file_name, Chunk, Item, ItemKind, TransferDirection, TransferHistory, TransferStatus};
use crate::store::MongoStore;
use crate::telegram::{MediaKind, SendSource, TelegramClient, VideoOptions};
use chrono::Utc;
use log::warn;
use mongodb::bson::oid::ObjectId;
use std::path::Path;
use uuid::Uuid;

/// Bytes above which a file is always sent chunked rather than in one
/// `send*` call, regardless of media kind (spec.md §4.5 "Upload Pipeline").
pub const CHUNK_SIZE: u64 = 48 * 1024 * 1024;

/// Single-shot upload for files at or below `CHUNK_SIZE`: one `send*` call,
/// one `Chunk` row, no `UploadSession` involved at all (spec.md §4.6
/// "single-shot path"). This is the path Design Note §9(b) refers to as
/// "official single-part mode" — distinct from a one-chunk *session*. Use
/// [`upload_whole_file`] directly for a caller (the self-hosted session
/// merge-completion path, the torrent uploader) that legitimately needs to
/// send something larger than `CHUNK_SIZE` as one message.
pub async fn upload_single(
    store: &MongoStore,
    telegram: &TelegramClient,
    config: &Config,
    parent_id: Option<ObjectId>,
    file_name: &str,
    mime_type: Option<&str>,
    data: Vec<u8>,
) -> Result<Item> {
    let size = data.len() as u64;
    if size > CHUNK_SIZE {
        return Err(TgVaultError::BadInput(
            "file exceeds the single-shot size limit; use a chunked upload session".into(),
        ));
    }
    upload_whole_file(store, telegram, config, parent_id, file_name, mime_type, data, None).await
}

/// Sends `data` to the storage channel as a single Telegram message and
/// records one `Chunk` row for it, with no upper bound beyond what Telegram
/// itself enforces. A `Video`/`Animation` classification first runs the
/// best-effort faststart remux and preview-frame extraction (spec.md §4.4)
/// and attaches the result as the `sendVideo` thumbnail/cover. `source_task_id`
/// ties the resulting `TransferHistory` row back to the torrent task that
/// produced this file, when there is one (spec.md §3 "TransferHistory",
/// §4.8 "record a `TransferHistory` row with the video-preprocess flags").
pub async fn upload_whole_file(
    store: &MongoStore,
    telegram: &TelegramClient,
    config: &Config,
    parent_id: Option<ObjectId>,
    file_name: &str,
    mime_type: Option<&str>,
    data: Vec<u8>,
    source_task_id: Option<ObjectId>,
) -> Result<Item> {
    let size = data.len() as u64;
    let now = Utc::now();
    let kind = classify_item_kind(file_name, mime_type, size, config.access_method);
    let item = store
        .create_item(kind, file_name, parent_id, mime_type.map(str::to_string), now)
        .await?;
    let item_id = item.id.expect("just inserted");

    let media_kind = classify(
        ClassificationInput {
            file_name,
            mime_type,
            size,
        },
        config.access_method,
    );

    let item_path = item.path.clone();
    let compensate = || {
        let store = store.clone();
        let item_path = item_path.clone();
        async move {
            let _ = store.delete_items_by_path_prefix(&item_path).await;
        }
    };

    let preprocessed = if media_kind == MediaKind::Video {
        preprocess_video(config, file_name, data).await
    } else {
        VideoPreprocessResult {
            data,
            options: None,
            faststart_fallback: false,
            preview_fallback: false,
        }
    };
    let VideoPreprocessResult {
        data,
        options: video_options,
        faststart_fallback,
        preview_fallback,
    } = preprocessed;
    let size = data.len() as u64;

    let message = retry_telegram_call(RetryPolicy::CHUNK_SEND, || {
        let telegram = telegram.clone();
        let data = data.clone();
        let file_name = file_name.to_string();
        let video_options = video_options.clone();
        async move {
            telegram
                .send_media(
                    media_kind,
                    SendSource::Bytes {
                        data,
                        file_name,
                    },
                    None,
                    video_options,
                )
                .await
        }
    })
    .await;

    let message = match message {
        Ok(m) => m,
        Err(e) => {
            compensate().await;
            return Err(e);
        }
    };

    let file_meta = match message.primary_file() {
        Some(f) => f.clone(),
        None => {
            compensate().await;
            return Err(TgVaultError::Internal(
                "telegram accepted the upload but returned no file metadata".into(),
            ));
        }
    };

    let chunk = Chunk {
        id: None,
        item_id,
        chunk_index: 0,
        size,
        telegram_chat_id: telegram.chat_id.clone(),
        telegram_message_id: message.message_id,
        telegram_file_id: file_meta.file_id,
        telegram_file_unique_id: file_meta.file_unique_id,
        created_at: now,
    };
    store.insert_chunk(&chunk).await?;
    store.set_item_size(&item_id, size, now).await?;

    let history = TransferHistory {
        id: None,
        source_task_id,
        direction: TransferDirection::Upload,
        item_id: Some(item_id),
        size,
        status: TransferStatus::Completed,
        faststart_fallback,
        preview_fallback,
        error_message: None,
        created_at: now,
        completed_at: Some(Utc::now()),
    };
    if let Err(e) = store.insert_transfer_history(&history).await {
        warn!("failed to record transfer history for item {}: {}", item_id, e);
    }

    let mut item = item;
    item.size = size;
    Ok(item)
}

struct VideoPreprocessResult {
    data: Vec<u8>,
    options: Option<VideoOptions>,
    faststart_fallback: bool,
    preview_fallback: bool,
}

/// Runs the faststart remux and preview-frame extraction against a scratch
/// copy of `data`, returning the (possibly remuxed) bytes to actually send,
/// the `VideoOptions` to attach, and whether either step fell back to its
/// degraded path (spec.md §4.4 "graceful fallback", §4.8 "video-preprocess
/// flags"). Never fails the upload: a remux failure sends the original
/// bytes, a preview failure just omits the thumbnail/cover.
async fn preprocess_video(config: &Config, file_name: &str, data: Vec<u8>) -> VideoPreprocessResult {
    let work_dir = config.upload_staging_dir.join("video-work").join(Uuid::new_v4().to_string());
    if let Err(e) = tokio::fs::create_dir_all(&work_dir).await {
        warn!("video preprocessing skipped, could not create work dir: {}", e);
        return VideoPreprocessResult {
            data,
            options: None,
            faststart_fallback: true,
            preview_fallback: true,
        };
    }
    let source_path = work_dir.join(file_name);
    if let Err(e) = tokio::fs::write(&source_path, &data).await {
        warn!("video preprocessing skipped, could not stage source file: {}", e);
        let _ = tokio::fs::remove_dir_all(&work_dir).await;
        return VideoPreprocessResult {
            data,
            options: None,
            faststart_fallback: true,
            preview_fallback: true,
        };
    }

    let geometry = video::probe(&source_path).await.ok();
    let duration_secs = geometry.map(|g| g.duration_secs).unwrap_or(0);

    let (final_data, faststart_fallback) = match video::remux_faststart(&source_path, &work_dir).await {
        Ok(remuxed_path) => match tokio::fs::read(&remuxed_path).await {
            Ok(bytes) => (bytes, false),
            Err(e) => {
                warn!("could not read remuxed file, sending original bytes: {}", e);
                (data, true)
            }
        },
        Err(e) => {
            warn!("faststart remux failed, sending original bytes: {}", e);
            (data, true)
        }
    };

    let (frame, preview_fallback) = match video::extract_preview_frame(&source_path, &work_dir, duration_secs).await {
        Ok(Some(frame)) => (Some(frame), false),
        Ok(None) => (None, true),
        Err(e) => {
            warn!("preview frame extraction failed: {}", e);
            (None, true)
        }
    };

    let _ = tokio::fs::remove_dir_all(&work_dir).await;

    let options = VideoOptions {
        duration_secs: geometry.map(|g| g.duration_secs),
        width: geometry.map(|g| g.width),
        height: geometry.map(|g| g.height),
        supports_streaming: true,
        thumbnail: frame.clone(),
        cover: frame,
    };
    VideoPreprocessResult {
        data: final_data,
        options: Some(options),
        faststart_fallback,
        preview_fallback,
    }
}

/// Commits one already-sized chunk of a chunked upload: builds the chunk
/// filename, sends it as a `Document` (chunk payloads are opaque binary
/// slices, never classified as media), and records the `Chunk` row (spec.md
/// §4.5 "Upload Pipeline", chunk filename convention).
pub async fn upload_chunk(
    store: &MongoStore,
    telegram: &TelegramClient,
    item_id: &ObjectId,
    original_name: &str,
    chunk_index: u32,
    data: Vec<u8>,
) -> Result<Chunk> {
    let size = data.len() as u64;
    let file_name = chunk_file_name(original_name, item_id, chunk_index);
    let now = Utc::now();

    let message = retry_telegram_call(RetryPolicy::CHUNK_SEND, || {
        let telegram = telegram.clone();
        let data = data.clone();
        let file_name = file_name.clone();
        async move {
            telegram
                .send_media(
                    MediaKind::Document,
                    SendSource::Bytes { data, file_name },
                    None,
                    None,
                )
                .await
        }
    })
    .await?;

    let file_meta = message
        .primary_file()
        .ok_or_else(|| TgVaultError::Internal("telegram accepted the chunk but returned no file metadata".into()))?
        .clone();

    let chunk = Chunk {
        id: None,
        item_id: *item_id,
        chunk_index,
        size,
        telegram_chat_id: telegram.chat_id.clone(),
        telegram_message_id: message.message_id,
        telegram_file_id: file_meta.file_id,
        telegram_file_unique_id: file_meta.file_unique_id,
        created_at: now,
    };
    store.insert_chunk(&chunk).await?;
    Ok(chunk)
}

/// Self-hosted sessions stage chunks to local disk and merge them into one
/// file before sending, instead of sending each chunk as its own message
/// (spec.md §4.6 "Self-hosted completion"). Returns the merged file's path;
/// the caller is responsible for uploading it and cleaning up the staging
/// directory afterward.
pub async fn merge_staged_chunks(staging_dir: &Path, total_chunks: u32, output_path: &Path) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut output = tokio::fs::File::create(output_path).await?;
    for index in 0..total_chunks {
        let chunk_path = staging_dir.join(format!("{:05}", index));
        let bytes = tokio::fs::read(&chunk_path).await?;
        output.write_all(&bytes).await?;
    }
    output.flush().await?;
    Ok(())
}

fn classify_item_kind(file_name: &str, mime_type: Option<&str>, size: u64, access_method: AccessMethod) -> ItemKind {
    let media = classify(
        ClassificationInput {
            file_name,
            mime_type,
            size,
        },
        access_method,
    );
    match media {
        MediaKind::Photo => ItemKind::Image,
        MediaKind::Video => ItemKind::Video,
        MediaKind::Audio => ItemKind::Audio,
        MediaKind::Animation => ItemKind::Video,
        MediaKind::Document => ItemKind::Document,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_matches_spec_threshold() {
        assert_eq!(CHUNK_SIZE, 48 * 1024 * 1024);
    }
}
