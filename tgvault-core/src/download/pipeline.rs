use crate::concurrency::{retry_telegram_call, RetryPolicy};
use crate::config::{AccessMethod, Config};
use crate::download::range::ByteRange;
use crate::errors::{Result, TgVaultError};
use crate::models::{Chunk, Item};
use crate::store::MongoStore;
use crate::telegram::{FileIdCache, TelegramClient};
use bytes::Bytes;
use futures::stream::{self, Stream};
use futures::StreamExt;

/// Static per-item data the pipeline resolves once up front, then streams
/// chunk bytes for the caller's requested byte range (spec.md §4.7 "Serve
/// chunked download"). A response header set this is used to build comes
/// from `total_size`/`item.mime_type`/`item.name`.
pub struct PreparedDownload {
    pub item: Item,
    pub range: ByteRange,
    pub chunks: Vec<(Chunk, u64)>,
}

/// Resolves which chunks intersect the requested range and in what absolute
/// byte offset each one starts, ready for streaming (spec.md §4.7 "chunk-span
/// math").
pub async fn prepare_download(store: &MongoStore, item: Item, range_header: Option<&str>) -> Result<PreparedDownload> {
    let range = crate::download::range::parse_single_range(range_header, item.size)?;
    let all_chunks = store.list_chunks_by_item(item.id.as_ref().expect("persisted item")).await?;

    let mut offset = 0u64;
    let mut spans = Vec::with_capacity(all_chunks.len());
    for chunk in &all_chunks {
        spans.push((chunk.clone(), offset));
        offset += chunk.size;
    }

    let intersecting: Vec<(Chunk, u64)> = if range.empty {
        Vec::new()
    } else {
        spans
            .into_iter()
            .filter(|(chunk, start)| {
                let end = start + chunk.size - 1;
                *start <= range.end && end >= range.start
            })
            .collect()
    };

    if intersecting.is_empty() && !range.empty {
        return Err(TgVaultError::RangeNotSatisfiable);
    }

    Ok(PreparedDownload {
        item,
        range,
        chunks: intersecting,
    })
}

/// Streams the bytes for a prepared download, clipping the first and last
/// chunk to the requested range. Uses the local-path shortcut when the
/// deployment is self-hosted and `allow_local_file_shortcut` is set, else
/// resolves each chunk's `file_id` through Telegram's `getFile` + the
/// `FileIdCache`, falling back to a fresh resolution on a stale entry
/// (spec.md §4.7).
pub fn stream_download<'a>(
    telegram: &'a TelegramClient,
    cache: &'a FileIdCache,
    config: &'a Config,
    prepared: &'a PreparedDownload,
) -> impl Stream<Item = Result<Bytes>> + 'a {
    let range = prepared.range;
    stream::iter(prepared.chunks.clone()).then(move |(chunk, chunk_start)| {
        let telegram = telegram.clone();
        async move {
            let chunk_end = chunk_start + chunk.size - 1;
            let clip_start = range.start.max(chunk_start) - chunk_start;
            let clip_end = range.end.min(chunk_end) - chunk_start;

            let file_path = resolve_file_path(&telegram, cache, &chunk.telegram_file_id).await?;

            if config.access_method == AccessMethod::SelfHosted && config.allow_local_file_shortcut {
                if let Some(bytes) = try_local_shortcut(&file_path, clip_start, clip_end).await? {
                    return Ok(bytes);
                }
            }

            let bytes = retry_telegram_call(RetryPolicy::DOWNLOAD_RESOLVE, || {
                let telegram = telegram.clone();
                let file_path = file_path.clone();
                async move { telegram.download_range(&file_path, clip_start, clip_end).await }
            })
            .await?;
            Ok(bytes)
        }
    })
}

async fn resolve_file_path(telegram: &TelegramClient, cache: &FileIdCache, file_id: &str) -> Result<String> {
    if let Some(path) = cache.get(file_id) {
        return Ok(path);
    }
    let resolved = retry_telegram_call(RetryPolicy::DOWNLOAD_RESOLVE, || {
        let telegram = telegram.clone();
        async move { telegram.get_file(file_id).await }
    })
    .await?;
    cache.put(file_id.to_string(), resolved.file_path.clone());
    Ok(resolved.file_path)
}

/// Self-hosted deployments that can see the Bot API server's local disk skip
/// the HTTP round-trip entirely and read the resolved `file_path` directly
/// when it is absolute (spec.md §4.7 step 3: "If the path is absolute *and*
/// the process is configured for self-hosted Bot API with the same
/// filesystem, open it locally"). Returns `Ok(None)` so the caller falls back
/// to the network path for a relative path or one that isn't actually
/// reachable from this process.
async fn try_local_shortcut(file_path: &str, clip_start: u64, clip_end: u64) -> Result<Option<Bytes>> {
    let local_path = std::path::Path::new(file_path);
    if !local_path.is_absolute() || !local_path.exists() {
        return Ok(None);
    }
    use tokio::io::{AsyncReadExt, AsyncSeekExt};
    let mut file = tokio::fs::File::open(&local_path).await?;
    file.seek(std::io::SeekFrom::Start(clip_start)).await?;
    let len = (clip_end - clip_start + 1) as usize;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(Some(Bytes::from(buf)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;

    fn chunk(index: u32, size: u64) -> Chunk {
        Chunk {
            id: None,
            item_id: ObjectId::new(),
            chunk_index: index,
            size,
            telegram_chat_id: "chat".into(),
            telegram_message_id: index as i64,
            telegram_file_id: format!("file-{}", index),
            telegram_file_unique_id: format!("uniq-{}", index),
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn chunk_offsets_accumulate() {
        let chunks = [chunk(0, 10), chunk(1, 10), chunk(2, 10)];
        let mut offset = 0u64;
        let mut offsets = Vec::new();
        for c in &chunks {
            offsets.push(offset);
            offset += c.size;
        }
        assert_eq!(offsets, vec![0, 10, 20]);
    }
}
