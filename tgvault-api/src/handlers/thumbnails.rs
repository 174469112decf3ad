use crate::error::ApiError;
use crate::handlers::items::parse_id;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use tgvault_core::download::{prepare_download, stream_download};
use tgvault_core::media::video;
use tgvault_core::models::{Item, ItemKind};
use tgvault_core::{Result as CoreResult, TgVaultError};

/// Serves a cached first-frame JPEG for a video item, generating it on first
/// request (spec.md §4.4 "Preview frame", §4.9 "single-flighted thumbnail
/// generation"). Cache key is `<itemId>-<updatedAtUnix>` so a re-upload
/// (which bumps `updatedAt`) invalidates the old frame automatically.
pub async fn get_thumbnail(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let item = state.store.get_item(&id).await?;
    if item.kind != ItemKind::Video {
        return Err(TgVaultError::BadInput("thumbnails are only generated for video items".into()).into());
    }

    let cache_key = format!("{}-{}", id, item.updated_at.timestamp());
    let cache_path = state.config.thumbnail_cache_dir.join(format!("{}.jpg", cache_key));

    let generator = state.thumbnail_generator.clone();
    let bytes = generator
        .single_flight(
            &cache_key,
            generate_and_cache(&state, &item, &cache_path),
            read_cached(&cache_path),
        )
        .await?;

    {
        let mut index = state.thumbnail_cache_index.lock().await;
        index.record_access(cache_key, bytes.len() as u64);
    }

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, HeaderValue::from_static("image/jpeg"))
        .header(header::CACHE_CONTROL, HeaderValue::from_static("private, max-age=86400"))
        .body(axum::body::Body::from(bytes))
        .expect("response builder");
    response
        .headers_mut()
        .insert(header::ETAG, HeaderValue::from_str(&format!("W/\"{}\"", cache_key)).unwrap());
    Ok(response)
}

async fn read_cached(cache_path: &std::path::Path) -> CoreResult<Vec<u8>> {
    tokio::fs::read(cache_path)
        .await
        .map_err(|e| TgVaultError::Internal(format!("cached thumbnail missing after single-flight: {}", e)))
}

/// Downloads the item's full bytes to a scratch file, runs `ffprobe`+`ffmpeg`
/// against it, and atomically installs the resulting JPEG into the cache
/// directory. Ungenerable videos surface as `Internal` rather than silently
/// serving a placeholder — callers decide whether to retry.
async fn generate_and_cache(state: &AppState, item: &Item, cache_path: &std::path::Path) -> CoreResult<Vec<u8>> {
    if let Ok(bytes) = tokio::fs::read(cache_path).await {
        return Ok(bytes);
    }

    let work_dir = state.config.thumbnail_cache_dir.join("tmp");
    tokio::fs::create_dir_all(&work_dir).await?;
    let source_path = work_dir.join(format!("{}-source", item.id.expect("persisted item")));

    let prepared = prepare_download(&state.store, item.clone(), None).await?;
    let mut stream = Box::pin(stream_download(&state.telegram, &state.file_id_cache, &state.config, &prepared));
    let mut file = tokio::fs::File::create(&source_path).await?;
    use tokio::io::AsyncWriteExt;
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    drop(file);

    let geometry = video::probe(&source_path).await;
    let duration_secs = geometry.map(|g| g.duration_secs).unwrap_or(0);
    let frame = video::extract_preview_frame(&source_path, &work_dir, duration_secs).await?;
    let _ = tokio::fs::remove_file(&source_path).await;

    let frame = frame.ok_or_else(|| TgVaultError::Internal("preview frame extraction failed".into()))?;

    let tmp_path = state.config.thumbnail_cache_dir.join(format!(
        "{}.tmp",
        cache_path.file_name().and_then(|n| n.to_str()).unwrap_or("preview")
    ));
    tokio::fs::create_dir_all(&state.config.thumbnail_cache_dir).await?;
    tokio::fs::write(&tmp_path, &frame).await?;
    tokio::fs::rename(&tmp_path, cache_path).await?;

    Ok(frame)
}
