use crate::error::ApiError;
use crate::handlers::items::parse_id;
use crate::state::AppState;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use tgvault_core::download::{prepare_download, stream_download};
use tgvault_core::models::{Item, TransferDirection, TransferHistory, TransferStatus};

#[derive(Deserialize, Default)]
pub struct DownloadQuery {
    #[serde(default)]
    pub download: bool,
}

/// Serves a byte range of an item's reassembled bytes (spec.md §4.7). Honors
/// `Range` when present and emits `206 Partial Content` with `Content-Range`;
/// without a `Range` header the full file streams back as `200 OK`.
pub async fn download_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let item = state.store.get_item(&id).await?;
    state.store.touch_last_accessed(&id, Utc::now()).await?;
    stream_item_response(state, item, headers, query.download).await
}

/// Shared by the authenticated item-id route and the public share-code
/// route (spec.md §4.1 Design Note §9(a): shared downloads still update
/// `lastAccessedAt`, already done by the caller before reaching here).
pub async fn stream_item_response(
    state: AppState,
    item: Item,
    headers: HeaderMap,
    force_download: bool,
) -> Result<Response, ApiError> {
    let range_header = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mime_type = item.mime_type.clone();
    let file_name = item.name.clone();
    let item_id = item.id.expect("persisted item");
    let updated_at_unix = item.updated_at.timestamp();

    let prepared = prepare_download(&state.store, item, range_header.as_deref()).await?;
    let total_size = prepared.item.size;
    let is_partial = range_header.is_some();
    let range = prepared.range;

    let history = TransferHistory {
        id: None,
        source_task_id: None,
        direction: TransferDirection::Download,
        item_id: Some(item_id),
        size: range.len(),
        status: TransferStatus::Completed,
        faststart_fallback: false,
        preview_fallback: false,
        error_message: None,
        created_at: Utc::now(),
        completed_at: Some(Utc::now()),
    };
    if let Err(e) = state.store.insert_transfer_history(&history).await {
        tracing::warn!("failed to record transfer history for item {}: {}", item_id, e);
    }

    let file_id_cache = state.file_id_cache.clone();
    let telegram = state.telegram.clone();
    let config = state.config.clone();

    // `stream_download` borrows from `prepared`, which would otherwise have
    // to outlive the response body; route the bytes through a channel
    // instead so the borrow stays inside the spawned task.
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<bytes::Bytes, std::io::Error>>(8);
    tokio::spawn(async move {
        let mut stream = Box::pin(stream_download(&telegram, &file_id_cache, &config, &prepared));
        while let Some(chunk) = stream.next().await {
            let mapped = chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
            if tx.send(mapped).await.is_err() {
                break;
            }
        }
    });

    let body = Body::from_stream(tokio_stream::wrappers::ReceiverStream::new(rx));

    let mut response = Response::builder()
        .status(if is_partial { StatusCode::PARTIAL_CONTENT } else { StatusCode::OK })
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, range.len())
        .body(body)
        .expect("response builder");

    let content_type = mime_type
        .as_deref()
        .and_then(|m| HeaderValue::from_str(m).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    response.headers_mut().insert(header::CONTENT_TYPE, content_type.clone());
    response.headers_mut().insert(
        header::CONTENT_DISPOSITION,
        content_disposition(&file_name, &content_type, force_download),
    );
    response.headers_mut().insert(
        header::ETAG,
        HeaderValue::from_str(&format!("W/\"{}-{}\"", item_id, updated_at_unix)).unwrap(),
    );

    if is_partial {
        response.headers_mut().insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {}-{}/{}", range.start, range.end, total_size)).unwrap(),
        );
    }

    Ok(response)
}

/// Previewable in-browser without forcing a save-as dialog (spec.md §4.7).
fn is_previewable(content_type: &HeaderValue) -> bool {
    let Ok(value) = content_type.to_str() else { return false };
    value.starts_with("image/")
        || value.starts_with("video/")
        || value.starts_with("audio/")
        || value == "application/pdf"
}

/// RFC 5987 `filename*=UTF-8''...` encoding, so non-ASCII file names survive
/// the header instead of silently corrupting (spec.md §4.7). `inline` for a
/// previewable MIME unless the caller passed `?download=1`.
fn content_disposition(file_name: &str, content_type: &HeaderValue, force_download: bool) -> HeaderValue {
    let disposition = if !force_download && is_previewable(content_type) {
        "inline"
    } else {
        "attachment"
    };
    let encoded = urlencoding::encode(file_name);
    let value = format!("{}; filename*=UTF-8''{}", disposition, encoded);
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}
