use crate::error::ApiError;
use crate::handlers::items::parse_id;
use crate::state::AppState;
use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tgvault_core::models::{TorrentSource, TorrentTask, TorrentTaskStatus};
use tgvault_core::torrent::TorrentWorker;

#[derive(Deserialize)]
pub struct PreviewTorrentRequest {
    pub magnet_or_url: String,
}

#[derive(Serialize)]
pub struct TorrentPreview {
    pub name: Option<String>,
    pub infohash: Option<String>,
    pub estimated_size: Option<u64>,
    pub trackers: Vec<String>,
    pub private: bool,
}

/// Best-effort, metadata-only parse of a magnet link so the caller can show
/// a confirmation screen before a `TorrentTask` row is ever created (spec.md
/// §6 `POST /api/torrents/preview`). Only the magnet URI form is parsed here;
/// a `.torrent` file's bencoded metadata is left to the external client
/// itself once a task is actually submitted, matching the engine's choice to
/// treat the BitTorrent wire format as an external collaborator (spec.md §1
/// Non-goals).
pub async fn preview_torrent(Json(payload): Json<PreviewTorrentRequest>) -> Result<impl IntoResponse, ApiError> {
    let preview = parse_magnet_preview(&payload.magnet_or_url)
        .ok_or_else(|| tgvault_core::TgVaultError::BadInput("not a recognizable magnet URI".into()))?;
    Ok(Json(preview))
}

fn parse_magnet_preview(raw: &str) -> Option<TorrentPreview> {
    let url = url::Url::parse(raw).ok()?;
    if url.scheme() != "magnet" {
        return None;
    }

    let mut name = None;
    let mut infohash = None;
    let mut estimated_size = None;
    let mut trackers = Vec::new();

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "dn" => name = Some(value.into_owned()),
            "xl" => estimated_size = value.parse::<u64>().ok(),
            "tr" => trackers.push(value.into_owned()),
            "xt" => {
                if let Some(hash) = value.strip_prefix("urn:btih:") {
                    infohash = Some(hash.to_lowercase());
                }
            }
            _ => {}
        }
    }

    Some(TorrentPreview {
        name,
        infohash,
        estimated_size,
        trackers,
        private: false,
    })
}

pub async fn list_torrent_tasks(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tasks = state.store.list_torrent_tasks().await?;
    Ok(Json(tasks))
}

pub async fn get_torrent_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let task = state.store.get_torrent_task(&id).await?;
    let files = state.store.list_torrent_task_files(&id).await?;
    Ok(Json(serde_json::json!({ "task": task, "files": files })))
}

#[derive(Deserialize)]
pub struct CreateTorrentRequest {
    pub magnet_or_url: String,
    pub target_parent_id: Option<String>,
    pub submitter: String,
    pub private: Option<bool>,
}

/// Either a magnet/URL submission or a raw `.torrent` file, normalized out
/// of the two request shapes `create_torrent_task` accepts.
struct TorrentTaskInput {
    source: TorrentSource,
    torrent_file_bytes: Option<Vec<u8>>,
    target_parent_id: Option<String>,
    submitter: String,
    private: bool,
}

/// Queues a magnet link, `.torrent` URL, or an uploaded `.torrent` file for
/// ingestion (spec.md §4.8/§6 "JSON or multipart"). The worker picks it up
/// via `TorrentWorker::claim_and_start`; this endpoint only ever writes
/// `queued` rows. A JSON body supplies `magnet_or_url`; a multipart body
/// supplies either a `torrent_url` text field or a `torrent_file` upload.
pub async fn create_torrent_task(
    State(state): State<AppState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = request
        .headers()
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let input = if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| tgvault_core::TgVaultError::BadInput(e.to_string()))?;
        parse_multipart_torrent_request(multipart).await?
    } else {
        let Json(payload) = Json::<CreateTorrentRequest>::from_request(request, &state)
            .await
            .map_err(|e| tgvault_core::TgVaultError::BadInput(e.to_string()))?;
        TorrentTaskInput {
            source: TorrentSource::Url(payload.magnet_or_url),
            torrent_file_bytes: None,
            target_parent_id: payload.target_parent_id,
            submitter: payload.submitter,
            private: payload.private.unwrap_or(false),
        }
    };

    let target_parent_item_id = input.target_parent_id.map(|id| parse_id(&id)).transpose()?;
    let now = Utc::now();
    let task = TorrentTask {
        id: None,
        source: input.source,
        name: String::new(),
        infohash: String::new(),
        meta_file_path: String::new(),
        client_hash: None,
        target_chat_id: state.config.telegram_chat_id.clone(),
        target_parent_item_id,
        submitter: input.submitter,
        estimated_size: 0,
        downloaded_bytes: 0,
        progress: 0.0,
        private: input.private,
        tracker_hosts: Vec::new(),
        status: TorrentTaskStatus::Queued,
        error_message: None,
        source_cleanup_due_at: None,
        created_at: now,
        updated_at: now,
    };
    let id = state.store.create_torrent_task(&task).await?;

    if let Some(bytes) = input.torrent_file_bytes {
        tokio::fs::create_dir_all(&state.config.torrent_work_dir).await?;
        let meta_path = state.config.torrent_work_dir.join(format!("{}.torrent", id.to_hex()));
        tokio::fs::write(&meta_path, &bytes).await?;
        let meta_path_str = meta_path.to_string_lossy().into_owned();
        state
            .store
            .set_torrent_source_and_meta_path(&id, &TorrentSource::File(meta_path_str.clone()), &meta_path_str)
            .await?;
    }

    Ok(Json(serde_json::json!({ "task_id": id.to_hex() })))
}

async fn parse_multipart_torrent_request(mut multipart: Multipart) -> Result<TorrentTaskInput, ApiError> {
    let mut torrent_url: Option<String> = None;
    let mut torrent_file: Option<Vec<u8>> = None;
    let mut target_parent_id: Option<String> = None;
    let mut submitter: Option<String> = None;
    let mut private = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| tgvault_core::TgVaultError::BadInput(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "torrent_url" => torrent_url = Some(field.text().await.unwrap_or_default()),
            "torrent_file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| tgvault_core::TgVaultError::BadInput(e.to_string()))?;
                torrent_file = Some(bytes.to_vec());
            }
            "target_parent_id" => {
                let text = field.text().await.unwrap_or_default();
                if !text.is_empty() {
                    target_parent_id = Some(text);
                }
            }
            "submitter" => submitter = Some(field.text().await.unwrap_or_default()),
            "private" => private = field.text().await.unwrap_or_default() == "true",
            _ => {}
        }
    }

    let submitter =
        submitter.ok_or_else(|| tgvault_core::TgVaultError::BadInput("missing submitter field".into()))?;

    let source = if torrent_file.is_some() {
        TorrentSource::File(String::new())
    } else if let Some(url) = &torrent_url {
        TorrentSource::Url(url.clone())
    } else {
        return Err(
            tgvault_core::TgVaultError::BadInput("multipart request must include torrent_url or torrent_file".into())
                .into(),
        );
    };

    Ok(TorrentTaskInput {
        source,
        torrent_file_bytes: torrent_file,
        target_parent_id,
        submitter,
        private,
    })
}

#[derive(Deserialize)]
pub struct SelectFilesRequest {
    pub file_indices: Vec<u32>,
}

/// Chooses which files inside an `awaiting_selection` task to actually
/// finish downloading and ingest (spec.md §4.8 "file selection").
pub async fn select_torrent_files(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SelectFilesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let worker = TorrentWorker::new(
        state.store.clone(),
        state.telegram.clone(),
        state.qbittorrent.clone(),
        state.config.clone(),
    );
    worker.select_files(&id, &payload.file_indices).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn delete_torrent_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    state.store.delete_torrent_task(&id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Re-queues an `error` task for another attempt: purges its stale
/// per-file rows and the prior external-client task before resetting status,
/// so the worker's next claim starts from a clean slate (spec.md §4.8
/// "Retry").
pub async fn retry_torrent_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let task = state.store.get_torrent_task(&id).await?;
    if task.status != TorrentTaskStatus::Error {
        return Err(tgvault_core::TgVaultError::BadInput("only error tasks can be retried".into()).into());
    }

    if !task.infohash.is_empty() {
        if let Err(e) = state.qbittorrent.delete_torrent(&task.infohash, true).await {
            tracing::warn!("retry: failed to delete prior external-client task for {}: {}", id, e);
        }
    }
    state.store.delete_torrent_task_files(&id).await?;
    state.store.reset_torrent_task_for_retry(&id, Utc::now()).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
