use crate::error::ApiError;
use crate::handlers::items::parse_id;
use crate::state::AppState;
use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Json};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use tgvault_core::upload::upload_single;

/// Single-shot multipart upload for files at or below the chunk-size
/// threshold (spec.md §4.5/§4.6). Larger files must go through the session
/// endpoints below.
pub async fn upload_single_shot(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut parent_id: Option<ObjectId> = None;
    let mut file_name = None;
    let mut mime_type = None;
    let mut data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| tgvault_core::TgVaultError::BadInput(e.to_string()))?
    {
        match field.name().unwrap_or_default() {
            "parent_id" => {
                let text = field.text().await.unwrap_or_default();
                if !text.is_empty() {
                    parent_id = Some(parse_id(&text)?);
                }
            }
            "file" => {
                file_name = field.file_name().map(str::to_string);
                mime_type = field.content_type().map(str::to_string);
                data = Some(field.bytes().await.map_err(|e| tgvault_core::TgVaultError::BadInput(e.to_string()))?);
            }
            _ => {}
        }
    }

    let file_name = file_name.ok_or_else(|| tgvault_core::TgVaultError::BadInput("missing file field".into()))?;
    let data = data.ok_or_else(|| tgvault_core::TgVaultError::BadInput("missing file bytes".into()))?;

    let item = upload_single(
        &state.store,
        &state.telegram,
        &state.config,
        parent_id,
        &file_name,
        mime_type.as_deref(),
        data.to_vec(),
    )
    .await?;

    Ok(Json(item))
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    pub parent_id: Option<String>,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub total_size: u64,
}

pub async fn create_upload_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let parent_id = payload.parent_id.map(|id| parse_id(&id)).transpose()?;
    let (item, session_id) = state
        .sessions
        .create_session(parent_id, &payload.file_name, payload.mime_type.as_deref(), payload.total_size)
        .await?;
    Ok(Json(serde_json::json!({ "item": item, "session_id": session_id.to_hex() })))
}

pub async fn upload_chunk_to_session(
    State(state): State<AppState>,
    Path((session_id, chunk_index)): Path<(String, u32)>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = parse_id(&session_id)?;
    state.sessions.receive_chunk(&session_id, chunk_index, body.to_vec()).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// `GET /api/uploads/{id}`: session plus the chunk indices already received,
/// so a resuming client knows exactly which ones to re-send (spec.md §6).
pub async fn list_session_chunks(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = parse_id(&session_id)?;
    let session = state.store.get_session(&session_id).await?;
    let indices = state.sessions.list_received_chunk_indices(&session_id).await?;
    Ok(Json(serde_json::json!({ "session": session, "uploaded_indices": indices })))
}

pub async fn complete_upload_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = parse_id(&session_id)?;
    state.sessions.complete_session(&session_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
