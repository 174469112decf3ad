use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use tgvault_core::models::ItemKind;

#[derive(Deserialize)]
pub struct ListQuery {
    pub parent_id: Option<String>,
    #[serde(default)]
    pub include_trashed: bool,
}

pub async fn list_children(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let parent_id = query
        .parent_id
        .map(|id| ObjectId::parse_str(&id))
        .transpose()
        .map_err(|_| tgvault_core::TgVaultError::BadInput("invalid parent_id".into()))?;
    let items = state
        .store
        .list_children(parent_id.as_ref(), query.include_trashed)
        .await?;
    Ok(Json(items))
}

pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let item = state.store.get_item(&id).await?;
    Ok(Json(item))
}

#[derive(Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<String>,
}

pub async fn create_folder(
    State(state): State<AppState>,
    Json(payload): Json<CreateFolderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let parent_id = payload
        .parent_id
        .map(|id| ObjectId::parse_str(&id))
        .transpose()
        .map_err(|_| tgvault_core::TgVaultError::BadInput("invalid parent_id".into()))?;
    let item = state
        .store
        .create_item(ItemKind::Folder, &payload.name, parent_id, None, Utc::now())
        .await?;
    Ok(Json(item))
}

#[derive(Deserialize)]
pub struct MoveRequest {
    pub new_parent_id: Option<String>,
    pub new_name: String,
}

pub async fn rename_or_move(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MoveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let new_parent_id = payload
        .new_parent_id
        .map(|id| ObjectId::parse_str(&id))
        .transpose()
        .map_err(|_| tgvault_core::TgVaultError::BadInput("invalid new_parent_id".into()))?;
    let item = state
        .store
        .rename_or_move(&id, new_parent_id, &payload.new_name, Utc::now())
        .await?;
    Ok(Json(item))
}

#[derive(Deserialize)]
pub struct CopyRequest {
    pub new_parent_id: Option<String>,
}

pub async fn copy_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<CopyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let new_parent_id = payload.new_parent_id.map(|id| parse_id(&id)).transpose()?;
    let item = state.store.copy_item(&id, new_parent_id, Utc::now()).await?;
    Ok(Json(item))
}

pub async fn trash_item(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    state.store.trash_item(&id, Utc::now()).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn restore_item(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    state.store.restore_item(&id, Utc::now()).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Permanently deletes the item subtree. Chunk-message cleanup upstream on
/// Telegram is deliberately not performed synchronously here — the engine's
/// non-goal list excludes a background reconciliation worker for it, so a
/// caller wanting that must drive `MongoStore::delete_chunks_by_items` and
/// the Telegram `deleteMessage` calls itself.
pub async fn delete_item_permanently(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let item = state.store.get_item(&id).await?;
    let deleted = state.store.delete_items_by_path_prefix(&item.path).await?;
    let chunks = state.store.delete_chunks_by_items(&deleted.item_ids).await?;
    for chunk in chunks {
        let outcome = state
            .telegram
            .delete_message(&chunk.telegram_chat_id, chunk.telegram_message_id)
            .await;
        if let tgvault_core::errors::TelegramOutcome::Failed(e) = outcome {
            state
                .store
                .record_delete_failure(&tgvault_core::models::TelegramDeleteFailure {
                    id: None,
                    item_id: chunk.item_id,
                    telegram_chat_id: chunk.telegram_chat_id,
                    telegram_message_id: chunk.telegram_message_id,
                    error_message: e.to_string(),
                    created_at: Utc::now(),
                })
                .await?;
        }
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct FavoriteRequest {
    pub favorite: bool,
}

pub async fn set_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<FavoriteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    state.store.set_favorite(&id, payload.favorite, Utc::now()).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct VaultRequest {
    pub enabled: bool,
}

pub async fn set_vault(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<VaultRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    state.store.set_vault(&id, payload.enabled, Utc::now()).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn create_share(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let code = state.store.create_share(&id, Utc::now()).await?;
    Ok(Json(serde_json::json!({ "shared_code": code })))
}

pub async fn revoke_share(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    state.store.revoke_share(&id, Utc::now()).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub(crate) fn parse_id(raw: &str) -> Result<ObjectId, tgvault_core::TgVaultError> {
    ObjectId::parse_str(raw).map_err(|_| tgvault_core::TgVaultError::BadInput(format!("invalid id {:?}", raw)))
}
