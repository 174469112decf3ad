use crate::error::ApiError;
use crate::handlers::downloads::{stream_item_response, DownloadQuery};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use chrono::Utc;

/// Publicly downloads an item by its share code, with no auth (spec.md §4.1
/// "shared downloads touch `lastAccessedAt`", Design Note §9(a)). This
/// handler is the one caller allowed to bypass the (out-of-scope) admin
/// session layer entirely, by design.
pub async fn download_shared(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let item = state.store.get_item_by_share_code(&code).await?;
    let id = item.id.expect("persisted item");
    state.store.touch_last_accessed(&id, Utc::now()).await?;
    stream_item_response(state, item, headers, query.download).await
}
