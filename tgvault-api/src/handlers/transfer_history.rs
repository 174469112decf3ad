use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// Lists recent upload/download activity (spec.md §3 "TransferHistory").
pub async fn list_transfer_history(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.store.list_transfer_history(query.limit).await?;
    Ok(Json(entries))
}

/// Lists chunk-message deletions that failed upstream on Telegram, so an
/// operator can reconcile them manually (spec.md §4.9, Non-goal: no
/// automatic reconciliation worker).
pub async fn list_delete_failures(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let failures = state.store.list_delete_failures().await?;
    Ok(Json(failures))
}
