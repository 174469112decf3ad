use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;
use tgvault_core::TgVaultError;

/// Maps a domain error to its HTTP status, per spec.md §7. Kept entirely at
/// the handler boundary — nothing upstream of this file knows about HTTP.
pub struct ApiError(pub TgVaultError);

impl From<TgVaultError> for ApiError {
    fn from(err: TgVaultError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            TgVaultError::NotFound(_) => StatusCode::NOT_FOUND,
            TgVaultError::Conflict(_) => StatusCode::CONFLICT,
            TgVaultError::BadInput(_) => StatusCode::BAD_REQUEST,
            TgVaultError::Forbidden(_) => StatusCode::FORBIDDEN,
            TgVaultError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            TgVaultError::SetupRequired(_) => StatusCode::PRECONDITION_REQUIRED,
            TgVaultError::InsufficientStorage(_) => StatusCode::INSUFFICIENT_STORAGE,
            TgVaultError::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            TgVaultError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            TgVaultError::RetryAfter(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.0.code(), "message": self.0.to_string() }));
        (status, body).into_response()
    }
}
