use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    MissingEnvVar(String),

    #[error("configuration error: {0}")]
    General(String),
}

/// Domain error kinds per spec.md §7. HTTP-status mapping happens only at
/// the `tgvault-api` handler boundary, never in here.
#[derive(Error, Debug)]
pub enum TgVaultError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad input: {0}")]
    BadInput(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("setup required: {0}")]
    SetupRequired(String),

    #[error("insufficient storage: {0}")]
    InsufficientStorage(String),

    #[error("range not satisfiable")]
    RangeNotSatisfiable,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("retry after {0:?}")]
    RetryAfter(Duration),

    #[error("mongo error: {0}")]
    MongoError(#[from] mongodb::error::Error),

    #[error("bson encoding error: {0}")]
    BsonError(#[from] mongodb::bson::ser::Error),

    #[error("bson decoding error: {0}")]
    BsonDecodeError(#[from] mongodb::bson::de::Error),

    #[error("telegram transport error: {0}")]
    TelegramError(#[from] reqwest::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("retry exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl TgVaultError {
    /// Error code string used in the HTTP error body (`{"error": "...", ...}`).
    pub fn code(&self) -> &'static str {
        match self {
            TgVaultError::NotFound(_) => "not_found",
            TgVaultError::Conflict(_) => "conflict",
            TgVaultError::BadInput(_) => "bad_request",
            TgVaultError::Forbidden(_) => "forbidden",
            TgVaultError::Unauthorized(_) => "unauthorized",
            TgVaultError::SetupRequired(_) => "setup_required",
            TgVaultError::InsufficientStorage(_) => "insufficient_storage",
            TgVaultError::RangeNotSatisfiable => "range_not_satisfiable",
            TgVaultError::UpstreamUnavailable(_) => "bad_gateway",
            TgVaultError::RetryAfter(_) => "service_unavailable",
            TgVaultError::MongoError(_)
            | TgVaultError::BsonError(_)
            | TgVaultError::BsonDecodeError(_)
            | TgVaultError::TelegramError(_)
            | TgVaultError::IoError(_)
            | TgVaultError::ConfigError(_)
            | TgVaultError::RetryExhausted { .. }
            | TgVaultError::Internal(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, TgVaultError>;

/// Classification of a Telegram Bot API call outcome (Design Note §9):
/// callers match on this sum instead of sniffing error strings.
#[derive(Debug)]
pub enum TelegramOutcome<T> {
    Ok(T),
    RetryAfter(Duration),
    Failed(TgVaultError),
}
