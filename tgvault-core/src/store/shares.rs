use super::MongoStore;
use crate::errors::{Result, TgVaultError};
use crate::models::{generate_share_code, SHARE_CODE_RETRY_BUDGET};
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

impl MongoStore {
    /// Allocates a fresh share code for `id`, retrying on collision up to
    /// `SHARE_CODE_RETRY_BUDGET` times before giving up (spec.md §4.1
    /// "Share code allocation").
    pub async fn create_share(&self, id: &ObjectId, now: DateTime<Utc>) -> Result<String> {
        let mut last_err = None;
        for _ in 0..SHARE_CODE_RETRY_BUDGET {
            let code = generate_share_code();
            match self.set_share(id, &code, now).await {
                Ok(()) => return Ok(code),
                Err(TgVaultError::Conflict(msg)) => last_err = Some(TgVaultError::Conflict(msg)),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            TgVaultError::Internal("share code allocation exhausted its retry budget".into())
        }))
    }

    pub async fn revoke_share(&self, id: &ObjectId, now: DateTime<Utc>) -> Result<()> {
        self.clear_share(id, now).await
    }
}
