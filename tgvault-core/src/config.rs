use crate::errors::ConfigError;
use crate::models::torrent_task::SourceCleanupPolicy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default maximum number of concurrent upload slots.
pub const DEFAULT_UPLOAD_SLOTS: usize = 4;
/// Default maximum number of concurrent download slots.
pub const DEFAULT_DOWNLOAD_SLOTS: usize = 8;
/// Default maximum number of concurrent thumbnail-generation slots.
pub const DEFAULT_THUMBNAIL_SLOTS: usize = 2;

/// Whether the engine talks to the public Bot API or a self-hosted one with
/// local filesystem shortcuts (spec.md GLOSSARY "Access method").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMethod {
    Official,
    SelfHosted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub telegram_api_url: String,
    pub telegram_chat_id: String,
    pub bot_token: String,
    pub access_method: AccessMethod,
    /// Only meaningful when `access_method == SelfHosted` *and* the process
    /// can read the filesystem the Bot API server writes to.
    pub allow_local_file_shortcut: bool,

    pub upload_slots: usize,
    pub download_slots: usize,
    pub thumbnail_slots: usize,

    pub upload_session_ttl: Duration,
    pub upload_session_cleanup_interval: Duration,
    pub thumbnail_cache_ttl: Duration,
    pub thumbnail_cache_max_bytes: u64,

    pub upload_staging_dir: PathBuf,
    pub thumbnail_cache_dir: PathBuf,
    pub torrent_work_dir: PathBuf,
    pub torrent_download_dir: PathBuf,
    pub secrets_dir: PathBuf,

    pub qbittorrent_url: String,
    pub qbittorrent_username: String,
    pub qbittorrent_password: String,

    pub default_cleanup_policy: SourceCleanupPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::General("could not resolve config directory".into()))?
            .join("tgvault");

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir).map_err(|e| {
                ConfigError::General(format!("failed to create config directory: {}", e))
            })?;
        }

        let config_path = config_dir.join(".env");
        if config_path.exists() {
            dotenv::from_path(&config_path).ok();
        }

        let mongo_uri = required("MONGO_URI")?;
        let telegram_chat_id = required("TELEGRAM_CHAT_ID")?;
        let bot_token = required("BOT_TOKEN")?;

        let telegram_api_url =
            env::var("TELEGRAM_API_URL").unwrap_or_else(|_| "https://api.telegram.org".to_string());

        let access_method = match env::var("TELEGRAM_ACCESS_METHOD").as_deref() {
            Ok("self_hosted") => AccessMethod::SelfHosted,
            _ => AccessMethod::Official,
        };

        let allow_local_file_shortcut = env::var("ALLOW_LOCAL_FILE_SHORTCUT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let upload_slots = env_usize("UPLOAD_SLOTS", DEFAULT_UPLOAD_SLOTS);
        let download_slots = env_usize("DOWNLOAD_SLOTS", DEFAULT_DOWNLOAD_SLOTS);
        let thumbnail_slots = env_usize("THUMBNAIL_SLOTS", DEFAULT_THUMBNAIL_SLOTS);

        let upload_session_ttl =
            Duration::from_secs(env_u64("UPLOAD_SESSION_TTL_SECS", 24 * 3600));
        let upload_session_cleanup_interval =
            Duration::from_secs(env_u64("UPLOAD_SESSION_CLEANUP_INTERVAL_SECS", 30 * 60));
        let thumbnail_cache_ttl = Duration::from_secs(env_u64("THUMBNAIL_CACHE_TTL_SECS", 7 * 24 * 3600));
        let thumbnail_cache_max_bytes = env_u64("THUMBNAIL_CACHE_MAX_BYTES", 1024 * 1024 * 1024);

        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tgvault");

        let upload_staging_dir = env_path("UPLOAD_STAGING_DIR", base_dir.join("upload-staging"));
        let thumbnail_cache_dir = env_path("THUMBNAIL_CACHE_DIR", base_dir.join("thumbnails"));
        let torrent_work_dir = env_path("TORRENT_WORK_DIR", base_dir.join("torrents/meta"));
        let torrent_download_dir = env_path("TORRENT_DOWNLOAD_DIR", base_dir.join("torrents/downloads"));
        let secrets_dir = env_path("SECRETS_DIR", config_dir.join("secrets"));

        let qbittorrent_url =
            env::var("QBITTORRENT_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let qbittorrent_username = env::var("QBITTORRENT_USERNAME").unwrap_or_default();
        let qbittorrent_password = env::var("QBITTORRENT_PASSWORD").unwrap_or_default();

        Ok(Self {
            mongo_uri,
            telegram_api_url,
            telegram_chat_id,
            bot_token,
            access_method,
            allow_local_file_shortcut,
            upload_slots,
            download_slots,
            thumbnail_slots,
            upload_session_ttl,
            upload_session_cleanup_interval,
            thumbnail_cache_ttl,
            thumbnail_cache_max_bytes,
            upload_staging_dir,
            thumbnail_cache_dir,
            torrent_work_dir,
            torrent_download_dir,
            secrets_dir,
            qbittorrent_url,
            qbittorrent_username,
            qbittorrent_password,
            default_cleanup_policy: SourceCleanupPolicy::Fixed { minutes: 60 },
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    let value = env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))?;
    if value.trim().is_empty() {
        return Err(ConfigError::MissingEnvVar(name.to_string()));
    }
    Ok(value.trim().to_string())
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_path(name: &str, default: PathBuf) -> PathBuf {
    env::var(name).map(PathBuf::from).unwrap_or(default)
}

/// Atomically write a secret file (temp file + rename), per spec.md §6
/// "Persisted on-disk layout" — used for self-hosted Bot API credential
/// files (`telegram_api_id`, `telegram_api_hash`).
pub async fn write_secret_atomic(dir: &std::path::Path, name: &str, contents: &str) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let final_path = dir.join(name);
    let tmp_path = dir.join(format!("{}.tmp", name));
    tokio::fs::write(&tmp_path, contents).await?;
    tokio::fs::rename(&tmp_path, &final_path).await?;
    Ok(())
}
