use std::sync::Arc;
use tgvault_core::concurrency::{ThumbnailCacheIndex, ThumbnailGenerator};
use tgvault_core::telegram::{FileIdCache, TelegramClient};
use tgvault_core::torrent::QbittorrentClient;
use tgvault_core::upload::UploadSessionManager;
use tgvault_core::{Config, MongoStore};
use tokio::sync::Mutex;

/// Shared handler state. Grounded on the teacher's `WebState` (`web/mod.rs`),
/// generalized from a single `TgCloudService` handle into the engine's
/// separate store/telegram/session collaborators.
#[derive(Clone)]
pub struct AppState {
    pub store: MongoStore,
    pub telegram: TelegramClient,
    pub config: Config,
    pub sessions: UploadSessionManager,
    pub file_id_cache: Arc<FileIdCache>,
    pub qbittorrent: Arc<QbittorrentClient>,
    pub thumbnail_generator: ThumbnailGenerator,
    pub thumbnail_cache_index: Arc<Mutex<ThumbnailCacheIndex>>,
}

impl AppState {
    pub fn new(store: MongoStore, telegram: TelegramClient, config: Config) -> Self {
        let sessions = UploadSessionManager::new(store.clone(), telegram.clone(), config.clone());
        let qbittorrent = QbittorrentClient::new(
            config.qbittorrent_url.clone(),
            config.qbittorrent_username.clone(),
            config.qbittorrent_password.clone(),
        );
        Self {
            store,
            telegram,
            config,
            sessions,
            file_id_cache: Arc::new(FileIdCache::new()),
            qbittorrent: Arc::new(qbittorrent),
            thumbnail_generator: ThumbnailGenerator::new(),
            thumbnail_cache_index: Arc::new(Mutex::new(ThumbnailCacheIndex::new())),
        }
    }
}
