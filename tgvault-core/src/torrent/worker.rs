use crate::concurrency::compute_cleanup_due_at;
use crate::config::Config;
use crate::errors::Result;
use crate::models::{TorrentTask, TorrentTaskFile, TorrentTaskStatus};
use crate::store::MongoStore;
use crate::telegram::TelegramClient;
use crate::torrent::qbittorrent::QbittorrentClient;
use crate::upload::upload_whole_file;
use chrono::Utc;
use log::{info, warn};
use mongodb::bson::oid::ObjectId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Drives the torrent task state machine: `Queued` -> `Downloading` ->
/// `AwaitingSelection` -> `Uploading` -> `Completed`/`Error` (spec.md §4.8).
/// `run_one_cycle` claims and advances exactly one task per poll interval,
/// in strict priority order, so running more than one worker process is
/// safe and no single cycle can starve the others.
pub struct TorrentWorker {
    store: MongoStore,
    telegram: TelegramClient,
    qbittorrent: Arc<QbittorrentClient>,
    config: Config,
}

impl TorrentWorker {
    pub fn new(store: MongoStore, telegram: TelegramClient, qbittorrent: Arc<QbittorrentClient>, config: Config) -> Self {
        Self {
            store,
            telegram,
            qbittorrent,
            config,
        }
    }

    /// Claims the next queued task, if any, and hands it to qBittorrent.
    /// Returns `Ok(None)` when the queue is empty so the caller can back off.
    pub async fn claim_and_start(&self) -> Result<Option<ObjectId>> {
        let Some(task) = self.store.claim_next_queued_torrent_task(Utc::now()).await? else {
            return Ok(None);
        };
        let id = task.id.expect("claimed task always has an id");

        let save_path = self.config.torrent_download_dir.join(id.to_hex());
        if let Err(e) = self.qbittorrent.add_torrent(&task.source, &save_path.to_string_lossy()).await {
            self.store
                .set_torrent_task_error(&id, &format!("failed to add torrent: {}", e), Utc::now())
                .await?;
            return Err(e);
        }

        info!("torrent task {} submitted to qbittorrent", id);
        Ok(Some(id))
    }

    /// Polls qBittorrent for progress on a `downloading` task. Once
    /// qBittorrent reports the file list, populates `TorrentTaskFile` rows
    /// (all unselected by default — an operator selects which ones to ingest
    /// via the HTTP API) and transitions to `AwaitingSelection`. Once a
    /// selection exists and the torrent has finished downloading, drops
    /// priority on the files that were never selected and transitions to
    /// `Uploading` (spec.md §4.8 downloading-phase logic).
    pub async fn poll_downloading(&self, task_id: &ObjectId) -> Result<()> {
        let task = self.store.get_torrent_task(task_id).await?;
        if task.status != TorrentTaskStatus::Downloading {
            return Ok(());
        }

        let info = self.qbittorrent.torrent_properties(&task.infohash).await?;
        self.store
            .update_torrent_progress(task_id, info.size.max(0) as u64, info.progress, Utc::now())
            .await?;

        let existing = self.store.list_torrent_task_files(task_id).await?;
        if existing.is_empty() {
            let files = self.qbittorrent.torrent_files(&task.infohash).await?;
            if !files.is_empty() {
                let rows: Vec<TorrentTaskFile> = files
                    .iter()
                    .map(|f| TorrentTaskFile {
                        id: None,
                        task_id: *task_id,
                        file_index: f.index,
                        absolute_path: f.name.clone(),
                        display_name: f.name.clone(),
                        size: f.size.max(0) as u64,
                        selected: false,
                        uploaded: false,
                        uploaded_item_id: None,
                        error: None,
                    })
                    .collect();
                self.store.insert_torrent_task_files(&rows).await?;
                self.store
                    .set_torrent_task_status(task_id, TorrentTaskStatus::AwaitingSelection, Utc::now())
                    .await?;
            }
            return Ok(());
        }

        let selected_indices: Vec<u32> = existing.iter().filter(|f| f.selected).map(|f| f.file_index).collect();
        if !selected_indices.is_empty() && info.progress >= 0.999 {
            let unselected_indices: Vec<u32> = existing.iter().filter(|f| !f.selected).map(|f| f.file_index).collect();
            if !unselected_indices.is_empty() {
                self.qbittorrent.set_file_priority(&task.infohash, &unselected_indices, 0).await?;
            }
            self.store
                .set_torrent_task_status(task_id, TorrentTaskStatus::Uploading, Utc::now())
                .await?;
        }
        Ok(())
    }

    /// Sets which files qBittorrent should actually finish downloading, and
    /// starts it fetching them (spec.md §4.8 "file selection").
    pub async fn select_files(&self, task_id: &ObjectId, file_indices: &[u32]) -> Result<()> {
        let task = self.store.get_torrent_task(task_id).await?;
        self.qbittorrent
            .set_file_priority(&task.infohash, file_indices, 1)
            .await?;
        for index in file_indices {
            self.store
                .set_torrent_task_file_selection(task_id, *index, true)
                .await?;
        }
        self.store
            .set_torrent_task_status(task_id, TorrentTaskStatus::Downloading, Utc::now())
            .await?;
        Ok(())
    }

    /// Once all selected files have finished downloading locally, uploads
    /// each one to the storage channel and marks the task `Completed`,
    /// scheduling its source for cleanup per the configured policy (spec.md
    /// §4.8 uploading-phase logic).
    pub async fn upload_completed_selection(&self, task_id: &ObjectId) -> Result<()> {
        let task = self.store.get_torrent_task(task_id).await?;
        let mut files = self.store.list_torrent_task_files(task_id).await?;
        let is_single_file = files.len() == 1;

        let mut selected: Vec<_> = files.iter().filter(|f| f.selected && !f.uploaded).cloned().collect();
        if selected.is_empty() {
            let unselected: Vec<u32> = files.iter().filter(|f| !f.selected && !f.uploaded).map(|f| f.file_index).collect();
            if !unselected.is_empty() {
                self.qbittorrent.set_file_priority(&task.infohash, &unselected, 1).await?;
                for index in &unselected {
                    self.store.set_torrent_task_file_selection(task_id, *index, true).await?;
                }
                files = self.store.list_torrent_task_files(task_id).await?;
                selected = files.into_iter().filter(|f| f.selected && !f.uploaded).collect();
            }
        }

        if selected.is_empty() {
            return Ok(());
        }

        self.store
            .set_torrent_task_status(task_id, TorrentTaskStatus::Uploading, Utc::now())
            .await?;

        for file in selected {
            let local_path = self.resolve_local_path(&task, &file, is_single_file).await;
            let data = match tokio::fs::read(&local_path).await {
                Ok(d) => d,
                Err(e) => {
                    let message = format!("failed to read torrent file {:?}: {}", local_path, e);
                    warn!("{}", message);
                    self.store
                        .mark_torrent_task_file_error(task_id, file.file_index, &e.to_string())
                        .await?;
                    self.store.set_torrent_task_error(task_id, &message, Utc::now()).await?;
                    return Ok(());
                }
            };

            let uploaded = upload_whole_file(
                &self.store,
                &self.telegram,
                &self.config,
                task.target_parent_item_id,
                &file.display_name,
                None,
                data,
                Some(*task_id),
            )
            .await;

            match uploaded {
                Ok(item) => {
                    self.store
                        .mark_torrent_task_file_uploaded(task_id, file.file_index, item.id.as_ref().unwrap())
                        .await?;
                }
                Err(e) => {
                    self.store
                        .mark_torrent_task_file_error(task_id, file.file_index, &e.to_string())
                        .await?;
                    self.store.set_torrent_task_error(task_id, &e.to_string(), Utc::now()).await?;
                    return Ok(());
                }
            }
        }

        let remaining = self.store.list_torrent_task_files(task_id).await?;
        let all_done = remaining.iter().filter(|f| f.selected).all(|f| f.uploaded);

        if all_done {
            let due_at = compute_cleanup_due_at(self.config.default_cleanup_policy, Utc::now());
            self.store.set_torrent_cleanup_due_at(task_id, due_at).await?;
            self.store
                .set_torrent_task_status(task_id, TorrentTaskStatus::Completed, Utc::now())
                .await?;
        }
        Ok(())
    }

    /// Resolves a selected file's on-disk path using spec.md §4.8's priority
    /// chain: a single-file torrent's `contentPath` verbatim; else
    /// `join(contentPath, name)` if it exists; else `join(savePath, name)` if
    /// it exists; else the computed guess under the task's own download
    /// subdirectory. Falls back to the computed guess on any qBittorrent API
    /// error, since a stalled properties call shouldn't abort the upload.
    async fn resolve_local_path(&self, task: &TorrentTask, file: &TorrentTaskFile, is_single_file: bool) -> PathBuf {
        let guess = self
            .config
            .torrent_download_dir
            .join(task.id.expect("persisted task").to_hex())
            .join(&file.absolute_path);

        let Ok(properties) = self.qbittorrent.properties(&task.infohash).await else {
            return guess;
        };

        if is_single_file {
            if let Some(content_path) = &properties.content_path {
                return PathBuf::from(content_path);
            }
        }

        if let Some(content_path) = &properties.content_path {
            let candidate = Path::new(content_path).join(&file.display_name);
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
        }

        if let Some(save_path) = &properties.save_path {
            let candidate = Path::new(save_path).join(&file.display_name);
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
        }

        guess
    }

    /// Deletes a completed task's source from qBittorrent, removes its
    /// `.torrent` meta file, and removes each of its downloaded files
    /// individually, skipping (and warning about) any path that resolves
    /// outside the configured download root (spec.md §4.8 "Cleanup itself").
    /// On a residual failure the policy-specific caller may reschedule.
    pub async fn run_cleanup(&self, task: &TorrentTask) -> Result<()> {
        let id = task.id.expect("persisted task");

        if !task.infohash.is_empty() {
            if let Err(e) = self.qbittorrent.delete_torrent(&task.infohash, true).await {
                warn!("failed to delete torrent source for task {}: {}", id, e);
                return Err(e);
            }
        }

        if !task.meta_file_path.is_empty() {
            let meta_path = PathBuf::from(&task.meta_file_path);
            if let Err(e) = tokio::fs::remove_file(&meta_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove torrent meta file {:?}: {}", meta_path, e);
                }
            }
        }

        let download_root = self.config.torrent_download_dir.join(id.to_hex());
        let files = self.store.list_torrent_task_files(&id).await?;
        let is_single_file = files.len() == 1;
        for file in files {
            let path = self.resolve_local_path(task, &file, is_single_file).await;
            if !path.starts_with(&self.config.torrent_download_dir) {
                warn!("skipping cleanup of {:?}, outside the configured download root", path);
                continue;
            }
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("failed to remove torrent file {:?}: {}", path, e);
                }
            }
        }
        let _ = tokio::fs::remove_dir_all(&download_root).await;

        self.store.clear_torrent_cleanup_due_at(&id).await?;
        Ok(())
    }

    /// Continuously claims and advances exactly one task per poll interval,
    /// in spec.md §4.8's priority order. Grounded on the teacher's
    /// background-loop idiom used for its bot polling task.
    pub async fn run_loop(self, poll_interval: Duration) {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_one_cycle().await {
                warn!("torrent worker cycle failed: {}", e);
            }
        }
    }

    /// Single poll cycle: claims and processes exactly one task, in the
    /// priority order spec.md §4.8 names — queued, then already-downloading,
    /// then uploading/awaiting-selection, then a due cleanup.
    pub async fn run_one_cycle(&self) -> Result<()> {
        if self.claim_and_start().await?.is_some() {
            return Ok(());
        }

        if let Some(task) = self
            .store
            .find_oldest_torrent_task_by_statuses(&[TorrentTaskStatus::Downloading])
            .await?
        {
            let id = task.id.expect("persisted task");
            return self.poll_downloading(&id).await;
        }

        if let Some(task) = self
            .store
            .find_oldest_torrent_task_by_statuses(&[TorrentTaskStatus::Uploading, TorrentTaskStatus::AwaitingSelection])
            .await?
        {
            let id = task.id.expect("persisted task");
            return self.upload_completed_selection(&id).await;
        }

        if let Some(task) = self
            .store
            .list_torrent_tasks_due_for_cleanup(Utc::now())
            .await?
            .into_iter()
            .next()
        {
            return self.run_cleanup(&task).await;
        }

        Ok(())
    }
}
