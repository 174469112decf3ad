use crate::config::Config;
use crate::errors::Result;
use crate::models::{SessionStatus, SourceCleanupPolicy};
use crate::store::MongoStore;
use chrono::Utc;
use log::{info, warn};
use rand::Rng;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Background reaper for `UploadSession`s idle past the configured TTL
/// (spec.md §4.9). Marks the session `Failed`, releases any staged chunk
/// files, and leaves the already-committed chunks and the zero-size item
/// row alone — a resumed session can still pick those up if the caller
/// retries with the same sessionId before the row is cleaned up separately.
pub async fn reap_expired_sessions(store: &MongoStore, config: &Config) -> Result<u32> {
    let cutoff = Utc::now() - chrono::Duration::from_std(config.upload_session_ttl).unwrap();
    let expired = store.list_expired_sessions(cutoff).await?;
    let mut reaped = 0;
    for session in expired {
        let Some(id) = session.id else { continue };
        store
            .set_session_status(&id, SessionStatus::Failed, Utc::now())
            .await?;
        let staging_dir = session.staging_dir(&config.upload_staging_dir);
        if staging_dir.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(&staging_dir).await {
                warn!("failed to remove staging dir {:?}: {}", staging_dir, e);
            }
        }
        reaped += 1;
    }
    if reaped > 0 {
        info!("reaped {} expired upload session(s)", reaped);
    }
    Ok(reaped)
}

/// Runs `reap_expired_sessions` on a fixed interval until the process exits.
/// Grounded on the teacher's background-task pattern in its CLI `serve`
/// command.
pub async fn run_session_reaper_loop(store: MongoStore, config: Config) {
    let mut ticker = tokio::time::interval(config.upload_session_cleanup_interval);
    loop {
        ticker.tick().await;
        if let Err(e) = reap_expired_sessions(&store, &config).await {
            warn!("session reaper iteration failed: {}", e);
        }
    }
}

/// Computes the instant a completed torrent task's source should be purged
/// from the BitTorrent client, per the configured policy (spec.md §4.8
/// "Source cleanup policy"). Computed once at task completion; later policy
/// changes only affect tasks scheduled afterward (Design Note §9).
pub fn compute_cleanup_due_at(policy: SourceCleanupPolicy, now: chrono::DateTime<Utc>) -> chrono::DateTime<Utc> {
    match policy {
        SourceCleanupPolicy::Immediate => now,
        SourceCleanupPolicy::Fixed { minutes } => now + chrono::Duration::minutes(minutes as i64),
        SourceCleanupPolicy::Random {
            min_minutes,
            max_minutes,
        } => {
            let minutes = if max_minutes > min_minutes {
                rand::thread_rng().gen_range(min_minutes..=max_minutes)
            } else {
                min_minutes
            };
            now + chrono::Duration::minutes(minutes as i64)
        }
    }
}

/// One-shot disk sweep of the thumbnail cache directory, for the CLI's
/// `reap-thumbnails` maintenance command. `ThumbnailCacheIndex` tracks
/// access times with a monotonic `Instant` and only lives as long as the
/// serving process, so a standalone sweep re-derives "last accessed" from
/// each file's mtime instead (spec.md §4.9 "thumbnail cache reaper").
pub async fn sweep_thumbnail_cache_dir(dir: &Path, max_bytes: u64, ttl: Duration) -> Result<u32> {
    if !dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut entries = Vec::new();
    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let modified = metadata.modified().unwrap_or(now);
        let age = now.duration_since(modified).unwrap_or_default();
        entries.push((entry.path().to_path_buf(), metadata.len(), age));
    }

    let mut evict: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, (_, _, age))| *age >= ttl)
        .map(|(i, _)| i)
        .collect();

    let mut size: u64 = entries.iter().map(|(_, len, _)| *len).sum::<u64>()
        - evict.iter().map(|&i| entries[i].1).sum::<u64>();

    if size > max_bytes {
        let mut remaining: Vec<usize> = (0..entries.len()).filter(|i| !evict.contains(i)).collect();
        remaining.sort_by_key(|&i| std::cmp::Reverse(entries[i].2));
        for i in remaining {
            if size <= max_bytes {
                break;
            }
            size -= entries[i].1;
            evict.push(i);
        }
    }

    let mut reaped = 0;
    for i in evict {
        let (path, _, _) = &entries[i];
        if tokio::fs::remove_file(path).await.is_ok() {
            reaped += 1;
        }
    }
    if reaped > 0 {
        info!("reaped {} thumbnail cache file(s)", reaped);
    }
    Ok(reaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_policy_is_due_now() {
        let now = Utc::now();
        assert_eq!(compute_cleanup_due_at(SourceCleanupPolicy::Immediate, now), now);
    }

    #[test]
    fn fixed_policy_adds_exact_minutes() {
        let now = Utc::now();
        let due = compute_cleanup_due_at(SourceCleanupPolicy::Fixed { minutes: 30 }, now);
        assert_eq!(due, now + chrono::Duration::minutes(30));
    }

    #[test]
    fn random_policy_stays_within_bounds() {
        let now = Utc::now();
        for _ in 0..50 {
            let due = compute_cleanup_due_at(
                SourceCleanupPolicy::Random {
                    min_minutes: 10,
                    max_minutes: 20,
                },
                now,
            );
            let delta = (due - now).num_minutes();
            assert!((10..=20).contains(&delta));
        }
    }
}
