use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::errors::Result;

/// Ensures only one generation runs per item at a time; every other caller
/// waiting on the same item's thumbnail joins the in-flight generation
/// instead of starting a duplicate `ffmpeg` process (spec.md §4.9
/// "single-flighted thumbnail generation").
#[derive(Clone)]
pub struct ThumbnailGenerator {
    in_flight: Arc<Mutex<HashMap<String, Arc<tokio::sync::Notify>>>>,
}

impl ThumbnailGenerator {
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Runs `generate` for `key`, collapsing concurrent callers for the same
    /// key into a single execution. Concurrent callers that lose the race
    /// wait for the winner and then re-run `on_cached` to read the result
    /// the winner produced.
    pub async fn single_flight<T, G, C>(&self, key: &str, generate: G, on_cached: C) -> Result<T>
    where
        G: std::future::Future<Output = Result<T>>,
        C: std::future::Future<Output = Result<T>>,
    {
        let notify = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.get(key).cloned() {
                Some(existing)
            } else {
                let notify = Arc::new(tokio::sync::Notify::new());
                in_flight.insert(key.to_string(), notify);
                None
            }
        };

        match notify {
            Some(existing) => {
                existing.notified().await;
                on_cached.await
            }
            None => {
                let result = generate.await;
                let mut in_flight = self.in_flight.lock().await;
                if let Some(notify) = in_flight.remove(key) {
                    notify.notify_waiters();
                }
                result
            }
        }
    }
}

impl Default for ThumbnailGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Evicts cache entries on an LRU-ish policy bounded by both a max byte
/// budget and a TTL (spec.md §4.9 "Thumbnail cache reaper"). Entries are
/// tracked by last-access time; eviction removes the coldest entries first
/// until the cache fits the byte budget, then separately removes anything
/// past the TTL regardless of size.
pub struct ThumbnailCacheIndex {
    entries: HashMap<String, CacheEntry>,
}

struct CacheEntry {
    size: u64,
    last_accessed: std::time::Instant,
}

impl ThumbnailCacheIndex {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn record_access(&mut self, key: String, size: u64) {
        self.entries.insert(
            key,
            CacheEntry {
                size,
                last_accessed: std::time::Instant::now(),
            },
        );
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Returns keys to evict: first everything past `ttl`, then — if the
    /// cache is still over `max_bytes` after that — the coldest remaining
    /// entries until it fits.
    pub fn keys_to_evict(&self, max_bytes: u64, ttl: std::time::Duration) -> Vec<String> {
        let mut evict: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.last_accessed.elapsed() >= ttl)
            .map(|(k, _)| k.clone())
            .collect();

        let mut size = self.total_size()
            - evict
                .iter()
                .filter_map(|k| self.entries.get(k))
                .map(|e| e.size)
                .sum::<u64>();

        if size > max_bytes {
            let mut remaining: Vec<(&String, &CacheEntry)> = self
                .entries
                .iter()
                .filter(|(k, _)| !evict.contains(k))
                .collect();
            remaining.sort_by_key(|(_, e)| e.last_accessed);

            for (key, entry) in remaining {
                if size <= max_bytes {
                    break;
                }
                size -= entry.size;
                evict.push(key.clone());
            }
        }

        evict
    }
}

impl Default for ThumbnailCacheIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn single_flight_runs_generator_once() {
        let gen = ThumbnailGenerator::new();
        let counter = Arc::new(std::sync::atomic::AtomicU32::new(0));

        let c1 = counter.clone();
        let fut1 = gen.single_flight(
            "item-1",
            async move {
                c1.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok::<_, crate::errors::TgVaultError>(1u32)
            },
            async { Ok::<_, crate::errors::TgVaultError>(1u32) },
        );

        let result = fut1.await.unwrap();
        assert_eq!(result, 1);
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn evicts_coldest_entries_first_to_fit_budget() {
        let mut index = ThumbnailCacheIndex::new();
        index.record_access("a".into(), 100);
        std::thread::sleep(Duration::from_millis(5));
        index.record_access("b".into(), 100);
        let evicted = index.keys_to_evict(150, Duration::from_secs(3600));
        assert_eq!(evicted, vec!["a".to_string()]);
    }
}
