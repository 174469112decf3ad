use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// `getFile` responses are only valid for about an hour; the download
/// pipeline re-resolves a stale entry rather than trusting a cached one past
/// this point (spec.md §4.7 "file_id resolution cache").
const FILE_ID_TTL: Duration = Duration::from_secs(55 * 60);

struct Entry {
    file_path: String,
    cached_at: Instant,
}

/// Lock-protected TTL cache from `file_id` to the resolved Bot API
/// `file_path`, shared across concurrent downloads. Grounded on the
/// teacher's in-memory bot-state caches (`bot_manager.rs`), generalized to a
/// single TTL map keyed by file_id.
pub struct FileIdCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl FileIdCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, file_id: &str) -> Option<String> {
        let entries = self.entries.lock().expect("file_id cache poisoned");
        entries.get(file_id).and_then(|entry| {
            if entry.cached_at.elapsed() < FILE_ID_TTL {
                Some(entry.file_path.clone())
            } else {
                None
            }
        })
    }

    pub fn put(&self, file_id: String, file_path: String) {
        let mut entries = self.entries.lock().expect("file_id cache poisoned");
        entries.insert(
            file_id,
            Entry {
                file_path,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, file_id: &str) {
        let mut entries = self.entries.lock().expect("file_id cache poisoned");
        entries.remove(file_id);
    }
}

impl Default for FileIdCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_returns_fresh_entries() {
        let cache = FileIdCache::new();
        cache.put("abc".into(), "docs/file_0.bin".into());
        assert_eq!(cache.get("abc"), Some("docs/file_0.bin".to_string()));
    }

    #[test]
    fn missing_entries_return_none() {
        let cache = FileIdCache::new();
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = FileIdCache::new();
        cache.put("abc".into(), "docs/file_0.bin".into());
        cache.invalidate("abc");
        assert_eq!(cache.get("abc"), None);
    }
}
