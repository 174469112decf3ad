pub mod reapers;
pub mod retry;
pub mod slots;
pub mod thumbnail_cache;

pub use reapers::{compute_cleanup_due_at, reap_expired_sessions, run_session_reaper_loop, sweep_thumbnail_cache_dir};
pub use retry::{retry_telegram_call, RetryPolicy};
pub use slots::{SlotLimiter, SlotLimiters};
pub use thumbnail_cache::{ThumbnailCacheIndex, ThumbnailGenerator};
