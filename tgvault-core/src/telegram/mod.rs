pub mod client;
pub mod file_id_cache;

pub use client::{
    next_backoff, Chat, ChatMember, FileMeta, MediaKind, Message, ResolvedFile, SendSource,
    TelegramClient, User, VideoOptions,
};
pub use file_id_cache::FileIdCache;
