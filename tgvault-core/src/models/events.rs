use std::sync::atomic::AtomicU64;
use std::sync::Arc;

/// Progress/status events streamed out of the upload pipeline, kept close to
/// the teacher's `UploadEvent`/`UploadStatus` shape.
#[derive(Debug, Clone)]
pub struct UploadEvent {
    pub status: UploadStatus,
}

#[derive(Debug, Clone)]
pub enum UploadStatus {
    Started {
        total_size: u64,
        total_chunks: u32,
        progress: Arc<AtomicU64>,
    },
    ChunkCommitted {
        index: u32,
    },
    ResolvingFileId,
    Completed {
        item_id: String,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone)]
pub struct DownloadEvent {
    pub status: DownloadStatus,
}

#[derive(Debug, Clone)]
pub enum DownloadStatus {
    Started {
        total_size: u64,
        chunks_involved: u32,
    },
    ChunkFetched {
        chunk_index: u32,
        bytes: u64,
    },
    Completed,
    Failed {
        error: String,
    },
}
