pub mod pipeline;
pub mod session;

pub use pipeline::{merge_staged_chunks, upload_chunk, upload_single, upload_whole_file, CHUNK_SIZE};
pub use session::UploadSessionManager;
