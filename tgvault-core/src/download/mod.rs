pub mod pipeline;
pub mod range;

pub use pipeline::{prepare_download, stream_download, PreparedDownload};
pub use range::{parse_single_range, ByteRange};
