pub mod qbittorrent;
pub mod worker;

pub use qbittorrent::QbittorrentClient;
pub use worker::TorrentWorker;
