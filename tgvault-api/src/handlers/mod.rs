pub mod downloads;
pub mod items;
pub mod shares;
pub mod thumbnails;
pub mod torrents;
pub mod transfer_history;
pub mod uploads;
