pub mod chunk;
pub mod events;
pub mod item;
pub mod share;
pub mod torrent_task;
pub mod transfer_history;
pub mod upload_session;

pub use chunk::*;
pub use events::*;
pub use item::*;
pub use share::*;
pub use torrent_task::*;
pub use transfer_history::*;
pub use upload_session::*;
