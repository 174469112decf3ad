pub mod error;
pub mod handlers;
pub mod state;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use state::AppState;
use std::net::SocketAddr;
use tgvault_core::telegram::TelegramClient;
use tgvault_core::{Config, MongoStore};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Wires every storage-engine endpoint onto one `Router` (spec.md §6). HTTP
/// router concerns named out of scope by the engine's design — CORS, request
/// logging middleware, panic-catching middleware, the admin password/session
/// cookie layer, the setup wizard, settings screens and the front-end itself
/// — are deliberately left for a caller embedding this crate to add; this
/// only serves the storage-engine surface.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/items", get(handlers::items::list_children))
        .route("/api/items/folder", post(handlers::items::create_folder))
        .route("/api/items/:id", get(handlers::items::get_item))
        .route("/api/items/:id", patch(handlers::items::rename_or_move))
        .route("/api/items/:id", delete(handlers::items::delete_item_permanently))
        .route("/api/items/:id/copy", post(handlers::items::copy_item))
        .route("/api/items/:id/trash", post(handlers::items::trash_item))
        .route("/api/items/:id/restore", post(handlers::items::restore_item))
        .route("/api/items/:id/favorite", patch(handlers::items::set_favorite))
        .route("/api/items/:id/vault", post(handlers::items::set_vault))
        .route("/api/items/:id/share", post(handlers::items::create_share))
        .route("/api/items/:id/share", delete(handlers::items::revoke_share))
        .route("/api/items/:id/content", get(handlers::downloads::download_item))
        .route("/api/items/:id/thumbnail", get(handlers::thumbnails::get_thumbnail))
        .route("/api/files/upload", post(handlers::uploads::upload_single_shot))
        .route("/api/uploads", post(handlers::uploads::create_upload_session))
        .route("/api/uploads/:session_id", get(handlers::uploads::list_session_chunks))
        .route(
            "/api/uploads/:session_id/chunks/:chunk_index",
            post(handlers::uploads::upload_chunk_to_session),
        )
        .route(
            "/api/uploads/:session_id/complete",
            post(handlers::uploads::complete_upload_session),
        )
        .route("/api/torrents/preview", post(handlers::torrents::preview_torrent))
        .route("/api/torrents/tasks", get(handlers::torrents::list_torrent_tasks))
        .route("/api/torrents/tasks", post(handlers::torrents::create_torrent_task))
        .route("/api/torrents/tasks/:id", get(handlers::torrents::get_torrent_task))
        .route("/api/torrents/tasks/:id", delete(handlers::torrents::delete_torrent_task))
        .route(
            "/api/torrents/tasks/:id/dispatch",
            post(handlers::torrents::select_torrent_files),
        )
        .route(
            "/api/torrents/tasks/:id/retry",
            post(handlers::torrents::retry_torrent_task),
        )
        .route(
            "/api/transfer-history",
            get(handlers::transfer_history::list_transfer_history),
        )
        .route(
            "/api/transfer-history/delete-failures",
            get(handlers::transfer_history::list_delete_failures),
        )
        .route("/d/:code", get(handlers::shares::download_shared))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the HTTP server, binding to `127.0.0.1:<port>` and serving until
/// Ctrl-C. Grounded on the teacher's `start_server` (`web/mod.rs`), stripped
/// of its askama view layer and multipart/mpsc toy plumbing in favor of the
/// typed handlers in `handlers/`.
pub async fn start_server(store: MongoStore, telegram: TelegramClient, config: Config, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(store, telegram, config);
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("tgvault api listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
        })
        .await?;

    Ok(())
}
