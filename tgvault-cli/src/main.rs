mod ui;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tgvault_core::concurrency::{run_session_reaper_loop, sweep_thumbnail_cache_dir};
use tgvault_core::telegram::TelegramClient;
use tgvault_core::torrent::{QbittorrentClient, TorrentWorker};
use tgvault_core::{Config, MongoStore};
use ui::*;

#[derive(Parser)]
#[command(name = "tgvault")]
#[command(about = "Operator CLI for the tgvault storage engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API and run the background workers (session reaper,
    /// thumbnail reaper, torrent worker — which also drives torrent
    /// source-cleanup as its lowest-priority cycle step).
    Serve {
        #[arg(long, default_value_t = 8090)]
        port: u16,
    },
    /// List the children of a folder (root by default).
    List {
        #[arg(long)]
        parent_id: Option<String>,
        #[arg(long, default_value_t = false)]
        include_trashed: bool,
    },
    /// Run the expired-upload-session reaper once and exit.
    ReapSessions,
    /// Sweep the on-disk thumbnail cache once and exit.
    ReapThumbnails,
    /// Torrent task maintenance.
    Torrents {
        #[command(subcommand)]
        action: TorrentAction,
    },
}

#[derive(Subcommand)]
enum TorrentAction {
    /// List all torrent tasks.
    List,
    /// Re-queue a task stuck in `error`.
    Retry { task_id: String },
    /// Remove a task's tracking rows (does not touch the external client).
    Delete { task_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();
    tracing_subscriber::fmt::try_init().ok();

    let args = Cli::parse();
    print_banner();

    let config = Config::from_env().context("failed to load configuration")?;

    let spinner = create_spinner("Connecting to services...");
    let store = MongoStore::new(&config.mongo_uri)
        .await
        .inspect_err(|_| spinner.finish_and_clear())
        .context("failed to connect to the metadata store")?;
    let telegram = TelegramClient::new(
        config.telegram_api_url.clone(),
        config.bot_token.clone(),
        config.telegram_chat_id.clone(),
    );
    spinner.finish_and_clear();

    match args.command {
        Commands::Serve { port } => {
            let qbittorrent = QbittorrentClient::new(
                config.qbittorrent_url.clone(),
                config.qbittorrent_username.clone(),
                config.qbittorrent_password.clone(),
            );

            tokio::spawn(run_session_reaper_loop(store.clone(), config.clone()));
            tokio::spawn({
                let dir = config.thumbnail_cache_dir.clone();
                let max_bytes = config.thumbnail_cache_max_bytes;
                let ttl = config.thumbnail_cache_ttl;
                async move {
                    let mut ticker = tokio::time::interval(Duration::from_secs(3600));
                    loop {
                        ticker.tick().await;
                        if let Err(e) = sweep_thumbnail_cache_dir(&dir, max_bytes, ttl).await {
                            log::warn!("thumbnail cache sweep failed: {}", e);
                        }
                    }
                }
            });
            let worker = TorrentWorker::new(store.clone(), telegram.clone(), Arc::new(qbittorrent), config.clone());
            tokio::spawn(worker.run_loop(Duration::from_secs(10)));

            tgvault_api::start_server(store, telegram, config, port).await?;
        }

        Commands::List { parent_id, include_trashed } => {
            let parent_id = parent_id
                .map(|id| mongodb::bson::oid::ObjectId::parse_str(&id))
                .transpose()
                .context("invalid --parent-id")?;
            let spinner = create_spinner("Listing items...");
            let items = store.list_children(parent_id.as_ref(), include_trashed).await;
            spinner.finish_and_clear();
            match items {
                Ok(items) if items.is_empty() => println!("No items found."),
                Ok(items) => print_item_list(items),
                Err(e) => print_error(&format!("List failed: {}", e)),
            }
        }

        Commands::ReapSessions => {
            let spinner = create_spinner("Reaping expired upload sessions...");
            let result = tgvault_core::concurrency::reap_expired_sessions(&store, &config).await;
            spinner.finish_and_clear();
            match result {
                Ok(n) => print_success(&format!("Reaped {} expired session(s)", n)),
                Err(e) => print_error(&format!("Reap failed: {}", e)),
            }
        }

        Commands::ReapThumbnails => {
            let spinner = create_spinner("Sweeping thumbnail cache...");
            let result = sweep_thumbnail_cache_dir(
                &config.thumbnail_cache_dir,
                config.thumbnail_cache_max_bytes,
                config.thumbnail_cache_ttl,
            )
            .await;
            spinner.finish_and_clear();
            match result {
                Ok(n) => print_success(&format!("Evicted {} thumbnail file(s)", n)),
                Err(e) => print_error(&format!("Sweep failed: {}", e)),
            }
        }

        Commands::Torrents { action } => match action {
            TorrentAction::List => {
                let spinner = create_spinner("Listing torrent tasks...");
                let tasks = store.list_torrent_tasks().await;
                spinner.finish_and_clear();
                match tasks {
                    Ok(tasks) if tasks.is_empty() => println!("No torrent tasks found."),
                    Ok(tasks) => print_torrent_list(tasks),
                    Err(e) => print_error(&format!("List failed: {}", e)),
                }
            }
            TorrentAction::Retry { task_id } => {
                let id = mongodb::bson::oid::ObjectId::parse_str(&task_id).context("invalid task id")?;
                let spinner = create_spinner(&format!("Retrying torrent task {}...", task_id));
                let result: anyhow::Result<()> = async {
                    let task = store.get_torrent_task(&id).await?;
                    if !task.infohash.is_empty() {
                        let qbittorrent = QbittorrentClient::new(
                            config.qbittorrent_url.clone(),
                            config.qbittorrent_username.clone(),
                            config.qbittorrent_password.clone(),
                        );
                        let _ = qbittorrent.delete_torrent(&task.infohash, true).await;
                    }
                    store.delete_torrent_task_files(&id).await?;
                    store.reset_torrent_task_for_retry(&id, chrono::Utc::now()).await?;
                    Ok(())
                }
                .await;
                spinner.finish_and_clear();
                match result {
                    Ok(()) => print_success(&format!("Torrent task {} re-queued", task_id)),
                    Err(e) => print_error(&format!("Retry failed: {}", e)),
                }
            }
            TorrentAction::Delete { task_id } => {
                let id = mongodb::bson::oid::ObjectId::parse_str(&task_id).context("invalid task id")?;
                let spinner = create_spinner(&format!("Deleting torrent task {}...", task_id));
                let result = store.delete_torrent_task(&id).await;
                spinner.finish_and_clear();
                match result {
                    Ok(()) => print_success(&format!("Torrent task {} deleted", task_id)),
                    Err(e) => print_error(&format!("Delete failed: {}", e)),
                }
            }
        },
    }

    Ok(())
}
