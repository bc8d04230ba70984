mod api;
mod auth;
mod config;
mod db;
mod metadata;
mod models;
mod response;
mod scanner;
mod scheduler;
mod tasks;
mod updates;
mod util;
mod watcher;

use std::sync::Arc;

use cart_shared::scan::{ScanRequest, ScanType};
use tracing::{error, info, warn};
use util::logging::init_tracing;

use crate::config::{AppConfig, LibraryConfigManager};
use crate::metadata::MetadataSources;
use crate::models::user::UserDoc;
use crate::response::ServerResult;
use crate::scanner::queue::ScanQueue;
use crate::scanner::scan::ScanContext;
use crate::tasks::TaskRegistry;
use crate::updates::UpdateChecker;
use crate::util::app_state::AppState;

#[tokio::main]
async fn main() -> ServerResult<()> {
    println!("Booting Cartridge {}...", updates::VERSION);
    init_tracing();
    info!("Starting cartridge server");

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Failed to load config: {:?}", e);
        std::process::exit(1);
    });
    let config = Arc::new(config);

    info!("Connecting to database");
    let db = Arc::new(db::Mongo::new(&config.mongo_uri, &config.mongo_db).await?);
    db.ensure_indexes().await?;
    UserDoc::create_default_admin(&db, &config).await?;

    let library_config = Arc::new(LibraryConfigManager::load(&config.config_path)?);
    let metadata = Arc::new(MetadataSources::from_config(&config));
    if !metadata.any_enabled() {
        warn!("No metadata source configured; scans will only sync files");
    }

    let ctx = ScanContext {
        db: db.clone(),
        config: config.clone(),
        library_config: library_config.clone(),
        metadata: metadata.clone(),
    };
    let scan_queue = Arc::new(ScanQueue::new(ctx.clone()));
    let tasks = Arc::new(TaskRegistry::new(&config, &scan_queue));
    let updates = Arc::new(UpdateChecker::new());

    updates.spawn();
    scheduler::spawn(tasks.clone());
    if let Err(e) = watcher::spawn(&ctx, scan_queue.clone()) {
        error!("Could not start the filesystem watcher: {}", e);
    }

    // Sync the library into the database on boot without touching the
    // metadata APIs.
    if let Err(e) = scan_queue.submit(ScanRequest {
        scan_type: ScanType::NoScan,
        ..Default::default()
    }) {
        error!("Startup scan failed to launch: {}", e);
    }

    let state = AppState {
        cookie_key: auth::tokens::cookie_key(&config.auth_secret_key),
        db,
        config,
        library_config,
        scan_queue,
        tasks,
        metadata,
        updates,
    };

    info!("Server started");
    if let Err(e) = api::serve::serve(state).await {
        error!("Server exited: {:?}", e);
    }
    Ok(())
}
