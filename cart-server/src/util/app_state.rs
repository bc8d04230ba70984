use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use crate::config::{AppConfig, LibraryConfigManager};
use crate::db::Mongo;
use crate::metadata::MetadataSources;
use crate::scanner::queue::ScanQueue;
use crate::tasks::TaskRegistry;
use crate::updates::UpdateChecker;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mongo>,
    pub config: Arc<AppConfig>,
    pub library_config: Arc<LibraryConfigManager>,
    pub scan_queue: Arc<ScanQueue>,
    pub tasks: Arc<TaskRegistry>,
    pub metadata: Arc<MetadataSources>,
    pub updates: Arc<UpdateChecker>,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
