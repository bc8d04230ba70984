//! Background tasks: the scheduled rescan and the remote fixture pulls
//! that refresh the title databases used to name Switch and MAME dumps.
//! Each task reports into the heartbeat `SCHEDULER` slot and can also be
//! run on demand through `POST /api/tasks/{name}/run`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cart_shared::scan::{ScanRequest, ScanType};
use cart_shared::tasks::TaskSchema;
use serde_json::{Value, json};
use tracing::info;

use crate::config::AppConfig;
use crate::response::ServerResult;
use crate::scanner::queue::ScanQueue;

const SWITCH_TITLEDB_URL: &str =
    "https://raw.githubusercontent.com/blawar/titledb/master/US.en.json";
const MAME_XML_URL: &str = "https://github.com/mamedev/mame/releases/latest/download/mame.xml";

#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;
    fn title(&self) -> &'static str;
    fn description(&self) -> String;
    /// Key of this task's entry in the heartbeat `SCHEDULER` report.
    fn report_key(&self) -> &'static str;
    fn enabled(&self) -> bool;
    fn cron(&self) -> &str;
    fn manual_run(&self) -> bool {
        true
    }
    async fn run(&self) -> ServerResult<()>;
}

pub struct TaskRegistry {
    tasks: Vec<Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new(config: &Arc<AppConfig>, queue: &Arc<ScanQueue>) -> Self {
        let tasks: Vec<Arc<dyn Task>> = vec![
            Arc::new(ScanLibraryTask {
                queue: queue.clone(),
                enabled: config.enable_scheduled_rescan,
                cron: config.scheduled_rescan_cron.clone(),
            }),
            Arc::new(UpdateSwitchTitledbTask {
                dest: config.resources_path.join("fixtures/switch_titledb.json"),
                enabled: config.enable_scheduled_update_switch_titledb,
                cron: config.scheduled_update_switch_titledb_cron.clone(),
            }),
            Arc::new(UpdateMameXmlTask {
                dest: config.resources_path.join("fixtures/mame.xml"),
                enabled: config.enable_scheduled_update_mame_xml,
                cron: config.scheduled_update_mame_xml_cron.clone(),
            }),
        ];
        Self { tasks }
    }

    pub fn all(&self) -> &[Arc<dyn Task>] {
        &self.tasks
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.iter().find(|t| t.name() == name).cloned()
    }

    pub fn list(&self) -> Vec<TaskSchema> {
        self.tasks
            .iter()
            .map(|t| TaskSchema {
                name: t.name().to_string(),
                title: t.title().to_string(),
                description: t.description(),
                enabled: t.enabled(),
                cron_string: t.cron().to_string(),
                manual_run: t.manual_run(),
            })
            .collect()
    }

    /// The `SCHEDULER` heartbeat slot, keyed by report key.
    pub fn heartbeat_report(&self) -> Value {
        let mut report = serde_json::Map::new();
        for task in &self.tasks {
            report.insert(
                task.report_key().to_string(),
                json!({
                    "ENABLED": task.enabled(),
                    "CRON": task.cron(),
                    "TITLE": task.title(),
                    "MESSAGE": task.description(),
                }),
            );
        }
        Value::Object(report)
    }
}

struct ScanLibraryTask {
    queue: Arc<ScanQueue>,
    enabled: bool,
    cron: String,
}

#[async_trait]
impl Task for ScanLibraryTask {
    fn name(&self) -> &'static str {
        "scan_library"
    }
    fn title(&self) -> &'static str {
        "Scheduled rescan"
    }
    fn description(&self) -> String {
        "Rescans the entire library".to_string()
    }
    fn report_key(&self) -> &'static str {
        "RESCAN"
    }
    fn enabled(&self) -> bool {
        self.enabled
    }
    fn cron(&self) -> &str {
        &self.cron
    }

    async fn run(&self) -> ServerResult<()> {
        self.queue.submit(ScanRequest {
            scan_type: ScanType::Quick,
            ..Default::default()
        })?;
        Ok(())
    }
}

/// Downloads a remote fixture into the resources tree, atomically via a
/// sibling temp file so a failed pull never clobbers the previous copy.
async fn fetch_to_file(url: &str, dest: &PathBuf) -> ServerResult<u64> {
    info!("Fetching {}", url);
    let body = reqwest::get(url).await?.error_for_status()?.bytes().await?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = dest.with_extension("download");
    tokio::fs::write(&tmp, &body).await?;
    tokio::fs::rename(&tmp, dest).await?;

    info!("Saved {} bytes to {}", body.len(), dest.display());
    Ok(body.len() as u64)
}

struct UpdateSwitchTitledbTask {
    dest: PathBuf,
    enabled: bool,
    cron: String,
}

#[async_trait]
impl Task for UpdateSwitchTitledbTask {
    fn name(&self) -> &'static str {
        "update_switch_titledb"
    }
    fn title(&self) -> &'static str {
        "Switch TitleDB update"
    }
    fn description(&self) -> String {
        "Updates the Nintendo Switch TitleDB file".to_string()
    }
    fn report_key(&self) -> &'static str {
        "SWITCH_TITLEDB"
    }
    fn enabled(&self) -> bool {
        self.enabled
    }
    fn cron(&self) -> &str {
        &self.cron
    }

    async fn run(&self) -> ServerResult<()> {
        fetch_to_file(SWITCH_TITLEDB_URL, &self.dest).await?;
        Ok(())
    }
}

struct UpdateMameXmlTask {
    dest: PathBuf,
    enabled: bool,
    cron: String,
}

#[async_trait]
impl Task for UpdateMameXmlTask {
    fn name(&self) -> &'static str {
        "update_mame_xml"
    }
    fn title(&self) -> &'static str {
        "MAME XML update"
    }
    fn description(&self) -> String {
        "Updates the MAME XML file".to_string()
    }
    fn report_key(&self) -> &'static str {
        "MAME_XML"
    }
    fn enabled(&self) -> bool {
        self.enabled
    }
    fn cron(&self) -> &str {
        &self.cron
    }

    async fn run(&self) -> ServerResult<()> {
        fetch_to_file(MAME_XML_URL, &self.dest).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TaskRegistry {
        let tasks: Vec<Arc<dyn Task>> = vec![Arc::new(UpdateMameXmlTask {
            dest: PathBuf::from("/tmp/mame.xml"),
            enabled: true,
            cron: "0 0 5 * * *".to_string(),
        })];
        TaskRegistry { tasks }
    }

    #[test]
    fn report_uses_upper_cased_keys() {
        let report = registry().heartbeat_report();
        let entry = &report["MAME_XML"];
        assert_eq!(entry["ENABLED"], true);
        assert_eq!(entry["CRON"], "0 0 5 * * *");
        assert_eq!(entry["TITLE"], "MAME XML update");
        assert!(entry["MESSAGE"].as_str().unwrap().contains("MAME"));
    }

    #[test]
    fn lookup_by_name() {
        let registry = registry();
        assert!(registry.get("update_mame_xml").is_some());
        assert!(registry.get("nope").is_none());

        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "update_mame_xml");
        assert!(listed[0].manual_run);
    }
}
