use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaskSchema {
    pub name: String,
    pub title: String,
    pub description: String,
    pub enabled: bool,
    pub cron_string: String,
    pub manual_run: bool,
}
