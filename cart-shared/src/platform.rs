use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PlatformSchema {
    pub id: String,
    #[serde(default)]
    pub igdb_id: Option<i64>,
    #[serde(default)]
    pub moby_id: Option<i64>,
    pub slug: String,
    pub fs_slug: String,
    pub name: String,
    pub rom_count: u64,
    pub created_at: String,
    pub updated_at: String,
}

impl Display for PlatformSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", json)
    }
}
